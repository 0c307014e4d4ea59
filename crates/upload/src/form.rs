use bytes::Bytes;
use exn::ResultExt;
use futures::Stream;
use interactives_models::{Archive, InteractiveUpdate, Violation, Violations};
use multer::{Constraints, Field, Multipart, SizeLimit};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::error::{ErrorKind, Result};
use crate::policy::{AttachmentRule, FormShape, at_most_one_and_or_metadata, exactly_one_with_metadata};

/// Name of the JSON side-channel field.
pub const METADATA_FIELD: &str = "interactive";
/// Field that attachment problems are reported against.
pub const FILE_FIELD: &str = "file";

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    pub max_upload_size_mb: u64,
    pub max_metadata_bytes: u64,
    /// Directory for spooled attachments; the system temp dir if unset.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_size_mb: 2500,
            max_metadata_bytes: BYTES_PER_MB,
            scratch_dir: None,
        }
    }
}

impl Limits {
    fn max_upload_size(&self) -> u64 {
        self.max_upload_size_mb.saturating_mul(BYTES_PER_MB)
    }
}

/// What a call site requires of a request.
pub struct Expectations {
    rule: Box<dyn AttachmentRule>,
    pub metadata_mandatory: bool,
    /// Open the attachment as a zip and list its HTML pages.
    pub inspect_archive: bool,
}

impl Expectations {
    pub fn new(rule: impl AttachmentRule + 'static, metadata_mandatory: bool) -> Self {
        Self { rule: Box::new(rule), metadata_mandatory, inspect_archive: false }
    }

    pub fn inspecting(mut self) -> Self {
        self.inspect_archive = true;
        self
    }

    /// Exactly one zip plus metadata; the zip must hold a renderable page.
    pub fn create() -> Self {
        Self::new(exactly_one_with_metadata, true).inspecting()
    }

    /// A zip, metadata, or both.
    pub fn update() -> Self {
        Self::new(at_most_one_and_or_metadata, false)
    }
}

/// The uploaded archive, spooled to a temporary file.
///
/// The file is removed when this value is dropped.
#[derive(Debug)]
pub struct Attachment {
    /// Base name as sent by the client.
    pub file_name: String,
    pub size: u64,
    /// Hex BLAKE3 digest of the content.
    pub sha: String,
    /// Present when the archive was inspected.
    pub archive: Option<Archive>,
    file: NamedTempFile,
}

impl Attachment {
    /// Wrap an already spooled file. The file is deleted along with the attachment.
    pub fn new(file_name: impl Into<String>, size: u64, sha: impl Into<String>, file: NamedTempFile) -> Self {
        Self { file_name: file_name.into(), size, sha: sha.into(), archive: None, file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// A request that passed validation.
#[derive(Debug, Default)]
pub struct FormData {
    pub attachment: Option<Attachment>,
    /// Normalized side-channel payload.
    pub update: Option<InteractiveUpdate>,
}

enum Spooled {
    Complete(Attachment),
    Rejected(Violation),
}

/// Stateless multipart validator, shared between requests.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: Limits,
}

impl Validator {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Parse and validate a multipart body.
    ///
    /// The attachment is streamed to scratch space while it is hashed, so
    /// memory use does not grow with the upload. Every problem found is
    /// collected into one [`ErrorKind::Invalid`]; other errors mean the
    /// request could not be examined at all.
    #[instrument(skip_all, fields(inspect = expect.inspect_archive))]
    pub async fn validate<S, O, E>(&self, content_type: Option<&str>, body: S, expect: &Expectations) -> Result<FormData>
    where
        S: Stream<Item = std::result::Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut violations = Violations::default();
        let boundary = match content_type.map(multer::parse_boundary) {
            Some(Ok(boundary)) => boundary,
            Some(Err(e)) => {
                violations.push(FILE_FIELD, format!("error parsing form data {e}"));
                exn::bail!(ErrorKind::Invalid(violations));
            },
            None => {
                violations.push(FILE_FIELD, "error parsing form data: missing content type");
                exn::bail!(ErrorKind::Invalid(violations));
            },
        };
        let constraints = Constraints::new()
            .size_limit(SizeLimit::new().for_field(METADATA_FIELD, self.limits.max_metadata_bytes));
        let mut multipart = Multipart::with_constraints(body, boundary, constraints);

        let mut shape = FormShape::default();
        let mut attachment = None;
        let mut metadata = None;
        // Parsing stopped early; what is missing may simply be unread.
        let mut truncated = false;
        loop {
            let field = match multipart.next_field().await {
                Ok(Some(field)) => field,
                Ok(None) => break,
                Err(e) => {
                    violations.extend([self.parse_violation(e)]);
                    truncated = true;
                    break;
                },
            };
            if let Some(file_name) = field.file_name().map(base_name) {
                shape.attachments += 1;
                if shape.attachments > 1 {
                    continue;
                }
                let extension = Path::new(&file_name).extension().and_then(|e| e.to_str()).unwrap_or_default();
                if extension != "zip" {
                    let shown = if extension.is_empty() { String::new() } else { format!(".{extension}") };
                    violations.push(FILE_FIELD, format!("file extension ({shown}) should be zip"));
                    continue;
                }
                match self.spool(field, file_name).await? {
                    Spooled::Complete(spooled) => attachment = Some(spooled),
                    Spooled::Rejected(violation) => {
                        violations.extend([violation]);
                        truncated = true;
                        break;
                    },
                }
            } else if field.name() == Some(METADATA_FIELD) {
                match field.text().await {
                    Ok(text) => metadata = Some(text),
                    Err(e) => {
                        violations.extend([self.parse_violation(e)]);
                        truncated = true;
                        break;
                    },
                }
            }
        }

        let metadata = metadata.filter(|text| !text.trim().is_empty());
        shape.has_metadata = metadata.is_some();
        if shape.attachments > 1 {
            violations.push(FILE_FIELD, "only one attachment is allowed");
        }
        if !truncated {
            if let Err(message) = expect.rule.check(&shape) {
                violations.push(FILE_FIELD, message);
            }
            if metadata.is_none() && expect.metadata_mandatory {
                violations.push(METADATA_FIELD, "missing mandatory key in form data");
            }
        }

        let update = match metadata {
            Some(text) => match serde_json::from_str::<InteractiveUpdate>(&text) {
                Ok(mut update) => {
                    update.normalize();
                    if expect.metadata_mandatory && update.metadata.is_none() {
                        violations.push(format!("{METADATA_FIELD}.metadata"), "required");
                    }
                    violations.extend(update.violations(METADATA_FIELD));
                    Some(update)
                },
                Err(e) => {
                    tracing::debug!(error = %e, "metadata is not valid JSON");
                    violations.push(METADATA_FIELD, "cannot unmarshal update json");
                    None
                },
            },
            None => None,
        };

        if expect.inspect_archive
            && violations.is_empty()
            && let Some(spooled) = attachment.as_mut()
        {
            match Self::inspect(spooled).await? {
                Ok(archive) => spooled.archive = Some(archive),
                Err(message) => violations.push(FILE_FIELD, message),
            }
        }

        if !violations.is_empty() {
            tracing::debug!(count = violations.len(), "rejecting form data");
            exn::bail!(ErrorKind::Invalid(violations));
        }
        Ok(FormData { attachment, update })
    }

    async fn spool(&self, mut field: Field<'static>, file_name: String) -> Result<Spooled> {
        let file = match &self.limits.scratch_dir {
            Some(dir) => tempfile::Builder::new().prefix("upload-").suffix(".zip").tempfile_in(dir),
            None => tempfile::Builder::new().prefix("upload-").suffix(".zip").tempfile(),
        }
        .or_raise(|| ErrorKind::Io)?;
        let mut writer = tokio::fs::File::from_std(file.as_file().try_clone().or_raise(|| ErrorKind::Io)?);
        let mut hasher = blake3::Hasher::new();
        let max = self.limits.max_upload_size();
        let mut size: u64 = 0;
        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Ok(Spooled::Rejected(self.parse_violation(e))),
            };
            size += chunk.len() as u64;
            if size > max {
                return Ok(Spooled::Rejected(Violation::new(
                    FILE_FIELD,
                    format!("size of content exceeded allowed limit ({} MB)", self.limits.max_upload_size_mb),
                )));
            }
            hasher.update(&chunk);
            writer.write_all(&chunk).await.or_raise(|| ErrorKind::Io)?;
        }
        writer.flush().await.or_raise(|| ErrorKind::Io)?;
        let sha = hasher.finalize().to_hex().to_string();
        tracing::debug!(file = %file_name, size, sha = %sha, "spooled attachment");
        Ok(Spooled::Complete(Attachment::new(file_name, size, sha, file)))
    }

    /// Inspect the spooled zip off the async runtime. The inner error is a
    /// message for the file field.
    async fn inspect(attachment: &Attachment) -> Result<std::result::Result<Archive, String>> {
        let name = attachment.file_name.clone();
        let file = attachment.file.reopen().or_raise(|| ErrorKind::Io)?;
        let inspected = tokio::task::spawn_blocking(move || interactives_archive::open_reader(&name, BufReader::new(file)))
            .await
            .or_raise(|| ErrorKind::Aborted)?;
        Ok(inspected.map_err(|e| (*e).to_string()))
    }

    fn parse_violation(&self, error: multer::Error) -> Violation {
        match error {
            multer::Error::FieldSizeExceeded { field_name, .. } if field_name.as_deref() == Some(METADATA_FIELD) => {
                Violation::new(
                    METADATA_FIELD,
                    format!("exceeded allowed size ({} bytes)", self.limits.max_metadata_bytes),
                )
            },
            other => Violation::new(FILE_FIELD, format!("error parsing form data {other}")),
        }
    }
}

/// Strip any client-side directories from an uploaded file name.
fn base_name(file_name: &str) -> String {
    let last = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    last.to_string()
}
