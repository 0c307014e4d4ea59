use exn::ResultExt;
use interactives_models::{Archive, HtmlFile};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::instrument;
use zip::ZipArchive;

use crate::error::{ErrorKind, Result};

const HTML_EXTENSIONS: [&str; 2] = ["html", "htm"];

/// Inspect an in-memory zip.
///
/// See [`open_reader`].
pub fn open(name: &str, bytes: &[u8]) -> Result<Archive> {
    open_reader(name, Cursor::new(bytes))
}

/// Walk every entry of a zip and collect the HTML pages that a preview can
/// render.
///
/// Hidden entries (base name starting with `.`) and directories are skipped.
/// Fails with [`ErrorKind::NoIndexHtml`] when nothing renderable is left.
#[instrument(skip(reader))]
pub fn open_reader<R: Read + Seek>(name: &str, mut reader: R) -> Result<Archive> {
    let size_in_bytes = reader.seek(SeekFrom::End(0)).or_raise(|| ErrorKind::Io)?;
    reader.rewind().or_raise(|| ErrorKind::Io)?;

    let mut zip = ZipArchive::new(reader).map_err(|e| ErrorKind::InvalidZip(e.to_string()))?;
    let mut files = Vec::new();
    for index in 0..zip.len() {
        let entry = zip.by_index_raw(index).map_err(|e| ErrorKind::InvalidZip(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        if let Some(base) = html_base_name(entry.name()) {
            files.push(HtmlFile {
                name: base.to_string(),
                uri: entry.name().to_string(),
                size_in_bytes: entry.size(),
            });
        }
    }

    if files.is_empty() {
        exn::bail!(ErrorKind::NoIndexHtml);
    }
    tracing::debug!(archive = name, html_files = files.len(), "inspected archive");
    Ok(Archive {
        name: name.to_string(),
        size_in_bytes,
        files,
        import_message: None,
    })
}

/// Base name of a visible `.htm`/`.html` entry.
fn html_base_name(entry: &str) -> Option<&str> {
    let path = Path::new(entry);
    let base = path.file_name()?.to_str()?;
    if base.starts_with('.') {
        return None;
    }
    let extension = path.extension()?.to_str()?;
    HTML_EXTENSIONS
        .iter()
        .any(|html| extension.eq_ignore_ascii_case(html))
        .then_some(base)
}
