use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorKind, Result};

/// Import lifecycle of an interactive.
///
/// ```text
/// ArchiveUploaded --(dispatch ok)--> ArchiveDispatchedToImporter --(import ok)--> ImportSuccess
/// ArchiveUploaded --(dispatch fails)--> ArchiveDispatchFailed
/// ArchiveDispatchedToImporter --(import failed)--> ImportFailure
/// ```
///
/// The importer may report back before the dispatch outcome has been recorded,
/// so import results are also accepted from `ArchiveUploaded` and
/// `ArchiveDispatchFailed`. Nothing ever moves back to `ArchiveUploaded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum State {
    ArchiveUploaded,
    ArchiveDispatchFailed,
    ArchiveDispatchedToImporter,
    ImportFailure,
    ImportSuccess,
}

impl State {
    pub const ALL: [State; 5] = [
        State::ArchiveUploaded,
        State::ArchiveDispatchFailed,
        State::ArchiveDispatchedToImporter,
        State::ImportFailure,
        State::ImportSuccess,
    ];

    /// Canonical external name, used both on the wire and in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            State::ArchiveUploaded => "ArchiveUploaded",
            State::ArchiveDispatchFailed => "ArchiveDispatchFailed",
            State::ArchiveDispatchedToImporter => "ArchiveDispatchedToImporter",
            State::ImportFailure => "ImportFailure",
            State::ImportSuccess => "ImportSuccess",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, State::ImportFailure | State::ImportSuccess)
    }

    /// Only a successfully imported archive may be published.
    pub fn can_publish(&self) -> bool {
        *self == State::ImportSuccess
    }

    /// Record the outcome of handing the archive to the importer.
    ///
    /// The service itself only takes the failure edge; the success edge is
    /// for external drivers that confirm delivery.
    pub fn dispatched(self, ok: bool) -> Result<State> {
        let to = match ok {
            true => State::ArchiveDispatchedToImporter,
            false => State::ArchiveDispatchFailed,
        };
        match self {
            State::ArchiveUploaded => Ok(to),
            from => exn::bail!(ErrorKind::InvalidTransition { from, to }),
        }
    }

    /// Record the importer's verdict.
    ///
    /// Repeating the verdict a record already holds is a no-op; reporting the
    /// opposite verdict on a terminal record is rejected.
    pub fn imported(self, success: bool) -> Result<State> {
        let to = match success {
            true => State::ImportSuccess,
            false => State::ImportFailure,
        };
        match self {
            State::ArchiveUploaded | State::ArchiveDispatchedToImporter | State::ArchiveDispatchFailed => Ok(to),
            from if from == to => Ok(to),
            from => exn::bail!(ErrorKind::InvalidTransition { from, to }),
        }
    }
}

impl FromStr for State {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase();
        Ok(match normalized.as_str() {
            "archiveuploaded" => State::ArchiveUploaded,
            "archivedispatchfailed" => State::ArchiveDispatchFailed,
            "archivedispatchedtoimporter" => State::ArchiveDispatchedToImporter,
            "importfailure" => State::ImportFailure,
            "importsuccess" => State::ImportSuccess,
            _ => exn::bail!(ErrorKind::UnknownState(s.to_string())),
        })
    }
}
impl TryFrom<String> for State {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        value.as_str().parse()
    }
}
impl From<State> for String {
    fn from(state: State) -> Self {
        state.as_str().to_string()
    }
}

impl Display for State {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
