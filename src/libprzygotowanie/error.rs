use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions that stop a run. Everything recoverable lives in the phase reports instead.
#[derive(Debug, Error)]
pub enum Error {
    #[error("spreadsheet not found at {0:?}")]
    SpreadsheetMissing(PathBuf),
    #[error("cannot read spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),
    #[error("spreadsheet {0:?} has no worksheet")]
    NoWorksheet(PathBuf),
    #[error("archive not found at {0:?}")]
    ArchiveMissing(PathBuf),
    #[error("cannot read archive: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("question list not found at {0:?}")]
    QuestionsMissing(PathBuf),
    #[error("malformed question list: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
    #[error("transcoder could not be prepared: {0}")]
    TranscoderSetup(String),
}

impl Error {
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
