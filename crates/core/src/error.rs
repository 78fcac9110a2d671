use crate::classify::ExclusionReason;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum SurveyError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid anonymization pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("{name}: folder name does not match any subject naming scheme; skipped")]
    InvalidIdentifier { name: String },
    #[error("{path} excluded: {reason}", path = .path.display())]
    EmptyOrIneligibleFolder {
        path: PathBuf,
        reason: ExclusionReason,
    },
    #[error("dicom header reading fails for {path}: {source}", path = .path.display())]
    UnparsableHeader {
        path: PathBuf,
        #[source]
        source: dicom_header::HeaderError,
    },
    #[error("source directory {path} is not readable: {source}", path = .path.display())]
    FatalRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write demographics table: {0}")]
    CsvWrite(#[from] csv::Error),
    #[error("failed to write run log: {0}")]
    LogWrite(std::io::Error),
}

pub type SurveyResult<T> = std::result::Result<T, SurveyError>;
