//! Constants used throughout the survey core crate.
//!
//! File names and defaults live here so the runner, the CLI and the tests agree
//! on them.

/// Filename of the aggregated one-row-per-subject table.
pub const DEMOGRAPHICS_FILENAME: &str = "Demographics.csv";

/// Filename of the append-only run log.
pub const LOG_FILENAME: &str = "ExtractDicomInfo.log";

/// Leading column holding the subject identifier.
pub const SUBJECT_ID_COLUMN: &str = "SubjectID";

/// Leading column holding the numeric order parsed from the identifier.
pub const ORDER_COLUMN: &str = "Order";

/// Value written for a header attribute absent from an otherwise valid file.
pub const UNKNOWN_VALUE: &str = "Unknown";

/// Image file extensions recognised when no override is configured.
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &["dcm"];

/// Folder names made only of digits are treated as anonymized series folders.
pub const DEFAULT_ANONYMIZED_PATTERN: &str = r"^\d+$";

/// Files of this size (in KB) or closer are grouped into the same subtype.
pub const DEFAULT_SIZE_THRESHOLD_KB: f64 = 3.0;

/// macOS bookkeeping files that never count as folder content.
pub const IGNORED_SYSTEM_FILES: &[&str] = &[
    ".DS_Store",
    ".Spotlight-V100",
    ".Trashes",
    ".TemporaryItems",
    ".fseventsd",
];

/// AppleDouble resource forks (`._IM0001.DCM`) are ignored by prefix.
pub const IGNORED_FILE_PREFIX: &str = "._";
