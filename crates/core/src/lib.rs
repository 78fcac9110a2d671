//! # Survey Core
//!
//! Batch survey of imaging study folders:
//!
//! - [`validation`]: subject identifiers such as `BP001` against a [`NamingScheme`]
//! - [`classify`]: eligible series folders inside each subject folder
//! - [`extract`]: header attributes from one representative DICOM file per series
//! - [`aggregate`]: the whole run, producing `Demographics.csv` and `ExtractDicomInfo.log`
//!
//! The run is sequential and stateless between invocations; the only outputs are the two
//! files written into the configured output directory.
//!
//! **No front-end concerns**: argument parsing and subscriber setup belong in the runner and
//! `survey-cli` binaries.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod extract;
pub mod log;
mod scan;
pub mod table;
pub mod validation;

pub use aggregate::{run, Aggregator, RunOutcome, RunSummary};
pub use classify::{Classification, ExclusionReason, FolderClassifier, SeriesFolder, SubjectFolder};
pub use config::SurveyConfig;
pub use error::{SurveyError, SurveyResult};
pub use extract::{MetadataExtractor, SeriesRecord};
pub use log::{LogEntry, LogLevel, RunLog};
pub use table::{DemographicsTable, SubjectRow};
pub use validation::{validate, validate_any, NamingScheme};
