//! Series folder classification.
//!
//! A subject folder may hold its image series at any depth, under names that
//! either carry the subject identifier (`BP001_T1`) or were anonymized by the
//! scanner export (`000000001`):
//!
//! ```text
//! BP001/
//!   IM0001.DCM          # images directly in the subject folder form a series too
//!   BP001_T1/
//!     IM0001.DCM
//!   BP001_DTI/
//!     000000001/        # anonymized series folder
//!       IM0001.DCM
//!   localizer/          # not a series name: excluded
//! ```
//!
//! Each candidate directory is either yielded as a [`SeriesFolder`] or excluded
//! with an [`ExclusionReason`], and every exclusion produces exactly one log entry.

use crate::config::SurveyConfig;
use crate::log::RunLog;
use crate::scan::folder_content;
use crate::SurveyError;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// A directory under the source root whose name is a valid subject identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectFolder {
    pub path: PathBuf,
    pub id: String,
    pub order: u64,
    /// Index of the naming scheme that accepted `id`.
    pub scheme: usize,
}

/// A folder holding one acquisition run's image files.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesFolder {
    pub path: PathBuf,
    /// Path relative to the subject folder, `/`-separated; the subject id for images
    /// stored directly in the subject folder.
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExclusionReason {
    Blacklisted,
    Empty,
    ContainerOnly,
    AnonymizedWithoutImages,
    NoImageFiles,
    UnrecognisedName,
    Unreadable(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::Blacklisted => f.write_str("folder is on the exclusion list"),
            ExclusionReason::Empty => f.write_str("folder contains no files"),
            ExclusionReason::ContainerOnly => f.write_str("folder holds only sub-folders"),
            ExclusionReason::AnonymizedWithoutImages => {
                f.write_str("anonymized folder contains no image files")
            }
            ExclusionReason::NoImageFiles => f.write_str("no image files found"),
            ExclusionReason::UnrecognisedName => {
                f.write_str("name does not match the series folder convention")
            }
            ExclusionReason::Unreadable(e) => write!(f, "folder could not be read ({})", e),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Exclusion {
    pub path: PathBuf,
    pub reason: ExclusionReason,
}

/// Outcome of classifying one subject folder.
#[derive(Clone, Debug, Default)]
pub struct Classification {
    /// Eligible series, sorted by key.
    pub series: Vec<SeriesFolder>,
    pub excluded: Vec<Exclusion>,
}

/// Splits a subject folder into eligible series folders and logged exclusions.
#[derive(Clone, Debug)]
pub struct FolderClassifier {
    cfg: Arc<SurveyConfig>,
}

impl FolderClassifier {
    pub fn new(cfg: Arc<SurveyConfig>) -> Self {
        Self { cfg }
    }

    pub fn classify(&self, subject: &SubjectFolder, log: &mut RunLog) -> Classification {
        let mut outcome = Classification::default();

        match folder_content(&subject.path, &self.cfg) {
            Ok(content) if !content.images.is_empty() => outcome.series.push(SeriesFolder {
                path: subject.path.clone(),
                key: subject.id.clone(),
            }),
            Ok(_) => {}
            Err(e) => {
                self.exclude(
                    subject,
                    &mut outcome,
                    log,
                    subject.path.clone(),
                    ExclusionReason::Unreadable(e.to_string()),
                );
                return outcome;
            }
        }

        let mut walker = WalkDir::new(&subject.path).min_depth(1).into_iter();
        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| subject.path.clone());
                    self.exclude(
                        subject,
                        &mut outcome,
                        log,
                        path,
                        ExclusionReason::Unreadable(e.to_string()),
                    );
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let path = entry.into_path();
            match self.judge(subject, &path) {
                Ok(()) => {
                    let key = series_key(&subject.path, &path);
                    outcome.series.push(SeriesFolder { path, key });
                }
                Err(reason) => {
                    // nothing below an excluded-by-name folder is a series
                    if reason == ExclusionReason::Blacklisted {
                        walker.skip_current_dir();
                    }
                    self.exclude(subject, &mut outcome, log, path, reason);
                }
            }
        }

        outcome.series.sort_by(|a, b| a.key.cmp(&b.key));
        disambiguate_keys(subject, &mut outcome.series, log);
        outcome
    }

    /// Applies the eligibility rules to one candidate directory.
    fn judge(&self, subject: &SubjectFolder, path: &Path) -> Result<(), ExclusionReason> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.cfg.excluded_folders().iter().any(|n| *n == name) {
            return Err(ExclusionReason::Blacklisted);
        }

        let content = folder_content(path, &self.cfg)
            .map_err(|e| ExclusionReason::Unreadable(e.to_string()))?;
        if content.file_count() == 0 {
            return Err(if content.subfolders > 0 {
                ExclusionReason::ContainerOnly
            } else {
                ExclusionReason::Empty
            });
        }

        let has_images = !content.images.is_empty();
        if self.cfg.anonymized_pattern().is_match(&name) {
            return if has_images {
                Ok(())
            } else {
                Err(ExclusionReason::AnonymizedWithoutImages)
            };
        }

        if name.contains(&subject.id) {
            return if has_images {
                Ok(())
            } else {
                Err(ExclusionReason::NoImageFiles)
            };
        }

        Err(ExclusionReason::UnrecognisedName)
    }

    fn exclude(
        &self,
        subject: &SubjectFolder,
        outcome: &mut Classification,
        log: &mut RunLog,
        path: PathBuf,
        reason: ExclusionReason,
    ) {
        let err = SurveyError::EmptyOrIneligibleFolder {
            path: path.clone(),
            reason: reason.clone(),
        };
        log.warn(format!("{}: {}", subject.id, err));
        outcome.excluded.push(Exclusion { path, reason });
    }
}

/// Renames repeated series keys to `<key>#<n>`, logging each rename.
///
/// The subject root is keyed by the subject id, which a nested folder of the same
/// name (`BP001/BP001/`) also produces. Keys name table columns, so they must stay
/// unique within a subject.
fn disambiguate_keys(subject: &SubjectFolder, series: &mut [SeriesFolder], log: &mut RunLog) {
    let mut seen: HashSet<String> = HashSet::new();
    for folder in series.iter_mut() {
        if seen.insert(folder.key.clone()) {
            continue;
        }

        let mut n = 2;
        let mut renamed = format!("{}#{}", folder.key, n);
        while seen.contains(&renamed) {
            n += 1;
            renamed = format!("{}#{}", folder.key, n);
        }
        log.warn(format!(
            "{}: series key {} is shared by several folders; {} is recorded as {}",
            subject.id,
            folder.key,
            folder.path.display(),
            renamed
        ));
        seen.insert(renamed.clone());
        folder.key = renamed;
    }
}

fn series_key(subject_dir: &Path, series_dir: &Path) -> String {
    series_dir
        .strip_prefix(subject_dir)
        .unwrap_or(series_dir)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
