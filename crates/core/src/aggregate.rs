//! Survey aggregation.
//!
//! The aggregator drives a whole run: it lists the subject folders directly under
//! the source directory, validates their names, classifies and extracts each
//! subject's series, merges everything into the [`DemographicsTable`] and finally
//! writes `Demographics.csv` and appends the run log.
//!
//! Failures below the source directory are isolated: an invalid name, an ineligible
//! folder or an unreadable header becomes a log entry and the run moves on. Only an
//! unreadable source directory or a failed output write ends the run with an error.

use crate::classify::{FolderClassifier, SubjectFolder};
use crate::config::SurveyConfig;
use crate::extract::MetadataExtractor;
use crate::log::RunLog;
use crate::table::{DemographicsTable, SubjectRow};
use crate::validation::validate_any;
use crate::{SurveyError, SurveyResult};
use std::fs;
use std::sync::Arc;

/// Counts reported at the end of a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub subjects_processed: usize,
    /// Directories under the source root whose name matched no naming scheme.
    pub subjects_excluded: usize,
    /// Series candidates inside subject folders that were not extracted.
    pub folders_excluded: usize,
    pub unreadable_headers: usize,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub table: DemographicsTable,
    pub log: RunLog,
    pub summary: RunSummary,
}

#[derive(Clone, Debug)]
pub struct Aggregator {
    cfg: Arc<SurveyConfig>,
    classifier: FolderClassifier,
    extractor: MetadataExtractor,
}

impl Aggregator {
    pub fn new(cfg: Arc<SurveyConfig>) -> Self {
        Self {
            classifier: FolderClassifier::new(cfg.clone()),
            extractor: MetadataExtractor::new(cfg.clone()),
            cfg,
        }
    }

    /// Runs the survey and persists its outputs.
    ///
    /// # Errors
    ///
    /// - `SurveyError::FatalRoot` if the source directory cannot be listed; a final
    ///   error entry is still appended to the run log when the output directory exists.
    /// - `SurveyError::CsvWrite` / `SurveyError::LogWrite` if an output file cannot be
    ///   written.
    pub fn run(&self) -> SurveyResult<RunOutcome> {
        let mut log = RunLog::new();
        log.info(format!(
            "Survey of {} starts...",
            self.cfg.source_dir().display()
        ));

        let (table, summary) = match self.collect(&mut log) {
            Ok(collected) => collected,
            Err(err) => {
                log.error(format!("Run aborted: {}", err));
                if self.cfg.output_dir().is_dir() {
                    if let Err(write_err) = log.append_to(&self.cfg.log_path()) {
                        tracing::error!("could not record aborted run: {}", write_err);
                    }
                }
                return Err(err);
            }
        };

        if let Err(err) = table.save(&self.cfg.demographics_path()) {
            log.error(format!("{}", err));
            log.append_to(&self.cfg.log_path())?;
            return Err(err);
        }
        log.append_to(&self.cfg.log_path())?;

        Ok(RunOutcome {
            table,
            log,
            summary,
        })
    }

    /// Lists the subject folders directly under the source directory, sorted by name.
    ///
    /// Directories whose name matches no naming scheme are logged and skipped; plain
    /// files are ignored.
    pub fn subjects(&self, log: &mut RunLog) -> SurveyResult<Vec<SubjectFolder>> {
        self.scan_subjects(log).map(|(subjects, _)| subjects)
    }

    /// Builds the table without writing anything to disk.
    pub fn collect(&self, log: &mut RunLog) -> SurveyResult<(DemographicsTable, RunSummary)> {
        let (subjects, rejected) = self.scan_subjects(log)?;
        let mut summary = RunSummary {
            subjects_excluded: rejected,
            ..RunSummary::default()
        };

        let mut table = DemographicsTable::new();
        for subject in &subjects {
            let row = self.process_subject(subject, log, &mut summary);
            table.push(row);
            summary.subjects_processed += 1;
        }

        if table.is_empty() {
            log.error("Demographics table is blank.");
        }
        log.info(format!(
            "Run finished: {} subjects processed, {} subjects excluded, {} folders excluded, {} unreadable headers",
            summary.subjects_processed,
            summary.subjects_excluded,
            summary.folders_excluded,
            summary.unreadable_headers
        ));

        Ok((table, summary))
    }

    /// Returns the valid subjects and the number of directories rejected by name.
    fn scan_subjects(&self, log: &mut RunLog) -> SurveyResult<(Vec<SubjectFolder>, usize)> {
        let root = self.cfg.source_dir();
        let fatal = |source| SurveyError::FatalRoot {
            path: root.to_path_buf(),
            source,
        };

        let mut entries = Vec::new();
        for entry in fs::read_dir(root).map_err(fatal)? {
            match entry {
                Ok(entry) if entry.path().is_dir() => entries.push(entry),
                Ok(_) => {}
                Err(e) => log.warn(format!(
                    "failed to read an entry of {}: {}",
                    root.display(),
                    e
                )),
            }
        }
        entries.sort_by_key(|e| e.file_name());

        let mut subjects = Vec::new();
        let mut rejected = 0;
        for entry in entries {
            let name = entry.file_name().to_string_lossy().into_owned();
            match validate_any(&name, self.cfg.schemes()) {
                Some((scheme, order)) => subjects.push(SubjectFolder {
                    path: entry.path(),
                    id: name,
                    order,
                    scheme,
                }),
                None => {
                    rejected += 1;
                    log.warn(SurveyError::InvalidIdentifier { name }.to_string());
                }
            }
        }

        Ok((subjects, rejected))
    }

    fn process_subject(
        &self,
        subject: &SubjectFolder,
        log: &mut RunLog,
        summary: &mut RunSummary,
    ) -> SubjectRow {
        let mut row = SubjectRow::new(subject.id.clone(), subject.order);

        let classified = self.classifier.classify(subject, log);
        summary.folders_excluded += classified.excluded.len();

        if classified.series.is_empty() {
            log.warn(format!("{}: no eligible series folders found", subject.id));
        }

        for series in &classified.series {
            for record in self.extractor.extract_all(series, log) {
                if record.unreadable {
                    summary.unreadable_headers += 1;
                }
                row.extend(record.cells());
            }
        }

        log.info(format!(
            "{}: {} series collected",
            subject.id,
            classified.series.len()
        ));
        row
    }
}

/// Runs a survey with `cfg`; see [`Aggregator::run`].
pub fn run(cfg: SurveyConfig) -> SurveyResult<RunOutcome> {
    Aggregator::new(Arc::new(cfg)).run()
}
