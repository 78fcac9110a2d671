//! Series metadata extraction.
//!
//! One representative image per series (the first by file name) is decoded and a
//! fixed set of header attributes becomes a [`SeriesRecord`]. A file that cannot
//! be decoded yields a placeholder record instead of an error, so a damaged
//! series never costs the subject its row.

use crate::classify::SeriesFolder;
use crate::config::SurveyConfig;
use crate::constants::UNKNOWN_VALUE;
use crate::log::RunLog;
use crate::scan::folder_content;
use crate::SurveyError;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Column suffix of the series (or subtype) label.
pub const SUBTYPE_FIELD: &str = "Subtype";

/// Column suffix of the number of image files the record stands for.
pub const FILE_COUNT_FIELD: &str = "FileCount";

/// Report column suffix and the DICOM keyword it is read from, in column order.
pub const HEADER_COLUMNS: &[(&str, &str)] = &[
    ("Sex", "PatientSex"),
    ("Age", "PatientAge"),
    ("Height", "PatientSize"),
    ("Weight", "PatientWeight"),
    ("SequenceName", "SequenceName"),
    ("Date", "PerformedProcedureStepStartDate"),
    ("Time", "PerformedProcedureStepStartTime"),
    ("Name", "PatientName"),
    ("PatientID", "PatientID"),
    ("EchoTime", "EchoTime"),
    ("ImageType", "ImageType"),
    ("Manufacturer", "Manufacturer"),
    ("Modality", "Modality"),
    ("SeriesDescription", "SeriesDescription"),
    ("RepetitionTime", "RepetitionTime"),
    ("SliceThickness", "SliceThickness"),
];

/// Header attributes of one series, keyed by field name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesRecord {
    /// Series key, or `<series>-<i>(<kb>size)` for a size subtype.
    pub label: String,
    /// `(field, value)` pairs in column order.
    pub fields: Vec<(String, String)>,
    /// Set when the representative file could not be decoded.
    pub unreadable: bool,
}

impl SeriesRecord {
    fn base(label: &str, file_count: usize) -> Vec<(String, String)> {
        vec![
            (SUBTYPE_FIELD.to_string(), label.to_string()),
            (FILE_COUNT_FIELD.to_string(), file_count.to_string()),
        ]
    }

    /// Record for a series whose representative file could not be decoded: every
    /// header field is present but blank.
    pub fn placeholder(label: &str, file_count: usize) -> Self {
        let mut fields = Self::base(label, file_count);
        fields.extend(
            HEADER_COLUMNS
                .iter()
                .map(|(column, _)| (column.to_string(), String::new())),
        );
        Self {
            label: label.to_string(),
            fields,
            unreadable: true,
        }
    }

    fn from_header(label: &str, file_count: usize, header: &dicom_header::DicomHeader) -> Self {
        let mut fields = Self::base(label, file_count);
        fields.extend(HEADER_COLUMNS.iter().map(|(column, keyword)| {
            let value = header
                .get(keyword)
                .filter(|v| !v.is_empty())
                .unwrap_or(UNKNOWN_VALUE);
            (column.to_string(), value.to_string())
        }));
        Self {
            label: label.to_string(),
            fields,
            unreadable: false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Table cells for this record, named `<label>:<field>` so series never collide.
    pub fn cells(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.fields
            .iter()
            .map(move |(field, value)| (format!("{}:{}", self.label, field), value.clone()))
    }
}

/// Reads representative headers from series folders.
#[derive(Clone, Debug)]
pub struct MetadataExtractor {
    cfg: Arc<SurveyConfig>,
}

impl MetadataExtractor {
    pub fn new(cfg: Arc<SurveyConfig>) -> Self {
        Self { cfg }
    }

    /// Extracts the records of a series, split into size subtypes when configured.
    pub fn extract_all(&self, series: &SeriesFolder, log: &mut RunLog) -> Vec<SeriesRecord> {
        if self.cfg.split_subtypes() {
            self.extract_subtypes(series, log)
        } else {
            vec![self.extract(series, log)]
        }
    }

    /// Extracts one record from the first image file of the series.
    pub fn extract(&self, series: &SeriesFolder, log: &mut RunLog) -> SeriesRecord {
        let images = self.images(series, log);
        match images.first() {
            Some(representative) => {
                self.record_from(&series.key, representative, images.len(), log)
            }
            None => SeriesRecord::placeholder(&series.key, 0),
        }
    }

    /// Extracts one record per size subtype of the series.
    ///
    /// Files are visited in name order; each joins the first subtype whose size key
    /// lies within the configured threshold, otherwise it starts a new subtype keyed by
    /// its whole-KB size. A single subtype keeps the plain series label.
    pub fn extract_subtypes(&self, series: &SeriesFolder, log: &mut RunLog) -> Vec<SeriesRecord> {
        let images = self.images(series, log);
        if images.is_empty() {
            return vec![SeriesRecord::placeholder(&series.key, 0)];
        }

        let threshold = self.cfg.size_threshold_kb();
        let mut clusters: Vec<(u64, Vec<&PathBuf>)> = Vec::new();
        for image in &images {
            let size_kb = match std::fs::metadata(image) {
                Ok(meta) => meta.len() as f64 / 1024.0,
                Err(e) => {
                    log.warn(format!(
                        "{}: failed to stat {}: {}",
                        series.key,
                        image.display(),
                        e
                    ));
                    continue;
                }
            };

            match clusters
                .iter_mut()
                .find(|(key, _)| (size_kb - *key as f64).abs() <= threshold)
            {
                Some((_, members)) => members.push(image),
                None => clusters.push((size_kb as u64, vec![image])),
            }
        }

        if clusters.len() <= 1 {
            return vec![self.record_from(&series.key, &images[0], images.len(), log)];
        }

        clusters
            .iter()
            .enumerate()
            .map(|(i, (key, members))| {
                let label = format!("{}-{}({}size)", series.key, i, key);
                self.record_from(&label, members[0], members.len(), log)
            })
            .collect()
    }

    fn images(&self, series: &SeriesFolder, log: &mut RunLog) -> Vec<PathBuf> {
        match folder_content(&series.path, &self.cfg) {
            Ok(content) if !content.images.is_empty() => content.images,
            Ok(_) => {
                log.error(format!(
                    "{}: no dicom files found in {}",
                    series.key,
                    series.path.display()
                ));
                Vec::new()
            }
            Err(e) => {
                log.error(format!(
                    "{}: failed to list {}: {}",
                    series.key,
                    series.path.display(),
                    e
                ));
                Vec::new()
            }
        }
    }

    fn record_from(
        &self,
        label: &str,
        representative: &Path,
        file_count: usize,
        log: &mut RunLog,
    ) -> SeriesRecord {
        match dicom_header::read_header(representative) {
            Ok(header) => SeriesRecord::from_header(label, file_count, &header),
            Err(source) => {
                let err = SurveyError::UnparsableHeader {
                    path: representative.to_path_buf(),
                    source,
                };
                log.warn(format!("{}: {}", label, err));
                SeriesRecord::placeholder(label, file_count)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::NamingScheme;
    use dicom_header::fixtures::DicomFileBuilder;
    use std::fs;
    use tempfile::TempDir;

    fn extractor(root: &Path, split: bool) -> MetadataExtractor {
        let cfg = SurveyConfig::new(
            root.to_path_buf(),
            vec![NamingScheme::new("BP", 3, "").unwrap()],
        )
        .unwrap()
        .with_subtype_split(split, 3.0)
        .unwrap();
        MetadataExtractor::new(Arc::new(cfg))
    }

    fn series(root: &Path, key: &str) -> SeriesFolder {
        let path = root.join(key);
        fs::create_dir_all(&path).unwrap();
        SeriesFolder {
            path,
            key: key.to_string(),
        }
    }

    fn mr_file(sex: &str) -> DicomFileBuilder {
        DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0060, b"CS", "MR")
            .text(0x0010, 0x0040, b"CS", sex)
            .text(0x0018, 0x0081, b"DS", "2.46")
    }

    #[test]
    fn test_extract_reads_first_file_by_name() {
        let temp = TempDir::new().unwrap();
        let series = series(temp.path(), "BP001_T1");
        mr_file("M").write_to(&series.path.join("IM0002.DCM")).unwrap();
        mr_file("F").write_to(&series.path.join("IM0001.DCM")).unwrap();

        let mut log = RunLog::new();
        let record = extractor(temp.path(), false).extract(&series, &mut log);

        assert!(!record.unreadable);
        assert_eq!(record.get("Sex"), Some("F"));
        assert_eq!(record.get("Modality"), Some("MR"));
        assert_eq!(record.get("EchoTime"), Some("2.46"));
        assert_eq!(record.get("FileCount"), Some("2"));
        assert_eq!(record.get("Subtype"), Some("BP001_T1"));
        assert_eq!(record.get("Manufacturer"), Some(UNKNOWN_VALUE));
        assert!(log.is_empty());
    }

    #[test]
    fn test_extract_emits_placeholder_for_unparsable_file() {
        let temp = TempDir::new().unwrap();
        let series = series(temp.path(), "BP001_T2");
        fs::write(series.path.join("IM0001.DCM"), b"definitely not dicom").unwrap();

        let mut log = RunLog::new();
        let record = extractor(temp.path(), false).extract(&series, &mut log);

        assert!(record.unreadable);
        assert_eq!(record.get("Sex"), Some(""));
        assert_eq!(record.get("FileCount"), Some("1"));
        assert_eq!(record.fields.len(), HEADER_COLUMNS.len() + 2);
        assert_eq!(log.len(), 1);
        assert_eq!(log.mentioning("IM0001.DCM").count(), 1);
    }

    #[test]
    fn test_cells_are_prefixed_with_series_label() {
        let record = SeriesRecord::placeholder("BP001_T1", 3);
        let cells: Vec<(String, String)> = record.cells().take(2).collect();

        assert_eq!(
            cells,
            vec![
                ("BP001_T1:Subtype".to_string(), "BP001_T1".to_string()),
                ("BP001_T1:FileCount".to_string(), "3".to_string()),
            ]
        );
    }

    #[test]
    fn test_extract_subtypes_splits_by_file_size() {
        let temp = TempDir::new().unwrap();
        let series = series(temp.path(), "BP001_DWI");
        let small = mr_file("F").pixel_data(&[0u8; 1024]);
        let large = mr_file("F").pixel_data(&[0u8; 20 * 1024]);
        small.write_to(&series.path.join("IM0001.DCM")).unwrap();
        large.write_to(&series.path.join("IM0002.DCM")).unwrap();
        small.write_to(&series.path.join("IM0003.DCM")).unwrap();

        let mut log = RunLog::new();
        let records = extractor(temp.path(), true).extract_all(&series, &mut log);

        assert_eq!(records.len(), 2);
        assert!(records[0].label.starts_with("BP001_DWI-0("));
        assert!(records[1].label.starts_with("BP001_DWI-1(20size"));
        assert_eq!(records[0].get("FileCount"), Some("2"));
        assert_eq!(records[1].get("FileCount"), Some("1"));
    }

    #[test]
    fn test_extract_subtypes_keeps_series_label_for_single_cluster() {
        let temp = TempDir::new().unwrap();
        let series = series(temp.path(), "BP001_T1");
        mr_file("F").write_to(&series.path.join("IM0001.DCM")).unwrap();
        mr_file("M").write_to(&series.path.join("IM0002.DCM")).unwrap();

        let mut log = RunLog::new();
        let records = extractor(temp.path(), true).extract_all(&series, &mut log);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "BP001_T1");
        assert_eq!(records[0].get("FileCount"), Some("2"));
    }

    #[test]
    fn test_extract_decodes_latin1_patient_name() {
        let temp = TempDir::new().unwrap();
        let series = series(temp.path(), "BP001_T1");
        DicomFileBuilder::explicit_little()
            .text(0x0008, 0x0005, b"CS", "ISO_IR 100")
            .text(0x0008, 0x0060, b"CS", "MR")
            .raw_text(0x0010, 0x0010, b"PN", b"M\xFCller^Jo")
            .write_to(&series.path.join("IM0001.DCM"))
            .unwrap();

        let mut log = RunLog::new();
        let record = extractor(temp.path(), false).extract(&series, &mut log);

        assert_eq!(record.get("Name"), Some("Müller^Jo"));
        assert!(log.is_empty());
    }
}
