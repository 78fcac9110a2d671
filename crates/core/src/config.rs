//! Survey runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! aggregator. Nothing in the survey reads environment variables mid-run; the
//! `*_from_env_value` helpers take already-read values so binaries decide where
//! they come from.

use crate::constants::{
    DEFAULT_ANONYMIZED_PATTERN, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_SIZE_THRESHOLD_KB,
    DEMOGRAPHICS_FILENAME, LOG_FILENAME,
};
use crate::validation::NamingScheme;
use crate::{SurveyError, SurveyResult};
use regex::Regex;
use std::path::{Path, PathBuf};

/// Default digit width when `DICOM_ORDER_DIGITS` is not set.
pub const DEFAULT_ORDER_DIGITS: usize = 3;

/// Survey configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct SurveyConfig {
    source_dir: PathBuf,
    output_dir: PathBuf,
    schemes: Vec<NamingScheme>,
    image_extensions: Vec<String>,
    anonymized_pattern: Regex,
    excluded_folders: Vec<String>,
    split_subtypes: bool,
    size_threshold_kb: f64,
}

impl SurveyConfig {
    /// Create a new `SurveyConfig` writing its outputs into `source_dir`.
    ///
    /// The source directory is not checked here: a missing root is reported by the
    /// run itself so it lands in the run log.
    pub fn new(source_dir: PathBuf, schemes: Vec<NamingScheme>) -> SurveyResult<Self> {
        if schemes.is_empty() {
            return Err(SurveyError::InvalidInput(
                "at least one naming scheme is required".into(),
            ));
        }

        Ok(Self {
            output_dir: source_dir.clone(),
            source_dir,
            schemes,
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            anonymized_pattern: Regex::new(DEFAULT_ANONYMIZED_PATTERN)?,
            excluded_folders: Vec::new(),
            split_subtypes: false,
            size_threshold_kb: DEFAULT_SIZE_THRESHOLD_KB,
        })
    }

    /// Redirect `Demographics.csv` and the run log to `output_dir`, which must exist.
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> SurveyResult<Self> {
        if !output_dir.is_dir() {
            return Err(SurveyError::InvalidInput(format!(
                "output directory does not exist: {}",
                output_dir.display()
            )));
        }
        self.output_dir = output_dir;
        Ok(self)
    }

    /// Replace the recognised image extensions. Leading dots are dropped and matching
    /// is case-insensitive.
    pub fn with_image_extensions<I, S>(mut self, extensions: I) -> SurveyResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let extensions: Vec<String> = extensions
            .into_iter()
            .map(|e| e.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect();

        if extensions.is_empty() {
            return Err(SurveyError::InvalidInput(
                "at least one image extension is required".into(),
            ));
        }
        self.image_extensions = extensions;
        Ok(self)
    }

    /// Replace the predicate deciding which folder names count as anonymized series.
    pub fn with_anonymized_pattern(mut self, pattern: &str) -> SurveyResult<Self> {
        self.anonymized_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// Folder names dropped from every subject regardless of content.
    pub fn with_excluded_folders<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_folders = names
            .into_iter()
            .map(Into::into)
            .filter(|n: &String| !n.trim().is_empty())
            .collect();
        self
    }

    /// Split series folders into subtypes by representative file size.
    pub fn with_subtype_split(mut self, enabled: bool, threshold_kb: f64) -> SurveyResult<Self> {
        if !threshold_kb.is_finite() || threshold_kb < 0.0 {
            return Err(SurveyError::InvalidInput(format!(
                "size threshold must be a non-negative number of KB, got {}",
                threshold_kb
            )));
        }
        self.split_subtypes = enabled;
        self.size_threshold_kb = threshold_kb;
        Ok(self)
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn schemes(&self) -> &[NamingScheme] {
        &self.schemes
    }

    pub fn image_extensions(&self) -> &[String] {
        &self.image_extensions
    }

    pub fn anonymized_pattern(&self) -> &Regex {
        &self.anonymized_pattern
    }

    pub fn excluded_folders(&self) -> &[String] {
        &self.excluded_folders
    }

    pub fn split_subtypes(&self) -> bool {
        self.split_subtypes
    }

    pub fn size_threshold_kb(&self) -> f64 {
        self.size_threshold_kb
    }

    pub fn demographics_path(&self) -> PathBuf {
        self.output_dir.join(DEMOGRAPHICS_FILENAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.output_dir.join(LOG_FILENAME)
    }
}

/// Build a naming scheme from optional prefix, digit width and suffix values.
///
/// Missing prefix and suffix mean empty strings; a missing width falls back to
/// [`DEFAULT_ORDER_DIGITS`].
pub fn scheme_from_env_values(
    prefix: Option<String>,
    digits: Option<String>,
    suffix: Option<String>,
) -> SurveyResult<NamingScheme> {
    let digit_width = match digits.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()) {
        Some(d) => d.parse::<usize>().map_err(|_| {
            SurveyError::InvalidInput(format!("order digits '{}' is not a number", d))
        })?,
        None => DEFAULT_ORDER_DIGITS,
    };

    NamingScheme::new(
        prefix.unwrap_or_default(),
        digit_width,
        suffix.unwrap_or_default(),
    )
}

/// Split a comma-separated folder list, dropping blanks.
pub fn excluded_folders_from_env_value(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Parse a boolean flag value; missing or blank means `default`.
pub fn bool_from_env_value(value: Option<String>, default: bool) -> SurveyResult<bool> {
    let value = value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty());

    match value.as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(SurveyError::InvalidInput(format!(
            "'{}' is not a boolean value",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scheme() -> NamingScheme {
        NamingScheme::new("BP", 3, "").unwrap()
    }

    #[test]
    fn test_new_defaults_output_dir_to_source_dir() {
        let cfg = SurveyConfig::new(PathBuf::from("/data/study"), vec![scheme()]).unwrap();

        assert_eq!(cfg.output_dir(), Path::new("/data/study"));
        assert_eq!(
            cfg.demographics_path(),
            PathBuf::from("/data/study/Demographics.csv")
        );
        assert_eq!(
            cfg.log_path(),
            PathBuf::from("/data/study/ExtractDicomInfo.log")
        );
        assert_eq!(cfg.image_extensions(), &["dcm".to_string()]);
        assert!(!cfg.split_subtypes());
    }

    #[test]
    fn test_new_requires_a_scheme() {
        let err = SurveyConfig::new(PathBuf::from("/data"), Vec::new())
            .expect_err("empty scheme list should be rejected");
        assert!(matches!(err, SurveyError::InvalidInput(_)));
    }

    #[test]
    fn test_with_output_dir_requires_existing_directory() {
        let temp = TempDir::new().unwrap();
        let cfg = SurveyConfig::new(temp.path().to_path_buf(), vec![scheme()]).unwrap();

        let missing = temp.path().join("missing");
        assert!(cfg.clone().with_output_dir(missing).is_err());

        let out = temp.path().join("out");
        std::fs::create_dir(&out).unwrap();
        let cfg = cfg.with_output_dir(out.clone()).unwrap();
        assert_eq!(cfg.log_path(), out.join(LOG_FILENAME));
    }

    #[test]
    fn test_with_image_extensions_normalises_values() {
        let cfg = SurveyConfig::new(PathBuf::from("/data"), vec![scheme()])
            .unwrap()
            .with_image_extensions([".DCM", " ima ", ""])
            .unwrap();

        assert_eq!(cfg.image_extensions(), &["dcm".to_string(), "ima".to_string()]);
    }

    #[test]
    fn test_with_anonymized_pattern_rejects_bad_regex() {
        let err = SurveyConfig::new(PathBuf::from("/data"), vec![scheme()])
            .unwrap()
            .with_anonymized_pattern("([0-9")
            .expect_err("unbalanced regex should fail");
        assert!(matches!(err, SurveyError::InvalidPattern(_)));
    }

    #[test]
    fn test_with_subtype_split_rejects_negative_threshold() {
        let cfg = SurveyConfig::new(PathBuf::from("/data"), vec![scheme()]).unwrap();
        assert!(cfg.clone().with_subtype_split(true, -1.0).is_err());
        assert!(cfg.with_subtype_split(true, 5.0).unwrap().split_subtypes());
    }

    #[test]
    fn test_scheme_from_env_values_uses_defaults() {
        let scheme = scheme_from_env_values(Some("HC".into()), None, None).unwrap();
        assert_eq!(scheme.digit_width(), DEFAULT_ORDER_DIGITS);
        assert_eq!(scheme.suffix(), "");

        let scheme =
            scheme_from_env_values(Some("sub-".into()), Some(" 4 ".into()), Some("_a".into()))
                .unwrap();
        assert_eq!(scheme.format_id(12).unwrap(), "sub-0012_a");

        assert!(scheme_from_env_values(None, Some("x".into()), None).is_err());
    }

    #[test]
    fn test_excluded_folders_from_env_value_splits_and_trims() {
        assert_eq!(
            excluded_folders_from_env_value(Some(" localizer, ,scout ".into())),
            vec!["localizer".to_string(), "scout".to_string()]
        );
        assert!(excluded_folders_from_env_value(None).is_empty());
    }

    #[test]
    fn test_bool_from_env_value() {
        assert!(bool_from_env_value(Some("TRUE".into()), false).unwrap());
        assert!(!bool_from_env_value(Some("off".into()), true).unwrap());
        assert!(bool_from_env_value(None, true).unwrap());
        assert!(bool_from_env_value(Some("maybe".into()), false).is_err());
    }
}
