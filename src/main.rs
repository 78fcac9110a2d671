use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use survey_core::config::{
    bool_from_env_value, excluded_folders_from_env_value, scheme_from_env_values,
};
use survey_core::constants::DEFAULT_SIZE_THRESHOLD_KB;
use survey_core::{Aggregator, SurveyConfig};

/// One-shot survey runner configured from the environment
///
/// Reads a `.env` file if present, resolves a [`SurveyConfig`] and runs the survey
/// once over the source directory.
///
/// # Environment Variables
/// - `DICOM_SOURCE_DIR`: directory holding one folder per subject (required)
/// - `DICOM_OUTPUT_DIR`: where `Demographics.csv` and the run log go (default: source dir)
/// - `DICOM_SUBJECT_PREFIX`: identifier prefix (default: empty)
/// - `DICOM_ORDER_DIGITS`: zero-padded digit width (default: 3)
/// - `DICOM_SUBJECT_SUFFIX`: identifier suffix (default: empty)
/// - `DICOM_EXCLUDED_FOLDERS`: comma-separated series folder names to ignore
/// - `DICOM_SPLIT_SUBTYPES`: split series by file size (default: false)
///
/// # Returns
/// * `Ok(())` - If the run completed and both output files were written
/// * `Err(anyhow::Error)` - If configuration is invalid or the source directory is unreadable
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("survey_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let source_dir = std::env::var("DICOM_SOURCE_DIR")
        .map_err(|_| anyhow::anyhow!("DICOM_SOURCE_DIR must be set"))?;

    let scheme = scheme_from_env_values(
        std::env::var("DICOM_SUBJECT_PREFIX").ok(),
        std::env::var("DICOM_ORDER_DIGITS").ok(),
        std::env::var("DICOM_SUBJECT_SUFFIX").ok(),
    )?;
    let split = bool_from_env_value(std::env::var("DICOM_SPLIT_SUBTYPES").ok(), false)?;

    let mut cfg = SurveyConfig::new(source_dir.into(), vec![scheme])?
        .with_excluded_folders(excluded_folders_from_env_value(
            std::env::var("DICOM_EXCLUDED_FOLDERS").ok(),
        ))
        .with_subtype_split(split, DEFAULT_SIZE_THRESHOLD_KB)?;
    if let Ok(output_dir) = std::env::var("DICOM_OUTPUT_DIR") {
        cfg = cfg.with_output_dir(output_dir.into())?;
    }

    tracing::info!("++ Surveying {}", cfg.source_dir().display());
    tracing::info!("++ Writing {}", cfg.demographics_path().display());

    let outcome = Aggregator::new(Arc::new(cfg)).run()?;
    tracing::info!(
        "++ Done: {} subjects, {} subjects excluded, {} folders excluded, {} unreadable headers",
        outcome.summary.subjects_processed,
        outcome.summary.subjects_excluded,
        outcome.summary.folders_excluded,
        outcome.summary.unreadable_headers
    );

    Ok(())
}
