use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use survey_core::constants::DEFAULT_SIZE_THRESHOLD_KB;
use survey_core::{Aggregator, NamingScheme, RunLog, SurveyConfig};

#[derive(Parser)]
#[command(name = "dicom-survey")]
#[command(about = "Survey imaging study folders into a demographics table")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract header metadata for every subject into Demographics.csv
    Extract {
        /// Directory holding one folder per subject
        source: PathBuf,
        /// Subject naming scheme as PREFIX:DIGITS:SUFFIX (repeatable)
        #[arg(long = "scheme", required = true)]
        schemes: Vec<NamingScheme>,
        /// Directory for Demographics.csv and the run log (defaults to SOURCE)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Series folder name to ignore (repeatable)
        #[arg(long = "exclude")]
        excluded: Vec<String>,
        /// Image file extension to read (repeatable, defaults to dcm)
        #[arg(long = "extension")]
        extensions: Vec<String>,
        /// Regex for anonymized series folder names
        #[arg(long)]
        anonymized_pattern: Option<String>,
        /// Split series into subtypes by file size
        #[arg(long)]
        split_subtypes: bool,
        /// Size tolerance in KB when splitting subtypes
        #[arg(long, default_value_t = DEFAULT_SIZE_THRESHOLD_KB)]
        size_threshold_kb: f64,
    },
    /// Check whether a folder name is a valid subject identifier
    CheckId {
        /// Folder name to check
        name: String,
        /// Subject naming scheme as PREFIX:DIGITS:SUFFIX (repeatable)
        #[arg(long = "scheme", required = true)]
        schemes: Vec<NamingScheme>,
    },
    /// Print the header fields of one DICOM file
    Inspect {
        /// DICOM file to decode
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the subject folders under a source directory
    Subjects {
        /// Directory holding one folder per subject
        source: PathBuf,
        /// Subject naming scheme as PREFIX:DIGITS:SUFFIX (repeatable)
        #[arg(long = "scheme", required = true)]
        schemes: Vec<NamingScheme>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("survey_core=warn".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Extract {
            source,
            schemes,
            output,
            excluded,
            extensions,
            anonymized_pattern,
            split_subtypes,
            size_threshold_kb,
        }) => {
            let mut cfg = SurveyConfig::new(source, schemes)?
                .with_excluded_folders(excluded)
                .with_subtype_split(split_subtypes, size_threshold_kb)?;
            if let Some(output) = output {
                cfg = cfg.with_output_dir(output)?;
            }
            if !extensions.is_empty() {
                cfg = cfg.with_image_extensions(extensions)?;
            }
            if let Some(pattern) = anonymized_pattern {
                cfg = cfg.with_anonymized_pattern(&pattern)?;
            }

            let demographics_path = cfg.demographics_path();
            match survey_core::run(cfg) {
                Ok(outcome) => println!(
                    "Wrote {} ({} subjects, {} subjects excluded, {} folders excluded, {} unreadable headers)",
                    demographics_path.display(),
                    outcome.summary.subjects_processed,
                    outcome.summary.subjects_excluded,
                    outcome.summary.folders_excluded,
                    outcome.summary.unreadable_headers
                ),
                Err(e) => {
                    eprintln!("Error running survey: {}", e);
                    process::exit(1);
                }
            }
        }
        Some(Commands::CheckId { name, schemes }) => {
            match survey_core::validate_any(&name, &schemes) {
                Some((scheme, order)) => {
                    println!("{}: order {} (scheme {})", name, order, schemes[scheme])
                }
                None => {
                    println!("{}: no match", name);
                    process::exit(1);
                }
            }
        }
        Some(Commands::Inspect { file, json }) => match dicom_header::read_header(&file) {
            Ok(header) if json => println!("{}", serde_json::to_string_pretty(&header)?),
            Ok(header) => {
                println!("TransferSyntax: {}", header.transfer_syntax);
                for (keyword, value) in &header.elements {
                    println!("{}: {}", keyword, value);
                }
            }
            Err(e) => {
                eprintln!("Error reading {}: {}", file.display(), e);
                process::exit(1);
            }
        },
        Some(Commands::Subjects { source, schemes }) => {
            let cfg = SurveyConfig::new(source, schemes)?;
            let aggregator = Aggregator::new(std::sync::Arc::new(cfg));
            let mut log = RunLog::new();
            match aggregator.subjects(&mut log) {
                Ok(subjects) if subjects.is_empty() => println!("No subjects found."),
                Ok(subjects) => {
                    for subject in subjects {
                        println!("ID: {}, Order: {}", subject.id, subject.order);
                    }
                }
                Err(e) => {
                    eprintln!("Error listing subjects: {}", e);
                    process::exit(1);
                }
            }
        }
        None => {
            println!("Use 'dicom-survey --help' for commands");
        }
    }

    Ok(())
}
