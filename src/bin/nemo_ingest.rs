use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use nemo_ingest::app::{App, ValidateOptions};
use nemo_ingest::config::ConfigLoader;
use nemo_ingest::error::IngestError;
use nemo_ingest::output::JsonOutput;

const INVALID_MANIFEST_EXIT: u8 = 4;

#[derive(Parser)]
#[command(name = "nemo-ingest")]
#[command(about = "Validate NeMO submission manifests and classify submitted files")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Validate a submission manifest and print the JSON report")]
    Validate(ValidateArgs),
    #[command(about = "Classify file names, one JSON line per name")]
    Classify(ClassifyArgs),
}

#[derive(Args)]
struct ValidateArgs {
    manifest: Utf8PathBuf,

    #[arg(long)]
    config: Option<String>,

    #[arg(long, help = "Controlled vocabulary JSON, overrides the config")]
    vocabulary: Option<Utf8PathBuf>,

    #[arg(long)]
    skip_header_check: bool,

    #[arg(long, help = "Directory receiving the complete <manifest>.errors file")]
    error_dir: Option<Utf8PathBuf>,

    #[arg(long)]
    dry_run: bool,

    #[arg(long, help = "Maximum number of errors kept in the report")]
    error_limit: Option<usize>,
}

#[derive(Args)]
struct ClassifyArgs {
    #[arg(required = true)]
    filenames: Vec<String>,

    #[arg(long)]
    technique: Option<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(err) = report.downcast_ref::<IngestError>() {
                return ExitCode::from(map_exit_code(err));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &IngestError) -> u8 {
    match error {
        IngestError::ManifestNotFound(_)
        | IngestError::MissingConfig
        | IngestError::MissingVocabulary
        | IngestError::ConfigRead(_)
        | IngestError::AuxRead(_) => 2,
        IngestError::ManifestEncoding
        | IngestError::ManifestHeader
        | IngestError::RowFieldCount { .. }
        | IngestError::ManifestEmpty
        | IngestError::ManifestParse(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate(args) => run_validate(args),
        Commands::Classify(args) => {
            let results = App::classify(&args.filenames, args.technique.as_deref());
            JsonOutput::print_classifications(&results).into_diagnostic()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_validate(args: ValidateArgs) -> miette::Result<ExitCode> {
    let config = ConfigLoader::resolve(args.config.as_deref())?;
    let app = App::from_config(config, args.vocabulary.as_deref())?;
    let options = ValidateOptions {
        skip_header_check: args.skip_header_check,
        error_dir: args.error_dir,
        dry_run: args.dry_run,
        error_limit: args.error_limit,
    };
    let report = app.validate(&args.manifest, &options)?;
    JsonOutput::print_report(&report).into_diagnostic()?;
    if report.result {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(INVALID_MANIFEST_EXIT))
    }
}
