use clap::Parser;
use std::path::PathBuf;

use annotrain::backend::BackendKind;
use annotrain::train::{self, TrainOpt};
use annotrain::variant_type::VariantType;

#[derive(Parser)]
#[command(name = "annotrain")]
#[command(about = "Trains positive(-negative) models for scoring variant calls from site-level annotations", long_about = None)]
#[command(version)]
struct Cli {
    /// Annotation store with training/calibration/snp labels
    #[arg(long, value_name = "FILE")]
    annotations_file: PathBuf,

    /// Unlabeled annotation store (enables positive-negative training;
    /// must be paired with --calibration-sensitivity-threshold)
    #[arg(long, value_name = "FILE")]
    unlabeled_annotations_file: Option<PathBuf>,

    /// Model backend
    #[arg(long, value_enum, default_value = "embedded-gaussian")]
    model_backend: BackendKind,

    /// Executable backend script (required for external-custom)
    #[arg(long, value_name = "FILE")]
    backend_script: Option<PathBuf>,

    /// Backend hyperparameters JSON (required for external-custom)
    #[arg(long, value_name = "FILE")]
    hyperparameters_json: Option<PathBuf>,

    /// Basename for output files
    #[arg(short = 'o', long, value_name = "PREFIX")]
    output_prefix: String,

    /// Calibration-set sensitivity used to select negative-training sites,
    /// in [0,1] (must be paired with --unlabeled-annotations-file)
    #[arg(long, value_name = "FLOAT")]
    calibration_sensitivity_threshold: Option<f64>,

    /// Variant type(s) to train models for; may be repeated.
    /// Always processed SNP before INDEL regardless of order given
    #[arg(long = "mode", value_enum, default_values = ["snp", "indel"])]
    variant_types: Vec<VariantType>,

    /// Verbose level: 1=error, 2=warning, 3=message, 4+=debugging
    #[arg(short = 'v', long, value_name = "INT", default_value = "3")]
    verbosity: i32,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbosity {
        v if v <= 1 => log::LevelFilter::Error,
        2 => log::LevelFilter::Warn,
        3 => log::LevelFilter::Info,
        4 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .format_timestamp(None)
        .format_target(false)
        .init();

    let opt = TrainOpt {
        annotations_file: cli.annotations_file,
        unlabeled_annotations_file: cli.unlabeled_annotations_file,
        backend_kind: cli.model_backend,
        backend_script: cli.backend_script,
        hyperparameters_json: cli.hyperparameters_json,
        output_prefix: cli.output_prefix,
        calibration_sensitivity_threshold: cli.calibration_sensitivity_threshold,
        variant_types: cli.variant_types,
    };

    if let Err(e) = train::run_training(&opt) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}
