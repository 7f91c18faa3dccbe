use clap::Parser;
use cli::{TrainingRun, run};
use color_eyre::eyre::{Result, eyre};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{self, EnvFilter};

use classify::{ClassifierKind, SvmKernel};
use rag::FeatureSetKind;

/// Create an agglomeration boundary classifier from a recorded merge
/// history.
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Watershed volume, a `stack` dataset in container format
    ws: PathBuf,
    /// Ground truth volume, in container format also
    gt: PathBuf,
    /// Probabilities volume, in container ... you get the idea
    probs: PathBuf,
    /// Path to save the serialized classifier
    fout: PathBuf,
    /// Agglomerate until this threshold
    #[arg(short = 'T', long, default_value_t = 255.0)]
    max_threshold: f64,
    /// Use a boundary as a positive example only if it overlaps more than
    /// this fraction of true boundary
    #[arg(short = 'E', long, value_name = "FLOAT", default_value_t = 0.9)]
    true_tolerance: f64,
    /// Use a boundary as a negative example only if it overlaps less than
    /// this fraction of true boundary
    #[arg(short = 'e', long, value_name = "FLOAT", default_value_t = 0.1)]
    false_tolerance: f64,
    /// Save the generated training data to FILE
    #[arg(short = 's', long, value_name = "FILE")]
    save_training_data: Option<PathBuf>,
    /// Ensure true edges and false edges are equally represented
    #[arg(short = 'b', long)]
    balance_classes: bool,
    /// Classifier to fit: svm, logistic-regression or linear-regression
    #[arg(short = 'c', long, default_value = "svm")]
    classifier: String,
    /// Kernel for an SVM classifier: linear, rbf or polynomial
    #[arg(short = 'k', long, default_value = "rbf")]
    kernel: String,
    /// Feature set: moments or full-statistics
    #[arg(short = 'f', long, default_value = "full-statistics")]
    feature_set: String,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = TrainingRun {
        watershed: cli.ws,
        ground_truth: cli.gt,
        probabilities: cli.probs,
        classifier_out: cli.fout,
        max_threshold: cli.max_threshold,
        true_tolerance: cli.true_tolerance,
        false_tolerance: cli.false_tolerance,
        balance_classes: cli.balance_classes,
        classifier: ClassifierKind::parse(&cli.classifier)?,
        kernel: SvmKernel::parse(&cli.kernel)?,
        feature_set: cli
            .feature_set
            .parse::<FeatureSetKind>()
            .map_err(|_| eyre!("Unknown feature set '{}'", cli.feature_set))?,
        save_training_data: cli.save_training_data,
    };

    let report = run(&config)?;
    info!(
        "✅ Trained on {} of {} merges ({} positive, {} negative)",
        report.kept, report.merges, report.positives, report.negatives
    );
    Ok(())
}
