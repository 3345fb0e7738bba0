use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use log::info;

use itemcat::{
    item_schema, ModelStore, Orchestrator, RunConfig, RunOutcome, TrainerStrategy,
};
use itemcat::pipeline::{PerceptronOptions, SdcaOptions};

/// The fixed ad-hoc example predicted after every run.
const EXAMPLE: &[(&str, &str)] = &[
    ("Title", "Sony Blu-Ray Player"),
    ("Description", "Blu-Ray player from Sony, black powers on"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Strategy {
    /// Stochastic dual coordinate ascent
    Sdca,
    /// One-vs-all averaged perceptron
    AveragedPerceptron,
}

impl Strategy {
    fn to_trainer(self) -> TrainerStrategy {
        match self {
            Strategy::Sdca => TrainerStrategy::SdcaMulticlass(SdcaOptions::default()),
            Strategy::AveragedPerceptron => {
                TrainerStrategy::OvaAveragedPerceptron(PerceptronOptions::default())
            }
        }
    }
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory containing the training and test TSV files
    #[arg(long, default_value = "Data")]
    data_dir: PathBuf,

    /// Directory for saved model artifacts (defaults to the itemcat cache)
    #[arg(long)]
    models_dir: Option<PathBuf>,

    /// Held-out test file shared by all runs, relative to the data directory
    #[arg(long, default_value = "testingdata.tsv")]
    test_file: String,

    /// Training files to run, relative to the data directory; one run each
    #[arg(long = "train-file", default_values_t = [
        "trainingdata.tsv".to_string(),
        "trainingdata_10k.tsv".to_string(),
        "trainingdata_500k.tsv".to_string(),
    ])]
    train_files: Vec<String>,

    /// Trainer strategy used by every run
    #[arg(long, value_enum, default_value = "sdca")]
    strategy: Strategy,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("=== Starting Item Categorization Runs ===");

    let models_dir = args
        .models_dir
        .clone()
        .unwrap_or_else(ModelStore::default_models_dir);
    let test_path = args.data_dir.join(&args.test_file);

    let configs: Vec<RunConfig> = args
        .train_files
        .iter()
        .map(|file| {
            let name = PathBuf::from(file)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.clone());
            RunConfig {
                artifact_path: models_dir.join(format!("{name}.bin")),
                name,
                train_path: args.data_dir.join(file),
                test_path: test_path.clone(),
                strategy: args.strategy.to_trainer(),
                schema: item_schema(),
            }
        })
        .collect();

    let start = Instant::now();
    let outcomes = Orchestrator::run_all(&configs, EXAMPLE);
    let total_time = start.elapsed();

    for outcome in &outcomes {
        match outcome {
            RunOutcome::Completed(report) => {
                println!("\nRun '{}':", report.name);
                println!("  Fit time:       {:.2}s", report.fit_seconds);
                print!("{}", report.metrics);
                let mut scores: Vec<_> = report.example.scores.iter().collect();
                scores.sort_by(|a, b| b.1.partial_cmp(a.1).unwrap_or(std::cmp::Ordering::Equal));
                println!(
                    "  Example '{}': predicted category {}",
                    EXAMPLE[0].1, report.example.label
                );
                for (label, score) in scores.iter().take(3) {
                    println!("    {label}: {:.1}%", *score * 100.0);
                }
            }
            RunOutcome::Failed { name, reason } => {
                println!("\nRun '{name}': FAILED: {reason}");
            }
        }
    }

    let failed: Vec<&RunOutcome> = outcomes.iter().filter(|o| o.is_failure()).collect();
    println!(
        "\n{}/{} runs succeeded in {:.2?}",
        outcomes.len() - failed.len(),
        outcomes.len(),
        total_time
    );
    for outcome in &failed {
        if let RunOutcome::Failed { name, reason } = outcome {
            println!("  failed: {name}: {reason}");
        }
    }

    if !failed.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
