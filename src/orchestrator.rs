//! Top-level driver: one run per configured dataset size, each fitting,
//! persisting, evaluating, and serving one example prediction. Runs are
//! isolated; a failing run becomes a failure record and never aborts its
//! siblings.

use std::path::PathBuf;
use std::time::Instant;

use log::{error, info};

use crate::dataset::DatasetReader;
use crate::error::Result;
use crate::evaluate::{Evaluator, Metrics};
use crate::pipeline::{PipelineExecutor, PipelineSpec, TrainerStrategy};
use crate::predict::{Prediction, Predictor};
use crate::schema::DatasetSchema;
use crate::store::ModelStore;

/// Everything one run needs: paths, schema, and trainer strategy. The four
/// copy-pasted script variants of old collapse into a list of these.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Short name used in logs and the summary
    pub name: String,
    pub train_path: PathBuf,
    /// Held-out set shared across runs; read-only
    pub test_path: PathBuf,
    pub artifact_path: PathBuf,
    pub strategy: TrainerStrategy,
    pub schema: DatasetSchema,
}

/// Result of one successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub name: String,
    pub fit_seconds: f64,
    pub metrics: Metrics,
    pub example: Prediction,
}

/// Outcome of one run, success or captured failure.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    Failed { name: String, reason: String },
}

impl RunOutcome {
    pub fn name(&self) -> &str {
        match self {
            RunOutcome::Completed(report) => &report.name,
            RunOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed { .. })
    }
}

/// Executes configured runs in order with per-run error capture.
pub struct Orchestrator;

impl Orchestrator {
    /// Runs every config, converting errors into failure records. The
    /// example record is predicted once per successful run.
    pub fn run_all(configs: &[RunConfig], example: &[(&str, &str)]) -> Vec<RunOutcome> {
        configs
            .iter()
            .map(|config| match Self::run_one(config, example) {
                Ok(report) => RunOutcome::Completed(report),
                Err(e) => {
                    error!("Run '{}' failed: {e}", config.name);
                    RunOutcome::Failed {
                        name: config.name.clone(),
                        reason: e.to_string(),
                    }
                }
            })
            .collect()
    }

    fn run_one(config: &RunConfig, example: &[(&str, &str)]) -> Result<RunReport> {
        info!("=== Run '{}' ===", config.name);
        let train_reader = DatasetReader::open(&config.train_path, config.schema.clone())?;
        let spec = PipelineSpec::for_schema(&config.schema, config.strategy.clone());

        let start = Instant::now();
        let model = PipelineExecutor::fit(&spec, &train_reader)?;
        let fit_seconds = start.elapsed().as_secs_f64();
        info!("Run '{}': fit took {:.2}s", config.name, fit_seconds);

        ModelStore::save(&model, &config.artifact_path)?;

        let test_reader = DatasetReader::open(&config.test_path, config.schema.clone())?;
        let metrics = Evaluator::evaluate(&model, &test_reader)?;

        let example = Predictor::new(&model).predict(example);
        info!(
            "Run '{}': example predicted as '{}'",
            config.name, example.label
        );

        Ok(RunReport {
            name: config.name.clone(),
            fit_seconds,
            metrics,
            example,
        })
    }
}
