//! A reusable text-classification training and evaluation pipeline for item
//! categorization: declare the transform steps and trainer as data, fit them
//! against a tab-separated dataset, persist the fitted model, score a
//! held-out set, and serve single-item predictions.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use itemcat::{
//!     item_schema, DatasetReader, Evaluator, ModelStore, PipelineExecutor,
//!     PipelineSpec, Predictor, TrainerStrategy,
//! };
//!
//! let schema = item_schema();
//! let train = DatasetReader::open("Data/trainingdata.tsv", schema.clone())?;
//! let spec = PipelineSpec::for_schema(&schema, TrainerStrategy::default());
//!
//! let model = PipelineExecutor::fit(&spec, &train)?;
//! ModelStore::save(&model, "Data/ItemCategorizationModel.bin")?;
//!
//! let test = DatasetReader::open("Data/testingdata.tsv", schema)?;
//! let metrics = Evaluator::evaluate(&model, &test)?;
//! println!("Accuracy: {:.4}", metrics.accuracy);
//!
//! let prediction = Predictor::new(&model).predict(&[
//!     ("Title", "Sony Blu-Ray Player"),
//!     ("Description", "Blu-Ray player from Sony, black powers on"),
//! ]);
//! println!("Predicted category: {}", prediction.label);
//! # Ok(())
//! # }
//! ```
//!
//! # Pipeline variation is configuration
//!
//! Alternate trainer strategies, feature-column subsets, and dataset sizes
//! are alternate [`PipelineSpec`]s and [`RunConfig`]s, never duplicated
//! programs. The [`Orchestrator`] executes a list of run configs with
//! per-run error isolation.

pub mod dataset;
pub mod error;
pub mod evaluate;
pub mod orchestrator;
pub mod pipeline;
pub mod predict;
pub mod schema;
pub mod store;

pub use dataset::{DatasetReader, Row};
pub use error::{PipelineError, Result};
pub use evaluate::{Evaluator, Metrics};
pub use orchestrator::{Orchestrator, RunConfig, RunOutcome, RunReport};
pub use pipeline::{
    FittedModel, FittedStep, LabelEncoder, PipelineExecutor, PipelineSpec, Step,
    TrainerStrategy,
};
pub use predict::{Prediction, Predictor};
pub use schema::{item_schema, ColumnDef, ColumnKind, ColumnRole, DatasetSchema};
pub use store::{ModelStore, FORMAT_VERSION};

pub fn init_logger() {
    env_logger::init();
}
