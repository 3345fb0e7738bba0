//! The pipeline core: declarative specs, text transforms, trainers, and the
//! executor that fits them into an immutable model.

pub mod executor;
pub mod spec;
pub mod text;
pub mod trainer;

pub use executor::{FittedModel, FittedStep, LabelEncoder, PipelineExecutor, ScoredRow};
pub use spec::{PipelineSpec, Step, FEATURES_COLUMN, LABEL_COLUMN, PREDICTED_COLUMN};
pub use text::{HashingFeaturizer, SparseVector};
pub use trainer::{PerceptronOptions, SdcaOptions, TrainedClassifier, TrainerStrategy};
