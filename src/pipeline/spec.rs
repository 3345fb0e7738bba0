//! Declarative pipeline specification.
//!
//! A [`PipelineSpec`] is data, not code: the ordered list of transform steps
//! plus the trainer strategy. Alternate configurations (different trainer,
//! fewer feature columns, extra tokenization sub-steps) are alternate specs,
//! never duplicated programs. Structural invariants are checked by
//! [`PipelineSpec::validate`] before any dataset row is read.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};
use crate::pipeline::trainer::TrainerStrategy;
use crate::schema::{ColumnRole, DatasetSchema};

/// Name of the encoded-label key column produced by `EncodeLabel`.
pub const LABEL_COLUMN: &str = "Label";
/// Default name of the concatenated feature column consumed by `Train`.
pub const FEATURES_COLUMN: &str = "Features";
/// Default name of the decoded prediction column produced by `DecodeLabel`.
pub const PREDICTED_COLUMN: &str = "PredictedLabel";

fn default_hash_bits() -> u8 {
    16
}

/// One transform step of a pipeline, in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Step {
    /// Learns the mapping from raw label values to integer keys and adds the
    /// key column [`LABEL_COLUMN`].
    EncodeLabel { column: String },
    /// Splits a text column into lower-cased alphanumeric tokens.
    Tokenize { column: String, output: String },
    /// Drops built-in stop words from a token column.
    RemoveStopWords { input: String, output: String },
    /// Hashes a text or token column into a normalized sparse vector.
    Featurize {
        column: String,
        output: String,
        #[serde(default = "default_hash_bits")]
        hash_bits: u8,
    },
    /// Concatenates vector columns into one feature vector.
    Concatenate { inputs: Vec<String>, output: String },
    /// Fits the classifier. The single iterative full-pass step; adds the
    /// per-class `Score` column at transform time.
    Train {
        strategy: TrainerStrategy,
        label: String,
        features: String,
    },
    /// Maps the predicted key back to the original label vocabulary.
    DecodeLabel { output: String },
}

/// Value kind a column holds while threading through the steps. Used only
/// for validation; execution state lives in the fitted steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnData {
    Text,
    Tokens,
    Vector,
    Key,
}

/// An ordered, validated-on-demand sequence of [`Step`]s.
///
/// # Example
/// ```
/// use itemcat::{item_schema, PipelineSpec, TrainerStrategy};
///
/// let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
/// assert!(spec.validate(&item_schema()).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSpec {
    steps: Vec<Step>,
}

impl PipelineSpec {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Builds the standard spec for a schema: encode the label, then
    /// tokenize → remove stop words → featurize each feature column,
    /// concatenate, train, decode.
    pub fn for_schema(schema: &DatasetSchema, strategy: TrainerStrategy) -> Self {
        let mut steps = vec![Step::EncodeLabel {
            column: schema.label_column().to_string(),
        }];
        let mut featurized = Vec::new();
        for column in schema.feature_columns() {
            let tokens = format!("{column}_tokens");
            let cleaned = format!("{column}_cleaned");
            let vector = format!("{column}_featurized");
            steps.push(Step::Tokenize {
                column: column.to_string(),
                output: tokens.clone(),
            });
            steps.push(Step::RemoveStopWords {
                input: tokens,
                output: cleaned.clone(),
            });
            steps.push(Step::Featurize {
                column: cleaned,
                output: vector.clone(),
                hash_bits: default_hash_bits(),
            });
            featurized.push(vector);
        }
        steps.push(Step::Concatenate {
            inputs: featurized,
            output: FEATURES_COLUMN.to_string(),
        });
        steps.push(Step::Train {
            strategy,
            label: LABEL_COLUMN.to_string(),
            features: FEATURES_COLUMN.to_string(),
        });
        steps.push(Step::DecodeLabel {
            output: PREDICTED_COLUMN.to_string(),
        });
        Self { steps }
    }

    /// Checks the structural invariants against a schema, before any row is
    /// read. Fails with [`PipelineError::InvalidSpec`] naming the violated
    /// invariant:
    ///
    /// - every input column is declared by the schema or produced earlier,
    ///   with the kind the step expects;
    /// - `Train` appears exactly once, after every feature-producing step;
    /// - `DecodeLabel` follows `Train`;
    /// - no output column is produced twice.
    pub fn validate(&self, schema: &DatasetSchema) -> Result<()> {
        let mut columns: HashMap<String, ColumnData> = schema
            .columns()
            .iter()
            .map(|c| (c.name.clone(), ColumnData::Text))
            .collect();
        let mut trained = false;

        for step in &self.steps {
            if trained && !matches!(step, Step::DecodeLabel { .. }) {
                return Err(PipelineError::InvalidSpec(format!(
                    "step {step:?} appears after Train; only DecodeLabel may follow Train"
                )));
            }
            match step {
                Step::EncodeLabel { column } => {
                    let def = schema.column(column).ok_or_else(|| {
                        PipelineError::InvalidSpec(format!(
                            "EncodeLabel references undeclared column '{column}'"
                        ))
                    })?;
                    if def.role != ColumnRole::Label {
                        return Err(PipelineError::InvalidSpec(format!(
                            "EncodeLabel column '{column}' is not the schema's Label column"
                        )));
                    }
                    Self::produce(&mut columns, LABEL_COLUMN, ColumnData::Key)?;
                }
                Step::Tokenize { column, output } => {
                    Self::expect(&columns, column, ColumnData::Text, "Tokenize")?;
                    Self::produce(&mut columns, output, ColumnData::Tokens)?;
                }
                Step::RemoveStopWords { input, output } => {
                    Self::expect(&columns, input, ColumnData::Tokens, "RemoveStopWords")?;
                    Self::produce(&mut columns, output, ColumnData::Tokens)?;
                }
                Step::Featurize { column, output, .. } => {
                    match columns.get(column.as_str()) {
                        Some(ColumnData::Text) | Some(ColumnData::Tokens) => {}
                        Some(_) => {
                            return Err(PipelineError::InvalidSpec(format!(
                                "Featurize input '{column}' is not a text or token column"
                            )))
                        }
                        None => {
                            return Err(PipelineError::InvalidSpec(format!(
                                "Featurize references undeclared column '{column}'"
                            )))
                        }
                    }
                    Self::produce(&mut columns, output, ColumnData::Vector)?;
                }
                Step::Concatenate { inputs, output } => {
                    if inputs.is_empty() {
                        return Err(PipelineError::InvalidSpec(
                            "Concatenate requires at least one input column".to_string(),
                        ));
                    }
                    for input in inputs {
                        Self::expect(&columns, input, ColumnData::Vector, "Concatenate")?;
                    }
                    Self::produce(&mut columns, output, ColumnData::Vector)?;
                }
                Step::Train {
                    label, features, ..
                } => {
                    if trained {
                        return Err(PipelineError::InvalidSpec(
                            "Train must appear exactly once".to_string(),
                        ));
                    }
                    Self::expect(&columns, label, ColumnData::Key, "Train")?;
                    Self::expect(&columns, features, ColumnData::Vector, "Train")?;
                    trained = true;
                }
                Step::DecodeLabel { output } => {
                    if !trained {
                        return Err(PipelineError::InvalidSpec(
                            "DecodeLabel must follow Train".to_string(),
                        ));
                    }
                    Self::produce(&mut columns, output, ColumnData::Text)?;
                }
            }
        }

        if !trained {
            return Err(PipelineError::InvalidSpec(
                "Train must appear exactly once".to_string(),
            ));
        }
        Ok(())
    }

    fn expect(
        columns: &HashMap<String, ColumnData>,
        name: &str,
        expected: ColumnData,
        step: &str,
    ) -> Result<()> {
        match columns.get(name) {
            Some(kind) if *kind == expected => Ok(()),
            Some(kind) => Err(PipelineError::InvalidSpec(format!(
                "{step} input '{name}' has kind {kind:?}, expected {expected:?}"
            ))),
            None => Err(PipelineError::InvalidSpec(format!(
                "{step} references undeclared column '{name}'"
            ))),
        }
    }

    fn produce(
        columns: &mut HashMap<String, ColumnData>,
        name: &str,
        kind: ColumnData,
    ) -> Result<()> {
        if columns.insert(name.to_string(), kind).is_some() {
            return Err(PipelineError::InvalidSpec(format!(
                "column '{name}' is produced more than once"
            )));
        }
        Ok(())
    }
}
