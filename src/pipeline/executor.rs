//! Pipeline execution: turning a [`PipelineSpec`] plus a training dataset
//! into a [`FittedModel`], and applying a fitted model to new rows.
//!
//! Fitting makes exactly one streaming pass over the raw file to learn the
//! label-key mapping and hash every row into a compact sparse vector; only
//! those vectors are held in memory for the trainer's iterative passes, so
//! scaled-up training files never require materializing raw rows.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dataset::{DatasetReader, Row};
use crate::error::{PipelineError, Result};
use crate::pipeline::spec::{PipelineSpec, Step, PREDICTED_COLUMN};
use crate::pipeline::text::{remove_stop_words, tokenize, HashingFeaturizer, SparseVector};
use crate::pipeline::trainer::TrainedClassifier;
use crate::schema::DatasetSchema;

/// Learned label-to-key mapping. Keys are assigned in order of first
/// appearance in the training data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    column: String,
    labels: Vec<String>,
}

impl LabelEncoder {
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Distinct labels in key order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    pub fn key_of(&self, raw: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == raw)
    }

    /// Original label for a key. Keys come from the classifier, so they are
    /// always in range for a consistent artifact.
    pub fn decode(&self, key: usize) -> &str {
        self.labels.get(key).map(|l| l.as_str()).unwrap_or("")
    }
}

/// One fitted pipeline step, mirroring the [`Step`] it was fitted from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedStep {
    EncodeLabel(LabelEncoder),
    Tokenize {
        column: String,
        output: String,
    },
    RemoveStopWords {
        input: String,
        output: String,
    },
    Featurize {
        column: String,
        output: String,
        featurizer: HashingFeaturizer,
    },
    Concatenate {
        inputs: Vec<String>,
        output: String,
    },
    Train {
        label: String,
        features: String,
        classifier: TrainedClassifier,
    },
    DecodeLabel {
        output: String,
    },
}

/// A row scored by a fitted model: the input row with the predicted label
/// and the per-class probabilities appended.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub row: Row,
    /// Decoded predicted label, in the original vocabulary
    pub predicted: String,
    /// Encoded key of the predicted class
    pub predicted_key: usize,
    /// Per-class probabilities, in label-key order
    pub scores: Vec<f32>,
}

impl ScoredRow {
    /// Probability assigned to a label, zero for labels the model never saw.
    pub fn score_for(&self, encoder: &LabelEncoder, label: &str) -> f32 {
        encoder
            .key_of(label)
            .and_then(|k| self.scores.get(k))
            .copied()
            .unwrap_or(0.0)
    }
}

/// Per-row scratch space threaded through the fitted text steps.
#[derive(Default)]
struct Workspace {
    tokens: HashMap<String, Vec<String>>,
    vectors: HashMap<String, SparseVector>,
}

impl Workspace {
    fn tokens_for(&self, row: &Row, column: &str) -> Vec<String> {
        match self.tokens.get(column) {
            Some(tokens) => tokens.clone(),
            None => tokenize(row.get_or_empty(column)),
        }
    }
}

/// An immutable fitted pipeline: the ordered fitted steps plus the schema
/// it was trained against. Self-describing; evaluation and prediction need
/// no access to the original [`PipelineSpec`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    schema: DatasetSchema,
    steps: Vec<FittedStep>,
}

impl FittedModel {
    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    pub fn label_encoder(&self) -> &LabelEncoder {
        // fit() guarantees an EncodeLabel step
        self.steps
            .iter()
            .find_map(|s| match s {
                FittedStep::EncodeLabel(encoder) => Some(encoder),
                _ => None,
            })
            .unwrap_or_else(|| unreachable!("fitted model always carries a label encoder"))
    }

    pub fn classifier(&self) -> &TrainedClassifier {
        self.steps
            .iter()
            .find_map(|s| match s {
                FittedStep::Train { classifier, .. } => Some(classifier),
                _ => None,
            })
            .unwrap_or_else(|| unreachable!("fitted model always carries a trained step"))
    }

    /// Name of the decoded prediction column.
    pub fn predicted_column(&self) -> &str {
        self.steps
            .iter()
            .find_map(|s| match s {
                FittedStep::DecodeLabel { output } => Some(output.as_str()),
                _ => None,
            })
            .unwrap_or(PREDICTED_COLUMN)
    }

    /// Applies every fitted step to one row.
    pub fn score_row(&self, row: &Row) -> ScoredRow {
        let mut ws = Workspace::default();
        let mut predicted_key = 0usize;
        let mut scores = Vec::new();

        for step in &self.steps {
            match step {
                FittedStep::EncodeLabel(_) => {
                    // The true label is not needed to score; evaluation
                    // reads it from the input row directly.
                }
                FittedStep::Tokenize { column, output } => {
                    let tokens = tokenize(row.get_or_empty(column));
                    ws.tokens.insert(output.clone(), tokens);
                }
                FittedStep::RemoveStopWords { input, output } => {
                    let kept =
                        remove_stop_words(ws.tokens.get(input).map(|t| t.as_slice()).unwrap_or(&[]));
                    ws.tokens.insert(output.clone(), kept);
                }
                FittedStep::Featurize {
                    column,
                    output,
                    featurizer,
                } => {
                    let tokens = ws.tokens_for(row, column);
                    ws.vectors.insert(output.clone(), featurizer.featurize(&tokens));
                }
                FittedStep::Concatenate { inputs, output } => {
                    let parts: Vec<&SparseVector> =
                        inputs.iter().filter_map(|i| ws.vectors.get(i)).collect();
                    ws.vectors.insert(output.clone(), SparseVector::concat(&parts));
                }
                FittedStep::Train {
                    features,
                    classifier,
                    ..
                } => {
                    let empty = SparseVector::empty(classifier.dims());
                    let x = ws.vectors.get(features).unwrap_or(&empty);
                    let (key, class_scores) = classifier.predict(x);
                    predicted_key = key;
                    scores = class_scores;
                }
                FittedStep::DecodeLabel { .. } => {}
            }
        }

        let predicted = self.label_encoder().decode(predicted_key).to_string();
        ScoredRow {
            row: row.clone(),
            predicted,
            predicted_key,
            scores,
        }
    }

    /// Lazily applies the fitted steps to a sequence of rows, appending the
    /// predicted columns. Used by both evaluation and batch scoring.
    pub fn transform<'a, I>(&'a self, rows: I) -> impl Iterator<Item = Result<ScoredRow>> + 'a
    where
        I: Iterator<Item = Result<Row>> + 'a,
    {
        rows.map(move |row| row.map(|r| self.score_row(&r)))
    }
}

/// Fits pipeline specs against datasets.
pub struct PipelineExecutor;

impl PipelineExecutor {
    /// Validates `spec` against the reader's schema, streams the training
    /// file once to learn the label mapping and featurize every row, fits
    /// the trainer, and assembles the fitted steps in declared order.
    pub fn fit(spec: &PipelineSpec, reader: &DatasetReader) -> Result<FittedModel> {
        let schema = reader.schema().clone();
        spec.validate(&schema)?;

        let mut fitted: Vec<FittedStep> = Vec::with_capacity(spec.steps().len());
        let mut train_slot = None;
        let mut label_column = String::new();
        for step in spec.steps() {
            match step {
                Step::EncodeLabel { column } => {
                    label_column = column.clone();
                    fitted.push(FittedStep::EncodeLabel(LabelEncoder {
                        column: column.clone(),
                        labels: Vec::new(),
                    }));
                }
                Step::Tokenize { column, output } => fitted.push(FittedStep::Tokenize {
                    column: column.clone(),
                    output: output.clone(),
                }),
                Step::RemoveStopWords { input, output } => {
                    fitted.push(FittedStep::RemoveStopWords {
                        input: input.clone(),
                        output: output.clone(),
                    })
                }
                Step::Featurize {
                    column,
                    output,
                    hash_bits,
                } => fitted.push(FittedStep::Featurize {
                    column: column.clone(),
                    output: output.clone(),
                    featurizer: HashingFeaturizer::new(*hash_bits),
                }),
                Step::Concatenate { inputs, output } => fitted.push(FittedStep::Concatenate {
                    inputs: inputs.clone(),
                    output: output.clone(),
                }),
                Step::Train {
                    strategy,
                    label,
                    features,
                } => {
                    train_slot = Some((fitted.len(), strategy.clone(), label.clone(), features.clone()));
                }
                Step::DecodeLabel { output } => fitted.push(FittedStep::DecodeLabel {
                    output: output.clone(),
                }),
            }
        }
        let (train_index, strategy, train_label, train_features) = train_slot
            .ok_or_else(|| PipelineError::InvalidSpec("Train must appear exactly once".to_string()))?;

        info!(
            "Fitting pipeline ({} steps, trainer: {}) against {}",
            spec.steps().len(),
            strategy.name(),
            reader.path().display()
        );

        // Single streaming pass: encode labels in order of first appearance
        // and reduce each row to its concatenated feature vector.
        let mut labels = Vec::new();
        let mut label_index: HashMap<String, usize> = HashMap::new();
        let mut keys = Vec::new();
        let mut vectors = Vec::new();
        let partial = FittedModel {
            schema: schema.clone(),
            steps: fitted.clone(),
        };

        for row in reader.rows()? {
            let row = row?;
            let raw_label = row.get_or_empty(&label_column).to_string();
            let next = label_index.len();
            let key = *label_index.entry(raw_label.clone()).or_insert_with(|| {
                labels.push(raw_label);
                next
            });
            keys.push(key);
            vectors.push(Self::featurize_row(&partial, &row, &train_features));
        }
        debug!(
            "Featurized {} rows into {} classes",
            vectors.len(),
            labels.len()
        );

        let classifier = strategy.fit(&vectors, &keys, labels.len())?;
        info!(
            "Trained {} classes over {} features",
            classifier.n_classes(),
            classifier.dims()
        );

        for step in &mut fitted {
            if let FittedStep::EncodeLabel(encoder) = step {
                encoder.labels = labels.clone();
            }
        }
        fitted.insert(
            train_index,
            FittedStep::Train {
                label: train_label,
                features: train_features,
                classifier,
            },
        );

        Ok(FittedModel {
            schema,
            steps: fitted,
        })
    }

    /// Runs the pre-train text steps of a partially-assembled model and
    /// returns the vector at `features`.
    fn featurize_row(partial: &FittedModel, row: &Row, features: &str) -> SparseVector {
        let mut ws = Workspace::default();
        for step in &partial.steps {
            match step {
                FittedStep::Tokenize { column, output } => {
                    ws.tokens
                        .insert(output.clone(), tokenize(row.get_or_empty(column)));
                }
                FittedStep::RemoveStopWords { input, output } => {
                    let kept =
                        remove_stop_words(ws.tokens.get(input).map(|t| t.as_slice()).unwrap_or(&[]));
                    ws.tokens.insert(output.clone(), kept);
                }
                FittedStep::Featurize {
                    column,
                    output,
                    featurizer,
                } => {
                    let tokens = ws.tokens_for(row, column);
                    ws.vectors
                        .insert(output.clone(), featurizer.featurize(&tokens));
                }
                FittedStep::Concatenate { inputs, output } => {
                    let parts: Vec<&SparseVector> =
                        inputs.iter().filter_map(|i| ws.vectors.get(i)).collect();
                    ws.vectors
                        .insert(output.clone(), SparseVector::concat(&parts));
                }
                _ => {}
            }
        }
        ws.vectors
            .remove(features)
            .unwrap_or_else(|| SparseVector::empty(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::trainer::TrainerStrategy;
    use crate::schema::item_schema;
    use std::io::Write;

    fn training_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let rows = [
            "1001\tSony Blu-Ray Player\tBlu-Ray player from Sony black",
            "1001\tSamsung DVD Player\tDVD player with upscaling",
            "2002\tCotton T-Shirt\tPlain white cotton t-shirt",
            "2002\tWool Sweater\tWarm wool sweater grey",
        ];
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        file
    }

    fn fit_model(file: &tempfile::NamedTempFile) -> FittedModel {
        let reader = DatasetReader::open(file.path(), item_schema()).unwrap();
        let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
        PipelineExecutor::fit(&spec, &reader).unwrap()
    }

    #[test]
    fn test_fit_assembles_steps_in_order() {
        let file = training_file();
        let model = fit_model(&file);
        let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
        assert_eq!(model.steps().len(), spec.steps().len());
        assert!(matches!(model.steps()[0], FittedStep::EncodeLabel(_)));
        assert!(matches!(
            model.steps().last(),
            Some(FittedStep::DecodeLabel { .. })
        ));
    }

    #[test]
    fn test_labels_keyed_in_first_appearance_order() {
        let file = training_file();
        let model = fit_model(&file);
        assert_eq!(model.label_encoder().labels(), ["1001", "2002"]);
    }

    #[test]
    fn test_transform_appends_predictions() {
        let file = training_file();
        let model = fit_model(&file);
        let reader = DatasetReader::open(file.path(), item_schema()).unwrap();
        let scored: Vec<ScoredRow> = model
            .transform(reader.rows().unwrap())
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(scored.len(), 4);
        for row in &scored {
            assert_eq!(row.scores.len(), 2);
            assert!(!row.predicted.is_empty());
        }
        // Training rows should classify themselves correctly.
        assert_eq!(scored[0].predicted, "1001");
        assert_eq!(scored[2].predicted, "2002");
    }

    #[test]
    fn test_invalid_spec_fails_before_reading() {
        let reader = DatasetReader::open("/no/such/file.tsv", item_schema());
        // The reader refuses a missing path, so drive fit with a bad spec
        // against a real file instead: validation must fire first.
        assert!(reader.is_err());
        let file = training_file();
        let reader = DatasetReader::open(file.path(), item_schema()).unwrap();
        let spec = PipelineSpec::new(vec![Step::Concatenate {
            inputs: vec!["missing".to_string()],
            output: "Features".to_string(),
        }]);
        let err = PipelineExecutor::fit(&spec, &reader).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidSpec(_)));
    }

    #[test]
    fn test_novel_text_degrades_gracefully() {
        let file = training_file();
        let model = fit_model(&file);
        let row = Row::from_pairs(vec![
            ("Title", "zzgrobblefrak qwyxzt"),
            ("Description", "entirely unseen vocabulary"),
        ]);
        let scored = model.score_row(&row);
        assert_eq!(scored.scores.len(), 2);
        assert!(scored.scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_malformed_row_aborts_fit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "1001\tSony Blu-Ray Player\tok").unwrap();
        writeln!(file, "2002\tonly-two-fields").unwrap();
        let reader = DatasetReader::open(file.path(), item_schema()).unwrap();
        let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
        let err = PipelineExecutor::fit(&spec, &reader).unwrap_err();
        assert!(matches!(err, PipelineError::DatasetFormat { .. }));
    }
}
