//! Multiclass evaluation over a held-out dataset.

use std::collections::BTreeMap;
use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::dataset::DatasetReader;
use crate::error::Result;
use crate::pipeline::FittedModel;

/// Probability floor applied before taking a logarithm, so a zero-probability
/// prediction contributes a large finite loss instead of infinity.
const LOG_LOSS_FLOOR: f64 = 1e-15;

/// Aggregate multiclass metrics. All maps are ordered so repeated
/// evaluations of the same model and rows are bit-identical.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Fraction of rows whose predicted label equals the true label
    pub accuracy: f64,
    /// Mean per-row log-loss
    pub micro_log_loss: f64,
    /// Unweighted mean of the per-class mean log-losses
    pub macro_log_loss: f64,
    /// Rows evaluated
    pub total: usize,
    /// Rows predicted correctly
    pub correct: usize,
    /// Mean log-loss per true class
    pub per_class_log_loss: BTreeMap<String, f64>,
    /// Confusion counts: true label -> predicted label -> count
    pub confusion: BTreeMap<String, BTreeMap<String, usize>>,
}

impl Metrics {
    /// Count of rows with the given true and predicted labels.
    pub fn confusion_count(&self, true_label: &str, predicted: &str) -> usize {
        self.confusion
            .get(true_label)
            .and_then(|row| row.get(predicted))
            .copied()
            .unwrap_or(0)
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Accuracy:       {:.4}", self.accuracy)?;
        writeln!(f, "  Micro log-loss: {:.4}", self.micro_log_loss)?;
        writeln!(f, "  Macro log-loss: {:.4}", self.macro_log_loss)?;
        writeln!(f, "  Rows:           {} ({} correct)", self.total, self.correct)?;
        writeln!(f, "  Confusion (true -> predicted: count):")?;
        for (true_label, row) in &self.confusion {
            for (predicted, count) in row {
                writeln!(f, "    {true_label} -> {predicted}: {count}")?;
            }
        }
        Ok(())
    }
}

/// Scores a fitted model against labeled rows.
pub struct Evaluator;

impl Evaluator {
    /// Runs the model's transform over the reader's rows and accumulates
    /// accuracy, log-losses, and confusion counts.
    ///
    /// Deterministic: given the same model and the same row order, repeated
    /// calls produce identical [`Metrics`].
    pub fn evaluate(model: &FittedModel, reader: &DatasetReader) -> Result<Metrics> {
        let encoder = model.label_encoder();
        let label_column = encoder.column().to_string();

        let mut total = 0usize;
        let mut correct = 0usize;
        let mut loss_sum = 0.0f64;
        let mut class_loss: BTreeMap<String, (f64, usize)> = BTreeMap::new();
        let mut confusion: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

        for scored in model.transform(reader.rows()?) {
            let scored = scored?;
            let true_label = scored.row.get_or_empty(&label_column).to_string();

            let p_true = f64::from(scored.score_for(encoder, &true_label)).max(LOG_LOSS_FLOOR);
            let loss = -p_true.ln();
            loss_sum += loss;

            total += 1;
            if scored.predicted == true_label {
                correct += 1;
            }

            let entry = class_loss.entry(true_label.clone()).or_insert((0.0, 0));
            entry.0 += loss;
            entry.1 += 1;

            *confusion
                .entry(true_label)
                .or_default()
                .entry(scored.predicted.clone())
                .or_insert(0) += 1;
        }

        let per_class_log_loss: BTreeMap<String, f64> = class_loss
            .into_iter()
            .map(|(label, (sum, count))| (label, sum / count as f64))
            .collect();
        let macro_log_loss = if per_class_log_loss.is_empty() {
            0.0
        } else {
            per_class_log_loss.values().sum::<f64>() / per_class_log_loss.len() as f64
        };

        let metrics = Metrics {
            accuracy: if total > 0 {
                correct as f64 / total as f64
            } else {
                0.0
            },
            micro_log_loss: if total > 0 {
                loss_sum / total as f64
            } else {
                0.0
            },
            macro_log_loss,
            total,
            correct,
            per_class_log_loss,
            confusion,
        };
        info!(
            "Evaluated {} rows: accuracy {:.4}, micro log-loss {:.4}",
            metrics.total, metrics.accuracy, metrics.micro_log_loss
        );
        Ok(metrics)
    }
}
