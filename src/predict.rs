//! Low-latency single-record prediction outside the batch path.

use std::collections::HashMap;

use crate::dataset::Row;
use crate::pipeline::FittedModel;

/// One ad-hoc prediction: the decoded label plus per-class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    pub scores: HashMap<String, f32>,
}

/// Wraps a fitted model for one-row inference. Applies every fitted step
/// including label decoding, so the returned label is in the original
/// vocabulary, never an internal key.
///
/// Text the model never saw hashes into zero-weight feature buckets and a
/// missing feature column is treated as empty text, so novel input degrades
/// instead of erroring.
///
/// # Example
/// ```no_run
/// use itemcat::{ModelStore, Predictor};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let model = ModelStore::load("model.bin")?;
/// let predictor = Predictor::new(&model);
/// let prediction = predictor.predict(&[
///     ("Title", "Sony Blu-Ray Player"),
///     ("Description", "Blu-Ray player from Sony, black powers on"),
/// ]);
/// println!("Predicted category: {}", prediction.label);
/// # Ok(())
/// # }
/// ```
pub struct Predictor<'a> {
    model: &'a FittedModel,
}

impl<'a> Predictor<'a> {
    pub fn new(model: &'a FittedModel) -> Self {
        Self { model }
    }

    /// Predicts the label for one raw record given as `(column, text)`
    /// pairs. The label column is not required.
    pub fn predict(&self, record: &[(&str, &str)]) -> Prediction {
        let row = Row::from_pairs(record.to_vec());
        let scored = self.model.score_row(&row);
        let encoder = self.model.label_encoder();
        let scores = encoder
            .labels()
            .iter()
            .zip(&scored.scores)
            .map(|(label, &score)| (label.clone(), score))
            .collect();
        Prediction {
            label: scored.predicted,
            scores,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::DatasetReader;
    use crate::pipeline::{PipelineExecutor, PipelineSpec, TrainerStrategy};
    use crate::schema::item_schema;
    use std::io::Write;

    fn fit(rows: &[&str]) -> FittedModel {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for row in rows {
            writeln!(file, "{row}").unwrap();
        }
        let reader = DatasetReader::open(file.path(), item_schema()).unwrap();
        let spec = PipelineSpec::for_schema(&item_schema(), TrainerStrategy::default());
        PipelineExecutor::fit(&spec, &reader).unwrap()
    }

    #[test]
    fn test_predicts_trained_label_for_near_identical_text() {
        let model = fit(&["1001\tSony Blu-Ray Player\tBlu-Ray player from Sony black"]);
        let prediction = Predictor::new(&model).predict(&[
            ("Title", "Sony Blu-Ray Player"),
            ("Description", "Blu-Ray player from Sony, black powers on"),
        ]);
        assert_eq!(prediction.label, "1001");
        assert!(prediction.scores.contains_key("1001"));
    }

    #[test]
    fn test_missing_column_degrades_to_empty_text() {
        let model = fit(&[
            "1001\tSony Blu-Ray Player\tBlu-Ray player from Sony black",
            "2002\tCotton T-Shirt\tPlain white cotton t-shirt",
        ]);
        let prediction = Predictor::new(&model).predict(&[("Title", "Sony Blu-Ray Player")]);
        assert_eq!(prediction.label, "1001");
    }

    #[test]
    fn test_scores_cover_all_classes() {
        let model = fit(&[
            "1001\tSony Blu-Ray Player\tBlu-Ray player from Sony black",
            "2002\tCotton T-Shirt\tPlain white cotton t-shirt",
            "3003\tGarden Hose\tFifty foot green garden hose",
        ]);
        let prediction = Predictor::new(&model).predict(&[("Title", "dvd player")]);
        assert_eq!(prediction.scores.len(), 3);
        let sum: f32 = prediction.scores.values().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
