//! Dataset column contract shared by the reader, the pipeline, and the
//! persisted model artifact.

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// What a column contributes to training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// The category to predict (exactly one per schema)
    Label,
    /// Input to featurization (at least one per schema)
    Feature,
    /// Present in the source file but not used
    Ignored,
}

/// Raw value kind of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Text,
    Categorical,
}

/// One column of the tab-separated source, in field order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub role: ColumnRole,
    pub kind: ColumnKind,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, role: ColumnRole, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            role,
            kind,
        }
    }
}

/// An ordered column contract for a delimited-text dataset.
///
/// Column order matches the raw source's field order so rows can be parsed
/// positionally. Construction validates the structural invariants: exactly
/// one `Label` column and at least one `Feature` column.
///
/// # Example
/// ```
/// use itemcat::{ColumnKind, ColumnRole, DatasetSchema};
///
/// let schema = DatasetSchema::builder()
///     .column("CategoryID", ColumnRole::Label, ColumnKind::Categorical)
///     .column("Title", ColumnRole::Feature, ColumnKind::Text)
///     .column("Description", ColumnRole::Feature, ColumnKind::Text)
///     .build()
///     .unwrap();
///
/// assert_eq!(schema.arity(), 3);
/// assert_eq!(schema.label_column(), "CategoryID");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    columns: Vec<ColumnDef>,
}

impl DatasetSchema {
    /// Creates a builder for fluent schema construction
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// Validates and wraps an ordered column list
    pub fn new(columns: Vec<ColumnDef>) -> Result<Self> {
        let labels = columns
            .iter()
            .filter(|c| c.role == ColumnRole::Label)
            .count();
        if labels != 1 {
            return Err(PipelineError::InvalidSchema(format!(
                "schema must declare exactly one Label column, found {}",
                labels
            )));
        }
        if !columns.iter().any(|c| c.role == ColumnRole::Feature) {
            return Err(PipelineError::InvalidSchema(
                "schema must declare at least one Feature column".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(PipelineError::InvalidSchema(format!(
                    "duplicate column name '{}'",
                    col.name
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Number of fields each source row must have
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Name of the single Label column
    pub fn label_column(&self) -> &str {
        self.columns
            .iter()
            .find(|c| c.role == ColumnRole::Label)
            .map(|c| c.name.as_str())
            .unwrap_or_default()
    }

    /// Names of the Feature columns, in field order
    pub fn feature_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.role == ColumnRole::Feature)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Builder for [`DatasetSchema`]
#[derive(Default, Debug)]
pub struct SchemaBuilder {
    columns: Vec<ColumnDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Appends a column in source field order
    pub fn column(mut self, name: impl Into<String>, role: ColumnRole, kind: ColumnKind) -> Self {
        self.columns.push(ColumnDef::new(name, role, kind));
        self
    }

    pub fn build(self) -> Result<DatasetSchema> {
        DatasetSchema::new(self.columns)
    }
}

/// The standard item-categorization schema:
/// `CategoryID` (label), `Title` and `Description` (text features).
pub fn item_schema() -> DatasetSchema {
    DatasetSchema::builder()
        .column("CategoryID", ColumnRole::Label, ColumnKind::Categorical)
        .column("Title", ColumnRole::Feature, ColumnKind::Text)
        .column("Description", ColumnRole::Feature, ColumnKind::Text)
        .build()
        .unwrap_or_else(|_| unreachable!("built-in schema is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_schema() {
        let schema = item_schema();
        assert_eq!(schema.arity(), 3);
        assert_eq!(schema.label_column(), "CategoryID");
        assert_eq!(schema.feature_columns(), vec!["Title", "Description"]);
    }

    #[test]
    fn test_rejects_missing_label() {
        let result = DatasetSchema::builder()
            .column("Title", ColumnRole::Feature, ColumnKind::Text)
            .build();
        assert!(matches!(result, Err(PipelineError::InvalidSchema(_))));
    }

    #[test]
    fn test_rejects_two_labels() {
        let result = DatasetSchema::builder()
            .column("A", ColumnRole::Label, ColumnKind::Categorical)
            .column("B", ColumnRole::Label, ColumnKind::Categorical)
            .column("Title", ColumnRole::Feature, ColumnKind::Text)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_missing_features() {
        let result = DatasetSchema::builder()
            .column("CategoryID", ColumnRole::Label, ColumnKind::Categorical)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let result = DatasetSchema::builder()
            .column("CategoryID", ColumnRole::Label, ColumnKind::Categorical)
            .column("Title", ColumnRole::Feature, ColumnKind::Text)
            .column("Title", ColumnRole::Feature, ColumnKind::Text)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_title_only_schema() {
        // Description-less variant is a schema choice, not a separate program
        let schema = DatasetSchema::builder()
            .column("CategoryID", ColumnRole::Label, ColumnKind::Categorical)
            .column("Title", ColumnRole::Feature, ColumnKind::Text)
            .build()
            .unwrap();
        assert_eq!(schema.feature_columns(), vec!["Title"]);
    }
}
