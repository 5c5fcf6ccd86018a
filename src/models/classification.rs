use serde::{Deserialize, Serialize};

/// The three-field JSON document the model is constrained to emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ClassificationEnvelope {
    pub title: String,
    pub description: String,
    pub taxonomy: String,
}

/// Outcome persisted against a product row.
///
/// Every field is optional: the store only assigns columns whose field is
/// present and leaves the rest untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClassificationResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// A single column assignment derived from a [`ClassificationResult`].
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Json(serde_json::Value),
}

impl ClassificationResult {
    pub fn success(envelope: ClassificationEnvelope) -> Self {
        Self {
            title: Some(envelope.title),
            description: Some(envelope.description),
            taxonomy: Some(envelope.taxonomy),
            ..Self::default()
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.error_message.is_some()
    }

    /// Column assignments for the fields that are present, in column order.
    pub fn column_assignments(&self) -> Vec<(&'static str, ColumnValue)> {
        let mut columns = Vec::new();
        if let Some(title) = &self.title {
            columns.push(("title", ColumnValue::Text(title.clone())));
        }
        if let Some(description) = &self.description {
            columns.push(("description", ColumnValue::Text(description.clone())));
        }
        if let Some(taxonomy) = &self.taxonomy {
            columns.push(("taxonomy", ColumnValue::Text(taxonomy.clone())));
        }
        if let Some(violations) = &self.violations {
            columns.push(("violations", ColumnValue::Json(serde_json::json!(violations))));
        }
        if let Some(message) = &self.error_message {
            columns.push(("error_message", ColumnValue::Text(message.clone())));
        }
        columns
    }
}
