use garde::Validate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Queue entry kind handled by this worker.
pub const PRODUCT_ANALYSIS_JOB: &str = "ProductAnalysisJob";

/// Processing status of a product row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, EnumString, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Complete,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Complete | ProcessingStatus::Failed)
    }
}

/// Raw Sidekiq payload as pushed by the catalog backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub class: String,
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
    #[serde(default)]
    pub jid: Option<String>,
}

/// A decoded product classification job.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct ClassificationJob {
    #[garde(range(min = 1))]
    pub record_id: i64,

    #[garde(length(min = 1))]
    pub image_path: String,

    #[garde(skip)]
    pub jid: Option<String>,
}

impl ClassificationJob {
    /// Decode a queue entry, checking kind, arity and argument types.
    pub fn from_entry(entry: &QueueEntry) -> Result<Self, JobDecodeError> {
        if entry.class != PRODUCT_ANALYSIS_JOB {
            return Err(JobDecodeError::ForeignKind(entry.class.clone()));
        }
        if entry.args.len() < 2 {
            return Err(JobDecodeError::Arity(entry.args.len()));
        }

        let record_id = record_id_from(&entry.args[0])
            .ok_or_else(|| JobDecodeError::RecordId(entry.args[0].to_string()))?;
        let image_path = entry.args[1]
            .as_str()
            .ok_or_else(|| JobDecodeError::ImagePath(entry.args[1].to_string()))?
            .to_string();

        let job = Self {
            record_id,
            image_path,
            jid: entry.jid.clone(),
        };
        job.validate().map_err(JobDecodeError::Invalid)?;
        Ok(job)
    }
}

// JSON producers may encode integral ids as floats (e.g. 42.0).
fn record_id_from(value: &serde_json::Value) -> Option<i64> {
    if let Some(id) = value.as_i64() {
        return Some(id);
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
        .map(|f| f as i64)
}

#[derive(Debug, thiserror::Error)]
pub enum JobDecodeError {
    #[error("Malformed queue entry: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Not a ProductAnalysisJob: {0}")]
    ForeignKind(String),

    #[error("Invalid job args: expected 2, got {0}")]
    Arity(usize),

    #[error("Record id is not an integer: {0}")]
    RecordId(String),

    #[error("Image path is not a string: {0}")]
    ImagePath(String),

    #[error("Invalid job: {0}")]
    Invalid(garde::Report),
}

impl JobDecodeError {
    /// Entries that belong to some other consumer; skipped without noise.
    pub fn is_foreign(&self) -> bool {
        matches!(self, JobDecodeError::ForeignKind(_) | JobDecodeError::Malformed(_))
    }
}
