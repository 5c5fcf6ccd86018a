//! Boundaries of the job processor.
//!
//! - JobSource: blocking FIFO the jobs arrive on
//! - Classifier: image → raw model output
//! - ResultStore: partial update of a product row

use std::path::Path;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::queries;
use crate::models::classification::ClassificationResult;
use crate::models::job::ProcessingStatus;
use crate::services::engine::LlamaEngine;
use crate::services::inference::{InferenceClient, InferenceError};
use crate::services::queue::{JobQueue, QueueError};

#[async_trait]
pub trait JobSource: Send + Sync {
    /// Wait for the next raw entry. Popping is the commit point.
    async fn pop(&self) -> Result<String, QueueError>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, image_path: &Path) -> Result<String, InferenceError>;
}

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Set the status and assign only the fields present in `result`.
    async fn update_status(
        &self,
        record_id: i64,
        status: ProcessingStatus,
        result: &ClassificationResult,
    ) -> Result<(), sqlx::Error>;
}

#[async_trait]
impl JobSource for JobQueue {
    async fn pop(&self) -> Result<String, QueueError> {
        JobQueue::pop(self).await
    }
}

#[async_trait]
impl Classifier for InferenceClient {
    async fn classify(&self, image_path: &Path) -> Result<String, InferenceError> {
        InferenceClient::classify(self, image_path).await
    }
}

#[async_trait]
impl Classifier for LlamaEngine {
    async fn classify(&self, image_path: &Path) -> Result<String, InferenceError> {
        LlamaEngine::classify(self, image_path).await
    }
}

#[async_trait]
impl ResultStore for PgPool {
    async fn update_status(
        &self,
        record_id: i64,
        status: ProcessingStatus,
        result: &ClassificationResult,
    ) -> Result<(), sqlx::Error> {
        queries::update_product_status(self, record_id, status, result).await
    }
}
