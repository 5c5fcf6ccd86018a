use sqlx::PgPool;
use std::sync::Arc;

use crate::services::{inference::InferenceClient, queue::JobQueue};

/// State shared with the ops route handlers.
///
/// Holds probes only; the job loop owns the engine process itself.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub queue: Arc<JobQueue>,
    pub engine: InferenceClient,
}

impl AppState {
    pub fn new(db: PgPool, queue: Arc<JobQueue>, engine: InferenceClient) -> Self {
        Self { db, queue, engine }
    }
}
