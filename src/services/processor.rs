//! Queue consumer: one job at a time, one terminal status per job.

use std::future::Future;
use std::path::Path;
use std::time::{Duration, Instant};

use tokio::time::sleep;

use crate::models::classification::{ClassificationEnvelope, ClassificationResult};
use crate::models::job::{ClassificationJob, JobDecodeError, ProcessingStatus, QueueEntry};
use crate::services::traits::{Classifier, JobSource, ResultStore};

/// Back-off after a failed queue pop.
pub const QUEUE_RETRY_DELAY: Duration = Duration::from_secs(1);

/// What happened to one popped entry.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Not a job for this worker.
    Ignored,
    /// A product analysis job with unusable arguments.
    Dropped(String),
    Completed { record_id: i64 },
    Failed { record_id: i64, error: String },
}

/// Model output that is not the expected JSON envelope.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("JSON parsing error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Consume the queue until `shutdown` resolves.
///
/// `shutdown` is only raced against waiting for the next entry: a popped
/// entry always runs to its terminal write before `run` returns. Queue
/// failures are retried after [`QUEUE_RETRY_DELAY`]; per-job failures are
/// persisted and never stop the loop.
pub async fn run<Q, C, S, F>(queue: &Q, engine: &C, store: &S, shutdown: F)
where
    Q: JobSource + ?Sized,
    C: Classifier + ?Sized,
    S: ResultStore + ?Sized,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    tracing::info!("Worker ready, waiting for jobs");
    loop {
        let popped = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            popped = queue.pop() => popped,
        };

        let payload = match popped {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Queue pop failed, retrying");
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = sleep(QUEUE_RETRY_DELAY) => continue,
                }
            }
        };

        let outcome = process_entry(&payload, engine, store).await;
        tracing::debug!(?outcome, "Entry processed");
    }
    tracing::info!("Job loop stopped");
}

/// Decode, classify, validate and persist a single queue entry.
pub async fn process_entry<C, S>(payload: &str, engine: &C, store: &S) -> JobOutcome
where
    C: Classifier + ?Sized,
    S: ResultStore + ?Sized,
{
    let job = match decode(payload) {
        Ok(job) => job,
        Err(e) if e.is_foreign() => {
            tracing::trace!(reason = %e, "Skipping entry for another consumer");
            metrics::counter!("classification_jobs_ignored").increment(1);
            return JobOutcome::Ignored;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping malformed job");
            metrics::counter!("classification_jobs_ignored").increment(1);
            return JobOutcome::Dropped(e.to_string());
        }
    };

    metrics::counter!("classification_jobs_total").increment(1);
    tracing::info!(
        record_id = job.record_id,
        image = %job.image_path,
        jid = job.jid.as_deref().unwrap_or("-"),
        "Processing product"
    );

    if let Err(e) = store
        .update_status(job.record_id, ProcessingStatus::Processing, &ClassificationResult::default())
        .await
    {
        tracing::warn!(record_id = job.record_id, error = %e, "Failed to mark product as processing");
    }

    let start = Instant::now();
    let raw = match engine.classify(Path::new(&job.image_path)).await {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!(record_id = job.record_id, error = %e, "Inference failed");
            return fail(store, job.record_id, e.to_string()).await;
        }
    };
    metrics::histogram!("classification_inference_seconds").record(start.elapsed().as_secs_f64());
    tracing::debug!(record_id = job.record_id, raw = %raw, "Model output");

    let envelope = match clean_output(&raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::error!(record_id = job.record_id, error = %e, "Model output failed validation");
            return fail(store, job.record_id, e.to_string()).await;
        }
    };

    if let Ok(canonical) = serde_json::to_string(&envelope) {
        tracing::info!(record_id = job.record_id, result = %canonical, "Classification complete");
    }

    let result = ClassificationResult::success(envelope);
    match store
        .update_status(job.record_id, ProcessingStatus::Complete, &result)
        .await
    {
        Ok(()) => metrics::counter!("classification_jobs_completed").increment(1),
        Err(e) => {
            tracing::error!(record_id = job.record_id, error = %e, "Failed to persist classification");
        }
    }
    JobOutcome::Completed {
        record_id: job.record_id,
    }
}

fn decode(payload: &str) -> Result<ClassificationJob, JobDecodeError> {
    let entry: QueueEntry = serde_json::from_str(payload)?;
    ClassificationJob::from_entry(&entry)
}

async fn fail<S>(store: &S, record_id: i64, error: String) -> JobOutcome
where
    S: ResultStore + ?Sized,
{
    metrics::counter!("classification_jobs_failed").increment(1);
    let result = ClassificationResult::failure(error.clone());
    if let Err(e) = store
        .update_status(record_id, ProcessingStatus::Failed, &result)
        .await
    {
        tracing::error!(record_id, error = %e, "Failed to persist failure");
    }
    JobOutcome::Failed { record_id, error }
}

/// Parse model output strictly as the three-field envelope.
pub fn clean_output(raw: &str) -> Result<ClassificationEnvelope, ValidationError> {
    Ok(serde_json::from_str(raw.trim())?)
}
