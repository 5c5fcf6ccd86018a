//! Test doubles for the worker's collaborators.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use image2taxonomy::models::classification::{ClassificationResult, ColumnValue};
use image2taxonomy::models::job::ProcessingStatus;
use image2taxonomy::services::inference::InferenceError;
use image2taxonomy::services::queue::QueueError;
use image2taxonomy::services::traits::{Classifier, JobSource, ResultStore};

/// Shared state of a [`FakeLlamaServer`].
#[derive(Clone)]
pub struct FakeLlamaState {
    pub health: Arc<Mutex<StatusCode>>,
    pub reply: Arc<Mutex<(StatusCode, String)>>,
    pub requests: Arc<Mutex<Vec<serde_json::Value>>>,
}

/// Minimal stand-in for `llama-server` on an ephemeral port.
pub struct FakeLlamaServer {
    pub base_url: String,
    pub state: FakeLlamaState,
}

impl FakeLlamaServer {
    pub async fn start(reply: String) -> Self {
        let state = FakeLlamaState {
            health: Arc::new(Mutex::new(StatusCode::OK)),
            reply: Arc::new(Mutex::new((StatusCode::OK, reply))),
            requests: Arc::new(Mutex::new(Vec::new())),
        };

        let app = Router::new()
            .route("/health", get(fake_health))
            .route("/v1/chat/completions", post(fake_chat))
            .layer(DefaultBodyLimit::disable())
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake server");
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_health(&self, status: StatusCode) {
        *self.state.health.lock().unwrap() = status;
    }

    pub fn set_reply(&self, status: StatusCode, body: String) {
        *self.state.reply.lock().unwrap() = (status, body);
    }

    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

async fn fake_health(State(state): State<FakeLlamaState>) -> StatusCode {
    *state.health.lock().unwrap()
}

async fn fake_chat(
    State(state): State<FakeLlamaState>,
    Json(body): Json<serde_json::Value>,
) -> (StatusCode, String) {
    state.requests.lock().unwrap().push(body);
    state.reply.lock().unwrap().clone()
}

/// Write a solid-colour image of the given size and format into `dir`.
pub fn write_image(dir: &Path, name: &str, width: u32, height: u32, format: ImageFormat) -> PathBuf {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 90, 160])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, buf).unwrap();
    path
}

/// Queue that hands out scripted pops, then blocks forever.
pub struct ScriptedQueue {
    entries: Mutex<VecDeque<Result<String, QueueError>>>,
}

impl ScriptedQueue {
    pub fn new(entries: Vec<Result<String, QueueError>>) -> Self {
        Self {
            entries: Mutex::new(entries.into()),
        }
    }

    pub fn transport_error() -> QueueError {
        QueueError::Serialize(serde_json::from_str::<serde_json::Value>("}").unwrap_err())
    }
}

#[async_trait]
impl JobSource for ScriptedQueue {
    async fn pop(&self) -> Result<String, QueueError> {
        let next = self.entries.lock().unwrap().pop_front();
        match next {
            Some(entry) => entry,
            None => std::future::pending().await,
        }
    }
}

/// Classifier that records calls and replies with a fixed outcome.
pub struct FakeClassifier {
    reply: Result<String, (u16, String)>,
    delay: Option<Duration>,
    pub calls: Mutex<Vec<PathBuf>>,
}

impl FakeClassifier {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            reply: Err((status, body.to_string())),
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Take `delay` before every reply, like a slow model.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Classifier for FakeClassifier {
    async fn classify(&self, image_path: &Path) -> Result<String, InferenceError> {
        self.calls.lock().unwrap().push(image_path.to_path_buf());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(text) => Ok(text.clone()),
            Err((status, body)) => Err(InferenceError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// One `update_status` call as seen by the store.
#[derive(Debug, Clone)]
pub struct StoreWrite {
    pub record_id: i64,
    pub status: ProcessingStatus,
    pub result: ClassificationResult,
}

/// In-memory product rows with the same partial-update rule as the SQL adapter.
#[derive(Default)]
pub struct MemoryStore {
    pub writes: Mutex<Vec<StoreWrite>>,
    pub rows: Mutex<HashMap<i64, HashMap<String, String>>>,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Default::default()
        }
    }

    pub fn writes(&self) -> Vec<StoreWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub fn terminal_writes(&self) -> Vec<StoreWrite> {
        self.writes()
            .into_iter()
            .filter(|w| w.status.is_terminal())
            .collect()
    }

    pub fn column(&self, record_id: i64, column: &str) -> Option<String> {
        self.rows
            .lock()
            .unwrap()
            .get(&record_id)
            .and_then(|row| row.get(column).cloned())
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn update_status(
        &self,
        record_id: i64,
        status: ProcessingStatus,
        result: &ClassificationResult,
    ) -> Result<(), sqlx::Error> {
        self.writes.lock().unwrap().push(StoreWrite {
            record_id,
            status,
            result: result.clone(),
        });
        if self.fail_writes {
            return Err(sqlx::Error::PoolTimedOut);
        }

        let mut rows = self.rows.lock().unwrap();
        let row = rows.entry(record_id).or_default();
        row.insert("processing_status".to_string(), status.to_string());
        for (column, value) in result.column_assignments() {
            let value = match value {
                ColumnValue::Text(text) => text,
                ColumnValue::Json(json) => json.to_string(),
            };
            row.insert(column.to_string(), value);
        }
        Ok(())
    }
}
