use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::inference::EngineHealth;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub database: ComponentHealth,
    pub redis: ComponentHealth,
    pub inference: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn ok(start: std::time::Instant) -> Self {
        Self {
            status: "ok".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
        }
    }

    fn failed(status: &str) -> Self {
        Self {
            status: status.to_string(),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health: worker dependencies: database, queue and inference server.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let start = std::time::Instant::now();
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => ComponentHealth::ok(start),
        Err(_) => ComponentHealth::failed("error"),
    };

    let redis_start = std::time::Instant::now();
    let redis = match state.queue.health_check().await {
        Ok(_) => ComponentHealth::ok(redis_start),
        Err(_) => ComponentHealth::failed("error"),
    };
    if let Ok(depth) = state.queue.queue_depth().await {
        metrics::gauge!("classification_queue_depth").set(depth as f64);
    }

    let engine_start = std::time::Instant::now();
    let inference = match state.engine.health().await {
        EngineHealth::Ready => ComponentHealth::ok(engine_start),
        EngineHealth::Loading => ComponentHealth::failed("loading"),
        EngineHealth::Unavailable => ComponentHealth::failed("error"),
    };

    let all_healthy = database.is_ok() && redis.is_ok() && inference.is_ok();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            database,
            redis,
            inference,
        },
    };

    (status_code, Json(response))
}
