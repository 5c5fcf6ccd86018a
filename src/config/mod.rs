use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::engine::{Acceleration, EngineConfig};
use crate::services::inference::InferenceSettings;
use crate::services::preprocess::DEFAULT_TARGET_SIZE;
use crate::services::queue::DEFAULT_QUEUE;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Redis connection string for the job queue
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Redis list the catalog backend pushes jobs onto
    #[serde(default = "default_queue_name")]
    pub queue_name: String,

    /// Path to the `llama-server` binary
    pub llama_server_path: PathBuf,

    /// Path to the vision model weights (GGUF)
    pub model_path: PathBuf,

    /// Compiled taxonomy grammar (see the `gen-grammar` binary)
    pub grammar_path: PathBuf,

    /// One of cpu, gpu, metal, arm; anything else runs on the CPU
    #[serde(default)]
    pub acceleration: String,

    /// Layers offloaded to the accelerator (ignored for cpu)
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,

    #[serde(default = "default_engine_port")]
    pub engine_port: u16,

    /// Context window, sized for high-resolution product images
    #[serde(default = "default_context_size")]
    pub context_size: u32,

    /// Model name sent in chat requests
    #[serde(default = "default_model_alias")]
    pub model_alias: String,

    /// Upper bound for a single classification request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Shortest side images are scaled down to
    #[serde(default = "default_image_target_size")]
    pub image_target_size: u32,

    /// Bind address for the /health and /metrics endpoints
    #[serde(default = "default_ops_bind_addr")]
    pub ops_bind_addr: String,
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_queue_name() -> String {
    DEFAULT_QUEUE.to_string()
}

fn default_gpu_layers() -> u32 {
    99
}

fn default_engine_port() -> u16 {
    8080
}

fn default_context_size() -> u32 {
    8192
}

fn default_model_alias() -> String {
    "qwen3vl".to_string()
}

fn default_request_timeout_secs() -> u64 {
    600
}

fn default_image_target_size() -> u32 {
    DEFAULT_TARGET_SIZE
}

fn default_ops_bind_addr() -> String {
    "0.0.0.0:9090".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            server_path: self.llama_server_path.clone(),
            model_path: self.model_path.clone(),
            grammar_path: self.grammar_path.clone(),
            acceleration: Acceleration::parse_or_cpu(&self.acceleration),
            gpu_layers: self.gpu_layers,
            port: self.engine_port,
            context_size: self.context_size,
            inference: InferenceSettings {
                model_alias: self.model_alias.clone(),
                request_timeout: Duration::from_secs(self.request_timeout_secs),
                image_target_size: self.image_target_size,
            },
        }
    }
}
