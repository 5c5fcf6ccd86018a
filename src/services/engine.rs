//! Supervisor for the local `llama-server` inference process.
//!
//! One [`LlamaEngine`] exists per worker. It is created at startup, handed to
//! the job processor by reference, and shut down on every exit path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use strum::{Display, EnumString};
use tokio::process::{Child, Command};
use tokio::time::{interval, timeout, Instant, MissedTickBehavior};

use crate::services::inference::{
    projector_path, EngineHealth, InferenceClient, InferenceError, InferenceSettings,
};

pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Hardware backend passed to the inference server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
#[strum(serialize_all = "lowercase")]
pub enum Acceleration {
    #[default]
    Cpu,
    Gpu,
    Metal,
    Arm,
}

impl Acceleration {
    /// Parse a configured value; matching is exact and anything else runs on the CPU.
    pub fn parse_or_cpu(value: &str) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::debug!(value, "Unknown acceleration backend, using cpu");
            Acceleration::Cpu
        })
    }

    fn device(self) -> Option<&'static str> {
        match self {
            Acceleration::Cpu => None,
            Acceleration::Gpu => Some("cuda"),
            Acceleration::Metal => Some("metal"),
            Acceleration::Arm => Some("arm"),
        }
    }
}

/// Everything needed to launch and talk to the inference server.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_path: PathBuf,
    pub model_path: PathBuf,
    pub grammar_path: PathBuf,
    pub acceleration: Acceleration,
    pub gpu_layers: u32,
    pub port: u16,
    pub context_size: u32,
    pub inference: InferenceSettings,
}

impl EngineConfig {
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Command-line arguments for `llama-server`.
    pub fn server_args(&self, projector: Option<&Path>) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            self.model_path.display().to_string(),
            "--port".to_string(),
            self.port.to_string(),
            "-c".to_string(),
            self.context_size.to_string(),
        ];

        if let Some(device) = self.acceleration.device() {
            args.extend([
                "-ngl".to_string(),
                self.gpu_layers.to_string(),
                "--device".to_string(),
                device.to_string(),
            ]);
        }

        if let Some(projector) = projector {
            args.extend(["--mmproj".to_string(), projector.display().to_string()]);
        }

        args
    }
}

/// The running inference process plus a client bound to it.
pub struct LlamaEngine {
    child: Option<Child>,
    client: InferenceClient,
}

impl LlamaEngine {
    /// Load the grammar, launch the server and wait until it reports ready.
    pub async fn start(config: EngineConfig) -> Result<Self, EngineError> {
        let grammar = tokio::fs::read_to_string(&config.grammar_path)
            .await
            .map_err(|e| {
                EngineError::Configuration(format!(
                    "failed to read grammar {}: {e}",
                    config.grammar_path.display()
                ))
            })?;

        for (what, path) in [("model", &config.model_path), ("server binary", &config.server_path)] {
            if !path.exists() {
                return Err(EngineError::Configuration(format!(
                    "{what} not found at {}",
                    path.display()
                )));
            }
        }

        let projector = projector_path(&config.model_path).filter(|p| p.exists());
        match &projector {
            Some(p) => tracing::info!(projector = %p.display(), "Found multimodal projector"),
            None => tracing::warn!(
                model = %config.model_path.display(),
                "No mmproj file next to the model; vision capabilities may not work"
            ),
        }

        let args = config.server_args(projector.as_deref());
        tracing::info!(
            server = %config.server_path.display(),
            acceleration = %config.acceleration,
            gpu_layers = config.gpu_layers,
            port = config.port,
            "Starting inference server"
        );

        let mut cmd = Command::new(&config.server_path);
        cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);
        if let Some(lib_dir) = config.server_path.parent() {
            cmd.env("DYLD_LIBRARY_PATH", lib_dir);
        }
        let child = cmd.spawn().map_err(EngineError::Spawn)?;

        let client = InferenceClient::new(config.base_url(), grammar, config.inference.clone())
            .map_err(|e| EngineError::Configuration(e.to_string()))?;

        let mut engine = Self {
            child: Some(child),
            client,
        };

        if let Err(e) = engine.wait_until_ready(STARTUP_TIMEOUT).await {
            engine.shutdown().await;
            return Err(e);
        }

        tracing::info!(url = %engine.client.base_url(), "Inference server is ready");
        Ok(engine)
    }

    async fn wait_until_ready(&mut self, deadline: Duration) -> Result<(), EngineError> {
        let client = self.client.clone();
        let child = self.child.as_mut();
        wait_for_ready(&client, child, HEALTH_POLL_INTERVAL, deadline).await
    }

    pub fn client(&self) -> &InferenceClient {
        &self.client
    }

    pub async fn classify(&self, image_path: &Path) -> Result<String, InferenceError> {
        self.client.classify(image_path).await
    }

    /// Stop the server. Safe to call more than once.
    pub async fn shutdown(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        tracing::info!("Stopping inference server");
        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "Failed to kill inference server");
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }
}

/// Poll the health endpoint until it reports ready or `deadline` elapses.
///
/// When a child process is given, its early exit aborts the wait.
pub async fn wait_for_ready(
    client: &InferenceClient,
    mut child: Option<&mut Child>,
    poll: Duration,
    deadline: Duration,
) -> Result<(), EngineError> {
    let started = Instant::now();
    let mut ticker = interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let probe = async {
        loop {
            ticker.tick().await;

            if let Some(child) = child.as_deref_mut() {
                if let Ok(Some(status)) = child.try_wait() {
                    return Err(EngineError::Startup(format!(
                        "inference server exited during startup ({status})"
                    )));
                }
            }

            match client.health().await {
                EngineHealth::Ready => return Ok(()),
                EngineHealth::Loading => tracing::info!(
                    elapsed_secs = started.elapsed().as_secs(),
                    "Inference server is loading the model"
                ),
                EngineHealth::Unavailable => {}
            }
        }
    };

    match timeout(deadline, probe).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Startup(format!(
            "inference server failed to become ready after {}s",
            deadline.as_secs()
        ))),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Failed to launch inference server: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Engine startup error: {0}")]
    Startup(String),
}
