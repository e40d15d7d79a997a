use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use crate::core::model::{DevicePreference, ModelConfig, ModelState};
use crate::error::{AppError, Result};

/// Environment variable holding the listen address.
pub const ENV_BIND: &str = "IMAGETRUTH_BIND";
/// Environment variable holding the TorchScript weights path.
pub const ENV_MODEL_PATH: &str = "IMAGETRUTH_MODEL_PATH";
/// Environment variable holding the tokenizer JSON path.
pub const ENV_TOKENIZER_PATH: &str = "IMAGETRUTH_TOKENIZER_PATH";
/// Environment variable holding the device preference.
pub const ENV_DEVICE: &str = "IMAGETRUTH_DEVICE";
/// Environment variable holding the image size limit in bytes.
pub const ENV_MAX_UPLOAD_BYTES: &str = "IMAGETRUTH_MAX_UPLOAD_BYTES";

/// Room for the non-image multipart fields and part headers.
const FORM_OVERHEAD: usize = 64 * 1024;

/// Configuration for the application
#[derive(Clone, Debug)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,
    /// Maximum size of an uploaded image file in bytes
    pub max_upload_size: usize,
    /// Model provider configuration
    pub model: ModelConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_upload_size: 20 * 1024 * 1024, // 20MB
            model: ModelConfig::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by `IMAGETRUTH_*` environment variables.
    ///
    /// Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(bind) = env_var(ENV_BIND) {
            config.bind_addr = bind
                .parse()
                .map_err(|e| AppError::Config(format!("{}=`{}`: {}", ENV_BIND, bind, e)))?;
        }
        if let Some(path) = env_var(ENV_MODEL_PATH) {
            config.model.weights_path = PathBuf::from(path);
        }
        if let Some(path) = env_var(ENV_TOKENIZER_PATH) {
            config.model.tokenizer_path = PathBuf::from(path);
        }
        if let Some(device) = env_var(ENV_DEVICE) {
            config.model.device = device
                .parse::<DevicePreference>()
                .map_err(|e| AppError::Config(format!("{}: {}", ENV_DEVICE, e)))?;
        }
        if let Some(limit) = env_var(ENV_MAX_UPLOAD_BYTES) {
            config.max_upload_size = limit.parse().map_err(|e| {
                AppError::Config(format!("{}=`{}`: {}", ENV_MAX_UPLOAD_BYTES, limit, e))
            })?;
        }

        Ok(config)
    }
}

impl Config {
    /// HTTP body limit. `/predict` carries the image as base64, so the
    /// limit leaves room for a 4/3 expansion of `max_upload_size`.
    pub fn request_body_limit(&self) -> usize {
        self.max_upload_size
            .saturating_add(2)
            .saturating_div(3)
            .saturating_mul(4)
            .saturating_add(FORM_OVERHEAD)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Application state that can be shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Application configuration
    pub config: Config,
    /// Shared model handle, loaded once
    pub model: Arc<ModelState>,
}

impl AppState {
    /// Create application state around the process-wide model handle
    pub fn new(config: Config) -> Arc<Self> {
        let model = ModelState::global(&config.model);
        Self::with_model(config, model)
    }

    /// Create application state with an explicitly provided model handle
    pub fn with_model(config: Config, model: Arc<ModelState>) -> Arc<Self> {
        Arc::new(Self { config, model })
    }
}
