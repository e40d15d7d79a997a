#![doc(html_root_url = "https://docs.rs/imagetruth/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

//! # imagetruth
//!
//! "2 lies and 1 truth" for a vision-language model: upload an image, write
//! three descriptions of it (one true, two false) and let a pretrained CLIP
//! model guess which one matches.
//!
//! ## Features
//!
//! - **Model Provider**: loads a TorchScript CLIP export once per process on
//!   CUDA when available, otherwise on the CPU
//! - **Scoring**: CLIP preprocessing and tokenization, softmax over the three
//!   image/text logits, arg-max pick with confidence
//! - **Web UI**: a server-rendered page to upload an image, enter
//!   descriptions and see the winner with a confidence bar
//! - **JSON API**: the same prediction flow for programmatic clients
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use imagetruth::{score, DescriptionSet, ModelConfig, ModelState, Result};
//!
//! fn main() -> Result<()> {
//!     let model = ModelState::global(&ModelConfig::default());
//!     let image = image::open("apple.jpg").map_err(imagetruth::DecodeError::from)?;
//!     let descriptions = DescriptionSet::new([
//!         "A red apple".to_string(),
//!         "A car parked in a garage".to_string(),
//!         "An orange fruit on a tree".to_string(),
//!     ])?;
//!
//!     let result = score(&model, &image, &descriptions)?;
//!     println!("{} ({})", result.best_description, result.confidence_percent());
//!     Ok(())
//! }
//! ```

// Internal modules
pub mod api;
pub mod core;
/// Defines the application's error types and result aliases.
pub mod error;
mod state;
mod utils;

/// Build-time metadata generated by `built`.
#[allow(missing_docs, unreachable_pub)]
pub mod build_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

// Public API exports
pub use crate::{
    core::{
        model::{
            load_model, ComputeDevice, DevicePreference, ModelConfig, ModelError, ModelState,
            SimilarityModel,
        },
        scoring::{score, DescriptionSet, ScoreError, ScoreResult},
        upload::{DecodeError, UploadedImage},
    },
    error::{AppError, Result, ResultExt},
    state::{AppState, Config},
};

#[cfg(feature = "web")]
pub use crate::api::{create_router, health_check, model_status};

#[cfg(feature = "embeddings")]
pub use crate::core::clip::ClipModel;

/// Initialize the application with default settings
///
/// This function reads a `.env` file if one exists and sets up logging.
/// It should be called early in the application startup process.
///
/// # Errors
///
/// Returns an error if a logger is already installed.
///
/// # Example
///
/// ```no_run
/// use imagetruth::init;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     init()?;
///     // Application code here
///     Ok(())
/// }
/// ```
pub fn init() -> Result<()> {
    // A missing .env is fine; variables may come from the real environment
    let dotenv_path = dotenv::dotenv().ok();

    // Initialize logging with sensible defaults
    let env = env_logger::Env::default()
        .default_filter_or("info")
        .default_write_style_or("auto");

    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(false)
        .try_init()
        .map_err(|e| AppError::Config(format!("logger already initialized: {}", e)))?;

    log::info!("Initializing imagetruth {}", build_info::PKG_VERSION);
    if let Some(path) = dotenv_path {
        log::info!("Loaded environment from {}", path.display());
    }

    Ok(())
}
