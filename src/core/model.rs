//! Model provider: loads the CLIP encoder once per process and hands the
//! resulting handle to whoever needs to score images.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use image::DynamicImage;

use crate::core::preprocess::CLIP_IMAGE_SIZE;
use crate::core::scoring::ScoreError;
use crate::core::tokenizer::CONTEXT_LENGTH;

/// Identifier of the pretrained CLIP variant served by default.
pub const DEFAULT_VARIANT: &str = "ViT-B/32";

/// Errors raised while loading the model at startup.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// TorchScript weights are missing.
    #[error("model weights not found at {}", .0.display())]
    WeightsNotFound(PathBuf),

    /// Tokenizer definition is missing.
    #[error("tokenizer not found at {}", .0.display())]
    TokenizerNotFound(PathBuf),

    /// Tokenizer definition could not be used.
    #[error("invalid tokenizer: {0}")]
    Tokenizer(String),

    /// An explicitly requested device is not present.
    #[error("requested device `{0}` is not available")]
    DeviceUnavailable(String),

    /// The inference backend rejected the weights.
    #[error("failed to load {variant}: {message}")]
    Load {
        /// Model variant that was being loaded.
        variant: String,
        /// Backend error message.
        message: String,
    },

    /// The crate was compiled without an inference backend.
    #[error("built without the `embeddings` feature; no inference backend is available")]
    BackendDisabled,
}

/// Which device the operator asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DevicePreference {
    /// Accelerator if present, otherwise CPU.
    #[default]
    Auto,
    /// Always the CPU.
    Cpu,
    /// First CUDA device; fails to load when CUDA is missing.
    Cuda,
}

impl FromStr for DevicePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" | "gpu" => Ok(Self::Cuda),
            other => Err(format!("unknown device `{}` (expected auto, cpu or cuda)", other)),
        }
    }
}

/// The device a loaded model actually runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComputeDevice {
    /// General-purpose processor.
    Cpu,
    /// CUDA accelerator with its ordinal.
    Cuda(usize),
}

impl fmt::Display for ComputeDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
        }
    }
}

/// Resolve a preference against what the host offers.
pub fn select_device(
    preference: DevicePreference,
    cuda_available: bool,
) -> Result<ComputeDevice, ModelError> {
    match (preference, cuda_available) {
        (DevicePreference::Cpu, _) => Ok(ComputeDevice::Cpu),
        (DevicePreference::Auto, true) | (DevicePreference::Cuda, true) => {
            Ok(ComputeDevice::Cuda(0))
        }
        (DevicePreference::Auto, false) => Ok(ComputeDevice::Cpu),
        (DevicePreference::Cuda, false) => Err(ModelError::DeviceUnavailable("cuda".to_string())),
    }
}

/// Settings for the model provider.
#[derive(Clone, Debug)]
pub struct ModelConfig {
    /// Pretrained variant identifier, reported in logs and API responses.
    pub variant: String,
    /// TorchScript export whose `forward(image, text)` returns
    /// `(logits_per_image, logits_per_text)`.
    pub weights_path: PathBuf,
    /// HuggingFace `tokenizer.json` for the CLIP BPE vocabulary.
    pub tokenizer_path: PathBuf,
    /// Device selection policy.
    pub device: DevicePreference,
    /// Square input resolution expected by the vision tower.
    pub image_size: u32,
    /// Token context length expected by the text tower.
    pub context_length: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            variant: DEFAULT_VARIANT.to_string(),
            weights_path: PathBuf::from("models/clip-vit-b-32.pt"),
            tokenizer_path: PathBuf::from("models/clip-vit-b-32-tokenizer.json"),
            device: DevicePreference::Auto,
            image_size: CLIP_IMAGE_SIZE,
            context_length: CONTEXT_LENGTH,
        }
    }
}

/// A joint image/text encoder producing one similarity logit per text.
pub trait SimilarityModel: Send + Sync + fmt::Debug {
    /// Variant identifier, e.g. `ViT-B/32`.
    fn variant(&self) -> &str;

    /// Device inference runs on.
    fn device(&self) -> ComputeDevice;

    /// Raw similarity logits of `image` against each entry of `descriptions`,
    /// in input order.
    fn logits_per_image(
        &self,
        image: &DynamicImage,
        descriptions: &[String],
    ) -> Result<Vec<f32>, ScoreError>;
}

/// Process-wide model handle: either a ready encoder or the reason it is not.
#[derive(Clone, Debug)]
pub enum ModelState {
    /// Encoder loaded and usable.
    Ready(Arc<dyn SimilarityModel>),
    /// Loading failed; every score request short-circuits.
    Unavailable {
        /// Human-readable load failure.
        reason: String,
    },
}

static GLOBAL_MODEL: OnceLock<Arc<ModelState>> = OnceLock::new();

impl ModelState {
    /// Wrap an already loaded model.
    pub fn ready(model: Arc<dyn SimilarityModel>) -> Self {
        Self::Ready(model)
    }

    /// A handle that refuses all scoring.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Load the model, folding any failure into [`ModelState::Unavailable`].
    pub fn load(config: &ModelConfig) -> Self {
        match load_model(config) {
            Ok(model) => {
                log::info!(
                    "Loaded CLIP {} on {}",
                    model.variant(),
                    model.device()
                );
                Self::Ready(model)
            }
            Err(e) => {
                log::error!("Failed to load CLIP model: {}", e);
                Self::unavailable(e.to_string())
            }
        }
    }

    /// The memoized process-wide handle. The first caller's configuration
    /// wins; later callers get the same `Arc` without reloading.
    pub fn global(config: &ModelConfig) -> Arc<Self> {
        GLOBAL_MODEL
            .get_or_init(|| Arc::new(Self::load(config)))
            .clone()
    }

    /// The loaded model, if any.
    pub fn model(&self) -> Option<&Arc<dyn SimilarityModel>> {
        match self {
            Self::Ready(model) => Some(model),
            Self::Unavailable { .. } => None,
        }
    }

    /// Whether scoring can be attempted.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Why the model is unavailable, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match self {
            Self::Ready(_) => None,
            Self::Unavailable { reason } => Some(reason),
        }
    }
}

/// Load the configured encoder with the compiled-in backend.
pub fn load_model(config: &ModelConfig) -> Result<Arc<dyn SimilarityModel>, ModelError> {
    #[cfg(feature = "embeddings")]
    {
        let model = crate::core::clip::ClipModel::load(config)?;
        Ok(Arc::new(model))
    }

    #[cfg(not(feature = "embeddings"))]
    {
        let _ = config;
        Err(ModelError::BackendDisabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_preference_parsing() {
        assert_eq!("auto".parse::<DevicePreference>(), Ok(DevicePreference::Auto));
        assert_eq!("CPU".parse::<DevicePreference>(), Ok(DevicePreference::Cpu));
        assert_eq!(" cuda ".parse::<DevicePreference>(), Ok(DevicePreference::Cuda));
        assert!("tpu".parse::<DevicePreference>().is_err());
    }

    #[test]
    fn test_select_device() {
        assert_eq!(
            select_device(DevicePreference::Auto, true).unwrap(),
            ComputeDevice::Cuda(0)
        );
        assert_eq!(
            select_device(DevicePreference::Auto, false).unwrap(),
            ComputeDevice::Cpu
        );
        assert_eq!(
            select_device(DevicePreference::Cpu, true).unwrap(),
            ComputeDevice::Cpu
        );
        assert!(matches!(
            select_device(DevicePreference::Cuda, false),
            Err(ModelError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn test_device_display() {
        assert_eq!(ComputeDevice::Cpu.to_string(), "cpu");
        assert_eq!(ComputeDevice::Cuda(1).to_string(), "cuda:1");
    }

    #[test]
    fn test_missing_weights_leave_model_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            weights_path: dir.path().join("missing.pt"),
            tokenizer_path: dir.path().join("missing.json"),
            device: DevicePreference::Cpu,
            ..ModelConfig::default()
        };

        let state = ModelState::load(&config);

        assert!(!state.is_ready());
        assert!(state.model().is_none());
        assert!(state.unavailable_reason().is_some());
    }

    #[test]
    fn test_global_is_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelConfig {
            weights_path: dir.path().join("missing.pt"),
            device: DevicePreference::Cpu,
            ..ModelConfig::default()
        };

        let first = ModelState::global(&config);
        let second = ModelState::global(&ModelConfig::default());

        assert!(Arc::ptr_eq(&first, &second));
    }
}
