use std::sync::Mutex;

use anyhow::Context;
use image::DynamicImage;
use tch::{CModule, Device, IValue, Kind, Tensor};

use crate::core::model::{select_device, ComputeDevice, ModelConfig, ModelError, SimilarityModel};
use crate::core::preprocess::clip_input;
use crate::core::scoring::ScoreError;
use crate::core::tokenizer::ClipTokenizer;

/// CLIP served from a TorchScript export through libtorch.
///
/// The module's `forward(image, text)` must return
/// `(logits_per_image, logits_per_text)`. Calls are serialized on a mutex.
pub struct ClipModel {
    module: Mutex<CModule>,
    tokenizer: ClipTokenizer,
    variant: String,
    device: ComputeDevice,
    image_size: u32,
}

impl std::fmt::Debug for ClipModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipModel")
            .field("variant", &self.variant)
            .field("device", &self.device)
            .field("image_size", &self.image_size)
            .field("tokenizer", &self.tokenizer)
            .finish()
    }
}

impl ClipModel {
    /// Load weights and tokenizer and move the module to the selected device.
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        if !config.weights_path.is_file() {
            return Err(ModelError::WeightsNotFound(config.weights_path.clone()));
        }
        if !config.tokenizer_path.is_file() {
            return Err(ModelError::TokenizerNotFound(config.tokenizer_path.clone()));
        }

        let device = select_device(config.device, tch::Cuda::is_available())?;

        let tokenizer = ClipTokenizer::from_file(&config.tokenizer_path, config.context_length)
            .map_err(|e| ModelError::Tokenizer(format!("{:#}", e)))?;

        log::info!(
            "Loading CLIP {} from {} on {}",
            config.variant,
            config.weights_path.display(),
            device
        );
        let mut module = CModule::load_on_device(&config.weights_path, tch_device(device))
            .with_context(|| format!("loading {}", config.weights_path.display()))
            .map_err(|e| ModelError::Load {
                variant: config.variant.clone(),
                message: format!("{:#}", e),
            })?;
        module.set_eval();

        Ok(Self {
            module: Mutex::new(module),
            tokenizer,
            variant: config.variant.clone(),
            device,
            image_size: config.image_size,
        })
    }

    /// `[1, 3, size, size]` float tensor on the model's device.
    fn image_tensor(&self, img: &DynamicImage) -> Tensor {
        let input = clip_input(img, self.image_size);
        let side = self.image_size as i64;

        Tensor::of_slice(&input.into_raw_vec())
            .view([1, 3, side, side])
            .to_kind(Kind::Float)
            .to_device(tch_device(self.device))
    }

    /// `[n, context_length]` int64 token tensor on the model's device.
    fn text_tensor(&self, descriptions: &[String]) -> Result<Tensor, ScoreError> {
        let ids = self.tokenizer.encode_batch(descriptions)?;

        Ok(Tensor::of_slice(&ids)
            .view([descriptions.len() as i64, self.tokenizer.context_length() as i64])
            .to_device(tch_device(self.device)))
    }
}

impl SimilarityModel for ClipModel {
    fn variant(&self) -> &str {
        &self.variant
    }

    fn device(&self) -> ComputeDevice {
        self.device
    }

    fn logits_per_image(
        &self,
        image: &DynamicImage,
        descriptions: &[String],
    ) -> Result<Vec<f32>, ScoreError> {
        let text = self.text_tensor(descriptions)?;
        let image = self.image_tensor(image);

        let module = self
            .module
            .lock()
            .map_err(|_| ScoreError::Inference("model lock poisoned".to_string()))?;

        let output = tch::no_grad(|| {
            module.forward_is(&[IValue::Tensor(image), IValue::Tensor(text)])
        })
        .map_err(|e| ScoreError::Inference(e.to_string()))?;

        let logits_per_image = match output {
            IValue::Tuple(mut values) if !values.is_empty() => match values.swap_remove(0) {
                IValue::Tensor(t) => t,
                other => {
                    return Err(ScoreError::Inference(format!(
                        "expected logits tensor, got {:?}",
                        other
                    )))
                }
            },
            IValue::Tensor(t) => t,
            other => {
                return Err(ScoreError::Inference(format!(
                    "unexpected model output {:?}",
                    other
                )))
            }
        };

        let logits = logits_per_image
            .to_kind(Kind::Float)
            .to_device(Device::Cpu)
            .view([-1]);

        Vec::<f32>::try_from(logits).map_err(|e| ScoreError::Inference(e.to_string()))
    }
}

fn tch_device(device: ComputeDevice) -> Device {
    match device {
        ComputeDevice::Cpu => Device::Cpu,
        ComputeDevice::Cuda(ordinal) => Device::Cuda(ordinal),
    }
}
