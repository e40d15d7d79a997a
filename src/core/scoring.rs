use image::DynamicImage;
use ndarray::ArrayView1;
use serde::Serialize;

use crate::core::model::ModelState;

/// Number of candidate descriptions per round.
pub const DESCRIPTION_COUNT: usize = 3;

/// Placeholder winner reported when no model is loaded.
pub const MODEL_NOT_LOADED: &str = "Model not loaded";

/// Placeholder winner reported when inference fails.
pub const PREDICTION_FAILED: &str = "Error in prediction";

/// Reasons a scoring request produced no ranking.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    /// A description was empty or whitespace only.
    #[error("description {} is empty", .index + 1)]
    EmptyDescription {
        /// Zero-based position of the offending description.
        index: usize,
    },

    /// The caller did not supply exactly three descriptions.
    #[error("expected {expected} descriptions, got {got}")]
    WrongDescriptionCount {
        /// Required count.
        expected: usize,
        /// Supplied count.
        got: usize,
    },

    /// A description does not fit in the text encoder's context.
    #[error("description {} is too long: {tokens} tokens exceeds the context length of {max}", .index + 1)]
    DescriptionTooLong {
        /// Zero-based position of the offending description.
        index: usize,
        /// Token count including start and end markers.
        tokens: usize,
        /// Context length of the encoder.
        max: usize,
    },

    /// The model failed to load at startup.
    #[error("model not loaded: {0}")]
    ModelUnavailable(String),

    /// The encoder returned a score vector of the wrong size.
    #[error("model returned {got} scores for {expected} descriptions")]
    LogitCount {
        /// Number of descriptions scored.
        expected: usize,
        /// Number of logits returned.
        got: usize,
    },

    /// Preprocessing or the forward pass failed.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl ScoreError {
    /// Input problems the user can fix, as opposed to model or backend faults.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::EmptyDescription { .. }
                | Self::WrongDescriptionCount { .. }
                | Self::DescriptionTooLong { .. }
        )
    }
}

/// Exactly three candidate descriptions, all non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescriptionSet([String; DESCRIPTION_COUNT]);

impl DescriptionSet {
    /// Validate and wrap three descriptions. Whitespace-only counts as empty.
    pub fn new(descriptions: [String; DESCRIPTION_COUNT]) -> Result<Self, ScoreError> {
        if let Some(index) = descriptions.iter().position(|d| d.trim().is_empty()) {
            return Err(ScoreError::EmptyDescription { index });
        }
        Ok(Self(descriptions))
    }

    /// The descriptions in input order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Description at `index`.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Always [`DESCRIPTION_COUNT`].
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl TryFrom<Vec<String>> for DescriptionSet {
    type Error = ScoreError;

    fn try_from(descriptions: Vec<String>) -> Result<Self, Self::Error> {
        let got = descriptions.len();
        let descriptions: [String; DESCRIPTION_COUNT] =
            descriptions
                .try_into()
                .map_err(|_| ScoreError::WrongDescriptionCount {
                    expected: DESCRIPTION_COUNT,
                    got,
                })?;
        Self::new(descriptions)
    }
}

/// Outcome of ranking one image against its descriptions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Winning description, or a placeholder for sentinel results.
    pub best_description: String,
    /// Position of the winner; `None` for sentinel results.
    pub best_index: Option<usize>,
    /// Softmax probability of the winner.
    pub confidence: f32,
    /// Softmax probabilities in input order.
    pub probabilities: Vec<f32>,
    /// Raw logits in input order.
    pub logits: Vec<f32>,
}

impl ScoreResult {
    /// Placeholder result shown in place of a ranking after `err`.
    pub fn sentinel(err: &ScoreError) -> Self {
        let text = match err {
            ScoreError::ModelUnavailable(_) => MODEL_NOT_LOADED,
            _ => PREDICTION_FAILED,
        };
        Self {
            best_description: text.to_string(),
            best_index: None,
            confidence: 0.0,
            probabilities: Vec::new(),
            logits: Vec::new(),
        }
    }

    /// Whether this is a placeholder rather than a real ranking.
    pub fn is_sentinel(&self) -> bool {
        self.best_index.is_none()
    }

    /// Confidence as a percentage with two decimals, e.g. `87.50%`.
    pub fn confidence_percent(&self) -> String {
        format!("{:.2}%", self.confidence * 100.0)
    }

    /// Whether the confidence can be drawn as a bounded progress bar.
    pub fn has_bounded_confidence(&self) -> bool {
        (0.0..=1.0).contains(&self.confidence)
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let logits = ArrayView1::from(logits);
    let max = logits.fold(f32::NEG_INFINITY, |acc, &x| acc.max(x));
    let exp = logits.mapv(|x| (x - max).exp());
    let sum = exp.sum();
    (exp / sum).to_vec()
}

/// Index of the largest value; ties go to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &v) in values.iter().enumerate() {
        match best {
            Some((_, current)) if v <= current => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}

/// Turn raw logits into a ranking over `descriptions`.
pub fn rank(descriptions: &DescriptionSet, logits: Vec<f32>) -> Result<ScoreResult, ScoreError> {
    if logits.len() != descriptions.len() {
        return Err(ScoreError::LogitCount {
            expected: descriptions.len(),
            got: logits.len(),
        });
    }
    if logits.iter().any(|l| !l.is_finite()) {
        return Err(ScoreError::Inference(format!(
            "model returned non-finite logits {:?}",
            logits
        )));
    }

    let probabilities = softmax(&logits);
    let best_index = argmax(&probabilities)
        .ok_or_else(|| ScoreError::Inference("empty probability vector".to_string()))?;

    Ok(ScoreResult {
        best_description: descriptions.as_slice()[best_index].clone(),
        best_index: Some(best_index),
        confidence: probabilities[best_index],
        probabilities,
        logits,
    })
}

/// Score `image` against `descriptions` with the shared model handle.
///
/// An unavailable model short-circuits with [`ScoreError::ModelUnavailable`]
/// before any preprocessing happens.
pub fn score(
    state: &ModelState,
    image: &DynamicImage,
    descriptions: &DescriptionSet,
) -> Result<ScoreResult, ScoreError> {
    let model = match state {
        ModelState::Ready(model) => model,
        ModelState::Unavailable { reason } => {
            return Err(ScoreError::ModelUnavailable(reason.clone()))
        }
    };

    let logits = model.logits_per_image(image, descriptions.as_slice())?;
    rank(descriptions, logits)
}
