use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::core::{model::ModelState, scoring::ScoreResult};

#[derive(Serialize, Debug)]
pub struct ApiResponse<T: Serialize> {
    #[serde(skip)]
    pub status: StatusCode,
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: StatusCode::OK,
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A failed request that still carries a payload (e.g. a sentinel score).
    pub fn failure(status: StatusCode, data: T, message: impl Into<String>) -> Self {
        Self {
            status,
            success: false,
            data: Some(data),
            error: Some(message.into()),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        let body = json!({
            "success": self.success,
            "data": self.data,
            "error": self.error,
        });

        (self.status, Json(body)).into_response()
    }
}

/// Score of one description in a prediction.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct DescriptionScore {
    pub description: String,
    pub probability: f32,
    pub logit: f32,
}

/// Body of `POST /api/predict`.
#[derive(Serialize, Debug)]
pub struct PredictResponse {
    pub interaction_id: Uuid,
    pub best_description: String,
    pub best_index: Option<usize>,
    pub confidence: f32,
    pub confidence_percent: String,
    pub scores: Vec<DescriptionScore>,
    pub variant: Option<String>,
    pub device: Option<String>,
    pub elapsed_ms: u64,
    pub scored_at: DateTime<Utc>,
}

impl PredictResponse {
    pub fn new(
        interaction_id: Uuid,
        descriptions: &[String],
        result: &ScoreResult,
        model: &ModelState,
        elapsed_ms: u64,
    ) -> Self {
        let scores = descriptions
            .iter()
            .zip(result.probabilities.iter().zip(result.logits.iter()))
            .map(|(description, (&probability, &logit))| DescriptionScore {
                description: description.clone(),
                probability,
                logit,
            })
            .collect();

        Self {
            interaction_id,
            best_description: result.best_description.clone(),
            best_index: result.best_index,
            confidence: result.confidence,
            confidence_percent: result.confidence_percent(),
            scores,
            variant: model.model().map(|m| m.variant().to_string()),
            device: model.model().map(|m| m.device().to_string()),
            elapsed_ms,
            scored_at: Utc::now(),
        }
    }
}

/// Body of `GET /api/model`.
#[derive(Serialize, Debug)]
pub struct ModelStatus {
    pub ready: bool,
    pub variant: Option<String>,
    pub device: Option<String>,
    pub reason: Option<String>,
}

impl From<&ModelState> for ModelStatus {
    fn from(state: &ModelState) -> Self {
        Self {
            ready: state.is_ready(),
            variant: state.model().map(|m| m.variant().to_string()),
            device: state.model().map(|m| m.device().to_string()),
            reason: state.unavailable_reason().map(str::to_string),
        }
    }
}

/// Body of `GET /api/health`.
#[derive(Serialize, Debug)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub built_at: &'static str,
    pub model_ready: bool,
}
