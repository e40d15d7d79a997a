use axum::{
    extract::{Multipart, State},
    response::Html,
};
use std::{sync::Arc, time::Instant};
use uuid::Uuid;

use crate::{
    core::{
        model::ModelState,
        scoring::{self, DescriptionSet, ScoreError, ScoreResult},
        upload::UploadedImage,
    },
    error::{AppError, Result},
    AppState,
};

use super::{
    form::PredictForm,
    pages::{Page, EMPTY_DESCRIPTIONS_WARNING},
    responses::{ApiResponse, PredictResponse},
};

/// Result of one scoring run on the blocking pool.
struct Scored {
    interaction_id: Uuid,
    upload: UploadedImage,
    outcome: std::result::Result<ScoreResult, ScoreError>,
    elapsed_ms: u64,
}

/// Run inference off the async runtime. The upload travels through the
/// closure and comes back so the page can still preview it.
async fn run_scoring(
    model: Arc<ModelState>,
    upload: UploadedImage,
    descriptions: DescriptionSet,
) -> Result<Scored> {
    let interaction_id = Uuid::new_v4();
    let started = Instant::now();

    let (upload, outcome) = tokio::task::spawn_blocking(move || {
        let outcome = scoring::score(&model, upload.image(), &descriptions);
        (upload, outcome)
    })
    .await?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        Ok(result) => log::info!(
            "[{}] {} -> description {:?} ({}) in {}ms",
            interaction_id,
            upload.file_name(),
            result.best_index.map(|i| i + 1),
            result.confidence_percent(),
            elapsed_ms
        ),
        Err(e) => log::warn!("[{}] scoring failed: {}", interaction_id, e),
    }

    Ok(Scored {
        interaction_id,
        upload,
        outcome,
        elapsed_ms,
    })
}

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(Page::new(&state.model).render())
}

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Html<String>> {
    let form = PredictForm::read(multipart).await?;
    let mut page = Page::new(&state.model);

    match form.decode_image(state.config.max_upload_size) {
        Some(Ok(upload)) => page.image = Some(upload),
        Some(Err(e)) => page.error(format!("Error processing image: {}", e)),
        None => page.error("Error processing image: no file was uploaded"),
    }

    Ok(Html(page.render()))
}

pub async fn predict(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Html<String>> {
    let form = PredictForm::read(multipart).await?;
    let mut page = Page::new(&state.model);
    page.descriptions = form.descriptions.clone();

    if !state.model.is_ready() {
        return Ok(Html(page.render()));
    }

    let upload = match form.decode_image(state.config.max_upload_size) {
        Some(Ok(upload)) => upload,
        Some(Err(e)) => {
            page.error(format!("Error processing image: {}", e));
            return Ok(Html(page.render()));
        }
        None => {
            page.error("Error processing image: upload an image first");
            return Ok(Html(page.render()));
        }
    };

    let descriptions = match DescriptionSet::new(form.descriptions) {
        Ok(descriptions) => descriptions,
        Err(_) => {
            page.image = Some(upload);
            page.warning(EMPTY_DESCRIPTIONS_WARNING);
            return Ok(Html(page.render()));
        }
    };

    let scored = run_scoring(state.model.clone(), upload, descriptions).await?;
    page.image = Some(scored.upload);

    match scored.outcome {
        Ok(result) => page.result = Some(result),
        Err(e) if e.is_expected() => page.warning(e.to_string()),
        Err(e) => {
            page.error(format!("Prediction error: {}", e));
            page.result = Some(ScoreResult::sentinel(&e));
        }
    }

    Ok(Html(page.render()))
}

pub async fn api_predict(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<ApiResponse<PredictResponse>> {
    let form = PredictForm::read(multipart).await?;

    let upload = form
        .decode_image(state.config.max_upload_size)
        .ok_or_else(|| AppError::InvalidInput("missing `image` field".to_string()))??;
    let descriptions = DescriptionSet::new(form.descriptions)?;
    let texts = descriptions.as_slice().to_vec();

    let scored = run_scoring(state.model.clone(), upload, descriptions).await?;

    match scored.outcome {
        Ok(result) => Ok(ApiResponse::success(PredictResponse::new(
            scored.interaction_id,
            &texts,
            &result,
            &state.model,
            scored.elapsed_ms,
        ))),
        Err(e) if e.is_expected() => Err(e.into()),
        Err(e) => {
            let sentinel = ScoreResult::sentinel(&e);
            let err = AppError::from(e);
            Ok(ApiResponse::failure(
                err.status_code(),
                PredictResponse::new(
                    scored.interaction_id,
                    &texts,
                    &sentinel,
                    &state.model,
                    scored.elapsed_ms,
                ),
                err.to_string(),
            ))
        }
    }
}
