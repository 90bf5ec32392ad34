//! HTTP request handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::engine::{InferenceService, ServingError};
use crate::training;

/// Shared application state
pub struct AppState {
    pub service: Arc<InferenceService>,
}

impl AppState {
    pub fn new(service: Arc<InferenceService>) -> Self {
        Self { service }
    }
}

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Static description of the serving stack
pub async fn model_info() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(ModelInfoResponse {
            model: "ONNX".to_string(),
            tokenizer: "HuggingFace".to_string(),
            status: "loaded".to_string(),
        }),
    )
}

/// Whether a model is currently loaded
pub async fn model_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let loaded = state.service.is_ready();
    let message = if loaded {
        "Model is loaded and ready."
    } else {
        "Model is missing. Please upload model.onnx and tokenizer.json."
    };

    (
        StatusCode::OK,
        Json(ModelStatusResponse {
            model_loaded: loaded,
            message: message.to_string(),
        }),
    )
}

/// Classify a piece of text
pub async fn predict(
    State(state): State<Arc<AppState>>,
    request: Result<Json<PredictRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match request {
        Ok(request) => request,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("predict", %request_id);

    async move {
        tracing::debug!("Prediction request with {} chars", request.text.chars().count());
        match state.service.predict(request.text).await {
            Ok(result) => (StatusCode::OK, Json(result)).into_response(),
            Err(e) => {
                let status = status_for(&e);
                if status.is_server_error() {
                    tracing::warn!("Prediction failed: {}", e);
                }
                error_response(status, e.to_string())
            }
        }
    }
    .instrument(span)
    .await
}

/// Re-read the model and tokenizer files
pub async fn reload_model(State(state): State<Arc<AppState>>) -> Response {
    match state.service.reload().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse {
                status: "reloaded".to_string(),
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Reload request failed: {}", e);
            error_response(status_for(&e), e.to_string())
        }
    }
}

/// Fit a decision tree on a dataset file
pub async fn train(Query(params): Query<TrainParams>) -> Response {
    let Some(data_path) = params.data_path else {
        return error_response(StatusCode::BAD_REQUEST, "missing query parameter 'dataPath'");
    };

    match tokio::task::spawn_blocking(move || training::train_tree(&data_path)).await {
        Ok(Ok(model)) => (StatusCode::OK, Json(TrainResponse { model })).into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Training failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("training task failed: {}", e),
        ),
    }
}

/// Fit a decision tree and label the rows of a second dataset file.
///
/// `instancesPath` defaults to `dataPath`, which re-classifies the training
/// data.
pub async fn classify(Query(params): Query<TrainParams>) -> Response {
    let Some(data_path) = params.data_path else {
        return error_response(StatusCode::BAD_REQUEST, "missing query parameter 'dataPath'");
    };
    let instances_path = params.instances_path.unwrap_or_else(|| data_path.clone());

    let task = move || training::classify_with_tree(&data_path, &instances_path);
    match tokio::task::spawn_blocking(task).await {
        Ok(Ok(labels)) => {
            let predictions = labels
                .into_iter()
                .enumerate()
                .map(|(instance, label)| InstancePrediction { instance, label })
                .collect();
            (StatusCode::OK, Json(ClassifyResponse { predictions })).into_response()
        }
        Ok(Err(e)) => {
            tracing::warn!("Classification failed: {:#}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", e))
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("classification task failed: {}", e),
        ),
    }
}

/// HTTP status for a serving failure
fn status_for(error: &ServingError) -> StatusCode {
    match error {
        ServingError::ModelUnavailable | ServingError::Closed => StatusCode::SERVICE_UNAVAILABLE,
        ServingError::Validation(_) => StatusCode::BAD_REQUEST,
        ServingError::Inference(_) | ServingError::Reload(_) | ServingError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct TrainParams {
    #[serde(rename = "dataPath")]
    pub data_path: Option<PathBuf>,

    #[serde(rename = "instancesPath")]
    pub instances_path: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model: String,
    pub tokenizer: String,
    pub status: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelStatusResponse {
    pub model_loaded: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct TrainResponse {
    pub model: String,
}

#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub predictions: Vec<InstancePrediction>,
}

#[derive(Debug, Serialize)]
pub struct InstancePrediction {
    pub instance: usize,
    /// `None` when the tree cannot place the row
    pub label: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
