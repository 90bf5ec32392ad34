//! Route definitions

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    classify, health, model_info, model_status, predict, reload_model, train, AppState,
};

/// Create the API router
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/model-info", get(model_info))
        .route("/v1/model-status", get(model_status))
        .route("/v1/predict", post(predict))
        .route("/v1/reload-model", post(reload_model))
        // Offline training utility, independent of the served model
        .route("/v1/train", post(train))
        .route("/v1/train/classify", post(classify))
}
