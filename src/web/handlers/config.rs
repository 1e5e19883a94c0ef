use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{error, info};

use super::ApiResponse;
use crate::config::AppConfig;
use crate::AppContext;

pub fn config_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(get_config).put(update_config))
        .with_state(ctx)
}

async fn get_config(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.pipeline.config().snapshot().redacted()))
}

/// Replaces the live configuration. Runs already submitted keep the settings
/// they started with.
async fn update_config(
    State(ctx): State<Arc<AppContext>>,
    Json(mut config): Json<AppConfig>,
) -> impl IntoResponse {
    let current = ctx.pipeline.config().snapshot();
    if let Err(e) = config.resolve_api_key(&current) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::<AppConfig>::error(e.to_string())),
        );
    }

    if let Err(e) = config.save_to(&ctx.config_path) {
        error!("Failed to save config to {}: {}", ctx.config_path.display(), e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<AppConfig>::error(e.to_string())),
        );
    }

    ctx.pipeline.config().replace(config.clone());
    info!("Configuration updated");
    (StatusCode::OK, Json(ApiResponse::success(config.redacted())))
}
