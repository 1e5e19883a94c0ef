use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tracing::error;

use super::ApiResponse;
use crate::pipeline::{StageError, StageKey, SummarySource};
use crate::schedule::Submission;
use crate::AppContext;

/// `POST` starts a stage, `GET` polls it, `DELETE` acknowledges a finished run.
pub fn stage_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route(
            "/:id/transcribe",
            post(submit_transcribe).get(transcribe_status).delete(acknowledge_transcribe),
        )
        .route(
            "/:id/correct",
            post(submit_correct).get(correct_status).delete(acknowledge_correct),
        )
        .route(
            "/:id/summarize/:source",
            post(submit_summarize).get(summarize_status).delete(acknowledge_summarize),
        )
        .with_state(ctx)
}

pub fn task_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/stats", get(task_stats))
        .with_state(ctx)
}

fn stage_error_status(e: &StageError) -> StatusCode {
    match e {
        StageError::LessonNotFound(_) => StatusCode::NOT_FOUND,
        StageError::MissingAudio { .. }
        | StageError::MissingTranscript(_)
        | StageError::MissingSource { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StageError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn submit(ctx: &AppContext, key: StageKey) -> (StatusCode, Json<ApiResponse<Submission>>) {
    match ctx.pipeline.submit(key).await {
        Ok(Submission::AwaitingAcknowledgement) => (
            StatusCode::CONFLICT,
            Json(ApiResponse {
                success: false,
                data: Some(Submission::AwaitingAcknowledgement),
                error: Some(format!("{} has finished; acknowledge it before running again", key)),
            }),
        ),
        Ok(submission) => (StatusCode::ACCEPTED, Json(ApiResponse::success(submission))),
        Err(e) => {
            let status = stage_error_status(&e);
            if status == StatusCode::INTERNAL_SERVER_ERROR {
                error!("Failed to submit {}: {}", key, e);
            }
            (status, Json(ApiResponse::error(e.to_string())))
        }
    }
}

fn summarize_key(id: i64, source: &str) -> Result<StageKey, (StatusCode, Json<ApiResponse<()>>)> {
    source
        .parse::<SummarySource>()
        .map(|source| StageKey::Summarize(id, source))
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiResponse::error(e))))
}

async fn submit_transcribe(State(ctx): State<Arc<AppContext>>, Path(id): Path<i64>) -> impl IntoResponse {
    submit(&ctx, StageKey::Transcribe(id)).await
}

async fn submit_correct(State(ctx): State<Arc<AppContext>>, Path(id): Path<i64>) -> impl IntoResponse {
    submit(&ctx, StageKey::Correct(id)).await
}

async fn submit_summarize(
    State(ctx): State<Arc<AppContext>>,
    Path((id, source)): Path<(i64, String)>,
) -> impl IntoResponse {
    match summarize_key(id, &source) {
        Ok(key) => submit(&ctx, key).await.into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn transcribe_status(State(ctx): State<Arc<AppContext>>, Path(id): Path<i64>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.pipeline.status(&StageKey::Transcribe(id))))
}

async fn correct_status(State(ctx): State<Arc<AppContext>>, Path(id): Path<i64>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.pipeline.status(&StageKey::Correct(id))))
}

async fn summarize_status(
    State(ctx): State<Arc<AppContext>>,
    Path((id, source)): Path<(i64, String)>,
) -> impl IntoResponse {
    match summarize_key(id, &source) {
        Ok(key) => Json(ApiResponse::success(ctx.pipeline.status(&key))).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn acknowledge_transcribe(State(ctx): State<Arc<AppContext>>, Path(id): Path<i64>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.pipeline.acknowledge(&StageKey::Transcribe(id))))
}

async fn acknowledge_correct(State(ctx): State<Arc<AppContext>>, Path(id): Path<i64>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.pipeline.acknowledge(&StageKey::Correct(id))))
}

async fn acknowledge_summarize(
    State(ctx): State<Arc<AppContext>>,
    Path((id, source)): Path<(i64, String)>,
) -> impl IntoResponse {
    match summarize_key(id, &source) {
        Ok(key) => Json(ApiResponse::success(ctx.pipeline.acknowledge(&key))).into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

async fn task_stats(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    Json(ApiResponse::success(ctx.pipeline.stats()))
}
