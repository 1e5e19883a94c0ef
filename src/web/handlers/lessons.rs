use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use super::ApiResponse;
use crate::lesson::{Lesson, LessonArtifact, NewLesson, SearchQuery};
use crate::web::Pagination;
use crate::AppContext;

pub fn lesson_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(list_lessons).post(create_lesson))
        .route("/search", get(search_lessons))
        .route("/stats", get(lesson_stats))
        .route("/:id", get(get_lesson))
        .route("/:id/export/:artifact", get(export_lesson))
        .with_state(ctx)
}

#[derive(Debug, Deserialize)]
struct CreateLessonRequest {
    title: String,
    filename: String,
    course_id: Option<i64>,
    duration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct LessonFilter {
    course_id: Option<i64>,
}

#[derive(Debug, Serialize)]
struct CreatedLesson {
    lesson: Lesson,
    /// Where the lesson's audio has to be placed before transcription.
    audio_path: String,
}

async fn list_lessons(
    State(ctx): State<Arc<AppContext>>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<LessonFilter>,
) -> impl IntoResponse {
    match ctx.pipeline.lessons().list(filter.course_id, &pagination).await {
        Ok(lessons) => (StatusCode::OK, Json(ApiResponse::success(lessons))),
        Err(e) => {
            error!("Failed to list lessons: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

async fn get_lesson(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<i64>,
) -> impl IntoResponse {
    match ctx.pipeline.lessons().get(id).await {
        Ok(Some(lesson)) => (StatusCode::OK, Json(ApiResponse::success(lesson))),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error(format!("Lesson {} not found", id))),
        ),
        Err(e) => {
            error!("Failed to get lesson {}: {}", id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

async fn create_lesson(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateLessonRequest>,
) -> impl IntoResponse {
    let mut new_lesson = NewLesson::new(req.title, req.filename);
    new_lesson.course_id = req.course_id;
    new_lesson.duration = req.duration;

    match ctx.pipeline.lessons().create(new_lesson).await {
        Ok(lesson) => {
            let audio_path = ctx.pipeline.audio().path_for(&lesson).display().to_string();
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(CreatedLesson { lesson, audio_path })),
            )
        }
        Err(e) => {
            error!("Failed to create lesson: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

async fn search_lessons(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    match ctx.pipeline.lessons().search(&query).await {
        Ok(hits) => (StatusCode::OK, Json(ApiResponse::success(hits))),
        Err(e) => {
            error!("Failed to search lessons for {:?}: {}", query.q, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

async fn lesson_stats(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    match ctx.pipeline.lessons().stats().await {
        Ok(stats) => (StatusCode::OK, Json(ApiResponse::success(stats))),
        Err(e) => {
            error!("Failed to count lessons: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string())),
            )
        }
    }
}

/// Downloads one stage output as a `text/plain` attachment.
async fn export_lesson(
    State(ctx): State<Arc<AppContext>>,
    Path((id, artifact)): Path<(i64, String)>,
) -> Response {
    let artifact = match artifact.parse::<LessonArtifact>() {
        Ok(artifact) => artifact,
        Err(e) => return (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::error(e))).into_response(),
    };

    let lesson = match ctx.pipeline.lessons().get(id).await {
        Ok(Some(lesson)) => lesson,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ApiResponse::<()>::error(format!("Lesson {} not found", id))),
            )
                .into_response()
        }
        Err(e) => {
            error!("Failed to get lesson {}: {}", id, e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::<()>::error(e.to_string())),
            )
                .into_response();
        }
    };

    match lesson.export(artifact) {
        Some(text) => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", artifact.file_name(&lesson.title)),
                ),
            ],
            text,
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::error(format!("Lesson {} has no {}", id, artifact))),
        )
            .into_response(),
    }
}
