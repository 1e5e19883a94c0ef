use axum::Router;
use serde::Serialize;
use std::sync::Arc;
use crate::AppContext;

pub mod config;
pub mod lessons;
pub mod pipeline;


pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .nest(
            "/lessons",
            lessons::lesson_router(ctx.clone()).merge(pipeline::stage_router(ctx.clone())),
        )
        .nest("/tasks", pipeline::task_router(ctx.clone()))
        .nest("/config", config::config_router(ctx))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(error: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }
}
