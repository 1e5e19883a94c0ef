#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use tracing::info;
use std::net::SocketAddr;
use std::sync::Arc;
use lesson_pipeline::asr::AsrEngine;
use lesson_pipeline::config::{AppConfig, SharedConfig};
use lesson_pipeline::llm::HttpLlmClient;
use lesson_pipeline::pipeline::PipelineService;
use lesson_pipeline::schedule::TaskRegistry;
use lesson_pipeline::storage::{AudioLibrary, InMemoryLessonStore, LessonStore, SqliteLessonStore};
use lesson_pipeline::{utils::logger, AppContext, CONFIG_PATH, DATABASE_URL};

#[cfg(feature = "whisper")]
fn asr_engine(config: &AppConfig) -> Arc<dyn AsrEngine> {
    Arc::new(lesson_pipeline::asr::whisper::WhisperAsr::new(config.models_dir.clone()))
}

#[cfg(not(feature = "whisper"))]
fn asr_engine(_config: &AppConfig) -> Arc<dyn AsrEngine> {
    tracing::warn!("Built without the whisper feature, transcription is disabled");
    Arc::new(lesson_pipeline::asr::UnavailableAsr)
}

#[tokio::main]
async fn main() -> Result<()> {
    lesson_pipeline::init_env();
    // 初始化日志系统
    let _guard = logger::init("./logs".to_string())?;

    info!("Starting lesson pipeline ({})", env!("GIT_HASH"));

    let mut config = AppConfig::load_from(&CONFIG_PATH)?;
    config.apply_env();

    let audio = AudioLibrary::new(&config.data_folder);
    audio.ensure_dirs()?;
    info!("Lesson audio is read from {}", audio.root().display());

    // 初始化 storage
    let lessons: Arc<dyn LessonStore> = if std::env::args().any(|arg| arg == "--memory") {
        info!("Using in-memory lesson storage");
        Arc::new(InMemoryLessonStore::new())
    } else {
        Arc::new(SqliteLessonStore::new(&DATABASE_URL).await?)
    };

    let addr: SocketAddr = config.listen.parse()?;
    let asr = asr_engine(&config);
    let llm = Arc::new(HttpLlmClient::new(config.llm.clone())?);
    let registry = Arc::new(TaskRegistry::new());

    let pipeline = PipelineService::new(
        registry,
        lessons,
        audio,
        asr,
        llm,
        SharedConfig::new(config),
    );

    // 创建应用上下文
    let ctx = Arc::new(AppContext {
        pipeline: Arc::new(pipeline),
        config_path: CONFIG_PATH.clone(),
    });

    info!("Starting HTTP server at http://{}", addr);
    match lesson_pipeline::web::start_server(ctx, addr).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            tracing::error!("Server error: {}", e);
            return Err(e);
        }
    }

    Ok(())
}
