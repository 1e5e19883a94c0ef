pub mod asr;
pub mod audio;
pub mod config;
pub mod lesson;
pub mod llm;
pub mod pipeline;
pub mod schedule;
pub mod storage;
pub mod utils;
pub mod web;

use std::{env, path::PathBuf, sync::Arc};
use once_cell::sync::Lazy;
use pipeline::PipelineService;

pub struct AppContext {
    pub pipeline: Arc<PipelineService>,
    /// Where `PUT /config` persists edits.
    pub config_path: PathBuf,
}

const LESSON_DATABASE_URL: &str = "sqlite://./data/database/lessons.db?mode=rwc";
const LESSON_CONFIG_PATH: &str = "./data/config.toml";

fn env_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) => value,
        Err(_) => dotenv::var(name).unwrap_or_else(|_| default.to_string()),
    }
}

pub static DATABASE_URL: Lazy<String> =
    Lazy::new(|| env_or("LESSON_DATABASE_URL", LESSON_DATABASE_URL));

pub static CONFIG_PATH: Lazy<PathBuf> =
    Lazy::new(|| PathBuf::from(env_or("LESSON_CONFIG_PATH", LESSON_CONFIG_PATH)));

pub fn init_env() {
    dotenv::dotenv().ok();

    // 确保数据库目录存在
    if let Some(db_path) = DATABASE_URL.strip_prefix("sqlite://") {
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        if let Some(dir) = std::path::Path::new(db_path).parent() {
            std::fs::create_dir_all(dir).unwrap_or_else(|e| {
                eprintln!("Failed to create database directory: {}", e);
            });
        }
    }
}
