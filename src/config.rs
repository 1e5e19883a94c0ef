//! Service configuration: per-stage defaults, TOML persistence and
//! environment overrides.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Stands in for the api key in configs handed out over HTTP.
pub const REDACTED_API_KEY: &str = "********";

pub const DEFAULT_CORRECTION_PROMPT: &str = "Please correct any errors in the following transcription, including grammar, punctuation, and factual accuracy. Maintain the original meaning and style. Return only the corrected text without additional commentary.";

/// Speech model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhisperConfig {
    /// Model stem, resolved to `{models_dir}/ggml-{model_size}.bin`.
    pub model_size: String,
    /// `cpu` disables GPU inference; anything else requests it.
    pub device: String,
    pub compute_type: String,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_size: "large-v3".into(),
            device: "cuda".into(),
            compute_type: "int8".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// ISO-639-1 code, or `auto` for detection.
    pub language: String,
    pub beam_size: u32,
    pub vad_filter: bool,
    pub initial_prompt: Option<String>,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            language: "auto".into(),
            beam_size: 5,
            vad_filter: true,
            initial_prompt: None,
        }
    }
}

impl TranscribeConfig {
    /// Language handed to the engine; `None` means auto-detect.
    pub fn language(&self) -> Option<String> {
        let language = self.language.trim();
        if language.is_empty() || language.eq_ignore_ascii_case("auto") {
            None
        } else {
            Some(language.to_string())
        }
    }

    pub fn initial_prompt(&self) -> Option<String> {
        self.initial_prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub prompt: Option<String>,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            temperature: 0.3,
            prompt: None,
        }
    }
}

impl CorrectionConfig {
    pub fn prompt(&self) -> &str {
        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt,
            _ => DEFAULT_CORRECTION_PROMPT,
        }
    }
}

/// Canned summary styles. Unrecognised names are kept verbatim and fall back
/// to a generic instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SummaryType {
    Brief,
    Detailed,
    BulletPoints,
    ExecutiveSummary,
    Other(String),
}

impl SummaryType {
    pub fn instruction(&self) -> &'static str {
        match self {
            SummaryType::Brief => "Create a brief, concise summary",
            SummaryType::Detailed => "Create a detailed, comprehensive summary",
            SummaryType::BulletPoints => "Create a summary in bullet point format",
            SummaryType::ExecutiveSummary => {
                "Create an executive summary highlighting key points and decisions"
            }
            SummaryType::Other(_) => "Create a summary",
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            SummaryType::Brief => "Brief",
            SummaryType::Detailed => "Detailed",
            SummaryType::BulletPoints => "Bullet Points",
            SummaryType::ExecutiveSummary => "Executive Summary",
            SummaryType::Other(name) => name,
        }
    }
}

impl From<String> for SummaryType {
    fn from(name: String) -> Self {
        let normalized: String = name
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "brief" | "concise" => SummaryType::Brief,
            "detailed" => SummaryType::Detailed,
            "bulletpoints" | "bullets" => SummaryType::BulletPoints,
            "executivesummary" | "executive" => SummaryType::ExecutiveSummary,
            _ => SummaryType::Other(name),
        }
    }
}

impl From<&str> for SummaryType {
    fn from(name: &str) -> Self {
        SummaryType::from(name.to_string())
    }
}

impl From<SummaryType> for String {
    fn from(summary_type: SummaryType) -> Self {
        summary_type.as_str().to_string()
    }
}

impl Default for SummaryType {
    fn default() -> Self {
        SummaryType::Brief
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub summary_type: SummaryType,
    /// Target length in words.
    pub max_length: u32,
    /// Replaces the canned instruction when set.
    pub prompt: Option<String>,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            model: "gpt-4o".into(),
            temperature: 0.7,
            summary_type: SummaryType::default(),
            max_length: 300,
            prompt: None,
        }
    }
}

impl SummaryConfig {
    pub fn prompt(&self) -> String {
        match self.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => prompt.to_string(),
            _ => format!(
                "{} of the following text in approximately {} words. Return only the summary without additional commentary.",
                self.summary_type.instruction(),
                self.max_length
            ),
        }
    }
}

/// Hosted LLM endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub openai_base_url: String,
    pub anthropic_base_url: String,
    pub anthropic_version: String,
    pub timeout_secs: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            openai_base_url: "https://api.openai.com/v1".into(),
            anthropic_base_url: "https://api.anthropic.com/v1".into(),
            anthropic_version: "2023-06-01".into(),
            timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_key: Option<String>,
    /// Set when `api_key` came from the environment. Such keys are never
    /// written back to the config file.
    #[serde(skip)]
    pub api_key_from_env: bool,
    pub data_folder: PathBuf,
    pub models_dir: PathBuf,
    pub listen: String,
    pub whisper: WhisperConfig,
    pub transcribe: TranscribeConfig,
    pub correction: CorrectionConfig,
    pub summary: SummaryConfig,
    pub llm: EndpointConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_from_env: false,
            data_folder: PathBuf::from("./data"),
            models_dir: PathBuf::from("./models"),
            listen: "127.0.0.1:7200".into(),
            whisper: WhisperConfig::default(),
            transcribe: TranscribeConfig::default(),
            correction: CorrectionConfig::default(),
            summary: SummaryConfig::default(),
            llm: EndpointConfig::default(),
        }
    }
}

impl AppConfig {
    /// Missing files yield the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut persisted = self.clone();
        if persisted.api_key_from_env {
            persisted.api_key = None;
        }
        std::fs::write(path, toml::to_string_pretty(&persisted)?)?;
        Ok(())
    }

    /// `LESSON_API_KEY` and `LESSON_DATA_PATH` from the process environment
    /// or `.env` win over the file.
    pub fn apply_env(&mut self) {
        if let Some(api_key) = env_var("LESSON_API_KEY") {
            self.api_key = Some(api_key);
            self.api_key_from_env = true;
        }
        if let Some(data) = env_var("LESSON_DATA_PATH") {
            self.data_folder = PathBuf::from(data);
        }
    }

    /// Reconciles the api key of a config submitted over HTTP with the live
    /// one. The redacted placeholder keeps the current key and is rejected
    /// when there is none.
    pub fn resolve_api_key(&mut self, current: &AppConfig) -> Result<()> {
        match self.api_key.as_deref() {
            Some(REDACTED_API_KEY) => match &current.api_key {
                Some(key) => {
                    self.api_key = Some(key.clone());
                    self.api_key_from_env = current.api_key_from_env;
                }
                None => anyhow::bail!("no api key is set, the redacted placeholder cannot be kept"),
            },
            _ => self.api_key_from_env = false,
        }
        Ok(())
    }

    /// Copy safe to hand out over HTTP.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.api_key.is_some() {
            config.api_key = Some(REDACTED_API_KEY.into());
        }
        config
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .or_else(|_| dotenv::var(name))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Live configuration shared by the service. Stages take a `snapshot` when
/// they are submitted, so edits only affect later submissions.
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<AppConfig>>,
}

impl SharedConfig {
    pub fn new(config: AppConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn snapshot(&self) -> AppConfig {
        match self.inner.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, config: AppConfig) {
        match self.inner.write() {
            Ok(mut current) => *current = config,
            Err(poisoned) => *poisoned.into_inner() = config,
        }
    }

    /// Applies `edit` under the write lock, so concurrent edits never
    /// overwrite each other.
    pub fn update(&self, edit: impl FnOnce(&mut AppConfig)) {
        match self.inner.write() {
            Ok(mut current) => edit(&mut current),
            Err(poisoned) => edit(&mut poisoned.into_inner()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_returns_default() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.whisper.model_size, "large-v3");
        assert_eq!(config.transcribe.beam_size, 5);
        assert_eq!(config.correction.temperature, 0.3);
        assert_eq!(config.summary.max_length, 300);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
api_key = "sk-test"

[transcribe]
language = "fr"

[summary]
provider = "anthropic"
summary_type = "bullet-points"
max_length = 50
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.transcribe.language(), Some("fr".to_string()));
        assert!(config.transcribe.vad_filter);
        assert_eq!(config.summary.provider, "anthropic");
        assert_eq!(config.summary.summary_type, SummaryType::BulletPoints);
        assert_eq!(config.summary.model, "gpt-4o");
        assert_eq!(config.correction, CorrectionConfig::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.summary.summary_type = SummaryType::Other("Haiku".into());
        config.correction.prompt = Some("Fix spelling only.".into());
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_auto_language_means_detection() {
        let mut transcribe = TranscribeConfig::default();
        assert_eq!(transcribe.language(), None);
        transcribe.language = "AUTO".into();
        assert_eq!(transcribe.language(), None);
        transcribe.language = "en".into();
        assert_eq!(transcribe.language(), Some("en".to_string()));
    }

    #[test]
    fn test_summary_prompt_composition() {
        let mut summary = SummaryConfig {
            summary_type: SummaryType::Brief,
            max_length: 50,
            ..Default::default()
        };
        assert_eq!(
            summary.prompt(),
            "Create a brief, concise summary of the following text in approximately 50 words. Return only the summary without additional commentary."
        );

        summary.summary_type = "Something else".into();
        assert!(summary.prompt().starts_with("Create a summary of the following text"));

        summary.prompt = Some("Write a limerick.".into());
        assert_eq!(summary.prompt(), "Write a limerick.");
    }

    #[test]
    fn test_correction_prompt_falls_back_to_default() {
        let mut correction = CorrectionConfig::default();
        assert_eq!(correction.prompt(), DEFAULT_CORRECTION_PROMPT);
        correction.prompt = Some("   ".into());
        assert_eq!(correction.prompt(), DEFAULT_CORRECTION_PROMPT);
        correction.prompt = Some("Only fix names.".into());
        assert_eq!(correction.prompt(), "Only fix names.");
    }

    #[test]
    fn test_snapshot_is_detached_from_later_edits() {
        let shared = SharedConfig::new(AppConfig::default());
        let snapshot = shared.snapshot();
        shared.update(|config| config.correction.model = "gpt-4o-mini".into());

        assert_eq!(snapshot.correction.model, "gpt-4o");
        assert_eq!(shared.snapshot().correction.model, "gpt-4o-mini");
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let shared = SharedConfig::new(AppConfig::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        shared.update(|config| config.summary.max_length += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(shared.snapshot().summary.max_length, 300 + 800);
    }

    #[test]
    fn test_env_api_key_is_not_saved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = AppConfig {
            api_key: Some("sk-from-env".into()),
            api_key_from_env: true,
            ..Default::default()
        };
        config.save_to(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(!content.contains("sk-from-env"));
        assert_eq!(AppConfig::load_from(&path).unwrap().api_key, None);

        let config = AppConfig {
            api_key: Some("sk-from-file".into()),
            ..Default::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(
            AppConfig::load_from(&path).unwrap().api_key.as_deref(),
            Some("sk-from-file")
        );
    }

    #[test]
    fn test_placeholder_keeps_current_key() {
        let current = AppConfig {
            api_key: Some("sk-from-env".into()),
            api_key_from_env: true,
            ..Default::default()
        };
        let mut submitted = current.redacted();
        submitted.api_key_from_env = false;
        submitted.resolve_api_key(&current).unwrap();
        assert_eq!(submitted.api_key.as_deref(), Some("sk-from-env"));
        assert!(submitted.api_key_from_env);

        let mut replaced = AppConfig {
            api_key: Some("sk-new".into()),
            ..Default::default()
        };
        replaced.resolve_api_key(&current).unwrap();
        assert_eq!(replaced.api_key.as_deref(), Some("sk-new"));
        assert!(!replaced.api_key_from_env);

        let mut placeholder = AppConfig {
            api_key: Some(REDACTED_API_KEY.into()),
            ..Default::default()
        };
        assert!(placeholder.resolve_api_key(&AppConfig::default()).is_err());
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        assert_eq!(config.redacted().api_key.as_deref(), Some(REDACTED_API_KEY));
        assert_eq!(AppConfig::default().redacted().api_key, None);
    }
}
