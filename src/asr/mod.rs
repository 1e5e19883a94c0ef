use std::path::PathBuf;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::config::{TranscribeConfig, WhisperConfig};
use crate::lesson::{Segment, TranscriptionMetadata};

#[cfg(feature = "whisper")]
pub mod whisper;

/// Everything one transcription run needs, captured at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrParams {
    pub audio_path: PathBuf,
    /// `None` lets the engine detect the language.
    pub language: Option<String>,
    pub beam_size: u32,
    pub vad_filter: bool,
    pub initial_prompt: Option<String>,
    pub model_size: String,
    pub device: String,
    pub compute_type: String,
}

impl AsrParams {
    pub fn new(audio_path: PathBuf, whisper: &WhisperConfig, transcribe: &TranscribeConfig) -> Self {
        Self {
            audio_path,
            language: transcribe.language(),
            beam_size: transcribe.beam_size.max(1),
            vad_filter: transcribe.vad_filter,
            initial_prompt: transcribe.initial_prompt(),
            model_size: whisper.model_size.clone(),
            device: whisper.device.clone(),
            compute_type: whisper.compute_type.clone(),
        }
    }

    pub fn metadata(&self) -> TranscriptionMetadata {
        TranscriptionMetadata {
            model_size: Some(self.model_size.clone()),
            device: Some(self.device.clone()),
            compute_type: Some(self.compute_type.clone()),
            beam_size: Some(self.beam_size),
            vad_filter: Some(self.vad_filter),
            language: self.language.clone(),
            initial_prompt: self.initial_prompt.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsrOutput {
    pub segments: Vec<Segment>,
    pub metadata: TranscriptionMetadata,
}

/// Speech-to-text engine. Calls block for as long as inference takes, so
/// callers run them on a blocking thread.
pub trait AsrEngine: Send + Sync {
    fn transcribe(&self, params: &AsrParams) -> Result<AsrOutput>;
}

/// Stand-in used when the crate is built without an inference backend.
/// Every run fails, so the pipeline reports it like any other engine error.
pub struct UnavailableAsr;

impl AsrEngine for UnavailableAsr {
    fn transcribe(&self, _params: &AsrParams) -> Result<AsrOutput> {
        Err(anyhow::anyhow!("speech recognition is not available in this build"))
    }
}

/// Sorts segments by start and clamps times so they form a valid transcript.
pub fn normalize_segments(mut segments: Vec<Segment>) -> Vec<Segment> {
    for segment in segments.iter_mut() {
        segment.start = segment.start.max(0.0);
        segment.end = segment.end.max(segment.start);
        segment.text = segment.text.trim().to_string();
    }
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));
    segments
}
