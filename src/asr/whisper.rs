use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};
use anyhow::Result;
use tracing::info;

use crate::asr::{normalize_segments, AsrEngine, AsrOutput, AsrParams};
use crate::audio::load_audio;
use crate::lesson::Segment;

struct LoadedModel {
    model_size: String,
    device: String,
    ctx: Arc<WhisperContext>,
}

/// whisper.cpp backed engine. The model is loaded on first use and kept
/// until a run asks for a different size or device.
pub struct WhisperAsr {
    models_dir: PathBuf,
    n_threads: i32,
    loaded: Mutex<Option<LoadedModel>>,
}

impl WhisperAsr {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        let n_threads = std::thread::available_parallelism()
            .map(|n| n.get().min(8) as i32)
            .unwrap_or(4);
        Self {
            models_dir: models_dir.into(),
            n_threads,
            loaded: Mutex::new(None),
        }
    }

    pub fn model_path(&self, model_size: &str) -> PathBuf {
        self.models_dir.join(format!("ggml-{}.bin", model_size))
    }

    fn context(&self, params: &AsrParams) -> Result<Arc<WhisperContext>> {
        let mut loaded = self
            .loaded
            .lock()
            .map_err(|_| anyhow::anyhow!("whisper model lock poisoned"))?;

        if let Some(model) = loaded.as_ref() {
            if model.model_size == params.model_size && model.device == params.device {
                return Ok(model.ctx.clone());
            }
        }

        let model_path = self.model_path(&params.model_size);
        let ctx = Arc::new(open_model(&model_path, &params.device)?);
        *loaded = Some(LoadedModel {
            model_size: params.model_size.clone(),
            device: params.device.clone(),
            ctx: ctx.clone(),
        });
        Ok(ctx)
    }

    fn build_params<'a>(&self, ap: &'a AsrParams) -> FullParams<'a, 'a> {
        let mut params = FullParams::new(SamplingStrategy::BeamSearch {
            beam_size: ap.beam_size as i32,
            patience: -1.0,
        });

        // None 表示自动检测语言
        params.set_language(ap.language.as_deref());
        if let Some(prompt) = ap.initial_prompt.as_deref() {
            params.set_initial_prompt(prompt);
        }

        params.set_n_threads(self.n_threads);
        params.set_translate(false);
        params.set_no_context(false);
        params.set_single_segment(false);
        params.set_suppress_blank(true);
        params.set_suppress_non_speech_tokens(true);
        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        params
    }
}

fn open_model(model_path: &Path, device: &str) -> Result<WhisperContext> {
    if !model_path.exists() {
        return Err(anyhow::anyhow!("whisper model not found at {}", model_path.display()));
    }
    let path = model_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("model path is not valid UTF-8: {}", model_path.display()))?;

    let mut ctx_params = WhisperContextParameters::default();
    ctx_params.use_gpu(!device.eq_ignore_ascii_case("cpu"));

    info!("Loading whisper model {} (device {})", path, device);
    WhisperContext::new_with_params(path, ctx_params)
        .map_err(|e| anyhow::anyhow!("failed to open whisper model: {}", e))
}

impl AsrEngine for WhisperAsr {
    fn transcribe(&self, ap: &AsrParams) -> Result<AsrOutput> {
        let audio = load_audio(&ap.audio_path, ap.vad_filter)?;
        let ctx = self.context(ap)?;
        let mut state = ctx.create_state()?;
        let params = self.build_params(ap);

        info!("Transcribing {:?} ({} samples)", ap.audio_path, audio.len());
        state.full(params, &audio)?;
        let num_segments = state.full_n_segments()?;

        let mut segments = Vec::with_capacity(num_segments.max(0) as usize);
        for i in 0..num_segments {
            let text = state.full_get_segment_text(i)?;
            // whisper 的时间戳单位是 10ms
            let start = state.full_get_segment_t0(i)? as f64 / 100.0;
            let end = state.full_get_segment_t1(i)? as f64 / 100.0;
            segments.push(Segment::new(start, end, text));
        }

        Ok(AsrOutput {
            segments: normalize_segments(segments),
            metadata: ap.metadata(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path_uses_ggml_naming() {
        let asr = WhisperAsr::new("./models");
        assert_eq!(asr.model_path("large-v3"), PathBuf::from("./models/ggml-large-v3.bin"));
    }

    #[test]
    fn test_missing_model_fails_the_run() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let audio_path = dir.path().join("lesson.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&audio_path, spec)?;
        for i in 0..1600 {
            writer.write_sample((i % 100) as i16)?;
        }
        writer.finalize()?;

        let asr = WhisperAsr::new(dir.path().join("models"));
        let params = AsrParams::new(audio_path, &Default::default(), &Default::default());
        let err = asr.transcribe(&params).unwrap_err();
        assert!(err.to_string().contains("whisper model not found"));
        Ok(())
    }
}
