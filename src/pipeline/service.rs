use std::sync::Arc;
use tracing::{info, warn};

use super::prompts::{correction_request, summary_request};
use super::types::{StageError, StageKey, StageOutput, StageStatus, SummarySource};
use crate::asr::{AsrEngine, AsrParams};
use crate::config::SharedConfig;
use crate::lesson::{Lesson, LessonUpdate, Transcript};
use crate::llm::LlmClient;
use crate::schedule::{Submission, TaskRegistry, TaskStats};
use crate::storage::{AudioLibrary, LessonStore};

/// Runs the transcribe, correct and summarize stages for lessons on top of a
/// shared [`TaskRegistry`].
///
/// Stage methods check their preconditions, capture a configuration snapshot
/// and submit the work; they never wait for it. Work persists its output
/// through the [`LessonStore`] before it reports `Done`, so a failed run
/// leaves the lesson untouched.
pub struct PipelineService {
    registry: Arc<TaskRegistry<StageOutput>>,
    lessons: Arc<dyn LessonStore>,
    audio: AudioLibrary,
    asr: Arc<dyn AsrEngine>,
    llm: Arc<dyn LlmClient>,
    config: SharedConfig,
}

impl PipelineService {
    pub fn new(
        registry: Arc<TaskRegistry<StageOutput>>,
        lessons: Arc<dyn LessonStore>,
        audio: AudioLibrary,
        asr: Arc<dyn AsrEngine>,
        llm: Arc<dyn LlmClient>,
        config: SharedConfig,
    ) -> Self {
        Self {
            registry,
            lessons,
            audio,
            asr,
            llm,
            config,
        }
    }

    pub fn lessons(&self) -> &Arc<dyn LessonStore> {
        &self.lessons
    }

    pub fn audio(&self) -> &AudioLibrary {
        &self.audio
    }

    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    async fn lesson(&self, id: i64) -> Result<Lesson, StageError> {
        self.lessons
            .get(id)
            .await?
            .ok_or(StageError::LessonNotFound(id))
    }

    pub async fn transcribe(&self, lesson_id: i64) -> Result<Submission, StageError> {
        let lesson = self.lesson(lesson_id).await?;
        let audio_path = self.audio.path_for(&lesson);
        if !self.audio.exists(&lesson) {
            return Err(StageError::MissingAudio {
                lesson_id,
                path: audio_path.display().to_string(),
            });
        }

        let config = self.config.snapshot();
        let params = AsrParams::new(audio_path, &config.whisper, &config.transcribe);
        let asr = self.asr.clone();
        let lessons = self.lessons.clone();

        let key = StageKey::Transcribe(lesson_id);
        let submission = self.registry.submit(key.to_string(), async move {
            let output = tokio::task::spawn_blocking(move || asr.transcribe(&params)).await??;
            let transcript = Transcript::segmented(output.segments)?;
            lessons
                .update(lesson_id, LessonUpdate::transcript(transcript.clone(), output.metadata.clone()))
                .await?;
            info!("Stored transcript for lesson {}", lesson_id);
            anyhow::Ok(StageOutput::Transcript {
                transcript,
                metadata: output.metadata,
            })
        });
        Ok(submission)
    }

    pub async fn correct(&self, lesson_id: i64) -> Result<Submission, StageError> {
        let lesson = self.lesson(lesson_id).await?;
        let text = lesson
            .transcript_text()
            .ok_or(StageError::MissingTranscript(lesson_id))?;

        let (request, metadata) = correction_request(&self.config.snapshot(), &text);
        let llm = self.llm.clone();
        let lessons = self.lessons.clone();

        let key = StageKey::Correct(lesson_id);
        let submission = self.registry.submit(key.to_string(), async move {
            let text = llm.complete(&request).await?;
            lessons
                .update(lesson_id, LessonUpdate::correction(text.clone(), metadata.clone()))
                .await?;
            info!("Stored corrected transcript for lesson {}", lesson_id);
            anyhow::Ok(StageOutput::Correction { text, metadata })
        });
        Ok(submission)
    }

    pub async fn summarize(
        &self,
        lesson_id: i64,
        source: SummarySource,
    ) -> Result<Submission, StageError> {
        let lesson = self.lesson(lesson_id).await?;
        let text = match source {
            SummarySource::Transcript => lesson.transcript_text(),
            SummarySource::CorrectedTranscript => lesson.corrected_text(),
        }
        .ok_or(StageError::MissingSource {
            lesson_id,
            slot: source,
        })?;

        let (request, metadata) = summary_request(&self.config.snapshot(), &text);
        let llm = self.llm.clone();
        let lessons = self.lessons.clone();

        let key = StageKey::Summarize(lesson_id, source);
        let submission = self.registry.submit(key.to_string(), async move {
            let text = llm.complete(&request).await?;
            // replaces whatever summary was there, whichever source it came from
            lessons
                .update(lesson_id, LessonUpdate::summary(text.clone(), metadata.clone()))
                .await?;
            info!("Stored summary for lesson {} from {}", lesson_id, source);
            anyhow::Ok(StageOutput::Summary {
                source,
                text,
                metadata,
            })
        });
        Ok(submission)
    }

    /// Dispatches to the stage named by `key`.
    pub async fn submit(&self, key: StageKey) -> Result<Submission, StageError> {
        match key {
            StageKey::Transcribe(id) => self.transcribe(id).await,
            StageKey::Correct(id) => self.correct(id).await,
            StageKey::Summarize(id, source) => self.summarize(id, source).await,
        }
    }

    pub fn status(&self, key: &StageKey) -> StageStatus {
        self.registry.snapshot(&key.to_string()).into()
    }

    /// Forgets a stage run so it can be submitted again. Returns whether the
    /// key was known.
    pub fn acknowledge(&self, key: &StageKey) -> bool {
        let key = key.to_string();
        if self.registry.is_running(&key) {
            warn!("Acknowledging {} while it is still running", key);
        }
        self.registry.clear(&key)
    }

    pub fn stats(&self) -> TaskStats {
        self.registry.stats()
    }
}
