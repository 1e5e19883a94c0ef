use std::fmt::{self, Display};
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lesson::{ProvenanceMetadata, Transcript, TranscriptionMetadata};
use crate::schedule::TaskSnapshot;

/// Which stored text a summary is produced from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Transcript,
    CorrectedTranscript,
}

impl Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarySource::Transcript => f.write_str("transcript"),
            SummarySource::CorrectedTranscript => f.write_str("corrected_transcript"),
        }
    }
}

impl FromStr for SummarySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "transcript" => Ok(SummarySource::Transcript),
            "corrected_transcript" | "corrected" => Ok(SummarySource::CorrectedTranscript),
            other => Err(format!("unknown summary source: {}", other)),
        }
    }
}

/// One stage run for one lesson. Renders as the registry task key.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum StageKey {
    Transcribe(i64),
    Correct(i64),
    Summarize(i64, SummarySource),
}

impl Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKey::Transcribe(id) => write!(f, "transcribe:{}", id),
            StageKey::Correct(id) => write!(f, "correct:{}", id),
            StageKey::Summarize(id, source) => write!(f, "summarize:{}:{}", id, source),
        }
    }
}

/// What a finished stage produced and persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StageOutput {
    Transcript {
        transcript: Transcript,
        metadata: TranscriptionMetadata,
    },
    Correction {
        text: String,
        metadata: ProvenanceMetadata,
    },
    Summary {
        source: SummarySource,
        text: String,
        metadata: ProvenanceMetadata,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value")]
pub enum StageStatus {
    NotStarted,
    Running,
    Done(StageOutput),
    Failed(String),
}

impl StageStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, StageStatus::Done(_) | StageStatus::Failed(_))
    }
}

impl From<TaskSnapshot<StageOutput>> for StageStatus {
    fn from(snapshot: TaskSnapshot<StageOutput>) -> Self {
        match snapshot {
            TaskSnapshot::Absent => StageStatus::NotStarted,
            TaskSnapshot::Running => StageStatus::Running,
            TaskSnapshot::Done(output) => StageStatus::Done(output),
            TaskSnapshot::Failed(error) => StageStatus::Failed(error),
        }
    }
}

/// Failures reported before any work is submitted.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("lesson {0} not found")]
    LessonNotFound(i64),

    #[error("audio for lesson {lesson_id} is missing: {path}")]
    MissingAudio { lesson_id: i64, path: String },

    #[error("lesson {0} has no transcript")]
    MissingTranscript(i64),

    #[error("lesson {lesson_id} has no {slot} to summarize")]
    MissingSource { lesson_id: i64, slot: SummarySource },

    #[error("lesson store error: {0}")]
    Store(String),
}

impl From<anyhow::Error> for StageError {
    fn from(e: anyhow::Error) -> Self {
        StageError::Store(format!("{:#}", e))
    }
}
