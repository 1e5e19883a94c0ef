use anyhow::Result;
use sea_orm::Set;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::lesson::transcript::{text_from_stored, text_to_stored};
use crate::lesson::{Lesson, LessonUpdate, Transcript};
use crate::storage::lesson::entity::{ActiveModel, Model as LessonModel};

impl From<LessonModel> for Lesson {
    fn from(model: LessonModel) -> Self {
        Lesson {
            id: model.id,
            title: model.title,
            filename: model.filename,
            course_id: model.course_id,
            date: model.date,
            duration: model.duration,
            transcript: model.transcript.as_deref().map(Transcript::from_stored),
            transcript_metadata: decode_metadata(model.id, model.transcript_metadata.as_deref()),
            corrected_transcript: model.corrected_transcript.as_deref().map(text_from_stored),
            correction_metadata: decode_metadata(model.id, model.correction_metadata.as_deref()),
            summary: model.summary,
            summary_metadata: decode_metadata(model.id, model.summary_metadata.as_deref()),
        }
    }
}

/// Marks the columns named by `update` as changed on `active`.
pub fn apply_update(active: &mut ActiveModel, update: LessonUpdate) -> Result<()> {
    if let Some(transcript) = update.transcript {
        active.transcript = Set(Some(serde_json::to_string(&transcript)?));
    }
    if let Some(metadata) = update.transcript_metadata {
        active.transcript_metadata = Set(Some(encode_metadata(&metadata)?));
    }
    if let Some(text) = update.corrected_transcript {
        active.corrected_transcript = Set(Some(text_to_stored(&text)));
    }
    if let Some(metadata) = update.correction_metadata {
        active.correction_metadata = Set(Some(encode_metadata(&metadata)?));
    }
    if let Some(text) = update.summary {
        active.summary = Set(Some(text));
    }
    if let Some(metadata) = update.summary_metadata {
        active.summary_metadata = Set(Some(encode_metadata(&metadata)?));
    }
    Ok(())
}

fn encode_metadata<M: Serialize>(metadata: &M) -> Result<String> {
    Ok(serde_json::to_string(metadata)?)
}

// unreadable metadata is dropped rather than failing the whole lesson
fn decode_metadata<M: DeserializeOwned>(lesson_id: i64, raw: Option<&str>) -> Option<M> {
    let raw = raw?;
    match serde_json::from_str(raw) {
        Ok(metadata) => Some(metadata),
        Err(e) => {
            warn!("Ignoring unreadable metadata on lesson {}: {}", lesson_id, e);
            None
        }
    }
}
