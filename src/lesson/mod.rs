//! Lesson records and the payloads produced by the three pipeline stages.

use std::fmt::{self, Display};
use std::str::FromStr;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod search;
pub mod transcript;

pub use search::{LessonStats, SearchHit, SearchQuery};
pub use transcript::{format_timestamp, Segment, Transcript, TranscriptError};

/// Settings that produced a stored transcript.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionMetadata {
    pub model_size: Option<String>,
    pub device: Option<String>,
    pub compute_type: Option<String>,
    pub beam_size: Option<u32>,
    pub vad_filter: Option<bool>,
    pub language: Option<String>,
    pub initial_prompt: Option<String>,
}

/// Which provider and settings produced a corrected transcript or summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvenanceMetadata {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    #[serde(rename = "prompt", alias = "prompt_used")]
    pub prompt_used: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub course_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub duration: Option<f64>,
    pub transcript: Option<Transcript>,
    pub transcript_metadata: Option<TranscriptionMetadata>,
    pub corrected_transcript: Option<String>,
    pub correction_metadata: Option<ProvenanceMetadata>,
    pub summary: Option<String>,
    pub summary_metadata: Option<ProvenanceMetadata>,
}

impl Lesson {
    /// Flattened transcript text, if a non-empty transcript exists.
    pub fn transcript_text(&self) -> Option<String> {
        self.transcript
            .as_ref()
            .map(Transcript::text)
            .filter(|text| !text.is_empty())
    }

    pub fn corrected_text(&self) -> Option<String> {
        non_empty(self.corrected_transcript.as_deref())
    }

    pub fn summary_text(&self) -> Option<String> {
        non_empty(self.summary.as_deref())
    }

    /// Plain-text rendering of one stage output, `None` if the slot is empty.
    /// Segmented transcripts keep their `[HH:MM:SS - HH:MM:SS]` timestamps.
    pub fn export(&self, artifact: LessonArtifact) -> Option<String> {
        match artifact {
            LessonArtifact::Transcript => self
                .transcript
                .as_ref()
                .filter(|transcript| !transcript.is_empty())
                .map(Transcript::to_timestamped),
            LessonArtifact::Corrected => self.corrected_text(),
            LessonArtifact::Summary => self.summary_text(),
        }
    }
}

/// Stage outputs that can be downloaded as text files.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LessonArtifact {
    Transcript,
    Corrected,
    Summary,
}

impl LessonArtifact {
    /// `{title}_{artifact}.txt`, reduced to characters safe in a header.
    pub fn file_name(&self, title: &str) -> String {
        let title: String = title
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("{}_{}.txt", title, self)
    }
}

impl Display for LessonArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LessonArtifact::Transcript => f.write_str("transcript"),
            LessonArtifact::Corrected => f.write_str("corrected"),
            LessonArtifact::Summary => f.write_str("summary"),
        }
    }
}

impl FromStr for LessonArtifact {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.strip_suffix(".txt").unwrap_or(s) {
            "transcript" => Ok(LessonArtifact::Transcript),
            "corrected" => Ok(LessonArtifact::Corrected),
            "summary" => Ok(LessonArtifact::Summary),
            other => Err(format!("unknown artifact: {}", other)),
        }
    }
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLesson {
    pub title: String,
    pub filename: String,
    pub course_id: Option<i64>,
    pub date: DateTime<Utc>,
    pub duration: Option<f64>,
}

impl NewLesson {
    pub fn new(title: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            filename: filename.into(),
            course_id: None,
            date: Utc::now(),
            duration: None,
        }
    }
}

/// Fields to replace on a lesson. `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LessonUpdate {
    pub transcript: Option<Transcript>,
    pub transcript_metadata: Option<TranscriptionMetadata>,
    pub corrected_transcript: Option<String>,
    pub correction_metadata: Option<ProvenanceMetadata>,
    pub summary: Option<String>,
    pub summary_metadata: Option<ProvenanceMetadata>,
}

impl LessonUpdate {
    pub fn transcript(transcript: Transcript, metadata: TranscriptionMetadata) -> Self {
        Self {
            transcript: Some(transcript),
            transcript_metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn correction(text: String, metadata: ProvenanceMetadata) -> Self {
        Self {
            corrected_transcript: Some(text),
            correction_metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn summary(text: String, metadata: ProvenanceMetadata) -> Self {
        Self {
            summary: Some(text),
            summary_metadata: Some(metadata),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub(crate) fn apply(self, lesson: &mut Lesson) {
        if let Some(transcript) = self.transcript {
            lesson.transcript = Some(transcript);
        }
        if let Some(metadata) = self.transcript_metadata {
            lesson.transcript_metadata = Some(metadata);
        }
        if let Some(text) = self.corrected_transcript {
            lesson.corrected_transcript = Some(text);
        }
        if let Some(metadata) = self.correction_metadata {
            lesson.correction_metadata = Some(metadata);
        }
        if let Some(text) = self.summary {
            lesson.summary = Some(text);
        }
        if let Some(metadata) = self.summary_metadata {
            lesson.summary_metadata = Some(metadata);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lesson() -> Lesson {
        Lesson {
            id: 1,
            title: "Intro".to_string(),
            filename: "intro.wav".to_string(),
            course_id: None,
            date: Utc::now(),
            duration: None,
            transcript: None,
            transcript_metadata: None,
            corrected_transcript: None,
            correction_metadata: None,
            summary: None,
            summary_metadata: None,
        }
    }

    #[test]
    fn test_update_replaces_slot_and_metadata_together() {
        let mut lesson = lesson();
        lesson.summary = Some("old".to_string());
        lesson.summary_metadata = Some(ProvenanceMetadata {
            provider: Some("anthropic".to_string()),
            prompt_used: Some("old prompt".to_string()),
            ..Default::default()
        });

        let metadata = ProvenanceMetadata {
            provider: Some("openai".to_string()),
            model: Some("gpt-4o".to_string()),
            temperature: Some(0.7),
            prompt_used: None,
        };
        LessonUpdate::summary("new".to_string(), metadata.clone()).apply(&mut lesson);

        assert_eq!(lesson.summary.as_deref(), Some("new"));
        assert_eq!(lesson.summary_metadata, Some(metadata));
        assert!(lesson.corrected_transcript.is_none());
    }

    #[test]
    fn test_provenance_prompt_uses_legacy_key() {
        let metadata = ProvenanceMetadata {
            prompt_used: Some("fix it".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["prompt"], "fix it");

        let decoded: ProvenanceMetadata =
            serde_json::from_str(r#"{"provider":"openai","prompt_used":"x"}"#).unwrap();
        assert_eq!(decoded.prompt_used.as_deref(), Some("x"));
        assert_eq!(decoded.model, None);
    }

    #[test]
    fn test_export_renders_each_slot() {
        let mut lesson = lesson();
        assert_eq!(lesson.export(LessonArtifact::Transcript), None);

        lesson.transcript = Some(
            Transcript::segmented(vec![
                transcript::Segment::new(0.0, 2.0, "hello"),
                transcript::Segment::new(3661.0, 3663.5, "world"),
            ])
            .unwrap(),
        );
        lesson.corrected_transcript = Some(" Hello World. ".to_string());
        lesson.summary = Some("   ".to_string());

        assert_eq!(
            lesson.export(LessonArtifact::Transcript).as_deref(),
            Some("[00:00:00 - 00:00:02] hello\n[01:01:01 - 01:01:03] world")
        );
        assert_eq!(lesson.export(LessonArtifact::Corrected).as_deref(), Some("Hello World."));
        assert_eq!(lesson.export(LessonArtifact::Summary), None);
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!("summary.txt".parse(), Ok(LessonArtifact::Summary));
        assert_eq!("corrected".parse(), Ok(LessonArtifact::Corrected));
        assert!("audio".parse::<LessonArtifact>().is_err());
        assert_eq!(
            LessonArtifact::Transcript.file_name("Physik: Kapitel 1"),
            "Physik__Kapitel_1_transcript.txt"
        );
    }

    #[test]
    fn test_empty_slots_are_reported_missing() {
        let mut lesson = lesson();
        lesson.transcript = Some(Transcript::plain("   "));
        lesson.corrected_transcript = Some(String::new());
        assert_eq!(lesson.transcript_text(), None);
        assert_eq!(lesson.corrected_text(), None);

        lesson.transcript = Some(Transcript::plain("abc"));
        assert_eq!(lesson.transcript_text().as_deref(), Some("abc"));
    }
}
