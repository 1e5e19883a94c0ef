use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One timestamped span of speech. Times are seconds from the start of the audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl Segment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum TranscriptError {
    #[error("segment {index} starts before zero ({start})")]
    NegativeStart { index: usize, start: f64 },
    #[error("segment {index} ends at {end} before it starts at {start}")]
    EndBeforeStart { index: usize, start: f64, end: f64 },
    #[error("segment {index} starts at {start}, before the previous segment at {previous}")]
    OutOfOrder { index: usize, start: f64, previous: f64 },
}

/// Stored transcript payload.
///
/// Serialises untagged as `{"segments": [...]}` or `{"text": "..."}`, the two
/// shapes found in persisted lessons. Transcription always produces
/// `Segmented`; `PlainText` survives from older records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transcript {
    Segmented { segments: Vec<Segment> },
    PlainText { text: String },
}

impl Transcript {
    pub fn plain(text: impl Into<String>) -> Self {
        Transcript::PlainText { text: text.into() }
    }

    /// Builds a segmented transcript, rejecting segments that break ordering
    /// or have negative or inverted time ranges.
    pub fn segmented(segments: Vec<Segment>) -> Result<Self, TranscriptError> {
        let mut previous: Option<f64> = None;
        for (index, segment) in segments.iter().enumerate() {
            if segment.start < 0.0 {
                return Err(TranscriptError::NegativeStart { index, start: segment.start });
            }
            if segment.end < segment.start {
                return Err(TranscriptError::EndBeforeStart {
                    index,
                    start: segment.start,
                    end: segment.end,
                });
            }
            if let Some(previous) = previous {
                if segment.start < previous {
                    return Err(TranscriptError::OutOfOrder {
                        index,
                        start: segment.start,
                        previous,
                    });
                }
            }
            previous = Some(segment.start);
        }
        Ok(Transcript::Segmented { segments })
    }

    /// Decodes a stored column value.
    ///
    /// JSON of either shape decodes to that variant. A JSON string literal or
    /// anything that is not JSON at all is a legacy plain-string transcript.
    pub fn from_stored(raw: &str) -> Self {
        if let Ok(transcript) = serde_json::from_str::<Transcript>(raw) {
            return transcript;
        }
        match serde_json::from_str::<String>(raw) {
            Ok(text) => Transcript::PlainText { text },
            Err(_) => Transcript::PlainText { text: raw.to_string() },
        }
    }

    pub fn segments(&self) -> Option<&[Segment]> {
        match self {
            Transcript::Segmented { segments } => Some(segments),
            Transcript::PlainText { .. } => None,
        }
    }

    /// Flat text used as input to correction and summarisation.
    pub fn text(&self) -> String {
        match self {
            Transcript::PlainText { text } => text.trim().to_string(),
            Transcript::Segmented { segments } => segments
                .iter()
                .map(|segment| segment.text.trim())
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    /// `[HH:MM:SS - HH:MM:SS] text` per segment, or the plain text.
    pub fn to_timestamped(&self) -> String {
        match self {
            Transcript::PlainText { text } => text.clone(),
            Transcript::Segmented { segments } => segments
                .iter()
                .map(|segment| {
                    format!(
                        "[{} - {}] {}",
                        format_timestamp(segment.start),
                        format_timestamp(segment.end),
                        segment.text.trim()
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Corrected transcripts are stored as `{"text": "..."}`; older rows hold the
/// raw string.
pub(crate) fn text_from_stored(raw: &str) -> String {
    #[derive(Deserialize)]
    struct Stored {
        text: String,
    }

    if let Ok(stored) = serde_json::from_str::<Stored>(raw) {
        return stored.text;
    }
    serde_json::from_str::<String>(raw).unwrap_or_else(|_| raw.to_string())
}

pub(crate) fn text_to_stored(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}
