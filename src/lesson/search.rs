//! Text search over the stored stage outputs of lessons.

use serde::{Deserialize, Serialize};

use super::{format_timestamp, Lesson, Transcript};

const EXCERPT_CONTEXT: usize = 100;
const MAX_EXCERPTS: usize = 3;
/// Share of query words that must occur for a fuzzy match.
const FUZZY_THRESHOLD: f64 = 0.6;

/// Read from `?q=&transcript=&corrected=&summary=&fuzzy=`. Every slot is
/// searched unless turned off.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchQuery {
    pub q: String,
    pub transcript: bool,
    pub corrected: bool,
    pub summary: bool,
    pub fuzzy: bool,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            q: String::new(),
            transcript: true,
            corrected: true,
            summary: true,
            fuzzy: true,
        }
    }
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchMatches {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transcript: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub corrected: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub summary: Vec<String>,
}

impl SearchMatches {
    pub fn is_empty(&self) -> bool {
        self.transcript.is_empty() && self.corrected.is_empty() && self.summary.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub lesson_id: i64,
    pub title: String,
    pub course_id: Option<i64>,
    pub score: usize,
    pub matches: SearchMatches,
}

/// How many lessons have each stage output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LessonStats {
    pub total: usize,
    pub with_transcript: usize,
    pub with_corrected: usize,
    pub with_summary: usize,
}

impl LessonStats {
    pub fn tally(lessons: &[Lesson]) -> Self {
        lessons.iter().fold(Self::default(), |mut stats, lesson| {
            stats.total += 1;
            if lesson.transcript.as_ref().is_some_and(|transcript| !transcript.is_empty()) {
                stats.with_transcript += 1;
            }
            if lesson.corrected_text().is_some() {
                stats.with_corrected += 1;
            }
            if lesson.summary_text().is_some() {
                stats.with_summary += 1;
            }
            stats
        })
    }
}

/// Matches `query` against the selected slots of every lesson.
///
/// Each hit keeps up to three excerpts per slot with the match wrapped in
/// `**`. The score counts every excerpt found, summary excerpts twice, and
/// hits come back best first. Segmented transcripts are searched segment by
/// segment so excerpts carry the segment start time.
///
/// Fuzzy mode only keeps slots containing most of the query words, and falls
/// back to excerpts around the single words when the whole phrase does not
/// occur.
pub fn search(lessons: &[Lesson], query: &SearchQuery) -> Vec<SearchHit> {
    let needle = query.q.trim();
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<SearchHit> = lessons
        .iter()
        .filter_map(|lesson| search_lesson(lesson, needle, query))
        .collect();
    // stable, so equal scores stay in id order
    hits.sort_by(|a, b| b.score.cmp(&a.score));
    hits
}

fn search_lesson(lesson: &Lesson, needle: &str, query: &SearchQuery) -> Option<SearchHit> {
    let mut matches = SearchMatches::default();
    let mut score = 0;

    if query.transcript {
        if let Some(transcript) = &lesson.transcript {
            let excerpts = transcript_excerpts(transcript, needle, query.fuzzy);
            score += excerpts.len();
            matches.transcript = truncate(excerpts);
        }
    }
    if query.corrected {
        if let Some(text) = lesson.corrected_text() {
            let excerpts = text_excerpts(&text, needle, query.fuzzy);
            score += excerpts.len();
            matches.corrected = truncate(excerpts);
        }
    }
    if query.summary {
        if let Some(text) = lesson.summary_text() {
            let excerpts = text_excerpts(&text, needle, query.fuzzy);
            score += excerpts.len() * 2;
            matches.summary = truncate(excerpts);
        }
    }

    if matches.is_empty() {
        return None;
    }
    Some(SearchHit {
        lesson_id: lesson.id,
        title: lesson.title.clone(),
        course_id: lesson.course_id,
        score,
        matches,
    })
}

fn truncate(mut excerpts: Vec<String>) -> Vec<String> {
    excerpts.truncate(MAX_EXCERPTS);
    excerpts
}

fn transcript_excerpts(transcript: &Transcript, needle: &str, fuzzy: bool) -> Vec<String> {
    let Some(segments) = transcript.segments() else {
        return text_excerpts(&transcript.text(), needle, fuzzy);
    };
    if fuzzy && !fuzzy_match(&transcript.text(), needle) {
        return Vec::new();
    }
    segments
        .iter()
        .flat_map(|segment| {
            phrase_or_words(&segment.text, needle, fuzzy)
                .into_iter()
                .map(move |excerpt| format!("[{}] {}", format_timestamp(segment.start), excerpt))
        })
        .collect()
}

fn text_excerpts(text: &str, needle: &str, fuzzy: bool) -> Vec<String> {
    if fuzzy && !fuzzy_match(text, needle) {
        return Vec::new();
    }
    phrase_or_words(text, needle, fuzzy)
}

fn phrase_or_words(text: &str, needle: &str, fuzzy: bool) -> Vec<String> {
    let excerpts = highlight(text, needle);
    if !excerpts.is_empty() || !fuzzy {
        return excerpts;
    }
    needle
        .split_whitespace()
        .flat_map(|word| highlight(text, word))
        .collect()
}

fn fuzzy_match(text: &str, needle: &str) -> bool {
    let text = text.to_lowercase();
    let words: Vec<String> = needle.split_whitespace().map(str::to_lowercase).collect();
    if words.is_empty() {
        return false;
    }
    let found = words.iter().filter(|word| text.contains(word.as_str())).count();
    found as f64 / words.len() as f64 >= FUZZY_THRESHOLD
}

/// Case-insensitive, non-overlapping occurrences of `needle`, each with up to
/// 100 characters of context on both sides.
pub fn highlight(text: &str, needle: &str) -> Vec<String> {
    let haystack: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = needle.chars().collect();
    if pattern.is_empty() {
        return Vec::new();
    }

    let mut excerpts = Vec::new();
    let mut i = 0;
    while i + pattern.len() <= haystack.len() {
        if !matches_at(&haystack[i..], &pattern) {
            i += 1;
            continue;
        }

        let end = i + pattern.len();
        let from = i.saturating_sub(EXCERPT_CONTEXT);
        let to = (end + EXCERPT_CONTEXT).min(haystack.len());

        let mut excerpt = String::new();
        if from > 0 {
            excerpt.push_str("...");
        }
        excerpt.extend(&haystack[from..i]);
        excerpt.push_str("**");
        excerpt.extend(&haystack[i..end]);
        excerpt.push_str("**");
        excerpt.extend(&haystack[end..to]);
        if to < haystack.len() {
            excerpt.push_str("...");
        }
        excerpts.push(excerpt);
        i = end;
    }
    excerpts
}

fn matches_at(window: &[char], pattern: &[char]) -> bool {
    window
        .iter()
        .zip(pattern)
        .all(|(a, b)| a.to_lowercase().eq(b.to_lowercase()))
}
