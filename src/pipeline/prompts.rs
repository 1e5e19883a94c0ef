use crate::config::AppConfig;
use crate::lesson::ProvenanceMetadata;
use crate::llm::CompletionRequest;

pub const CORRECTION_SYSTEM_PROMPT: &str = "You are a helpful assistant that corrects transcriptions.";
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a helpful assistant that creates summaries.";

pub const CORRECTION_MAX_TOKENS: u32 = 4000;
pub const SUMMARY_MAX_TOKENS: u32 = 2000;

/// Completion request for a correction run plus the provenance to store with
/// its result.
pub fn correction_request(config: &AppConfig, text: &str) -> (CompletionRequest, ProvenanceMetadata) {
    let correction = &config.correction;
    let prompt = correction.prompt();

    let request = CompletionRequest {
        system_prompt: CORRECTION_SYSTEM_PROMPT.to_string(),
        user_prompt: format!("{}\n\nTranscription:\n{}", prompt, text),
        provider: correction.provider.clone(),
        model: correction.model.clone(),
        temperature: correction.temperature,
        max_tokens: CORRECTION_MAX_TOKENS,
        api_key: config.api_key.clone(),
    };
    let metadata = ProvenanceMetadata {
        provider: Some(correction.provider.clone()),
        model: Some(correction.model.clone()),
        temperature: Some(correction.temperature),
        prompt_used: Some(prompt.to_string()),
    };
    (request, metadata)
}

pub fn summary_request(config: &AppConfig, text: &str) -> (CompletionRequest, ProvenanceMetadata) {
    let summary = &config.summary;
    let prompt = summary.prompt();

    let request = CompletionRequest {
        system_prompt: SUMMARY_SYSTEM_PROMPT.to_string(),
        user_prompt: format!("{}\n\nText:\n{}", prompt, text),
        provider: summary.provider.clone(),
        model: summary.model.clone(),
        temperature: summary.temperature,
        max_tokens: SUMMARY_MAX_TOKENS,
        api_key: config.api_key.clone(),
    };
    let metadata = ProvenanceMetadata {
        provider: Some(summary.provider.clone()),
        model: Some(summary.model.clone()),
        temperature: Some(summary.temperature),
        prompt_used: Some(prompt),
    };
    (request, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SummaryType, DEFAULT_CORRECTION_PROMPT};

    #[test]
    fn test_correction_request_wraps_transcription() {
        let config = AppConfig {
            api_key: Some("sk".into()),
            ..Default::default()
        };
        let (request, metadata) = correction_request(&config, "hello\nworld");

        assert_eq!(
            request.user_prompt,
            format!("{}\n\nTranscription:\nhello\nworld", DEFAULT_CORRECTION_PROMPT)
        );
        assert_eq!(request.system_prompt, CORRECTION_SYSTEM_PROMPT);
        assert_eq!(request.max_tokens, 4000);
        assert_eq!(request.api_key.as_deref(), Some("sk"));
        assert_eq!(metadata.provider.as_deref(), Some("openai"));
        assert_eq!(metadata.temperature, Some(0.3));
        assert_eq!(metadata.prompt_used.as_deref(), Some(DEFAULT_CORRECTION_PROMPT));
    }

    #[test]
    fn test_summary_request_records_composed_prompt() {
        let mut config = AppConfig::default();
        config.summary.summary_type = SummaryType::ExecutiveSummary;
        config.summary.max_length = 120;

        let (request, metadata) = summary_request(&config, "abc");
        let prompt = "Create an executive summary highlighting key points and decisions of the following text in approximately 120 words. Return only the summary without additional commentary.";
        assert_eq!(request.user_prompt, format!("{}\n\nText:\nabc", prompt));
        assert_eq!(request.max_tokens, 2000);
        assert_eq!(metadata.prompt_used.as_deref(), Some(prompt));
        assert_eq!(metadata.temperature, Some(0.7));
    }
}
