use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

/// Keeps the key out of request URLs, which reqwest echoes in its errors.
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, thiserror::Error)]
pub enum SummarizerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("gemini returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            api_key: String::new(),
            model: "gemini-1.5-flash".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: GeminiConfig,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<GenerateContentCandidate>>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentCandidate {
    content: Option<GenerateContentContent>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentContent {
    parts: Option<Vec<GenerateContentPart>>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentPart {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, SummarizerError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self { http, config })
    }

    fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    /// Single-turn text generation. Returns the trimmed text of the first candidate.
    pub async fn generate(&self, prompt: &str) -> Result<String, SummarizerError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(self.generate_content_url())
            .header(API_KEY_HEADER, self.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(redact)?;

        let status = response.status();
        let raw = response.text().await.map_err(redact)?;
        if !status.is_success() {
            return Err(SummarizerError::HttpStatus {
                status: status.as_u16(),
                body: raw.chars().take(200).collect(),
            });
        }

        parse_generate_content_response(&raw)
    }
}

fn redact(e: reqwest::Error) -> SummarizerError {
    SummarizerError::Http(e.without_url())
}

fn parse_generate_content_response(raw: &str) -> Result<String, SummarizerError> {
    let parsed: GenerateContentResponse = serde_json::from_str(raw)
        .map_err(|e| SummarizerError::InvalidResponse(e.to_string()))?;

    let candidate = parsed
        .candidates
        .and_then(|mut candidates| candidates.drain(..).next())
        .ok_or_else(|| {
            SummarizerError::InvalidResponse("response contained no candidates".to_string())
        })?;

    let text = candidate
        .content
        .and_then(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect::<Vec<_>>()
        .join("");

    let text = text.trim();
    if text.is_empty() {
        return Err(SummarizerError::InvalidResponse(
            "candidate contained no text".to_string(),
        ));
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn joins_text_parts_of_first_candidate() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":" Hello "},{"text":"world "}]}},
                     {"content":{"parts":[{"text":"ignored"}]}}]}"#;
        assert_eq!(parse_generate_content_response(raw).unwrap(), "Hello world");
    }

    #[test]
    fn empty_candidates_are_invalid() {
        assert!(matches!(
            parse_generate_content_response(r#"{"candidates":[]}"#),
            Err(SummarizerError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_generate_content_response(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#),
            Err(SummarizerError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn api_key_is_sent_as_header() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/models/m:generateContent")
                .header(API_KEY_HEADER, "SECRET-KEY-123");
            then.status(200).json_body(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
            }));
        });

        let client = GeminiClient::new(GeminiConfig {
            api_base: server.base_url(),
            api_key: "SECRET-KEY-123".into(),
            model: "m".into(),
            request_timeout: Duration::from_secs(2),
        })
        .unwrap();

        assert_eq!(client.generate("hi").await.unwrap(), "ok");
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn transport_errors_do_not_reveal_the_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST);
            then.status(200).delay(Duration::from_millis(500));
        });

        let client = GeminiClient::new(GeminiConfig {
            api_base: server.base_url(),
            api_key: "SECRET-KEY-123".into(),
            model: "m".into(),
            request_timeout: Duration::from_millis(50),
        })
        .unwrap();

        let err = client.generate("hi").await.unwrap_err();
        assert!(matches!(err, SummarizerError::Http(_)));
        let logged = format!("Gemini summarization failed: {}", err);
        assert!(!logged.contains("SECRET-KEY-123"), "{logged}");
        assert!(!format!("{:?}", err).contains("SECRET-KEY-123"));
    }
}
