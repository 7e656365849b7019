use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{decode_summary, AnalysisError, Analyzer, SYSTEM_PROMPT};
use crate::config::AnalysisConfig;
use crate::summary::Summary;
use crate::utils::truncate_chars;

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Clone, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponseRaw {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client for OpenAI or any compatible endpoint (OpenRouter by default).
#[derive(Clone)]
pub struct OpenAiAnalyzer {
    http_client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_input_chars: usize,
}

impl OpenAiAnalyzer {
    /// Fails with [`AnalysisError::Configuration`] when no API key is configured.
    pub fn new(config: &AnalysisConfig) -> Result<Self, AnalysisError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AnalysisError::Configuration(
                    "OPENAI_API_KEY is not set. Add it to .env or the environment".into(),
                )
            })?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AnalysisError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: config.effective_base_url().to_string(),
            model: config.effective_model().to_string(),
            temperature: config.temperature,
            max_input_chars: config.max_input_chars,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_completion(&self, user_prompt: &str) -> Result<String, AnalysisError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                Message {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Message {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.temperature,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                warn!(error = %e, "Analysis request failed");
                AnalysisError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().unwrap_or_default();
            warn!(status = %status, error = %error_text, "Analysis API error");
            return Err(AnalysisError::Request(format!("API error {}: {}", status, error_text)));
        }

        let chat_response: ChatResponseRaw = response
            .json()
            .map_err(|e| AnalysisError::InvalidResponse(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AnalysisError::InvalidResponse("No content in response".into()))
    }
}

impl Analyzer for OpenAiAnalyzer {
    fn analyze(&self, text: &str) -> Result<Summary, AnalysisError> {
        let start = Instant::now();
        let excerpt = truncate_chars(text, self.max_input_chars);
        if excerpt.len() < text.len() {
            info!(limit = self.max_input_chars, "Document truncated for analysis");
        }

        let content = self.chat_completion(&format!("Analyze this document:\n\n{}", excerpt))?;
        let summary = decode_summary(&content, text)?;

        debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis(),
            risks = summary.risks.len(),
            "Analysis completed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_configuration_error() {
        let config = AnalysisConfig {
            api_key: None,
            ..AnalysisConfig::default()
        };
        let err = OpenAiAnalyzer::new(&config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_client_uses_provider_defaults() {
        let config = AnalysisConfig {
            api_key: Some("sk-test".to_string()),
            use_openrouter: false,
            ..AnalysisConfig::default()
        };
        let analyzer = OpenAiAnalyzer::new(&config).unwrap();
        assert_eq!(analyzer.base_url(), "https://api.openai.com/v1");
        assert_eq!(analyzer.model(), "gpt-4o-mini");
    }

    #[test]
    fn test_request_body_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![Message {
                role: "user",
                content: "hi",
            }],
            temperature: 0.2,
            response_format: ResponseFormat { kind: "json_object" },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }
}
