use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::TranslateConfig;
use crate::error::{Result, SubtransError};
use super::Translator;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub response_format: ResponseFormat,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Translator backed by an OpenAI-compatible chat completions endpoint
pub struct ChatTranslator {
    client: Client,
    config: TranslateConfig,
    api_key: String,
}

impl ChatTranslator {
    pub fn new(config: TranslateConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: TranslateConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("subtrans/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SubtransError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    pub fn build_request(&self, items: &[String], batch_label: Option<&str>) -> ChatRequest {
        ChatRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: build_system_prompt(&self.config.target_language),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_user_content(items, batch_label),
                },
            ],
            temperature: self.config.temperature,
            top_p: self.config.top_p,
            max_tokens: self.config.max_tokens,
            response_format: ResponseFormat {
                format_type: "json_object".to_string(),
            },
        }
    }

    fn network_error(&self, e: reqwest::Error) -> SubtransError {
        if e.is_timeout() {
            SubtransError::Network(format!(
                "Request timed out after {}s",
                self.config.timeout_secs
            ))
        } else {
            SubtransError::Network(format!("HTTP request failed: {}", e))
        }
    }
}

#[async_trait]
impl Translator for ChatTranslator {
    async fn translate(
        &self,
        items: &[String],
        batch_label: Option<&str>,
    ) -> Result<Vec<String>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.build_request(items, batch_label);
        debug!(
            "Sending {} items to {} (batch {})",
            items.len(),
            self.config.endpoint,
            batch_label.unwrap_or("-")
        );

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.network_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.network_error(e))?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error").map(error_message))
                .unwrap_or_else(|| preview(&body, 200));
            return Err(SubtransError::Api(format!("{}: {}", status, message)));
        }

        let completion: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            SubtransError::Format(format!("Unexpected completion payload: {}", e))
        })?;

        if let Some(error) = completion.error.as_ref() {
            return Err(SubtransError::Api(error_message(error)));
        }

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                SubtransError::Format("Completion contained no choices".to_string())
            })?;

        debug!("Raw translation content: {}", preview(&content, 500));

        let mut translations = parse_translations(&content)?;
        if translations.len() > items.len() {
            warn!(
                "Service returned {} translations for {} items, truncating",
                translations.len(),
                items.len()
            );
            translations.truncate(items.len());
        }

        Ok(translations)
    }
}

/// Instruction sent as the system message of every request
pub fn build_system_prompt(target_language: &str) -> String {
    format!(
        "You are an expert subtitle translator. You will receive a numbered list of texts.\n\
         Translate each numbered text into natural, fluent {lang} without any extra explanations.\n\
         \n\
         RULES:\n\
         1. Preserve EXACTLY the same number of items in the output as in the input\n\
         2. Output MUST be a JSON object with a single key: \"translations\"\n\
         3. \"translations\" must be an array of strings in the SAME ORDER as input\n\
         4. Do NOT merge or split any items\n\
         5. Each translation should be concise and match the original length\n\
         \n\
         Example Input:\n\
         1. Hello world\n\
         2. Good morning\n\
         \n\
         Example Output:\n\
         {{\"translations\": [\"<{lang} for 'Hello world'>\", \"<{lang} for 'Good morning'>\"]}}",
        lang = target_language
    )
}

/// Numbered item list, optionally prefixed with a batch id line
pub fn build_user_content(items: &[String], batch_label: Option<&str>) -> String {
    let mut content = String::new();
    if let Some(label) = batch_label {
        content.push_str(&format!("Batch ID: {}\n", label));
    }

    let numbered = items
        .iter()
        .enumerate()
        .map(|(i, text)| format!("{}. {}", i + 1, text))
        .collect::<Vec<_>>()
        .join("\n");
    content.push_str(&numbered);
    content
}

/// Parse the model's reply into the ordered translation list.
///
/// Falls back once to the outermost balanced `{...}` span when the reply is
/// wrapped in prose or code fences. This is not general JSON repair.
pub fn parse_translations(raw: &str) -> Result<Vec<String>> {
    let trimmed = raw.trim();

    let value: Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(direct) => {
            let extracted = extract_json_object(trimmed).ok_or_else(|| {
                SubtransError::Format(format!("Response is not JSON: {}", direct))
            })?;
            debug!("Extracted JSON object from mixed response");
            serde_json::from_str(extracted).map_err(|e| {
                SubtransError::Format(format!("Failed to parse extracted JSON: {}", e))
            })?
        }
    };

    if let Some(error) = value.get("error") {
        return Err(SubtransError::Api(error_message(error)));
    }

    let translations = value
        .get("translations")
        .ok_or_else(|| {
            SubtransError::Format("Missing 'translations' key in response".to_string())
        })?
        .as_array()
        .ok_or_else(|| SubtransError::Format("'translations' is not an array".to_string()))?;

    translations
        .iter()
        .map(|entry| match entry {
            Value::String(text) => Ok(text.trim().to_string()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(SubtransError::Format(format!(
                "Unexpected translation entry: {}",
                other
            ))),
        })
        .collect()
}

/// Locate the outermost balanced `{...}` span, honouring JSON string escapes
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

fn error_message(error: &Value) -> String {
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .unwrap_or("Unknown API error")
        .to_string()
}

fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() > limit {
        format!("{}...", text.chars().take(limit).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Verify the endpoint and credentials with a one-item request
pub async fn check_availability(config: &TranslateConfig) -> Result<()> {
    let translator = ChatTranslator::new(config.clone())?;
    let probe = vec!["Hello".to_string()];

    let translations = translator.translate(&probe, Some("probe")).await?;
    if translations.first().map_or(true, |t| t.is_empty()) {
        return Err(SubtransError::Format(
            "Translation endpoint returned no translation for probe".to_string(),
        ));
    }

    info!(
        "Translation endpoint {} is available (model '{}')",
        config.endpoint, config.model
    );
    Ok(())
}
