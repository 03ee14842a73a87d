use anyhow::anyhow;
use reqwest::Client;
use serde_json::{Value, json};

const CHAT_COMPLETIONS_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Minimal OpenRouter chat client for multimodal (text + image) prompts.
#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl OpenRouterClient {
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: CHAT_COMPLETIONS_URL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sends one user message made of `content` parts and returns the first choice's text.
    pub async fn complete(
        &self,
        model: &str,
        content: Vec<Value>,
        max_tokens: u32,
    ) -> anyhow::Result<String> {
        let payload = json!({
            "model": model,
            "messages": [
                {
                    "role": "user",
                    "content": content
                }
            ],
            "max_tokens": max_tokens
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("LLM API request failed: {}", response.status()));
        }

        let response_json: Value = response.json().await?;
        extract_message_content(&response_json)
    }
}

pub fn text_part(text: impl Into<String>) -> Value {
    json!({
        "type": "text",
        "text": text.into()
    })
}

pub fn png_part(base64_png: &str) -> Value {
    json!({
        "type": "image_url",
        "image_url": {
            "url": format!("data:image/png;base64,{}", base64_png)
        }
    })
}

fn extract_message_content(response: &Value) -> anyhow::Result<String> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid response format from LLM"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_first_choice() {
        let response = json!({
            "choices": [{ "message": { "role": "assistant", "content": "findings: clear" } }]
        });
        assert_eq!(extract_message_content(&response).unwrap(), "findings: clear");
    }

    #[test]
    fn test_rejects_malformed_response() {
        assert!(extract_message_content(&json!({ "error": "rate limited" })).is_err());
    }

    #[test]
    fn test_image_part_is_a_data_url() {
        assert_eq!(
            png_part("AAAA")["image_url"]["url"],
            "data:image/png;base64,AAAA"
        );
    }
}
