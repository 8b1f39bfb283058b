use serde::{Deserialize, Serialize};

use crate::models::ImagePayload;
use crate::services::vision::{ModelError, ModelSettings, VisionModel};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible provider routed through OpenRouter
pub struct OpenRouterClient {
    api_key: String,
    settings: ModelSettings,
    client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: String, settings: ModelSettings, client: reqwest::Client) -> Self {
        Self {
            api_key,
            settings,
            client,
        }
    }

    fn build_request(&self, prompt: &str, image: &ImagePayload) -> ChatRequest {
        ChatRequest {
            model: self.settings.model_id.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        content_type: "text".to_string(),
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        content_type: "image_url".to_string(),
                        image_url: ImageData {
                            url: image.data_url(),
                        },
                    },
                ],
            }],
            max_tokens: self.settings.max_output_tokens,
            temperature: self.settings.temperature,
        }
    }
}

#[async_trait::async_trait]
impl VisionModel for OpenRouterClient {
    fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> Result<String, ModelError> {
        let request = self.build_request(prompt, image);

        let response = self
            .client
            .post(OPENROUTER_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("X-Title", "CalorieSnap")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenRouter response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ OpenRouter API error ({}): {}", status, error_text);
            return Err(ModelError::from_status(status.as_u16(), error_text));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(ModelError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_carries_data_url() {
        let client = OpenRouterClient::new(
            "test_key".to_string(),
            ModelSettings {
                model_id: "test_model".to_string(),
                max_output_tokens: 512,
                temperature: 0.4,
            },
            reqwest::Client::new(),
        );
        let image = ImagePayload {
            mime_type: "image/webp".to_string(),
            data: "UklGRg==".to_string(),
        };

        let json = serde_json::to_value(client.build_request("describe", &image)).unwrap();

        assert_eq!(json["model"], "test_model");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "data:image/webp;base64,UklGRg=="
        );
    }
}
