use std::time::Duration;

use crate::models::ImagePayload;

/// Fixed prompt contract sent with every image.
pub const ANALYSIS_PROMPT: &str = "Analyze this food image and provide a detailed calorie breakdown.

Return JSON in this format:
{
  \"foods\": [
    {
      \"name\": \"food item name\",
      \"calories\": number,
      \"cooking_method\": \"fried|baked|grilled|steamed|raw\",
      \"confidence\": number (0.0-1.0),
      \"portion_estimate\": \"estimated size\",
      \"nutrition_info\": {
        \"protein\": number,
        \"carbs\": number,
        \"fat\": number,
        \"fiber\": number
      }
    }
  ],
  \"confidence\": number
}

Requirements:
- Maximum 5 food items
- Minimum 90% confidence for each item
- Include cooking method when identifiable, omit it otherwise
- Be precise with nutritional values";

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub model_id: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_id: "gemini-1.5-flash".to_string(),
            max_output_tokens: 2048,
            temperature: 0.4,
        }
    }
}

#[derive(Debug)]
pub enum ModelError {
    /// Provider rejected the credential
    Credential(String),
    Api { status: u16, body: String },
    Transport(reqwest::Error),
    Decode(String),
    EmptyResponse,
    Timeout(Duration),
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Credential(msg) => write!(f, "model credential rejected: {}", msg),
            ModelError::Api { status, body } => write!(f, "model API error ({}): {}", status, body),
            ModelError::Transport(e) => write!(f, "model request failed: {}", e),
            ModelError::Decode(msg) => write!(f, "unexpected model response: {}", msg),
            ModelError::EmptyResponse => write!(f, "model returned no text"),
            ModelError::Timeout(after) => write!(f, "analysis timeout after {:?}", after),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Transport(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Transport(e)
    }
}

impl ModelError {
    /// Classify a non-success provider response.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 401 || status == 403 || body.contains("API key") {
            ModelError::Credential(body)
        } else {
            ModelError::Api { status, body }
        }
    }
}

/// Trait for vision-language model providers (Gemini, OpenRouter, etc.)
#[async_trait::async_trait]
pub trait VisionModel: Send + Sync {
    fn model_id(&self) -> &str;
    async fn generate(&self, prompt: &str, image: &ImagePayload) -> Result<String, ModelError>;
}

/// Runs one model call under `deadline`.
///
/// On expiry the call future is dropped, which aborts the underlying HTTP
/// request once the runtime next polls it; anything the provider has
/// already started on its side is not recalled.
pub async fn invoke_with_deadline(
    model: &dyn VisionModel,
    prompt: &str,
    image: &ImagePayload,
    deadline: Duration,
) -> Result<String, ModelError> {
    log::info!("🤖 Sending {} image to model {}", image.mime_type, model.model_id());

    match tokio::time::timeout(deadline, model.generate(prompt, image)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("⏱️ Model {} did not answer within {:?}", model.model_id(), deadline);
            Err(ModelError::Timeout(deadline))
        }
    }
}
