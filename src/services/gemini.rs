use serde::{Deserialize, Serialize};

use crate::models::ImagePayload;
use crate::services::vision::{ModelError, ModelSettings, VisionModel};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiClient {
    api_key: String,
    settings: ModelSettings,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(api_key: String, settings: ModelSettings, client: reqwest::Client) -> Self {
        Self {
            api_key,
            settings,
            client,
        }
    }

    fn build_request(&self, prompt: &str, image: &ImagePayload) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: prompt.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type.clone(),
                            data: image.data.clone(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                max_output_tokens: self.settings.max_output_tokens,
                temperature: self.settings.temperature,
            },
        }
    }
}

/// Joins the text parts of the first candidate.
fn response_text(response: GenerateResponse) -> Result<String, ModelError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}

#[async_trait::async_trait]
impl VisionModel for GeminiClient {
    fn model_id(&self) -> &str {
        &self.settings.model_id
    }

    async fn generate(&self, prompt: &str, image: &ImagePayload) -> Result<String, ModelError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            GEMINI_BASE_URL, self.settings.model_id
        );
        let request = self.build_request(prompt, image);

        log::debug!("📤 Gemini request image payload: {} base64 chars", image.data.len());

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 Gemini response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            log::error!("❌ Gemini API error ({}): {}", status, error_text);
            return Err(ModelError::from_status(status.as_u16(), error_text));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Decode(e.to_string()))?;

        response_text(body)
    }
}
