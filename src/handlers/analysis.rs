use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::handlers::decoder::{self, DecodeError};
use crate::handlers::envelope::EnvelopeBuilder;
use crate::handlers::normalizer;
use crate::handlers::validation::{validate, InputKind};
use crate::models::{AnalysisResult, ErrorCode, ErrorInfo, ResponseEnvelope};
use crate::services::vision::{invoke_with_deadline, ModelError, VisionModel, ANALYSIS_PROMPT};
use crate::services::RateLimiter;

#[derive(Debug)]
pub enum AnalysisError {
    RateLimited,
    InvalidImage(String),
    InvalidSession,
    ImageTooLarge,
    Timeout,
    /// Credential missing locally or rejected by the provider
    Config(String),
    Model(ModelError),
}

impl AnalysisError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AnalysisError::RateLimited => ErrorCode::RateLimitExceeded,
            AnalysisError::InvalidImage(_) => ErrorCode::InvalidImage,
            AnalysisError::InvalidSession => ErrorCode::InvalidSession,
            AnalysisError::ImageTooLarge => ErrorCode::ImageTooLarge,
            AnalysisError::Timeout => ErrorCode::AnalysisTimeout,
            AnalysisError::Config(_) => ErrorCode::ServiceConfigError,
            AnalysisError::Model(_) => ErrorCode::UnknownError,
        }
    }

    fn user_message(&self) -> &'static str {
        match self.code() {
            ErrorCode::RateLimitExceeded => "Too many requests. Please try again later.",
            ErrorCode::InvalidImage => "Image field is required and must be valid base64",
            ErrorCode::InvalidSession => "Invalid session ID format",
            ErrorCode::ImageTooLarge => "Image too large. Maximum size: 4MB",
            ErrorCode::AnalysisTimeout => "Analysis took too long. Please try with a smaller image.",
            ErrorCode::ServiceConfigError => "Service configuration error",
            ErrorCode::UnknownError => "Analysis failed",
        }
    }

    pub fn info(&self) -> ErrorInfo {
        let code = self.code();
        ErrorInfo {
            code,
            message: self.user_message().to_string(),
            retryable: code.retryable(),
        }
    }
}

impl std::fmt::Display for AnalysisError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnalysisError::InvalidImage(detail) => write!(f, "invalid image: {}", detail),
            AnalysisError::Config(detail) => write!(f, "service configuration error: {}", detail),
            AnalysisError::Model(e) => write!(f, "{}", e),
            other => write!(f, "{}", other.code()),
        }
    }
}

impl std::error::Error for AnalysisError {}

impl From<DecodeError> for AnalysisError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::TooLarge { .. } => AnalysisError::ImageTooLarge,
            other => AnalysisError::InvalidImage(other.to_string()),
        }
    }
}

impl From<ModelError> for AnalysisError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::Timeout(_) => AnalysisError::Timeout,
            ModelError::Credential(detail) => AnalysisError::Config(detail),
            other => AnalysisError::Model(other),
        }
    }
}

/// Admission, validation, model call and normalization for one request.
pub struct AnalysisPipeline {
    limiter: Arc<RateLimiter>,
    /// `None` when no credential is configured
    model: Option<Arc<dyn VisionModel>>,
    timeout: Duration,
    credential_var: &'static str,
}

impl AnalysisPipeline {
    pub fn new(
        limiter: Arc<RateLimiter>,
        model: Option<Arc<dyn VisionModel>>,
        timeout: Duration,
        credential_var: &'static str,
    ) -> Self {
        Self {
            limiter,
            model,
            timeout,
            credential_var,
        }
    }

    /// Runs every stage and always produces an envelope.
    ///
    /// `body` is `Err` when the transport layer could not deliver it; that is
    /// reported only after the client has been admitted.
    pub async fn handle(
        &self,
        client_id: &str,
        body: Result<&[u8], AnalysisError>,
    ) -> ResponseEnvelope {
        let envelope = EnvelopeBuilder::start();

        match self.run(client_id, body).await {
            Ok((result, model_id)) => {
                log::info!(
                    "🍽️ Analysis for {} done: {} items, {} kcal",
                    client_id,
                    result.foods.len(),
                    result.total_calories
                );
                envelope.success(result, &model_id)
            }
            Err(e) => {
                match e.code() {
                    ErrorCode::UnknownError | ErrorCode::ServiceConfigError => {
                        log::error!("❌ Analysis error for {}: {}", client_id, e)
                    }
                    _ => log::warn!("⚠️ Request from {} rejected: {}", client_id, e),
                }
                envelope.failure(&e)
            }
        }
    }

    async fn run(
        &self,
        client_id: &str,
        body: Result<&[u8], AnalysisError>,
    ) -> Result<(AnalysisResult, String), AnalysisError> {
        if !self.limiter.check_rate_limit(client_id) {
            return Err(AnalysisError::RateLimited);
        }

        let request: Value = serde_json::from_slice(body?)
            .map_err(|e| AnalysisError::InvalidImage(format!("malformed request body: {}", e)))?;
        let Value::Object(mut fields) = request else {
            return Err(AnalysisError::InvalidImage("request body is not a JSON object".to_string()));
        };
        let image = fields.remove("image").unwrap_or_default();
        let session_id = fields.remove("sessionId").unwrap_or_default();

        if !validate(&image, InputKind::Image) {
            return Err(AnalysisError::InvalidImage("image field failed validation".to_string()));
        }

        if !session_absent(&session_id) {
            if !validate(&session_id, InputKind::Session) {
                return Err(AnalysisError::InvalidSession);
            }
            log::debug!("🔖 Session {} for {}", session_id, client_id);
        }

        let model = self.model.as_ref().ok_or_else(|| {
            AnalysisError::Config(format!("{} not configured", self.credential_var))
        })?;

        // validate() guarantees a string
        let image = decoder::decode(image.as_str().unwrap_or_default())?;

        let text = invoke_with_deadline(model.as_ref(), ANALYSIS_PROMPT, &image, self.timeout).await?;
        log::debug!("💬 Model response: {} chars", text.len());

        Ok((normalizer::normalize(&text), model.model_id().to_string()))
    }
}

/// Falsy session values (`null`, `false`, `0`, `""`) skip session validation.
fn session_absent(session_id: &Value) -> bool {
    match session_id {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ImagePayload;
    use parking_lot::Mutex;

    struct ScriptedModel {
        reply: Result<String, u16>,
        seen: Mutex<Vec<ImagePayload>>,
    }

    impl ScriptedModel {
        fn replying(text: &str) -> Self {
            Self {
                reply: Ok(text.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(status: u16) -> Self {
            Self {
                reply: Err(status),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl VisionModel for ScriptedModel {
        fn model_id(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _prompt: &str, image: &ImagePayload) -> Result<String, ModelError> {
            self.seen.lock().push(image.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(ModelError::from_status(*status, "upstream said no".to_string())),
            }
        }
    }

    fn pipeline(model: Option<Arc<dyn VisionModel>>) -> AnalysisPipeline {
        AnalysisPipeline::new(
            Arc::new(RateLimiter::new(10, Duration::from_secs(60))),
            model,
            Duration::from_secs(25),
            "GOOGLE_API_KEY",
        )
    }

    fn body(json: Value) -> Vec<u8> {
        serde_json::to_vec(&json).unwrap()
    }

    const PNG: &str = "data:image/png;base64,iVBORw0KGgo=";

    #[tokio::test]
    async fn test_success_passes_payload_to_model() {
        let model = Arc::new(ScriptedModel::replying(
            r#"{"foods":[{"name":"salad","calories":120,"confidence":0.93}],"confidence":0.93}"#,
        ));
        let pipeline = pipeline(Some(model.clone() as Arc<dyn VisionModel>));

        let envelope = pipeline
            .handle("1.2.3.4", Ok(body(serde_json::json!({ "image": PNG, "sessionId": "abc-123" })).as_slice()))
            .await;

        assert!(envelope.success);
        let data = envelope.data.unwrap();
        assert_eq!(data.result.foods[0].name, "salad");
        assert_eq!(data.metadata.model, "scripted");

        let seen = model.seen.lock();
        assert_eq!(seen[0].mime_type, "image/png");
        assert_eq!(seen[0].data, "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn test_validation_errors() {
        let model: Arc<dyn VisionModel> = Arc::new(ScriptedModel::replying("{}"));
        let pipeline = pipeline(Some(model));

        let cases = [
            (b"not json".to_vec(), ErrorCode::InvalidImage),
            (body(serde_json::json!({})), ErrorCode::InvalidImage),
            (body(serde_json::json!({ "image": 12 })), ErrorCode::InvalidImage),
            (body(serde_json::json!({ "image": "data:image/png,abc" })), ErrorCode::InvalidImage),
            (body(serde_json::json!({ "image": PNG, "sessionId": "no spaces" })), ErrorCode::InvalidSession),
            (body(serde_json::json!({ "image": PNG, "sessionId": 7 })), ErrorCode::InvalidSession),
            (body(serde_json::json!({ "image": PNG, "sessionId": true })), ErrorCode::InvalidSession),
            (body(serde_json::json!([PNG, "abc"])), ErrorCode::InvalidImage),
            (body(serde_json::json!("data:image/png;base64,iVBORw0KGgo=")), ErrorCode::InvalidImage),
        ];

        for (payload, expected) in cases {
            let envelope = pipeline.handle("client", Ok(payload.as_slice())).await;
            let error = envelope.error.unwrap();
            assert_eq!(error.code, expected);
            assert!(!error.retryable);
        }

        for absent in [serde_json::json!(""), serde_json::json!(null), serde_json::json!(false), serde_json::json!(0)] {
            let envelope = pipeline
                .handle("second-client", Ok(body(serde_json::json!({ "image": PNG, "sessionId": absent })).as_slice()))
                .await;
            assert!(envelope.success, "{:?}", absent);
        }
    }

    #[tokio::test]
    async fn test_missing_credential_fails_closed() {
        let envelope = pipeline(None)
            .handle("client", Ok(body(serde_json::json!({ "image": PNG })).as_slice()))
            .await;

        let error = envelope.error.unwrap();
        assert_eq!(error.code, ErrorCode::ServiceConfigError);
        assert!(!error.retryable);
    }

    #[tokio::test]
    async fn test_model_failures_are_classified() {
        let rejected: Arc<dyn VisionModel> = Arc::new(ScriptedModel::failing(401));
        let envelope = pipeline(Some(rejected))
            .handle("client", Ok(body(serde_json::json!({ "image": PNG })).as_slice()))
            .await;
        assert_eq!(envelope.error.unwrap().code, ErrorCode::ServiceConfigError);

        let overloaded: Arc<dyn VisionModel> = Arc::new(ScriptedModel::failing(503));
        let envelope = pipeline(Some(overloaded))
            .handle("client", Ok(body(serde_json::json!({ "image": PNG })).as_slice()))
            .await;
        assert_eq!(envelope.error.unwrap().code, ErrorCode::UnknownError);
    }

    #[tokio::test]
    async fn test_rate_limit_checked_before_body() {
        let pipeline = AnalysisPipeline::new(
            Arc::new(RateLimiter::new(1, Duration::from_secs(60))),
            None,
            Duration::from_secs(25),
            "GOOGLE_API_KEY",
        );

        let first = pipeline.handle("client", Err(AnalysisError::ImageTooLarge)).await;
        assert_eq!(first.error.unwrap().code, ErrorCode::ImageTooLarge);

        let second = pipeline.handle("client", Err(AnalysisError::ImageTooLarge)).await;
        let error = second.error.unwrap();
        assert_eq!(error.code, ErrorCode::RateLimitExceeded);
        assert!(error.retryable);
    }

    #[tokio::test]
    async fn test_model_garbage_yields_empty_success() {
        let model: Arc<dyn VisionModel> = Arc::new(ScriptedModel::replying("Sorry, I can't help."));
        let envelope = pipeline(Some(model))
            .handle("client", Ok(body(serde_json::json!({ "image": PNG })).as_slice()))
            .await;

        assert!(envelope.success);
        assert_eq!(envelope.data.unwrap().result, AnalysisResult::empty());
    }
}
