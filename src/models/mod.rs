use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Decoded `data:image/...;base64,...` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CookingMethod {
    Fried,
    Baked,
    Grilled,
    Steamed,
    Raw,
    Other(String),
}

impl From<String> for CookingMethod {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "fried" => CookingMethod::Fried,
            "baked" => CookingMethod::Baked,
            "grilled" => CookingMethod::Grilled,
            "steamed" => CookingMethod::Steamed,
            "raw" => CookingMethod::Raw,
            _ => CookingMethod::Other(s),
        }
    }
}

impl std::fmt::Display for CookingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CookingMethod::Fried => "fried",
            CookingMethod::Baked => "baked",
            CookingMethod::Grilled => "grilled",
            CookingMethod::Steamed => "steamed",
            CookingMethod::Raw => "raw",
            CookingMethod::Other(other) => other.as_str(),
        };
        write!(f, "{}", s)
    }
}

impl Serialize for CookingMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CookingMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(CookingMethod::from)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionInfo {
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub carbs: f64,
    #[serde(default)]
    pub fat: f64,
    #[serde(default)]
    pub fiber: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub calories: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cooking_method: Option<CookingMethod>,
    pub confidence: f64,
    pub portion_estimate: String,
    pub nutrition_info: NutritionInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub foods: Vec<FoodItem>,
    pub total_calories: f64,
    pub confidence: f64,
}

impl AnalysisResult {
    pub fn empty() -> Self {
        Self {
            foods: Vec::new(),
            total_calories: 0.0,
            confidence: 0.0,
        }
    }
}

/// Closed set of error codes returned to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    RateLimitExceeded,
    InvalidImage,
    InvalidSession,
    ImageTooLarge,
    AnalysisTimeout,
    ServiceConfigError,
    UnknownError,
}

impl ErrorCode {
    pub fn http_status(self) -> StatusCode {
        match self {
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::InvalidImage | ErrorCode::InvalidSession => StatusCode::BAD_REQUEST,
            ErrorCode::ImageTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::AnalysisTimeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::ServiceConfigError | ErrorCode::UnknownError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn retryable(self) -> bool {
        matches!(self, ErrorCode::RateLimitExceeded | ErrorCode::AnalysisTimeout)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::InvalidImage => "INVALID_IMAGE",
            ErrorCode::InvalidSession => "INVALID_SESSION",
            ErrorCode::ImageTooLarge => "IMAGE_TOO_LARGE",
            ErrorCode::AnalysisTimeout => "ANALYSIS_TIMEOUT",
            ErrorCode::ServiceConfigError => "SERVICE_CONFIG_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    pub timestamp: String,
    pub version: String,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model: String,
    pub timestamp: String,
    pub version: String,
}

/// `data` member of a successful envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisData {
    #[serde(flatten)]
    pub result: AnalysisResult,
    pub processing_time_ms: u64,
    pub metadata: ModelMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<AnalysisData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub metadata: ResponseMetadata,
}

impl ResponseEnvelope {
    pub fn http_status(&self) -> StatusCode {
        match &self.error {
            Some(error) => error.code.http_status(),
            None => StatusCode::OK,
        }
    }
}
