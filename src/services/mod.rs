pub mod gemini; // Google Gemini (default provider)
pub mod openrouter; // OpenRouter, OpenAI-compatible
pub mod rate_limiter;
pub mod vision;

pub use gemini::GeminiClient;
pub use openrouter::OpenRouterClient;
pub use rate_limiter::RateLimiter;
pub use vision::{ModelSettings, VisionModel};
