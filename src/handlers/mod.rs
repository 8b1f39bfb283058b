pub mod analysis;
pub mod decoder;
pub mod envelope;
pub mod normalizer;
pub mod reaper;
pub mod validation;

pub use analysis::{AnalysisError, AnalysisPipeline};
pub use reaper::RateLimitReaper;
