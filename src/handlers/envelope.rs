use chrono::{SecondsFormat, Utc};
use std::time::Instant;

use crate::config::API_VERSION;
use crate::handlers::analysis::AnalysisError;
use crate::models::{AnalysisData, AnalysisResult, ModelMetadata, ResponseEnvelope, ResponseMetadata};

/// Wraps a request's outcome with timing and version metadata.
pub struct EnvelopeBuilder {
    started: Instant,
}

impl EnvelopeBuilder {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub fn success(&self, result: AnalysisResult, model_id: &str) -> ResponseEnvelope {
        let processing_time_ms = self.elapsed_ms();
        let timestamp = iso_timestamp();

        ResponseEnvelope {
            success: true,
            data: Some(AnalysisData {
                result,
                processing_time_ms,
                metadata: ModelMetadata {
                    model: model_id.to_string(),
                    timestamp: timestamp.clone(),
                    version: API_VERSION.to_string(),
                },
            }),
            error: None,
            metadata: ResponseMetadata {
                timestamp,
                version: API_VERSION.to_string(),
                processing_time_ms,
            },
        }
    }

    pub fn failure(&self, error: &AnalysisError) -> ResponseEnvelope {
        ResponseEnvelope {
            success: false,
            data: None,
            error: Some(error.info()),
            metadata: ResponseMetadata {
                timestamp: iso_timestamp(),
                version: API_VERSION.to_string(),
                processing_time_ms: self.elapsed_ms(),
            },
        }
    }
}

fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
