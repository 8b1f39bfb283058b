mod config;
mod handlers;
mod models;
mod server;
mod services;

use anyhow::Result;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

use config::{AppConfig, ModelProvider};
use handlers::{AnalysisPipeline, RateLimitReaper};
use server::create_router;
use services::{GeminiClient, OpenRouterClient, RateLimiter, VisionModel};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init();

    // Load environment variables
    dotenv().ok();

    log::info!("🚀 Starting CalorieSnap analysis server...");

    let config = AppConfig::from_env()?;

    let http = reqwest::Client::new();
    let model: Option<Arc<dyn VisionModel>> = match config.api_key.clone() {
        Some(api_key) => {
            let model: Arc<dyn VisionModel> = match config.provider {
                ModelProvider::Gemini => {
                    Arc::new(GeminiClient::new(api_key, config.model.clone(), http))
                }
                ModelProvider::OpenRouter => {
                    Arc::new(OpenRouterClient::new(api_key, config.model.clone(), http))
                }
            };
            log::info!(
                "✅ {:?} vision model initialized: {}",
                config.provider,
                config.model.model_id
            );
            Some(model)
        }
        None => {
            log::warn!(
                "⚠️ {} not set, every analysis will fail with SERVICE_CONFIG_ERROR",
                config.api_key_var()
            );
            None
        }
    };

    let limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window,
    ));
    log::info!(
        "✅ Rate limiter initialized: {} requests / {:?}",
        config.rate_limit_max_requests,
        config.rate_limit_window
    );

    let mut reaper = RateLimitReaper::new(limiter.clone(), config.rate_limit_sweep_interval).await?;
    reaper.start().await?;

    let pipeline = AnalysisPipeline::new(
        limiter,
        model,
        config.analysis_timeout,
        config.api_key_var(),
    );
    let app = create_router(pipeline);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    log::info!("🌐 Listening on {}", config.bind_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("❌ Failed to listen for shutdown signal: {}", e);
        }
    })
    .await?;

    log::info!("🛑 Shutting down...");
    reaper.stop().await?;

    Ok(())
}
