use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::services::RateLimiter;

/// Periodically evicts clients whose rate-limit window has fully expired,
/// so the limiter only holds recently active clients.
pub struct RateLimitReaper {
    limiter: Arc<RateLimiter>,
    interval: Duration,
    scheduler: JobScheduler,
}

impl RateLimitReaper {
    pub async fn new(limiter: Arc<RateLimiter>, interval: Duration) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            limiter,
            interval,
            scheduler,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let limiter = self.limiter.clone();

        let job = Job::new_repeated_async(self.interval, move |_uuid, _l| {
            let limiter = limiter.clone();

            Box::pin(async move {
                let evicted = limiter.prune_expired(Instant::now());
                if evicted > 0 {
                    log::debug!(
                        "🧹 Evicted {} idle clients, {} still tracked",
                        evicted,
                        limiter.tracked_clients()
                    );
                }
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        log::info!("✅ Rate limit reaper started (every {:?})", self.interval);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        log::info!("Rate limit reaper stopped");
        Ok(())
    }
}
