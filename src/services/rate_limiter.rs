use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-client request cap over a trailing window.
///
/// Each identity keeps the instants of its admitted requests. Entries older
/// than the window are dropped whenever that identity is checked, and
/// [`RateLimiter::prune_expired`] evicts identities whose whole window has
/// lapsed. The map sits behind one mutex and no lock is held across an
/// `.await`, so a check and a sweep never interleave.
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Vec<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn check_rate_limit(&self, client_id: &str) -> bool {
        self.check_rate_limit_at(client_id, Instant::now())
    }

    /// Admits (and records) a request at `now`, or rejects it without recording.
    pub fn check_rate_limit_at(&self, client_id: &str, now: Instant) -> bool {
        let mut windows = self.windows.lock();
        let requests = windows.entry(client_id.to_string()).or_default();

        requests.retain(|&t| !Self::expired(t, now, self.window));

        if requests.len() >= self.max_requests {
            log::warn!(
                "🚦 Rate limit hit for {} ({} requests in {:?})",
                client_id,
                requests.len(),
                self.window
            );
            return false;
        }

        requests.push(now);
        log::debug!("✅ Admitted {} ({}/{})", client_id, requests.len(), self.max_requests);
        true
    }

    /// Drops stale entries everywhere and evicts identities left empty.
    /// Returns the number of evicted identities.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock();
        let before = windows.len();

        windows.retain(|_, requests| {
            requests.retain(|&t| !Self::expired(t, now, self.window));
            !requests.is_empty()
        });

        before - windows.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.lock().len()
    }

    fn expired(at: Instant, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(at) >= window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eleventh_request_rejected() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        for i in 0..10 {
            assert!(limiter.check_rate_limit_at("10.0.0.1", start + Duration::from_secs(i)));
        }
        assert!(!limiter.check_rate_limit_at("10.0.0.1", start + Duration::from_secs(30)));

        // other identities are independent
        assert!(limiter.check_rate_limit_at("10.0.0.2", start + Duration::from_secs(30)));
    }

    #[test]
    fn test_admitted_again_after_window() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        for _ in 0..10 {
            assert!(limiter.check_rate_limit_at("client", start));
        }
        assert!(!limiter.check_rate_limit_at("client", start + Duration::from_secs(59)));
        assert!(limiter.check_rate_limit_at("client", start + Duration::from_secs(61)));
    }

    #[test]
    fn test_rejection_is_not_recorded() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(limiter.check_rate_limit_at("client", start));
        assert!(limiter.check_rate_limit_at("client", start + Duration::from_secs(10)));
        for s in 11..50 {
            assert!(!limiter.check_rate_limit_at("client", start + Duration::from_secs(s)));
        }
        // only the first admission has aged out
        assert!(limiter.check_rate_limit_at("client", start + Duration::from_secs(61)));
        assert!(!limiter.check_rate_limit_at("client", start + Duration::from_secs(62)));
    }

    #[test]
    fn test_prune_evicts_only_fully_expired() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_rate_limit_at("idle", start);
        limiter.check_rate_limit_at("active", start);
        limiter.check_rate_limit_at("active", start + Duration::from_secs(45));
        assert_eq!(limiter.tracked_clients(), 2);

        let evicted = limiter.prune_expired(start + Duration::from_secs(70));
        assert_eq!(evicted, 1);
        assert_eq!(limiter.tracked_clients(), 1);

        assert_eq!(limiter.prune_expired(start + Duration::from_secs(120)), 1);
        assert_eq!(limiter.tracked_clients(), 0);
    }
}
