use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Rate limiter configuration for the HTTP ingestion surface
pub struct RateLimiterConfig {
    /// Maximum requests per minute
    pub requests_per_minute: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 100,
        }
    }
}

/// Global rate limiter
pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Create a new rate limiter for HTTP requests
pub fn create_rate_limiter(config: RateLimiterConfig) -> GlobalRateLimiter {
    let quota = Quota::per_minute(nonzero(config.requests_per_minute));
    Arc::new(RateLimiter::direct(quota))
}

/// Create a pacing limiter that allows `jobs` starts per `window`.
///
/// Used by the queue worker, which awaits `until_ready` before every job,
/// so the processing rate never exceeds the venue-friendly budget.
pub fn create_pacing_limiter(jobs: u32, window: Duration) -> GlobalRateLimiter {
    let jobs = nonzero(jobs);
    let period = window / jobs.get();
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(jobs))
        .allow_burst(jobs);
    Arc::new(RateLimiter::direct(quota))
}

fn nonzero(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n.max(1)).unwrap_or(NonZeroU32::MIN)
}

/// Middleware to apply rate limiting
pub async fn rate_limit_middleware(
    limiter: GlobalRateLimiter,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!("Rate limit exceeded");
            (
                StatusCode::TOO_MANY_REQUESTS,
                "Rate limit exceeded. Please try again later.",
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limiter_creation() {
        let config = RateLimiterConfig {
            requests_per_minute: 50,
        };
        let limiter = create_rate_limiter(config);

        assert!(limiter.check().is_ok());
    }

    #[test]
    fn test_pacing_limiter_allows_full_burst() {
        let limiter = create_pacing_limiter(10, Duration::from_secs(10));
        for _ in 0..10 {
            assert!(limiter.check().is_ok());
        }
        assert!(limiter.check().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.requests_per_minute, 100);
    }
}
