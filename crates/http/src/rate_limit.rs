//! Per-client rate limiting with a token bucket.
//!
//! Every client IP owns a bucket holding up to `burst` tokens that refills at
//! `requests_per_minute / 60` tokens per second. Each request takes one token;
//! an empty bucket answers `429 Too Many Requests` with `Retry-After`.
//! Requests without a known peer address share one bucket. Buckets idle long
//! enough to be full again are swept out during regular checks.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use bookstore_kernel::settings::RateLimitSettings;

use crate::error::AppError;

const FALLBACK_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_rate: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_rate: f64) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }

    /// Takes one token, or returns the number of seconds until one is available.
    fn take(&mut self, now: Instant) -> Result<u64, u64> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(self.tokens.floor() as u64)
        } else if self.refill_rate <= 0.0 {
            Err(60)
        } else {
            let missing = 1.0 - self.tokens;
            Err(((missing / self.refill_rate).ceil() as u64).max(1))
        }
    }
}

/// Number of checks between sweeps of idle buckets.
const PURGE_EVERY: u64 = 1024;

/// Idle window used when buckets never refill.
const NO_REFILL_IDLE: Duration = Duration::from_secs(3600);

/// Shared limiter state; cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<IpAddr, TokenBucket>>,
    checks: Arc<AtomicU64>,
    requests_per_minute: u32,
    burst: u32,
    /// A bucket untouched this long is full again and can be forgotten.
    idle_after: Duration,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let burst = burst.max(1);
        let idle_after = if requests_per_minute == 0 {
            NO_REFILL_IDLE
        } else {
            Duration::from_secs_f64(f64::from(burst) * 60.0 / f64::from(requests_per_minute))
        };
        Self {
            buckets: Arc::new(DashMap::new()),
            checks: Arc::new(AtomicU64::new(0)),
            requests_per_minute,
            burst,
            idle_after,
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(settings.requests_per_minute, settings.burst)
    }

    /// Consume a token for `client`; `Ok` carries the tokens left, `Err` the
    /// seconds to wait. Every `PURGE_EVERY` checks, idle buckets are dropped
    /// first.
    pub fn check(&self, client: IpAddr) -> Result<u64, AppError> {
        if self.checks.fetch_add(1, Ordering::Relaxed) % PURGE_EVERY == PURGE_EVERY - 1 {
            self.purge_idle(self.idle_after);
        }

        let refill_rate = f64::from(self.requests_per_minute) / 60.0;
        let mut bucket = self
            .buckets
            .entry(client)
            .or_insert_with(|| TokenBucket::new(f64::from(self.burst), refill_rate));
        bucket.take(Instant::now()).map_err(AppError::rate_limited)
    }

    /// Drop buckets idle for at least `max_idle`.
    fn purge_idle(&self, max_idle: Duration) {
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| bucket.last_refill.elapsed() < max_idle);
        tracing::debug!(
            dropped = before.saturating_sub(self.buckets.len()),
            "purged idle rate limit buckets"
        );
    }
}

/// Axum middleware enforcing the limiter; install with
/// `axum::middleware::from_fn_with_state`.
pub async fn enforce(State(limiter): State<RateLimiter>, req: Request, next: Next) -> Response {
    let client = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(FALLBACK_CLIENT);

    match limiter.check(client) {
        Ok(remaining) => {
            let mut response = next.run(req).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.burst));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Err(err) => {
            tracing::debug!(client = %client, "rate limit exceeded");
            err.into_response()
        }
    }
}
