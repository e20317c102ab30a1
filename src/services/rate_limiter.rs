//! In-memory rate limiting
//!
//! Sliding-window counters keyed by identifier or client IP:
//! - Failed logins per identifier (5 attempts per 15 minutes)
//! - Login requests per IP address (10 requests per minute)
//! - Public lead forms per IP address (10 submissions per minute)
//!
//! State is per process and lost on restart.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-key list of hit timestamps within a trailing window
pub struct SlidingWindow<K> {
    limit: usize,
    window: Duration,
    hits: Arc<RwLock<HashMap<K, Vec<DateTime<Utc>>>>>,
}

impl<K> SlidingWindow<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new(limit: usize, window: Duration) -> Self {
        Self {
            limit,
            window,
            hits: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Whether `key` has reached the limit within the window ending now
    pub async fn is_limited(&self, key: &K) -> bool {
        self.is_limited_at(key, Utc::now()).await
    }

    pub async fn is_limited_at(&self, key: &K, now: DateTime<Utc>) -> bool {
        let mut hits = self.hits.write().await;
        let cutoff = now - self.window;

        match hits.get_mut(key) {
            Some(times) => {
                times.retain(|time| *time > cutoff);
                times.len() >= self.limit
            }
            None => false,
        }
    }

    /// Seconds until the oldest hit leaves the window, if `key` is limited
    pub async fn retry_after(&self, key: &K) -> Option<i64> {
        self.retry_after_at(key, Utc::now()).await
    }

    pub async fn retry_after_at(&self, key: &K, now: DateTime<Utc>) -> Option<i64> {
        let mut hits = self.hits.write().await;
        let cutoff = now - self.window;
        let times = hits.get_mut(key)?;
        times.retain(|time| *time > cutoff);

        if times.len() < self.limit {
            return None;
        }
        let oldest = times.iter().min()?;
        Some(((*oldest + self.window) - now).num_seconds().max(1))
    }

    pub async fn record(&self, key: K) {
        self.record_at(key, Utc::now()).await;
    }

    pub async fn record_at(&self, key: K, now: DateTime<Utc>) {
        let mut hits = self.hits.write().await;
        hits.entry(key).or_default().push(now);
    }

    /// Check and record in one step.
    ///
    /// Returns `Err(retry_after_seconds)` without recording when limited.
    pub async fn hit(&self, key: K) -> Result<(), i64> {
        self.hit_at(key, Utc::now()).await
    }

    pub async fn hit_at(&self, key: K, now: DateTime<Utc>) -> Result<(), i64> {
        if let Some(retry_after) = self.retry_after_at(&key, now).await {
            return Err(retry_after);
        }
        self.record_at(key, now).await;
        Ok(())
    }

    pub async fn clear(&self, key: &K) {
        self.hits.write().await.remove(key);
    }

    /// Drop expired hits and keys left empty (called periodically)
    pub async fn cleanup(&self) {
        self.cleanup_at(Utc::now()).await;
    }

    pub async fn cleanup_at(&self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        let mut hits = self.hits.write().await;
        hits.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    /// Number of keys currently holding state
    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

/// Login throttle: failed attempts per identifier and requests per IP
pub struct LoginRateLimiter {
    identifiers: SlidingWindow<String>,
    ips: SlidingWindow<IpAddr>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self {
            identifiers: SlidingWindow::new(5, Duration::minutes(15)),
            ips: SlidingWindow::new(10, Duration::minutes(1)),
        }
    }

    fn key(identifier: &str) -> String {
        identifier.trim().to_lowercase()
    }

    /// Seconds to wait if the identifier has too many recent failures
    pub async fn identifier_retry_after(&self, identifier: &str) -> Option<i64> {
        self.identifiers.retry_after(&Self::key(identifier)).await
    }

    pub async fn is_identifier_limited(&self, identifier: &str) -> bool {
        self.identifiers.is_limited(&Self::key(identifier)).await
    }

    pub async fn record_failed_attempt(&self, identifier: &str) {
        self.identifiers.record(Self::key(identifier)).await;
    }

    /// Forget failures after a successful login
    pub async fn clear_identifier(&self, identifier: &str) {
        self.identifiers.clear(&Self::key(identifier)).await;
    }

    /// Count a login request from `ip`; `Err(retry_after)` when over the limit
    pub async fn hit_ip(&self, ip: IpAddr) -> Result<(), i64> {
        self.ips.hit(ip).await
    }

    pub async fn is_ip_limited(&self, ip: IpAddr) -> bool {
        self.ips.is_limited(&ip).await
    }

    pub async fn cleanup(&self) {
        self.identifiers.cleanup().await;
        self.ips.cleanup().await;
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Limiter shared by the public contact and quote forms
pub fn lead_limiter() -> SlidingWindow<IpAddr> {
    SlidingWindow::new(10, Duration::minutes(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_identifier_rate_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..4 {
            assert!(!limiter.is_identifier_limited("user@kitchentech.sa").await);
            limiter.record_failed_attempt("user@kitchentech.sa").await;
        }

        limiter.record_failed_attempt("user@kitchentech.sa").await;
        assert!(limiter.is_identifier_limited("user@kitchentech.sa").await);
        let retry = limiter
            .identifier_retry_after("user@kitchentech.sa")
            .await
            .expect("should be limited");
        assert!(retry > 0 && retry <= 15 * 60);

        limiter.clear_identifier("user@kitchentech.sa").await;
        assert!(!limiter.is_identifier_limited("user@kitchentech.sa").await);
    }

    #[tokio::test]
    async fn test_ip_rate_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("127.0.0.1").unwrap();

        for _ in 0..10 {
            assert!(limiter.hit_ip(ip).await.is_ok());
        }
        assert!(limiter.is_ip_limited(ip).await);
        assert!(limiter.hit_ip(ip).await.is_err());

        let other = IpAddr::from_str("10.0.0.2").unwrap();
        assert!(limiter.hit_ip(other).await.is_ok());
    }

    #[tokio::test]
    async fn test_case_insensitive_identifier() {
        let limiter = LoginRateLimiter::new();

        limiter.record_failed_attempt("User@KT.sa").await;
        limiter.record_failed_attempt("user@kt.sa").await;
        limiter.record_failed_attempt(" USER@KT.SA ").await;

        assert!(!limiter.is_identifier_limited("user@kt.sa").await);
        limiter.record_failed_attempt("user@kt.sa").await;
        limiter.record_failed_attempt("user@kt.sa").await;
        assert!(limiter.is_identifier_limited("User@Kt.Sa").await);
    }

    #[tokio::test]
    async fn test_window_slides() {
        let window = SlidingWindow::new(2, Duration::minutes(1));
        let start = Utc::now();

        assert!(window.hit_at("ip", start).await.is_ok());
        assert!(window.hit_at("ip", start + Duration::seconds(10)).await.is_ok());

        let retry = window
            .hit_at("ip", start + Duration::seconds(20))
            .await
            .unwrap_err();
        assert_eq!(retry, 40);

        assert!(window.hit_at("ip", start + Duration::seconds(61)).await.is_ok());
    }

    #[tokio::test]
    async fn test_cleanup_drops_empty_keys() {
        let window = SlidingWindow::new(3, Duration::minutes(1));
        let start = Utc::now();
        window.record_at("a", start).await;
        window.record_at("b", start + Duration::seconds(50)).await;
        assert_eq!(window.tracked_keys().await, 2);

        window.cleanup_at(start + Duration::seconds(70)).await;
        assert_eq!(window.tracked_keys().await, 1);

        window.cleanup_at(start + Duration::seconds(200)).await;
        assert_eq!(window.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn test_lead_limiter_defaults() {
        let limiter = lead_limiter();
        let ip = IpAddr::from_str("192.168.1.9").unwrap();
        assert_eq!(limiter.limit(), 10);
        for _ in 0..10 {
            limiter.hit(ip).await.unwrap();
        }
        assert!(limiter.retry_after(&ip).await.is_some());
    }
}
