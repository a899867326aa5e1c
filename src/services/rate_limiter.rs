//! Rate limiter for sign-in attempts
//!
//! Tracks failed sign-ins per account email (5 per 15 minutes) and sign-in
//! requests per client address (10 per minute). State lives in memory only.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::RwLock;

use crate::models::normalize_email;

const EMAIL_LIMIT: usize = 5;
const IP_LIMIT: usize = 10;

fn email_window() -> Duration {
    Duration::minutes(15)
}

fn ip_window() -> Duration {
    Duration::minutes(1)
}

/// Sliding-window sign-in limiter
#[derive(Default)]
pub struct LoginRateLimiter {
    email_failures: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    ip_requests: RwLock<HashMap<IpAddr, Vec<DateTime<Utc>>>>,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the account has used up its failed attempts
    pub async fn is_email_limited(&self, email: &str) -> bool {
        let cutoff = Utc::now() - email_window();
        let mut failures = self.email_failures.write().await;
        match failures.get_mut(&normalize_email(email)) {
            Some(times) => {
                times.retain(|t| *t > cutoff);
                times.len() >= EMAIL_LIMIT
            }
            None => false,
        }
    }

    pub async fn record_failure(&self, email: &str) {
        self.email_failures
            .write()
            .await
            .entry(normalize_email(email))
            .or_default()
            .push(Utc::now());
    }

    /// Forget failures after a successful sign-in
    pub async fn clear_failures(&self, email: &str) {
        self.email_failures.write().await.remove(&normalize_email(email));
    }

    /// Record a sign-in request from `ip` and report whether it exceeds the limit
    pub async fn check_ip(&self, ip: IpAddr) -> bool {
        let now = Utc::now();
        let cutoff = now - ip_window();
        let mut requests = self.ip_requests.write().await;
        let times = requests.entry(ip).or_default();
        times.retain(|t| *t > cutoff);
        if times.len() >= IP_LIMIT {
            return true;
        }
        times.push(now);
        false
    }

    /// Drop expired entries. Run periodically from a background task.
    pub async fn cleanup(&self) {
        let now = Utc::now();
        let email_cutoff = now - email_window();
        let ip_cutoff = now - ip_window();

        self.email_failures.write().await.retain(|_, times| {
            times.retain(|t| *t > email_cutoff);
            !times.is_empty()
        });
        self.ip_requests.write().await.retain(|_, times| {
            times.retain(|t| *t > ip_cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> (usize, usize) {
        (
            self.email_failures.read().await.len(),
            self.ip_requests.read().await.len(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[tokio::test]
    async fn test_email_limit() {
        let limiter = LoginRateLimiter::new();

        for _ in 0..EMAIL_LIMIT - 1 {
            limiter.record_failure("ann@example.com").await;
        }
        assert!(!limiter.is_email_limited("ann@example.com").await);

        limiter.record_failure("ann@example.com").await;
        assert!(limiter.is_email_limited("ann@example.com").await);
        assert!(!limiter.is_email_limited("bob@example.com").await);

        limiter.clear_failures("ann@example.com").await;
        assert!(!limiter.is_email_limited("ann@example.com").await);
    }

    #[tokio::test]
    async fn test_email_keyed_like_accounts() {
        let limiter = LoginRateLimiter::new();
        for email in ["ann@Example.com", "ann@example.com", " ann@EXAMPLE.COM", "ann@example.COM", "ann@exAmple.com"] {
            limiter.record_failure(email).await;
        }
        assert!(limiter.is_email_limited("ann@example.com").await);

        // Local parts are case-sensitive, so Ann is a separate account
        assert!(!limiter.is_email_limited("Ann@example.com").await);
        limiter.clear_failures("Ann@example.com").await;
        assert!(limiter.is_email_limited("ann@example.com").await);
    }

    #[tokio::test]
    async fn test_ip_limit() {
        let limiter = LoginRateLimiter::new();
        let ip = IpAddr::from_str("10.0.0.7").unwrap();
        let other = IpAddr::from_str("10.0.0.8").unwrap();

        for _ in 0..IP_LIMIT {
            assert!(!limiter.check_ip(ip).await);
        }
        assert!(limiter.check_ip(ip).await);
        assert!(!limiter.check_ip(other).await);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_entries() {
        let limiter = LoginRateLimiter::new();
        limiter.record_failure("ann@example.com").await;
        limiter.check_ip(IpAddr::from_str("::1").unwrap()).await;

        limiter.cleanup().await;
        assert_eq!(limiter.tracked_keys().await, (1, 1));
    }
}
