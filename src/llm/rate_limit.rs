//! Per-model-family call caps.
//!
//! Hosted providers are metered, so their models get a conservative cap;
//! everything else (typically local Ollama models) gets a generous one.
//! When a cap is reached the caller waits for the window to free up.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// At most `max_calls` calls within any `window_secs` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub max_calls: u32,
    pub window_secs: u64,
}

impl RateLimit {
    pub const fn new(max_calls: u32, window_secs: u64) -> Self {
        Self {
            max_calls,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Lookup table from model-name prefix to its [`RateLimit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    /// Applied when no provider prefix matches.
    pub default: RateLimit,
    /// Model-name prefix -> limit. The longest matching prefix wins.
    pub providers: BTreeMap<String, RateLimit>,
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        let hosted = RateLimit::new(8, 60);
        Self {
            default: RateLimit::new(60, 60),
            providers: ["gemini", "openai", "gpt"]
                .into_iter()
                .map(|p| (p.to_string(), hosted))
                .collect(),
        }
    }
}

impl RateLimitPolicy {
    pub fn limit_for(&self, model: &str) -> RateLimit {
        self.providers
            .iter()
            .filter(|(prefix, _)| model.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, limit)| *limit)
            .unwrap_or(self.default)
    }

    pub fn validate(&self) -> Result<()> {
        let all = std::iter::once(("<default>", &self.default))
            .chain(self.providers.iter().map(|(p, l)| (p.as_str(), l)));
        for (name, limit) in all {
            if limit.max_calls == 0 || limit.window_secs == 0 {
                return Err(EvalError::Config(format!(
                    "rate limit for '{}' must allow at least one call per non-zero window",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Sliding-window throttle. [`RateLimiter::acquire`] waits instead of failing.
#[derive(Debug)]
pub struct RateLimiter {
    limit: RateLimit,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Self {
        Self {
            limit,
            calls: Mutex::new(VecDeque::with_capacity(limit.max_calls as usize)),
        }
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Reserve one call, sleeping until the window has room for it.
    pub async fn acquire(&self) {
        let window = self.limit.window();
        let mut calls = self.calls.lock().await;

        loop {
            let now = Instant::now();
            while calls
                .front()
                .is_some_and(|&t| now.duration_since(t) >= window)
            {
                calls.pop_front();
            }

            if calls.len() < self.limit.max_calls as usize {
                calls.push_back(now);
                return;
            }

            if let Some(&oldest) = calls.front() {
                let wake = oldest + window;
                tracing::debug!(
                    wait_ms = wake.saturating_duration_since(now).as_millis() as u64,
                    max_calls = self.limit.max_calls,
                    "rate limit reached, waiting"
                );
                tokio::time::sleep_until(wake).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_prefixes() {
        let policy = RateLimitPolicy::default();
        assert_eq!(policy.limit_for("gemini/gemini-2.0-flash").max_calls, 8);
        assert_eq!(policy.limit_for("openai/gpt-4o-mini").max_calls, 8);
        assert_eq!(policy.limit_for("gpt-4o").max_calls, 8);
        assert_eq!(policy.limit_for("ollama/qwen3:4b").max_calls, 60);
        assert_eq!(policy.limit_for("ollama/qwen3:4b").window_secs, 60);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let mut policy = RateLimitPolicy::default();
        policy
            .providers
            .insert("gemini/gemini-2.5-pro".to_string(), RateLimit::new(2, 60));
        assert_eq!(policy.limit_for("gemini/gemini-2.5-pro").max_calls, 2);
        assert_eq!(policy.limit_for("gemini/gemini-2.0-flash").max_calls, 8);
    }

    #[test]
    fn test_validate_rejects_zero() {
        let mut policy = RateLimitPolicy::default();
        assert!(policy.validate().is_ok());
        policy.default = RateLimit::new(0, 60);
        assert!(policy.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hosted_cap_delays_ninth_call() {
        let policy = RateLimitPolicy::default();
        let limiter = RateLimiter::new(policy.limit_for("gemini/gemini-2.0-flash"));
        let start = Instant::now();

        for _ in 0..8 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_ninth_call_not_delayed() {
        let policy = RateLimitPolicy::default();
        let limiter = RateLimiter::new(policy.limit_for("ollama/granite3.3:2b"));
        let start = Instant::now();

        for _ in 0..9 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_slides() {
        let limiter = RateLimiter::new(RateLimit::new(2, 10));
        let start = Instant::now();

        limiter.acquire().await;
        tokio::time::advance(Duration::from_secs(5)).await;
        limiter.acquire().await;

        // Third call waits for the first to age out at t=10s, not t=15s.
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10));
        assert!(elapsed < Duration::from_secs(15));
    }
}
