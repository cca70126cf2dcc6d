//! Fixed-window rate limiting.
//!
//! # Design Decisions
//! - Fixed windows, not sliding: a counter per (address, category) key
//!   resets once the window has fully elapsed
//! - Auth endpoints get a strictly lower limit than general API traffic
//!   (brute-force risk is higher there)
//! - DashMap shards give per-key locking, so increment-then-compare is
//!   atomic per key under concurrent requests
//! - State is per-instance and ephemeral; expired windows are swept
//!   once the map reaches its key ceiling

use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::schema::RateLimitConfig;

/// Traffic category a request is limited under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateCategory {
    Api,
    Auth,
}

impl RateCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            RateCategory::Api => "api",
            RateCategory::Auth => "auth",
        }
    }
}

/// Composite limiter key: caller address plus category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    pub addr: IpAddr,
    pub category: RateCategory,
}

/// Counter state for one key's current window.
#[derive(Debug)]
struct WindowRecord {
    count: u32,
    window_started_at: Instant,
}

/// Outcome of a limiter check, with quota metadata for headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after: Duration,
}

/// Shared fixed-window rate limiter.
pub struct RateLimiter {
    windows: DashMap<RateLimitKey, WindowRecord>,
    config: RateLimitConfig,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let window = Duration::from_secs(config.window_secs);
        Self {
            windows: DashMap::new(),
            config,
            window,
        }
    }

    fn limit_for(&self, category: RateCategory) -> u32 {
        match category {
            RateCategory::Api => self.config.api_limit,
            RateCategory::Auth => self.config.auth_limit,
        }
    }

    /// Pick the category for a path, if the path is rate limited at all.
    /// Auth prefixes win over the broader API prefixes.
    pub fn categorize(&self, path: &str) -> Option<RateCategory> {
        if self.config.auth_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Some(RateCategory::Auth);
        }
        if self.config.api_prefixes.iter().any(|p| path.starts_with(p.as_str())) {
            return Some(RateCategory::Api);
        }
        None
    }

    /// Check and count one request against the caller's window.
    pub fn check(&self, addr: IpAddr, category: RateCategory) -> RateLimitDecision {
        self.check_at(addr, category, Instant::now())
    }

    /// Clock-injected variant of [`check`](Self::check).
    pub fn check_at(&self, addr: IpAddr, category: RateCategory, now: Instant) -> RateLimitDecision {
        let limit = self.limit_for(category);

        if !self.config.enabled {
            return RateLimitDecision {
                allowed: true,
                limit,
                remaining: limit,
                retry_after: self.window,
            };
        }

        if self.windows.len() >= self.config.max_keys {
            self.sweep(now);
        }

        let key = RateLimitKey { addr, category };
        // The entry guard holds the shard lock: reset-increment-compare
        // is atomic per key.
        let mut record = self.windows.entry(key).or_insert_with(|| WindowRecord {
            count: 0,
            window_started_at: now,
        });

        if now.duration_since(record.window_started_at) > self.window {
            record.count = 0;
            record.window_started_at = now;
        }
        record.count += 1;
        let count = record.count;
        drop(record);

        RateLimitDecision {
            allowed: count <= limit,
            limit,
            remaining: limit.saturating_sub(count),
            retry_after: self.window,
        }
    }

    /// Drop keys whose window has fully elapsed.
    fn sweep(&self, now: Instant) {
        let window = self.window;
        self.windows
            .retain(|_, record| now.duration_since(record.window_started_at) <= window);
    }

    /// Number of keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}
