//! Configuration for reference-data access

use serde::{Deserialize, Serialize};

/// TTL behavior for the shared snapshot cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Seconds a cached snapshot list stays servable without revalidation
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_seconds: 300 }
    }
}

/// Bounded retry schedule for collaborator fetches. Repeated timeouts
/// surface as `UpstreamUnavailable` rather than retrying indefinitely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Per-fetch timeout budget
    pub fetch_timeout_ms: u64,
    /// Backoff before the second attempt; doubles each retry
    pub initial_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, fetch_timeout_ms: 2_000, initial_backoff_ms: 50 }
    }
}
