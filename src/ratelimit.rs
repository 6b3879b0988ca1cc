//! Sliding-window limiter for the AI tutor, keyed by user id.
//!
//! Each key keeps the instants of its accepted requests inside the window;
//! a request is allowed while fewer than `max_requests` remain.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct RateLimiter {
  window: Duration,
  max_requests: usize,
  entries: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitResult {
  pub allowed: bool,
  pub limit: usize,
  pub remaining: usize,
  /// Time until the oldest request leaves the window.
  pub reset_after: Duration,
}

impl RateLimiter {
  pub fn new(window: Duration, max_requests: usize) -> Self {
    Self { window, max_requests, entries: Arc::new(Mutex::new(HashMap::new())) }
  }

  pub async fn check(&self, key: &str) -> RateLimitResult {
    self.check_at(key, Instant::now()).await
  }

  pub async fn check_at(&self, key: &str, now: Instant) -> RateLimitResult {
    let mut map = self.entries.lock().await;
    let hits = map.entry(key.to_string()).or_default();

    while let Some(&oldest) = hits.front() {
      if now.saturating_duration_since(oldest) >= self.window {
        hits.pop_front();
      } else {
        break;
      }
    }

    let allowed = hits.len() < self.max_requests;
    if allowed {
      hits.push_back(now);
    }

    let reset_after = hits
      .front()
      .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
      .unwrap_or_default();

    RateLimitResult {
      allowed,
      limit: self.max_requests,
      remaining: self.max_requests.saturating_sub(hits.len()),
      reset_after,
    }
  }

  /// Drop keys with no requests left in the window.
  pub async fn cleanup(&self) {
    let now = Instant::now();
    let mut map = self.entries.lock().await;
    map.retain(|_, hits| hits.back().is_some_and(|last| now.saturating_duration_since(*last) < self.window));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn within_limit_is_allowed() {
    let limiter = RateLimiter::new(Duration::from_secs(60), 2);
    assert!(limiter.check("u1").await.allowed);
    let second = limiter.check("u1").await;
    assert!(second.allowed);
    assert_eq!(second.remaining, 0);
    assert!(!limiter.check("u1").await.allowed);
    assert!(limiter.check("u2").await.allowed);
  }

  #[tokio::test]
  async fn window_slides_per_request() {
    let limiter = RateLimiter::new(Duration::from_secs(10), 2);
    let t0 = Instant::now();
    assert!(limiter.check_at("u", t0).await.allowed);
    assert!(limiter.check_at("u", t0 + Duration::from_secs(6)).await.allowed);

    let blocked = limiter.check_at("u", t0 + Duration::from_secs(9)).await;
    assert!(!blocked.allowed);
    assert_eq!(blocked.reset_after, Duration::from_secs(1));

    // the first hit has left the window, the second has not
    assert!(limiter.check_at("u", t0 + Duration::from_secs(10)).await.allowed);
    assert!(!limiter.check_at("u", t0 + Duration::from_secs(11)).await.allowed);
  }

  #[tokio::test]
  async fn cleanup_keeps_recent_keys() {
    let limiter = RateLimiter::new(Duration::from_secs(60), 1);
    limiter.check("recent").await;
    limiter.cleanup().await;
    assert!(!limiter.check("recent").await.allowed);
  }
}
