//! Sliding-window limiter keyed by actor identity.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::warn;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    /// Sessions one actor may open per window.
    pub max_sessions: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_sessions: 10,
        }
    }
}

/// Idle actors are swept from the map once every this many checks.
const SWEEP_INTERVAL: usize = 64;

/// Allows at most `max` events per actor within any `window`.
#[derive(Debug)]
pub struct SlidingWindowLimiter {
    window: Duration,
    max: usize,
    hits: Mutex<HashMap<String, VecDeque<Instant>>>,
    checks: AtomicUsize,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            window: Duration::from_secs(config.window_secs),
            max: config.max_sessions,
            hits: Mutex::new(HashMap::new()),
            checks: AtomicUsize::new(0),
        }
    }

    /// Record an event for `actor`, or fail if the window is full.
    pub fn check(&self, actor: &str) -> Result<()> {
        self.check_at(actor, Instant::now())
    }

    /// Same as [`check`](Self::check) with an explicit clock reading.
    pub fn check_at(&self, actor: &str, now: Instant) -> Result<()> {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_INTERVAL == SWEEP_INTERVAL - 1 {
            Self::sweep(&mut hits, now, self.window);
        }
        let entries = hits.entry(actor.to_string()).or_default();
        Self::prune(entries, now, self.window);

        if entries.len() >= self.max {
            let retry_after = entries
                .front()
                .map(|oldest| self.window.saturating_sub(now.saturating_duration_since(*oldest)))
                .unwrap_or(self.window);
            warn!(
                actor,
                limit = self.max,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return Err(EngineError::RateLimited {
                actor: actor.to_string(),
                retry_after_ms: retry_after.as_millis() as u64,
            });
        }

        entries.push_back(now);
        Ok(())
    }

    /// Events still available to `actor` in the current window.
    pub fn remaining(&self, actor: &str) -> usize {
        self.remaining_at(actor, Instant::now())
    }

    pub fn remaining_at(&self, actor: &str, now: Instant) -> usize {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        match hits.get_mut(actor) {
            Some(entries) => {
                Self::prune(entries, now, self.window);
                self.max.saturating_sub(entries.len())
            }
            None => self.max,
        }
    }

    /// Drop actors with no events inside the window.
    pub fn purge_idle(&self) {
        self.purge_idle_at(Instant::now());
    }

    pub fn purge_idle_at(&self, now: Instant) {
        let mut hits = self.hits.lock().unwrap_or_else(PoisonError::into_inner);
        Self::sweep(&mut hits, now, self.window);
    }

    /// Actors currently holding window state.
    pub fn tracked_actors(&self) -> usize {
        self.hits.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn sweep(hits: &mut HashMap<String, VecDeque<Instant>>, now: Instant, window: Duration) {
        hits.retain(|_, entries| {
            Self::prune(entries, now, window);
            !entries.is_empty()
        });
    }

    fn prune(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(oldest) = entries.front() {
            if now.saturating_duration_since(*oldest) >= window {
                entries.pop_front();
            } else {
                break;
            }
        }
    }
}
