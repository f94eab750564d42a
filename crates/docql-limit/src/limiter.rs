//! Fixed-window counter.
//!
//! Each caller gets a window that opens on its first use and lasts
//! `window`. Uses within the window count against `limit`; the first use
//! after the window has elapsed opens a fresh one. Callers whose window
//! has lapsed are swept out at most once per window, so identities that
//! stop calling do not accumulate.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use docql_core::config::CompilerConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest `retry_after` ever reported, so a rejection never says "now".
const MIN_RETRY_AFTER: f64 = 0.001;

#[derive(Debug, Clone, Copy)]
struct WindowState {
    started: Instant,
    used: u32,
}

impl WindowState {
    fn fresh(now: Instant) -> Self {
        Self {
            started: now,
            used: 0,
        }
    }

    fn expired(&self, now: Instant, window: Duration) -> bool {
        now.duration_since(self.started) >= window
    }
}

/// Snapshot of one caller's usage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStats {
    pub limit: u32,
    /// Window length in seconds; sub-second windows keep their fraction.
    pub window: f64,
    pub used: u32,
    pub remaining: u32,
    /// Seconds until capacity frees up; 0 while capacity remains.
    pub retry_after: f64,
}

#[derive(Debug)]
struct Windows {
    callers: HashMap<String, WindowState>,
    last_sweep: Instant,
}

impl Windows {
    /// Drop lapsed callers once `window` has passed since the last sweep.
    fn sweep(&mut self, now: Instant, window: Duration) {
        if now.duration_since(self.last_sweep) < window {
            return;
        }
        self.callers.retain(|_, state| !state.expired(now, window));
        self.last_sweep = now;
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(Windows {
                callers: HashMap::new(),
                last_sweep: Instant::now(),
            }),
        }
    }

    pub fn from_config(cfg: &CompilerConfig) -> Result<Self> {
        if cfg.rate_limit == 0 {
            return Err(Error::Config("rate_limit must be > 0".into()));
        }
        if cfg.rate_window_secs == 0 {
            return Err(Error::Config("rate_window_secs must be > 0".into()));
        }
        Ok(Self::new(
            cfg.rate_limit,
            Duration::from_secs(cfg.rate_window_secs),
        ))
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record one use for `caller`, or fail if the window is exhausted.
    pub fn check(&self, caller: &str) -> Result<()> {
        let now = Instant::now();
        let mut windows = self.lock();
        windows.sweep(now, self.window);
        let state = windows
            .callers
            .entry(caller.to_string())
            .or_insert_with(|| WindowState::fresh(now));
        if state.expired(now, self.window) {
            *state = WindowState::fresh(now);
        }
        if state.used >= self.limit {
            let retry_after = self.retry_after(state, now);
            #[cfg(feature = "tracing")]
            tracing::debug!(caller, limit = self.limit, retry_after, "rate limit hit");
            return Err(Error::RateLimitExceeded {
                limit: self.limit,
                window: self.window.as_secs_f64(),
                retry_after,
            });
        }
        state.used += 1;
        Ok(())
    }

    pub fn remaining(&self, caller: &str) -> u32 {
        self.stats(caller).remaining
    }

    pub fn available(&self, caller: &str) -> bool {
        self.remaining(caller) > 0
    }

    /// Current usage for `caller`. Does not record a use.
    pub fn stats(&self, caller: &str) -> RateLimitStats {
        let now = Instant::now();
        let windows = self.lock();
        let used = windows
            .callers
            .get(caller)
            .filter(|s| !s.expired(now, self.window))
            .map(|s| s.used)
            .unwrap_or(0);
        let remaining = self.limit.saturating_sub(used);
        let retry_after = match windows.callers.get(caller) {
            Some(state) if remaining == 0 => self.retry_after(state, now),
            _ => 0.0,
        };
        RateLimitStats {
            limit: self.limit,
            window: self.window.as_secs_f64(),
            used,
            remaining,
            retry_after,
        }
    }

    /// Forget all recorded usage.
    pub fn reset(&self) {
        self.lock().callers.clear();
    }

    pub fn reset_caller(&self, caller: &str) {
        self.lock().callers.remove(caller);
    }

    /// Callers currently holding window state.
    pub fn tracked_callers(&self) -> usize {
        self.lock().callers.len()
    }

    fn retry_after(&self, state: &WindowState, now: Instant) -> f64 {
        let elapsed = now.duration_since(state.started);
        let left = self.window.saturating_sub(elapsed).as_secs_f64();
        left.max(MIN_RETRY_AFTER)
    }

    fn lock(&self) -> MutexGuard<'_, Windows> {
        // Counters stay consistent even if a holder panicked: every update
        // is a single field write.
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callers_are_independent() {
        let rl = RateLimiter::new(1, Duration::from_secs(60));
        rl.check("a").unwrap();
        rl.check("b").unwrap();
        assert!(rl.check("a").is_err());
        assert_eq!(rl.remaining("b"), 0);
        assert_eq!(rl.remaining("c"), 1);
    }

    #[test]
    fn window_expiry_reopens_capacity() {
        let rl = RateLimiter::new(1, Duration::from_millis(20));
        rl.check("a").unwrap();
        assert!(rl.check("a").is_err());
        std::thread::sleep(Duration::from_millis(40));
        assert!(rl.available("a"));
        rl.check("a").unwrap();
    }

    #[test]
    fn zero_limit_config_is_rejected() {
        let cfg = CompilerConfig {
            rate_limit: 0,
            ..CompilerConfig::default()
        };
        assert!(matches!(RateLimiter::from_config(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn lapsed_callers_are_swept() {
        let rl = RateLimiter::new(5, Duration::from_millis(1));
        for i in 0..1000 {
            rl.check(&format!("caller-{}", i)).unwrap();
        }
        std::thread::sleep(Duration::from_millis(20));
        rl.check("late").unwrap();
        assert_eq!(rl.tracked_callers(), 1);
    }

    #[test]
    fn sub_second_window_is_reported_exactly() {
        let rl = RateLimiter::new(1, Duration::from_millis(250));
        rl.check("a").unwrap();
        match rl.check("a") {
            Err(Error::RateLimitExceeded { window, retry_after, .. }) => {
                assert_eq!(window, 0.25);
                assert!(retry_after > 0.0 && retry_after <= 0.25);
            }
            other => panic!("expected rate limit error, got {:?}", other),
        }
        assert_eq!(rl.stats("a").window, 0.25);
    }
}
