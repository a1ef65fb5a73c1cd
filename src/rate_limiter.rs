//! Per-provider throttling of outbound model calls.
//!
//! Each provider gets one [`RateLimiter`] for the life of the process. The
//! limiter keeps the instants of the grants still inside the current window,
//! so the oldest grant marks where the window started and the length of the
//! log is the number of calls made in it. A caller that finds the log full
//! sleeps until the oldest grant ages out and tries again.
//!
//! Limits are tracked per process only. Two `ascii-gen` processes running at
//! the same time each get the full budget.

use crate::ai_client::Provider;
use crate::config::Config;
use crate::error::GenError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Maximum number of calls allowed in any window of the given length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub max_calls: u32,
    pub window: Duration,
}

/// Grants made within the trailing window.
#[derive(Debug, Default)]
struct RateWindow {
    grants: VecDeque<Instant>,
}

impl RateWindow {
    fn expire(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.grants.front() {
            if oldest + window <= now {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }
}

pub struct RateLimiter {
    limit: RateLimit,
    state: Mutex<RateWindow>,
}

impl RateLimiter {
    pub fn new(limit: RateLimit) -> Result<Self, GenError> {
        if limit.max_calls == 0 {
            return Err(GenError::Configuration(
                "rate limit max calls must be at least 1".to_string(),
            ));
        }
        if limit.window.is_zero() {
            return Err(GenError::Configuration(
                "rate limit window must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            limit,
            state: Mutex::new(RateWindow::default()),
        })
    }

    /// Take a slot if one is free, otherwise report how long until the oldest
    /// grant leaves the window.
    fn try_acquire(&self) -> Result<(), Duration> {
        let now = Instant::now();
        let mut window = self.state.lock().unwrap_or_else(|e| e.into_inner());
        window.expire(now, self.limit.window);

        if window.grants.len() < self.limit.max_calls as usize {
            window.grants.push_back(now);
            return Ok(());
        }

        // The log is full, so it is non-empty.
        let oldest = window.grants.front().copied().unwrap_or(now);
        Err((oldest + self.limit.window).saturating_duration_since(now))
    }

    /// Wait for a call slot and claim it. Returns how long the caller waited.
    ///
    /// Never fails. Each pass sleeps at most one window length; another waiter
    /// may claim the freed slot first, in which case the loop goes around again.
    pub async fn acquire(&self) -> Duration {
        let started = Instant::now();
        loop {
            match self.try_acquire() {
                Ok(()) => return started.elapsed(),
                Err(wait) => {
                    debug!("Rate limit reached, sleeping {:?}", wait);
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Slots still free in the current window.
    pub fn available(&self) -> u32 {
        let mut window = self.state.lock().unwrap_or_else(|e| e.into_inner());
        window.expire(Instant::now(), self.limit.window);
        self.limit.max_calls - window.grants.len() as u32
    }
}

/// The process-wide set of limiters, one per provider.
pub struct RateLimiters {
    limiters: HashMap<Provider, Arc<RateLimiter>>,
}

impl RateLimiters {
    pub fn from_config(config: &Config) -> Result<Self, GenError> {
        let mut limiters = HashMap::new();
        for provider in Provider::ALL {
            let limit = config.rate_limit_for(provider);
            limiters.insert(provider, Arc::new(RateLimiter::new(limit)?));
        }
        Ok(Self { limiters })
    }

    /// Use the same limit for every provider.
    pub fn uniform(limit: RateLimit) -> Result<Self, GenError> {
        let mut limiters = HashMap::new();
        for provider in Provider::ALL {
            limiters.insert(provider, Arc::new(RateLimiter::new(limit)?));
        }
        Ok(Self { limiters })
    }

    pub fn get(&self, provider: Provider) -> Arc<RateLimiter> {
        Arc::clone(&self.limiters[&provider])
    }

    pub async fn acquire(&self, provider: Provider) -> Duration {
        let waited = self.limiters[&provider].acquire().await;
        if !waited.is_zero() {
            info!("Waited {:?} for a {} rate-limit slot", waited, provider);
        }
        waited
    }
}
