//! Shared clock abstraction for dependency injection.
//!
//! Cache entries carry a wall-clock creation timestamp and can expire by age.
//! Both are read through [`TimeProvider`] so tests can pin the clock instead
//! of sleeping. The rate limiter does not use this trait: it measures windows
//! on the monotonic tokio clock, which tests pause directly.

/// Trait for providing timestamps.
///
/// # Example
///
/// ```
/// use asciigen::providers::{TimeProvider, SystemTimeProvider};
///
/// let provider = SystemTimeProvider;
/// assert!(provider.now() > 0);
/// ```
pub trait TimeProvider: Send + Sync {
    /// Returns the current Unix timestamp in seconds.
    fn now(&self) -> u64;
}

/// Wall-clock time provider used outside of tests.
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A clock frozen at a fixed timestamp, adjustable by hand.
pub struct FixedTimeProvider {
    now: std::sync::atomic::AtomicU64,
}

impl FixedTimeProvider {
    pub fn new(now: u64) -> Self {
        Self {
            now: std::sync::atomic::AtomicU64::new(now),
        }
    }

    pub fn advance(&self, secs: u64) {
        self.now
            .fetch_add(secs, std::sync::atomic::Ordering::SeqCst);
    }
}

impl TimeProvider for FixedTimeProvider {
    fn now(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_provider_advances() {
        let clock = FixedTimeProvider::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(30);
        assert_eq!(clock.now(), 1_030);
    }
}
