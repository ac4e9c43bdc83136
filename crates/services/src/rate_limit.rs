//! # Rate Limiter
//!
//! Fixed-window request counters keyed by a composite identity string
//! (e.g. `click:203.0.113.7:<page>:<block>`).
//!
//! Counters live in a sharded `DashMap`; the read-check-increment for one key
//! happens while holding that key's shard lock, so two concurrent callers can
//! never both observe `count < max` for the last free slot.
//!
//! State is process-local and starts from zero on restart.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use domains::Clock;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A request budget per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub max_requests: u32,
    pub window: Duration,
}

impl Quota {
    /// Page views per caller and page.
    pub const VIEWS: Quota = Quota { max_requests: 100, window: Duration::from_secs(60) };
    /// Block clicks per caller, page and block.
    pub const CLICKS: Quota = Quota { max_requests: 50, window: Duration::from_secs(60) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Counter {
    count: u32,
    reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    counters: DashMap<String, Counter>,
    clock: Arc<dyn Clock>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            clock,
            sweeper: Mutex::new(None),
        }
    }

    /// Builds a limiter and starts its background sweep on the current
    /// tokio runtime. The sweep stops when the limiter is dropped.
    pub fn start(clock: Arc<dyn Clock>, sweep_every: Duration) -> Arc<Self> {
        let limiter = Arc::new(Self::new(clock));
        let handle = tokio::spawn(sweep_loop(Arc::downgrade(&limiter), sweep_every));
        *limiter.sweeper.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
        limiter
    }

    /// Counts one request against `key`.
    ///
    /// Denied calls do not increment, so hammering a closed window does not
    /// push `reset_at` further out. A `max_requests` of zero denies everything.
    pub fn check(&self, key: &str, max_requests: u32, window: Duration) -> RateLimitDecision {
        let now = self.clock.now();
        let window_end = window_end(now, window);

        if max_requests == 0 {
            return RateLimitDecision { allowed: false, remaining: 0, reset_at: window_end };
        }

        let mut counter = self
            .counters
            .entry(key.to_owned())
            .or_insert_with(|| Counter { count: 0, reset_at: now });

        if counter.count == 0 || now >= counter.reset_at {
            counter.count = 1;
            counter.reset_at = window_end;
            return RateLimitDecision {
                allowed: true,
                remaining: max_requests - 1,
                reset_at: counter.reset_at,
            };
        }

        if counter.count < max_requests {
            counter.count += 1;
            RateLimitDecision {
                allowed: true,
                remaining: max_requests - counter.count,
                reset_at: counter.reset_at,
            }
        } else {
            RateLimitDecision { allowed: false, remaining: 0, reset_at: counter.reset_at }
        }
    }

    pub fn check_quota(&self, key: &str, quota: Quota) -> RateLimitDecision {
        self.check(key, quota.max_requests, quota.window)
    }

    /// Drops every counter whose window has closed. Returns how many went.
    ///
    /// `retain` locks one shard at a time, so ingestion on other shards keeps
    /// flowing while a sweep runs.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut removed = 0;
        self.counters.retain(|_, counter| {
            let live = counter.reset_at > now;
            if !live {
                removed += 1;
            }
            live
        });
        removed
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().ok().and_then(Option::take) {
            handle.abort();
        }
    }
}

fn window_end(now: DateTime<Utc>, window: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(window)
        .ok()
        .and_then(|w| now.checked_add_signed(w))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

async fn sweep_loop(limiter: Weak<RateLimiter>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // The first tick fires immediately; nothing can have expired yet.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        let Some(limiter) = limiter.upgrade() else { break };
        let removed = limiter.sweep();
        if removed > 0 {
            tracing::debug!(removed, remaining = limiter.len(), "swept expired rate-limit counters");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domains::ManualClock;

    fn limiter() -> (Arc<ManualClock>, RateLimiter) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (clock.clone(), RateLimiter::new(clock))
    }

    #[test]
    fn fixed_window_counts_down_then_denies() {
        let (clock, limiter) = limiter();
        let window = Duration::from_millis(1000);

        let first = limiter.check("k", 3, window);
        assert!(first.allowed);
        assert_eq!(first.remaining, 2);
        assert_eq!(first.reset_at, clock.now() + TimeDelta::milliseconds(1000));

        clock.advance(TimeDelta::milliseconds(100));
        let second = limiter.check("k", 3, window);
        assert_eq!((second.allowed, second.remaining), (true, 1));

        let third = limiter.check("k", 3, window);
        assert_eq!((third.allowed, third.remaining), (true, 0));

        let fourth = limiter.check("k", 3, window);
        assert!(!fourth.allowed);
        assert_eq!(fourth.remaining, 0);
        assert_eq!(fourth.reset_at, first.reset_at);
    }

    #[test]
    fn denied_calls_do_not_extend_the_window() {
        let (clock, limiter) = limiter();
        let window = Duration::from_secs(1);
        let first = limiter.check("k", 1, window);
        for _ in 0..10 {
            clock.advance(TimeDelta::milliseconds(50));
            let denied = limiter.check("k", 1, window);
            assert!(!denied.allowed);
            assert_eq!(denied.reset_at, first.reset_at);
        }
    }

    #[test]
    fn window_expiry_resets_the_count() {
        let (clock, limiter) = limiter();
        let window = Duration::from_millis(1000);
        for _ in 0..4 {
            limiter.check("k", 3, window);
        }
        clock.advance(TimeDelta::milliseconds(1000));
        let fresh = limiter.check("k", 3, window);
        assert!(fresh.allowed);
        assert_eq!(fresh.remaining, 2);
        assert_eq!(fresh.reset_at, clock.now() + TimeDelta::milliseconds(1000));
    }

    #[test]
    fn keys_are_independent() {
        let (_, limiter) = limiter();
        assert!(limiter.check("a", 1, Duration::from_secs(60)).allowed);
        assert!(!limiter.check("a", 1, Duration::from_secs(60)).allowed);
        assert!(limiter.check("b", 1, Duration::from_secs(60)).allowed);
    }

    #[test]
    fn zero_quota_denies() {
        let (_, limiter) = limiter();
        assert!(!limiter.check("k", 0, Duration::from_secs(1)).allowed);
        assert!(limiter.is_empty());
    }

    #[test]
    fn sweep_only_drops_expired_windows() {
        let (clock, limiter) = limiter();
        limiter.check("short", 5, Duration::from_secs(1));
        limiter.check("long", 5, Duration::from_secs(60));
        clock.advance(TimeDelta::seconds(2));

        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.len(), 1);
        assert_eq!(limiter.check("long", 5, Duration::from_secs(60)).remaining, 3);
    }

    #[test]
    fn concurrent_callers_never_exceed_the_quota() {
        let (_, limiter) = limiter();
        let limiter = Arc::new(limiter);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..10)
                        .filter(|_| limiter.check("hot", 25, Duration::from_secs(60)).allowed)
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 25);
    }

    #[tokio::test(start_paused = true)]
    async fn background_sweep_evicts_expired_keys() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let limiter = RateLimiter::start(clock.clone(), Duration::from_secs(30));
        limiter.check("k", 5, Duration::from_secs(1));
        clock.advance(TimeDelta::seconds(5));

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;
        assert!(limiter.is_empty());
    }
}
