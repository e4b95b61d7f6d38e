use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

const MINUTE: Duration = Duration::from_secs(60);
const HOUR: Duration = Duration::from_secs(3600);
const BURST_WINDOW: Duration = Duration::from_secs(10);

/// Per-client request allowances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimits {
    /// Requests allowed in any sliding minute.
    #[serde(default = "default_per_minute")]
    pub requests_per_minute: u32,
    /// Requests allowed in any sliding hour.
    #[serde(default = "default_per_hour")]
    pub requests_per_hour: u32,
    /// Requests allowed in any 10-second window.
    #[serde(default = "default_burst")]
    pub burst_size: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            requests_per_minute: default_per_minute(),
            requests_per_hour: default_per_hour(),
            burst_size: default_burst(),
        }
    }
}

fn default_per_minute() -> u32 {
    60
}
fn default_per_hour() -> u32 {
    1000
}
fn default_burst() -> u32 {
    10
}

/// The window a rejected request exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitWindow {
    /// Sliding minute.
    Minute,
    /// Sliding hour.
    Hour,
    /// Last 10 seconds.
    Burst,
}

impl LimitWindow {
    /// How long the client should wait before retrying.
    pub fn retry_after(self) -> Duration {
        match self {
            Self::Minute => MINUTE,
            Self::Hour => HOUR,
            Self::Burst => BURST_WINDOW,
        }
    }

    /// Message returned to the client.
    pub fn detail(self) -> &'static str {
        match self {
            Self::Minute => "Rate limit exceeded. Too many requests per minute.",
            Self::Hour => "Rate limit exceeded. Too many requests per hour.",
            Self::Burst => "Rate limit exceeded. Too many requests in a short time.",
        }
    }
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The request was counted.
    Allowed {
        /// Requests left in the current minute.
        remaining_minute: u32,
        /// Requests left in the current hour.
        remaining_hour: u32,
    },
    /// The request was rejected and not counted.
    Limited(LimitWindow),
}

/// Sliding-window rate limiter per client key.
///
/// Each client keeps the timestamps of its accepted requests from the last
/// hour; the minute and burst windows are counted from the newest end.
pub struct RateLimiter {
    limits: RateLimits,
    clients: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    /// Limiter enforcing `limits` for every client.
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Configured allowances.
    pub fn limits(&self) -> RateLimits {
        self.limits
    }

    /// Count one request for `key` if every window still has room.
    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let mut clients = self.clients.lock();
        let log = clients.entry(key.to_string()).or_default();
        prune(log, now);

        let within = |window: Duration| {
            log.iter()
                .rev()
                .take_while(|t| now.duration_since(**t) < window)
                .count() as u32
        };
        let minute = within(MINUTE);
        let hour = log.len() as u32;

        if minute >= self.limits.requests_per_minute {
            return RateDecision::Limited(LimitWindow::Minute);
        }
        if hour >= self.limits.requests_per_hour {
            return RateDecision::Limited(LimitWindow::Hour);
        }
        if within(BURST_WINDOW) >= self.limits.burst_size {
            return RateDecision::Limited(LimitWindow::Burst);
        }

        log.push_back(now);
        RateDecision::Allowed {
            remaining_minute: self.limits.requests_per_minute - minute - 1,
            remaining_hour: self.limits.requests_per_hour - hour - 1,
        }
    }

    /// Forget requests older than an hour and clients with none left.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let mut clients = self.clients.lock();
        clients.retain(|_, log| {
            prune(log, now);
            !log.is_empty()
        });
    }

    /// Clients with at least one request in the last hour.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().len()
    }
}

fn prune(log: &mut VecDeque<Instant>, now: Instant) {
    while log.front().is_some_and(|t| now.duration_since(*t) >= HOUR) {
        log.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(per_minute: u32, per_hour: u32, burst: u32) -> RateLimiter {
        RateLimiter::new(RateLimits {
            requests_per_minute: per_minute,
            requests_per_hour: per_hour,
            burst_size: burst,
        })
    }

    #[test]
    fn test_burst_window_resets_after_ten_seconds() {
        let limiter = limiter(60, 1000, 3);
        let start = Instant::now();
        for _ in 0..3 {
            assert!(matches!(limiter.check_at("a", start), RateDecision::Allowed { .. }));
        }
        assert_eq!(
            limiter.check_at("a", start),
            RateDecision::Limited(LimitWindow::Burst)
        );
        // Other clients have their own windows.
        assert!(matches!(limiter.check_at("b", start), RateDecision::Allowed { .. }));

        let later = start + Duration::from_secs(11);
        assert_eq!(
            limiter.check_at("a", later),
            RateDecision::Allowed {
                remaining_minute: 56,
                remaining_hour: 996,
            }
        );
    }

    #[test]
    fn test_minute_limit_checked_before_burst() {
        let limiter = limiter(2, 1000, 2);
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("a", start);
        let limited = limiter.check_at("a", start);
        assert_eq!(limited, RateDecision::Limited(LimitWindow::Minute));
        assert_eq!(LimitWindow::Minute.retry_after(), Duration::from_secs(60));
        assert!(matches!(
            limiter.check_at("a", start + Duration::from_secs(61)),
            RateDecision::Allowed { .. }
        ));
    }

    #[test]
    fn test_hour_limit_spans_minutes() {
        let limiter = limiter(60, 3, 10);
        let start = Instant::now();
        for i in 0..3 {
            let at = start + Duration::from_secs(120 * i);
            assert!(matches!(limiter.check_at("a", at), RateDecision::Allowed { .. }));
        }
        let at = start + Duration::from_secs(600);
        assert_eq!(limiter.check_at("a", at), RateDecision::Limited(LimitWindow::Hour));
        let after_hour = start + Duration::from_secs(3601);
        assert!(matches!(limiter.check_at("a", after_hour), RateDecision::Allowed { .. }));
    }

    #[test]
    fn test_rejected_requests_are_not_counted() {
        let limiter = limiter(60, 1000, 1);
        let start = Instant::now();
        limiter.check_at("a", start);
        for _ in 0..5 {
            limiter.check_at("a", start);
        }
        assert_eq!(limiter.clients.lock()["a"].len(), 1);
    }

    #[test]
    fn test_cleanup_drops_expired_clients() {
        let limiter = limiter(60, 1000, 10);
        let start = Instant::now();
        limiter.check_at("a", start);
        limiter.check_at("b", start + Duration::from_secs(1800));
        assert_eq!(limiter.tracked_clients(), 2);
        limiter.cleanup_at(start + Duration::from_secs(3600));
        assert_eq!(limiter.tracked_clients(), 1);
    }
}
