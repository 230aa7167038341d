use std::time::{Duration, TryFromFloatSecsError};

use crate::config::{RangeFallback, RetryConfig};

/// High-level classification of an error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read stall).
    Timeout,
    /// Server asked us to slow down (429, 503).
    Throttled,
    /// Network-level failure (connection refused/reset, DNS, etc.).
    Connection,
    /// Retryable 5xx.
    Http5xx(u16),
    /// Body shorter than declared; bytes so far are valid.
    PrematureEnd,
    /// Server did not honour the range while resuming.
    RangeIgnored,
    /// Range, total or validators disagree with earlier segments.
    ServerInconsistency,
    /// More bytes than declared, or a final size mismatch.
    ProtocolViolation,
    /// Anything else (local I/O, bad request, 4xx, cancellation). Not retried.
    Other,
}

/// How the next attempt treats the bytes already on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Continue from the current on-disk offset.
    Resume,
    /// Truncate the output and start from offset zero.
    Restart,
    /// Stop without retrying.
    Abort,
}

impl ErrorKind {
    pub fn recovery(self) -> Recovery {
        match self {
            ErrorKind::Timeout
            | ErrorKind::Throttled
            | ErrorKind::Connection
            | ErrorKind::Http5xx(_)
            | ErrorKind::PrematureEnd => Recovery::Resume,
            ErrorKind::RangeIgnored
            | ErrorKind::ServerInconsistency
            | ErrorKind::ProtocolViolation => Recovery::Restart,
            ErrorKind::Other => Recovery::Abort,
        }
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry from the current offset after the given delay.
    ResumeAfter(Duration),
    /// Truncate, then retry from zero after the given delay.
    RestartAfter(Duration),
}

/// Pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySleep {
    Fixed(Duration),
    /// base * 2^(retry-1), capped at `max`.
    Backoff { base: Duration, max: Duration },
}

impl RetrySleep {
    /// Fails when `sleep_secs` is negative, NaN or too large for a `Duration`.
    pub fn from_config(cfg: &RetryConfig) -> Result<Self, TryFromFloatSecsError> {
        let base = Duration::try_from_secs_f64(cfg.sleep_secs)?;
        Ok(match cfg.backoff_max_secs {
            Some(max) => RetrySleep::Backoff {
                base,
                max: Duration::from_secs(max),
            },
            None => RetrySleep::Fixed(base),
        })
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match *self {
            RetrySleep::Fixed(d) => d,
            RetrySleep::Backoff { base, max } => {
                let exp = 1u32 << retry.saturating_sub(1).min(8);
                base.saturating_mul(exp).min(max)
            }
        }
    }
}

/// Retry budget and recovery rules for one transfer.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    pub sleep: RetrySleep,
    /// When false, transient failures restart from zero instead of resuming.
    pub resume: bool,
    pub range_fallback: RangeFallback,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            sleep: RetrySleep::Fixed(Duration::from_secs(1)),
            resume: true,
            range_fallback: RangeFallback::Restart,
        }
    }
}

impl RetryPolicy {
    /// Decide what follows a failure of attempt number `attempt` (1-based).
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        let recovery = match (kind, kind.recovery()) {
            (ErrorKind::RangeIgnored, _) if self.range_fallback == RangeFallback::Fail => {
                Recovery::Abort
            }
            (_, Recovery::Resume) if !self.resume => Recovery::Restart,
            (_, r) => r,
        };
        if recovery == Recovery::Abort || attempt > self.max_retries {
            return RetryDecision::NoRetry;
        }
        let delay = self.sleep.delay(attempt);
        match recovery {
            Recovery::Resume => RetryDecision::ResumeAfter(delay),
            _ => RetryDecision::RestartAfter(delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            sleep: RetrySleep::Fixed(Duration::from_millis(10)),
            ..RetryPolicy::default()
        }
    }

    #[test]
    fn no_retry_for_other() {
        assert_eq!(policy(5).decide(1, ErrorKind::Other), RetryDecision::NoRetry);
    }

    #[test]
    fn transient_kinds_resume() {
        let p = policy(5);
        for kind in [
            ErrorKind::Timeout,
            ErrorKind::Throttled,
            ErrorKind::Connection,
            ErrorKind::Http5xx(502),
            ErrorKind::PrematureEnd,
        ] {
            assert_eq!(
                p.decide(1, kind),
                RetryDecision::ResumeAfter(Duration::from_millis(10)),
                "{:?}",
                kind
            );
        }
    }

    #[test]
    fn inconsistency_kinds_restart() {
        let p = policy(5);
        for kind in [
            ErrorKind::RangeIgnored,
            ErrorKind::ServerInconsistency,
            ErrorKind::ProtocolViolation,
        ] {
            assert!(matches!(p.decide(1, kind), RetryDecision::RestartAfter(_)));
        }
    }

    #[test]
    fn respects_max_retries() {
        let p = policy(2);
        assert!(matches!(p.decide(1, ErrorKind::Timeout), RetryDecision::ResumeAfter(_)));
        assert!(matches!(p.decide(2, ErrorKind::Timeout), RetryDecision::ResumeAfter(_)));
        assert_eq!(p.decide(3, ErrorKind::Timeout), RetryDecision::NoRetry);
        assert_eq!(policy(0).decide(1, ErrorKind::Timeout), RetryDecision::NoRetry);
    }

    #[test]
    fn resume_disabled_turns_resume_into_restart() {
        let mut p = policy(3);
        p.resume = false;
        assert!(matches!(
            p.decide(1, ErrorKind::PrematureEnd),
            RetryDecision::RestartAfter(_)
        ));
    }

    #[test]
    fn range_fallback_fail_aborts() {
        let mut p = policy(3);
        p.range_fallback = RangeFallback::Fail;
        assert_eq!(p.decide(1, ErrorKind::RangeIgnored), RetryDecision::NoRetry);
        assert!(matches!(
            p.decide(1, ErrorKind::ServerInconsistency),
            RetryDecision::RestartAfter(_)
        ));
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let sleep = RetrySleep::Backoff {
            base: Duration::from_millis(250),
            max: Duration::from_secs(30),
        };
        assert_eq!(sleep.delay(1), Duration::from_millis(250));
        assert_eq!(sleep.delay(2), Duration::from_millis(500));
        assert!(sleep.delay(3) >= sleep.delay(2));
        assert_eq!(sleep.delay(20), Duration::from_secs(30));
    }

    #[test]
    fn sleep_from_config() {
        let fixed = RetrySleep::from_config(&RetryConfig {
            sleep_secs: 0.5,
            backoff_max_secs: None,
        })
        .unwrap();
        assert_eq!(fixed, RetrySleep::Fixed(Duration::from_millis(500)));
        let backoff = RetrySleep::from_config(&RetryConfig {
            sleep_secs: 1.0,
            backoff_max_secs: Some(8),
        })
        .unwrap();
        assert_eq!(backoff.delay(10), Duration::from_secs(8));
    }

    #[test]
    fn unrepresentable_sleep_is_rejected() {
        for sleep_secs in [1e30, f64::INFINITY, f64::NAN, -1.0] {
            let cfg = RetryConfig {
                sleep_secs,
                backoff_max_secs: None,
            };
            assert!(RetrySleep::from_config(&cfg).is_err(), "{}", sleep_secs);
        }
    }
}
