//! Reconnect policy decisions
//!
//! Pure decision logic over (attempts so far, time since last
//! attempt). The loop applies the decision; nothing here sleeps.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the loop schedules connect attempts while the broker is down.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum RetryPolicy {
    /// Fixed delay between attempts; exhausting the budget is a
    /// permanent failure.
    Bounded { max_attempts: u32, delay_ms: u64 },
    /// Fire-and-continue: a failed attempt is retried on the next
    /// scheduled check, without blocking unrelated telemetry cycles.
    Continuous,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Continuous
    }
}

/// Outcome of a retry-policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Attempt a connect now.
    Attempt,
    /// Delay not yet elapsed; check again later.
    Wait { remaining: Duration },
    /// Attempt budget exhausted.
    GiveUp,
}

impl RetryPolicy {
    /// Decide whether a connect attempt is due.
    ///
    /// `attempts` counts failures since the last successful connect;
    /// `since_last` is the time since the previous attempt, `None` when
    /// no attempt has been made yet.
    pub fn decide(&self, attempts: u32, since_last: Option<Duration>) -> RetryDecision {
        match *self {
            RetryPolicy::Continuous => RetryDecision::Attempt,
            RetryPolicy::Bounded {
                max_attempts,
                delay_ms,
            } => {
                if attempts >= max_attempts {
                    return RetryDecision::GiveUp;
                }
                let delay = Duration::from_millis(delay_ms);
                match since_last {
                    Some(elapsed) if elapsed < delay => RetryDecision::Wait {
                        remaining: delay - elapsed,
                    },
                    _ => RetryDecision::Attempt,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continuous_always_attempts() {
        let policy = RetryPolicy::Continuous;
        assert_eq!(policy.decide(0, None), RetryDecision::Attempt);
        assert_eq!(
            policy.decide(1_000, Some(Duration::ZERO)),
            RetryDecision::Attempt
        );
    }

    #[test]
    fn test_bounded_waits_for_fixed_delay() {
        let policy = RetryPolicy::Bounded {
            max_attempts: 3,
            delay_ms: 500,
        };
        assert_eq!(policy.decide(1, None), RetryDecision::Attempt);
        assert_eq!(
            policy.decide(1, Some(Duration::from_millis(200))),
            RetryDecision::Wait {
                remaining: Duration::from_millis(300)
            }
        );
        assert_eq!(
            policy.decide(1, Some(Duration::from_millis(500))),
            RetryDecision::Attempt
        );
    }

    #[test]
    fn test_bounded_gives_up_after_budget() {
        let policy = RetryPolicy::Bounded {
            max_attempts: 3,
            delay_ms: 500,
        };
        assert_eq!(policy.decide(2, Some(Duration::from_secs(1))), RetryDecision::Attempt);
        assert_eq!(policy.decide(3, Some(Duration::from_secs(1))), RetryDecision::GiveUp);
        assert_eq!(policy.decide(4, None), RetryDecision::GiveUp);
    }

    #[test]
    fn test_policy_deserializes_from_config() {
        let bounded: RetryPolicy =
            toml::from_str("mode = \"bounded\"\nmax_attempts = 30\ndelay_ms = 500\n").unwrap();
        assert_eq!(
            bounded,
            RetryPolicy::Bounded {
                max_attempts: 30,
                delay_ms: 500
            }
        );
        let continuous: RetryPolicy = toml::from_str("mode = \"continuous\"\n").unwrap();
        assert_eq!(continuous, RetryPolicy::Continuous);
    }
}
