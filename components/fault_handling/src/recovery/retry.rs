//! Bounded retry with exponential backoff and jitter

use super::{AttemptRecord, RecoveryContext, RecoveryOutcome, RecoveryStrategy};
use rand::Rng;
use std::time::{Duration, Instant};
use tracing::debug;

/// Backoff before `attempt` (1-based), without jitter.
///
/// The first attempt runs immediately; later ones wait `base * 2^(n-2)`,
/// capped at `max`.
///
/// # Examples
///
/// ```
/// use fault_handling::recovery::backoff_delay;
/// use std::time::Duration;
///
/// let base = Duration::from_millis(10);
/// let max = Duration::from_millis(50);
/// assert_eq!(backoff_delay(1, base, max), Duration::ZERO);
/// assert_eq!(backoff_delay(2, base, max), Duration::from_millis(10));
/// assert_eq!(backoff_delay(3, base, max), Duration::from_millis(20));
/// assert_eq!(backoff_delay(6, base, max), Duration::from_millis(50));
/// ```
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let factor = 1u32.checked_shl(attempt - 2).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

fn with_jitter(delay: Duration) -> Duration {
    let cap = delay.as_micros() as u64 / 4;
    if cap == 0 {
        return delay;
    }
    delay + Duration::from_micros(rand::thread_rng().gen_range(0..=cap))
}

/// Re-runs the request's operation until it succeeds or a budget runs out
///
/// Never makes more than `max_attempts` calls and never sleeps past the
/// deadline. On total failure the outcome carries the last attempt's message
/// verbatim and flags whether the deadline cut the attempts short.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryStrategy;

impl RecoveryStrategy for RetryStrategy {
    fn name(&self) -> &str {
        "retry"
    }

    fn recover(&self, ctx: &mut RecoveryContext<'_>) -> RecoveryOutcome {
        let started = Instant::now();
        if !ctx.has_operation() {
            return RecoveryOutcome {
                attempts: 0,
                ..RecoveryOutcome::failed(self.name(), "no operation to retry")
            };
        }

        let mut history = Vec::new();
        let mut last_message = String::from("no attempt made");
        let mut deadline_reached = false;
        for attempt in 1..=ctx.max_attempts {
            let delay = with_jitter(backoff_delay(attempt, ctx.base_backoff, ctx.max_backoff));
            if delay > ctx.remaining() {
                debug!(attempt, ?delay, "retry deadline reached");
                deadline_reached = true;
                break;
            }
            if !delay.is_zero() {
                std::thread::sleep(delay);
            }

            match ctx.run_operation() {
                Some(Ok(value)) => {
                    history.push(AttemptRecord {
                        attempt,
                        success: true,
                        message: "ok".to_string(),
                        delay,
                    });
                    return RecoveryOutcome {
                        strategy: self.name().to_string(),
                        success: true,
                        attempts: attempt,
                        elapsed: started.elapsed(),
                        message: format!("succeeded on attempt {}", attempt),
                        value: Some(value),
                        history,
                        deadline_reached: false,
                    };
                }
                Some(Err(message)) => {
                    debug!(attempt, %message, "retry attempt failed");
                    history.push(AttemptRecord {
                        attempt,
                        success: false,
                        message: message.clone(),
                        delay,
                    });
                    last_message = message;
                }
                None => break,
            }
        }

        RecoveryOutcome {
            strategy: self.name().to_string(),
            success: false,
            attempts: history.len() as u32,
            elapsed: started.elapsed(),
            message: last_message,
            value: None,
            history,
            deadline_reached,
        }
    }
}
