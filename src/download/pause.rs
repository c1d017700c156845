//! Cancellable sleeps for backoff and pacing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// How often a sleeping task re-checks the interrupt flag.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Sleeps for `duration` unless `interrupted` becomes true first.
///
/// Returns `true` when the full duration elapsed and `false` when the sleep
/// was cut short by an interruption (or the flag was already set).
pub async fn sleep_unless_interrupted(duration: Duration, interrupted: &AtomicBool) -> bool {
    if interrupted.load(Ordering::SeqCst) {
        return false;
    }
    if duration.is_zero() {
        return true;
    }

    let deadline = tokio::time::Instant::now().checked_add(duration);
    loop {
        let now = tokio::time::Instant::now();
        let remaining = match deadline {
            Some(deadline) if deadline <= now => return true,
            Some(deadline) => deadline - now,
            None => INTERRUPT_POLL_INTERVAL,
        };
        tokio::time::sleep(remaining.min(INTERRUPT_POLL_INTERVAL)).await;
        if interrupted.load(Ordering::SeqCst) {
            return false;
        }
    }
}
