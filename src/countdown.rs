//! Deadline countdown: clock predicate, label formatting, and the per-auction
//! ticker that drives live countdown displays.
//!
//! The predicate and formatter are pure functions of an explicit `now` so the
//! whole module stays deterministic under test; only `CountdownTicker` reads
//! the wall clock.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Label shown once an auction is past its deadline.
pub const ENDED_LABEL: &str = "Finalizada";

/// Whether bidding is still open by the clock. Independent from the on-chain
/// status field, which only flips when a completing transaction lands.
pub fn is_active(deadline: i64, now: i64) -> bool {
    now < deadline
}

/// Human-readable time left until `deadline`, floor-truncated.
///
/// Shows the largest nonzero unit pair: `3d 4h 5m`, `4h 5m`, `5m 6s` or `6s`.
/// At or past the deadline the label is always [`ENDED_LABEL`].
pub fn format_remaining(deadline: i64, now: i64) -> String {
    let remaining = deadline - now;
    if remaining <= 0 {
        return ENDED_LABEL.to_string();
    }

    let days = remaining / 86_400;
    let hours = (remaining % 86_400) / 3_600;
    let minutes = (remaining % 3_600) / 60;
    let seconds = remaining % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// One countdown tick for a displayed auction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownUpdate {
    pub label: String,
    pub is_active: bool,
}

/// Cancellable once-per-second countdown task for a single auction.
///
/// Owned by whatever is displaying the auction: spawn one per displayed
/// deadline identity, drop it on teardown. The task stops itself once the
/// deadline passes, so finished auctions never accumulate timers.
pub struct CountdownTicker {
    rx: watch::Receiver<CountdownUpdate>,
    handle: JoinHandle<()>,
}

impl CountdownTicker {
    pub fn spawn(deadline: i64) -> Self {
        let now = Utc::now().timestamp();
        let (tx, rx) = watch::channel(CountdownUpdate {
            label: format_remaining(deadline, now),
            is_active: is_active(deadline, now),
        });

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // First tick completes immediately; it re-publishes the initial state.
            loop {
                ticker.tick().await;
                let now = Utc::now().timestamp();
                let active = is_active(deadline, now);
                let update = CountdownUpdate {
                    label: format_remaining(deadline, now),
                    is_active: active,
                };
                if tx.send(update).is_err() {
                    // Every subscriber is gone.
                    break;
                }
                if !active {
                    break;
                }
            }
        });

        Self { rx, handle }
    }

    /// Channel of countdown updates; always carries the latest tick.
    pub fn subscribe(&self) -> watch::Receiver<CountdownUpdate> {
        self.rx.clone()
    }

    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for CountdownTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
