//! Interrupt handling for the loader binary
//!
//! The first interrupt cancels the run before its next batch. A second one
//! means the user wants out now, even with a batch in flight.

use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// What the interrupt watcher saw before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The signal source failed before any interrupt arrived
    Unavailable,
    /// One interrupt arrived and `cancel` was triggered
    Cancelled,
    /// A second interrupt arrived after cancellation
    ForceExit,
}

/// Cancel `cancel` on the first interrupt and report a second one.
///
/// `next_interrupt` resolves once per interrupt, e.g. `tokio::signal::ctrl_c`.
pub async fn watch_interrupts<F, Fut>(mut next_interrupt: F, cancel: CancellationToken) -> Interrupt
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<()>>,
{
    if next_interrupt().await.is_err() {
        return Interrupt::Unavailable;
    }

    warn!("Interrupt received; stopping after the current batch (press Ctrl-C again to exit now)");
    cancel.cancel();

    match next_interrupt().await {
        Ok(()) => Interrupt::ForceExit,
        Err(_) => Interrupt::Cancelled,
    }
}
