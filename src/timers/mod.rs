//! Pacing delays
//!
//! Monster turns and hit/miss reveals wait a moment so a player can follow
//! along. The waits are cosmetic: every pause can be cancelled, and a zero
//! delay completes without touching the timer wheel, so the engine behaves
//! the same with or without pacing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

/// Issues cancellable delays.
///
/// Each call to [`Pacer::cancel_all`] bumps a generation counter; every
/// pause in flight at that moment ends early and reports cancellation.
#[derive(Debug)]
pub struct Pacer {
    generation: watch::Sender<u64>,
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new()
    }
}

impl Pacer {
    /// Create a new pacer
    pub fn new() -> Self {
        let (generation, _) = watch::channel(0);
        Self { generation }
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Wait for `delay`. Returns false if cancelled before it elapsed.
    pub async fn pause(&self, delay: Duration) -> bool {
        if delay.is_zero() {
            return true;
        }

        let mut cancelled = self.generation.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = cancelled.changed() => {
                debug!("Pause of {:?} cancelled", delay);
                false
            }
        }
    }

    /// Cancel every pause currently waiting
    pub fn cancel_all(&self) {
        self.generation.send_modify(|g| *g += 1);
    }

    /// Number of cancellations so far
    pub fn generation(&self) -> u64 {
        *self.generation.borrow()
    }
}
