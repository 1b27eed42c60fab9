//! Scripted roll actor
//!
//! Answers every roll request with real dice, standing in for a player at
//! the dice tray. Used by the CLI and by end-to-end tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{RollCoordinator, RollRequest, RollResult};
use crate::combat::{parse_dice, DiceError, RandomSource};

/// Rolls dice for every request published on a coordinator
pub struct AutoRoller {
    coordinator: Arc<RollCoordinator>,
    rng: Mutex<Box<dyn RandomSource>>,
    delay: Duration,
}

impl std::fmt::Debug for AutoRoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoRoller")
            .field("delay", &self.delay)
            .finish()
    }
}

impl AutoRoller {
    /// Create a roller answering requests on `coordinator`
    pub fn new(coordinator: Arc<RollCoordinator>, rng: Box<dyn RandomSource>) -> Self {
        Self {
            coordinator,
            rng: Mutex::new(rng),
            delay: Duration::ZERO,
        }
    }

    /// Wait this long before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Roll the dice a request asks for
    pub fn answer(&self, request: &RollRequest) -> Result<RollResult, DiceError> {
        let dice = parse_dice(&request.expression)?;
        let rolled = dice.roll(request.modifier, self.rng.lock().as_mut())?;
        let natural = match rolled.rolls.as_slice() {
            [only] if dice.sides == 20 => Some(*only),
            _ => None,
        };

        Ok(RollResult {
            id: request.id.clone(),
            total: rolled.total,
            rolls: rolled.rolls,
            natural,
        })
    }

    /// Start answering requests in the background.
    ///
    /// The subscription is taken before this returns, so no request
    /// published afterwards is missed.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let mut requests = self.coordinator.subscribe_requests();
        tokio::spawn(async move {
            loop {
                let request = match requests.recv().await {
                    Ok(request) => request,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Auto roller fell behind, skipped {} requests", skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };

                if !self.delay.is_zero() {
                    tokio::time::sleep(self.delay).await;
                }

                match self.answer(&request) {
                    Ok(result) => {
                        debug!("Auto roller answered {} with {}", request.id, result.total);
                        self.coordinator.resolve_roll(result);
                    }
                    Err(e) => warn!("Auto roller cannot roll {}: {}", request.id, e),
                }
            }
        })
    }
}
