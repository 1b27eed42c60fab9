//! Roll coordination between the engine and whoever rolls the dice
//!
//! The engine decides *that* a roll is needed; a roll actor (the player's
//! dice tray, or the scripted [`AutoRoller`]) performs it. The coordinator is
//! a single-slot mailbox for the outstanding request plus broadcast streams
//! of requests and results.

mod actor;

pub use actor::AutoRoller;

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::combat::PendingRollKind;

/// Default capacity of the request and result streams
pub const CHANNEL_CAPACITY: usize = 64;

/// Optional context attached to a request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollContext {
    pub kind: Option<PendingRollKind>,
    pub actor_id: Option<String>,
    pub target_id: Option<String>,
}

/// A request for the roll actor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRequest {
    /// Correlation id echoed back in the result
    pub id: String,
    pub label: String,
    /// Dice notation, e.g. "1d20"
    pub expression: String,
    /// Added to the dice total
    pub modifier: i32,
    #[serde(default)]
    pub context: RollContext,
}

/// What the roll actor rolled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollResult {
    /// Must match the request being answered
    pub id: String,
    pub total: i32,
    /// Individual die faces, in roll order
    pub rolls: Vec<u32>,
    /// Unmodified face of a single d20
    pub natural: Option<u32>,
}

impl RollResult {
    /// The unmodified primary face: `natural` if given, else the only die
    pub fn natural_face(&self) -> Option<u32> {
        self.natural.or(match self.rolls.as_slice() {
            [only] => Some(*only),
            _ => None,
        })
    }
}

/// Single-slot request/response channel
#[derive(Debug)]
pub struct RollCoordinator {
    pending: Mutex<Option<RollRequest>>,
    requests: broadcast::Sender<RollRequest>,
    results: broadcast::Sender<RollResult>,
}

impl Default for RollCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RollCoordinator {
    /// Create a coordinator with the default stream capacity
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    /// Create a coordinator whose streams hold `capacity` undelivered messages
    pub fn with_capacity(capacity: usize) -> Self {
        let (requests, _) = broadcast::channel(capacity);
        let (results, _) = broadcast::channel(capacity);
        Self {
            pending: Mutex::new(None),
            requests,
            results,
        }
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Publish a request, replacing any unconsumed one
    pub fn request_roll(&self, request: RollRequest) {
        let replaced = self.pending.lock().replace(request.clone());
        if let Some(old) = replaced {
            debug!("Roll request {} replaced unconsumed {}", request.id, old.id);
        }
        debug!(
            "Requesting roll {} ({} {:+})",
            request.id, request.expression, request.modifier
        );
        // No listeners is fine: the request stays readable through pending()
        let _ = self.requests.send(request);
    }

    /// Publish a result to every current subscriber and clear the slot
    pub fn resolve_roll(&self, result: RollResult) {
        debug!("Roll {} resolved with total {}", result.id, result.total);
        *self.pending.lock() = None;
        let _ = self.results.send(result);
    }

    /// Drop the outstanding request without answering it
    pub fn clear_pending(&self) {
        *self.pending.lock() = None;
    }

    /// The outstanding request, if any
    pub fn pending(&self) -> Option<RollRequest> {
        self.pending.lock().clone()
    }

    /// Stream of future requests
    pub fn subscribe_requests(&self) -> broadcast::Receiver<RollRequest> {
        self.requests.subscribe()
    }

    /// Stream of future results
    pub fn subscribe_results(&self) -> broadcast::Receiver<RollResult> {
        self.results.subscribe()
    }
}
