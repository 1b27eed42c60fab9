//! Narrative session tracking
//!
//! The combat engine only ever tells the story layer one thing: where to go
//! when a fight ends.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

/// Narrative collaborator
pub trait Narrative: Send + Sync {
    /// Move the adventure to `node_id`
    fn go_to_node(&self, node_id: &str);
}

/// In-memory session: which adventure is being played and where
#[derive(Debug, Default)]
pub struct NodeTracker {
    adventure_id: RwLock<Option<String>>,
    current: RwLock<Option<String>>,
    history: RwLock<Vec<String>>,
}

impl NodeTracker {
    /// Create an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a shared instance
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Begin an adventure at its start node
    pub fn start(&self, adventure_id: &str, start_node_id: &str) {
        *self.adventure_id.write() = Some(adventure_id.to_string());
        *self.current.write() = Some(start_node_id.to_string());
        self.history.write().push(start_node_id.to_string());
    }

    /// The adventure being played
    pub fn adventure_id(&self) -> Option<String> {
        self.adventure_id.read().clone()
    }

    /// The node the player is on
    pub fn current_node(&self) -> Option<String> {
        self.current.read().clone()
    }

    /// Every node visited, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.read().clone()
    }

    /// Forget the session
    pub fn reset(&self) {
        *self.adventure_id.write() = None;
        *self.current.write() = None;
        self.history.write().clear();
    }
}

impl Narrative for NodeTracker {
    fn go_to_node(&self, node_id: &str) {
        info!("Moving to node {}", node_id);
        *self.current.write() = Some(node_id.to_string());
        self.history.write().push(node_id.to_string());
    }
}
