//! Single-value store for the current door state.

use super::door_state::{DoorState, DoorUpdate};
use chrono::Utc;
use parking_lot::RwLock;

/// Thread-safe holder of the one canonical [`DoorState`].
///
/// Every `set` replaces the whole value and refreshes `last_updated`.
/// Readers always get an owned copy.
pub struct StateStore {
    current: RwLock<DoorState>,
}

impl StateStore {
    /// Create a store holding the initial closed/clear state.
    pub fn new() -> Self {
        Self::with_state(DoorState::initial(Utc::now()))
    }

    pub fn with_state(state: DoorState) -> Self {
        Self {
            current: RwLock::new(state),
        }
    }

    /// Get a copy of the current state.
    pub fn get(&self) -> DoorState {
        self.current.read().clone()
    }

    /// Replace the current state and return the new canonical value.
    ///
    /// `last_updated` never goes backwards, even if the wall clock does.
    pub fn set(&self, update: DoorUpdate) -> DoorState {
        let mut current = self.current.write();
        let at = Utc::now().max(current.last_updated);
        *current = DoorState::from_update(update, at);
        current.clone()
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}
