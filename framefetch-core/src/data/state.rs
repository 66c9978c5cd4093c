//! Engine lifecycle state shared by the consumer and the producer task

use parking_lot::Mutex;
use tracing::debug;

use crate::error::FetchError;

/// Lifecycle of a prefetch engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Setup,
    Running,
    Stopping,
    Stopped,
}

/// State and terminal error visible to both sides
#[derive(Debug)]
pub struct EngineShared {
    state: Mutex<EngineState>,
    terminal: Mutex<Option<FetchError>>,
}

impl EngineShared {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EngineState::Idle),
            terminal: Mutex::new(None),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    pub fn set_state(&self, next: EngineState) {
        let mut state = self.state.lock();
        debug!("Engine state {:?} -> {:?}", *state, next);
        *state = next;
    }

    /// Move from `from` to `to`; returns false if the state was different
    pub fn transition(&self, from: EngineState, to: EngineState) -> bool {
        let mut state = self.state.lock();
        if *state != from {
            return false;
        }
        debug!("Engine state {:?} -> {:?}", from, to);
        *state = to;
        true
    }

    /// Record the error that ended the producer and mark the engine
    /// stopped; the first error wins
    pub fn fail(&self, err: FetchError) {
        // Hold the state lock across both writes so a reader that sees the
        // error also sees Stopped
        let mut state = self.state.lock();
        let mut terminal = self.terminal.lock();
        if terminal.is_none() {
            *terminal = Some(err);
        }
        *state = EngineState::Stopped;
    }

    pub fn terminal(&self) -> Option<FetchError> {
        self.terminal.lock().clone()
    }
}

impl Default for EngineShared {
    fn default() -> Self {
        Self::new()
    }
}
