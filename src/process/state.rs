//! The lifecycle FSM's state word.
//!
//! Readable lock-free via an atomic load; writers must hold the handle's
//! mutex *and* perform the atomic store last, after every other field write
//! has committed, so a terminal `state()` read is a memory barrier for the
//! rest of the handle.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted = 0,
    Running = 1,
    Finished = 2,
    Panicked = 3,
}

impl State {
    fn from_u8(raw: u8) -> State {
        match raw {
            0 => State::Unstarted,
            1 => State::Running,
            2 => State::Finished,
            _ => State::Panicked,
        }
    }
}

#[derive(Debug)]
pub struct AtomicState(AtomicU8);

impl AtomicState {
    pub fn new(initial: State) -> Self {
        AtomicState(AtomicU8::new(initial as u8))
    }

    pub fn load(&self) -> State {
        State::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Publish a new state. Callers must hold the handle's mutex and must
    /// have already committed every other field this transition touches.
    pub fn store(&self, state: State) {
        self.0.store(state as u8, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_variant() {
        for state in [State::Unstarted, State::Running, State::Finished, State::Panicked] {
            let atomic = AtomicState::new(state);
            assert_eq!(atomic.load(), state);
        }
    }
}
