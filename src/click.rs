//! Single- vs double-click disambiguation.
//!
//! `Idle -> Armed` on the first click. A second click on the same target inside
//! the window fires `Double` and returns to `Idle`; otherwise the window running
//! out (observed through [`ClickDisambiguator::poll`]) fires `Single`.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Click<T> {
    Single(T),
    Double(T),
}

#[derive(Debug, Clone)]
enum State<T> {
    Idle,
    Armed { target: T, at: Instant },
}

#[derive(Debug, Clone)]
pub struct ClickDisambiguator<T> {
    window: Duration,
    state: State<T>,
}

impl<T: Clone + PartialEq> ClickDisambiguator<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            state: State::Idle,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, State::Armed { .. })
    }

    /// When a pending single click will resolve, if one is pending.
    pub fn deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Armed { at, .. } => Some(*at + self.window),
            State::Idle => None,
        }
    }

    /// Feeds a click. Returns a resolved click if this one completes a double
    /// click, or if it displaces a pending click on another target (or one whose
    /// window already ran out), which then resolves as a single click.
    pub fn click(&mut self, target: T, now: Instant) -> Option<Click<T>> {
        match std::mem::replace(&mut self.state, State::Idle) {
            State::Idle => {
                self.state = State::Armed { target, at: now };
                None
            }
            State::Armed { target: pending, at } => {
                let within = now.saturating_duration_since(at) < self.window;
                if within && pending == target {
                    Some(Click::Double(target))
                } else {
                    self.state = State::Armed { target, at: now };
                    Some(Click::Single(pending))
                }
            }
        }
    }

    /// Resolves a pending click as single once its window has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<Click<T>> {
        let expired = match &self.state {
            State::Armed { at, .. } => now.saturating_duration_since(*at) >= self.window,
            State::Idle => false,
        };
        if !expired {
            return None;
        }

        match std::mem::replace(&mut self.state, State::Idle) {
            State::Armed { target, .. } => Some(Click::Single(target)),
            State::Idle => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = State::Idle;
    }
}
