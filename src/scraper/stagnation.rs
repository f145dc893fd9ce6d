/// Progress of a scroll-to-exhaustion loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollState {
    Growing,
    Stagnant(u32),
    Exhausted,
}

/// Counts consecutive scroll attempts that produced no new content.
///
/// Growth resets the counter. Reaching `max_attempts` consecutive misses is
/// terminal: once exhausted the tracker ignores further observations.
#[derive(Debug, Clone)]
pub struct StagnationTracker {
    state: ScrollState,
    max_attempts: u32,
}

impl StagnationTracker {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: ScrollState::Growing,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Consecutive attempts without growth so far
    pub fn attempts(&self) -> u32 {
        match self.state {
            ScrollState::Growing => 0,
            ScrollState::Stagnant(n) => n,
            ScrollState::Exhausted => self.max_attempts,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == ScrollState::Exhausted
    }

    pub fn observe_growth(&mut self) -> ScrollState {
        if !self.is_exhausted() {
            self.state = ScrollState::Growing;
        }
        self.state
    }

    pub fn observe_stagnation(&mut self) -> ScrollState {
        self.state = match self.state {
            ScrollState::Exhausted => ScrollState::Exhausted,
            _ => {
                let attempts = self.attempts() + 1;
                if attempts >= self.max_attempts {
                    ScrollState::Exhausted
                } else {
                    ScrollState::Stagnant(attempts)
                }
            }
        };
        self.state
    }

    /// Force the terminal state, e.g. when the panel reports it sits at its bottom
    pub fn exhaust(&mut self) {
        self.state = ScrollState::Exhausted;
    }
}
