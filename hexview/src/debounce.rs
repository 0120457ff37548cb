use std::time::{Duration, Instant};

/// Resettable one-shot deadline. Every [`Debouncer::trigger`] pushes the deadline back;
/// [`Debouncer::poll`] fires once after a quiet period of `delay`.
#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    #[must_use]
    pub const fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// Returns `true` once when the deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.deadline
            && now >= deadline
        {
            self.deadline = None;
            return true;
        }
        false
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub const fn cancel(&mut self) {
        self.deadline = None;
    }
}
