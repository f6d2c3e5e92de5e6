use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }
}

/// Countdown around an absolute deadline. The deadline is persisted with the
/// session, so a reload resumes the countdown rather than restarting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    deadline: DateTime<Utc>,
}

impl Countdown {
    /// A countdown ending `duration` after `now`.
    #[must_use]
    pub fn starting_at(now: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            deadline: now + duration,
        }
    }

    /// A countdown resumed from a persisted deadline.
    #[must_use]
    pub fn until(deadline: DateTime<Utc>) -> Self {
        Self { deadline }
    }

    #[must_use]
    pub fn deadline(&self) -> DateTime<Utc> {
        self.deadline
    }

    /// Time left at the given instant; zero once the deadline has passed.
    #[must_use]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.deadline - now).max(Duration::zero())
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.deadline
    }
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_remaining_never_goes_negative() {
        let countdown = Countdown::starting_at(fixed_now(), Duration::seconds(10));
        assert_eq!(
            countdown.remaining(fixed_now()),
            Duration::seconds(10)
        );
        assert_eq!(
            countdown.remaining(fixed_now() + Duration::seconds(30)),
            Duration::zero()
        );
    }

    #[test]
    fn resumed_countdown_keeps_the_original_deadline() {
        let original = Countdown::starting_at(fixed_now(), Duration::seconds(3600));
        let resumed = Countdown::until(original.deadline());
        assert_eq!(resumed, original);
        assert!(resumed.is_expired(fixed_now() + Duration::seconds(3600)));
    }
}
