/// Counters describing what a [`Throttled`](crate::Throttled) did with its calls.
///
/// Every call ends up in exactly one of three places: run immediately
/// (`leading`), become the pending deferred invocation, or get dropped later
/// because a newer call replaced it (`superseded`). A pending invocation that
/// fires either runs (`trailing`) or, if the scheduler fired it before the
/// window elapsed, waits again for the rest of the window (`skipped`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThrottleStats {
    pub(crate) calls: u64,
    pub(crate) leading: u64,
    pub(crate) trailing: u64,
    pub(crate) superseded: u64,
    pub(crate) skipped: u64,
}

impl ThrottleStats {
    /// How many times the wrapper was called.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// Runs that happened synchronously inside a call.
    pub fn leading(&self) -> u64 {
        self.leading
    }

    /// Runs that happened from a deferred invocation (timer or flush).
    pub fn trailing(&self) -> u64 {
        self.trailing
    }

    /// Deferred invocations cancelled before firing.
    ///
    /// Includes invocations cancelled by [`Throttled::cancel()`](crate::Throttled::cancel).
    pub fn superseded(&self) -> u64 {
        self.superseded
    }

    /// Deferred invocations that fired inside the window and were rescheduled.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Total callback runs.
    pub fn runs(&self) -> u64 {
        self.leading + self.trailing
    }

    /// How many calls never reached the callback.
    ///
    /// # Example
    ///
    /// (L = leading run, T = trailing run, x = superseded)
    ///
    /// - `L x x T`: 2
    /// - `L L L`: 0
    /// - `L`: 0
    pub fn absorbed(&self) -> u64 {
        self.calls.saturating_sub(self.runs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorbed_count() {
        let stats = ThrottleStats {
            calls: 4,
            leading: 1,
            trailing: 1,
            superseded: 2,
            skipped: 0,
        };

        assert_eq!(stats.runs(), 2);
        assert_eq!(stats.absorbed(), 2);
        assert_eq!(ThrottleStats::default().absorbed(), 0);
    }
}
