//! Session token accounting.

use ap_domain::stream::UsageSnapshot;
use ap_state::SessionUsage;

/// Folds per-invocation snapshots into session totals.
///
/// Reporting only: nothing gates on these numbers. Totals start at zero
/// each process start and error snapshots contribute nothing.
#[derive(Debug, Default)]
pub struct UsageTracker {
    session: SessionUsage,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one invocation's snapshot into the session totals. The
    /// context window is last-observed-wins; an unreported window (0)
    /// never clobbers a known one.
    pub fn record(&mut self, snapshot: &UsageSnapshot) {
        if snapshot.is_error {
            return;
        }
        self.session.input_tokens += snapshot.input_tokens;
        self.session.output_tokens += snapshot.output_tokens;
        if snapshot.context_window > 0 {
            self.session.context_window = snapshot.context_window;
        }
    }

    pub fn session(&self) -> SessionUsage {
        self.session
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(input: u64, output: u64) -> UsageSnapshot {
        UsageSnapshot {
            input_tokens: input,
            output_tokens: output,
            ..UsageSnapshot::default()
        }
    }

    #[test]
    fn totals_skip_error_snapshots() {
        let mut tracker = UsageTracker::new();
        tracker.record(&snapshot(10, 5));
        tracker.record(&UsageSnapshot::error("claude exited with code 1"));
        tracker.record(&snapshot(7, 3));

        let session = tracker.session();
        assert_eq!(session.input_tokens, 17);
        assert_eq!(session.output_tokens, 8);
    }

    #[test]
    fn context_window_is_last_observed() {
        let mut tracker = UsageTracker::new();

        let mut first = snapshot(1, 1);
        first.context_window = 200_000;
        tracker.record(&first);
        assert_eq!(tracker.session().context_window, 200_000);

        // An invocation that didn't report a window keeps the old one.
        tracker.record(&snapshot(1, 1));
        assert_eq!(tracker.session().context_window, 200_000);

        let mut third = snapshot(1, 1);
        third.context_window = 1_000_000;
        tracker.record(&third);
        assert_eq!(tracker.session().context_window, 1_000_000);
    }

    #[test]
    fn fresh_tracker_starts_at_zero() {
        let tracker = UsageTracker::new();
        let session = tracker.session();
        assert_eq!(session.total_tokens(), 0);
        assert_eq!(session.context_window, 0);
    }
}
