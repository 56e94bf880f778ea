//! Baseline tracking for the pending-request count.
//!
//! The first response after (re)arming only records a baseline. Later
//! responses alert when `total_pending` grew against the stored value, or,
//! when either side of that comparison is unknown, when `count` is non-zero.
//!
//! `last_check_time` starts at the local clock and is replaced by the server
//! clock on the first baseline. From then on it only moves forward.

use crate::ajax::PendingSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Baseline recorded, nothing compared.
    Baseline,
    Quiet,
    Alert,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollState {
    /// Unix seconds, sent back to the endpoint as `last_check`.
    pub last_check_time: i64,
    pub has_baseline: bool,
    pub last_total_pending: Option<u64>,
    /// A check is in flight.
    pub is_checking: bool,
    /// `last_check_time` came from the server at least once.
    clock_synced: bool,
}

impl PollState {
    pub fn new(last_check_time: i64) -> Self {
        Self {
            last_check_time,
            has_baseline: false,
            last_total_pending: None,
            is_checking: false,
            clock_synced: false,
        }
    }

    pub fn observe(&mut self, snapshot: &PendingSnapshot) -> Verdict {
        if self.clock_synced {
            self.last_check_time = self.last_check_time.max(snapshot.timestamp);
        } else {
            self.last_check_time = snapshot.timestamp;
            self.clock_synced = true;
        }

        if !self.has_baseline {
            self.has_baseline = true;
            self.last_total_pending = snapshot.total_pending;
            return Verdict::Baseline;
        }

        let should_alert = match (snapshot.total_pending, self.last_total_pending) {
            (Some(current), Some(previous)) => current > previous,
            _ => snapshot.count > 0,
        };

        if snapshot.total_pending.is_some() {
            self.last_total_pending = snapshot.total_pending;
        }

        if should_alert {
            Verdict::Alert
        } else {
            Verdict::Quiet
        }
    }

    /// Forget the baseline; the next response re-establishes it.
    pub fn reset_baseline(&mut self) {
        self.has_baseline = false;
        self.last_total_pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(count: u64, timestamp: i64, total_pending: Option<u64>) -> PendingSnapshot {
        PendingSnapshot {
            count,
            timestamp,
            total_pending,
            requests: Vec::new(),
        }
    }

    fn total(timestamp: i64, total_pending: u64) -> PendingSnapshot {
        snapshot(0, timestamp, Some(total_pending))
    }

    #[test]
    fn test_first_response_only_sets_baseline() {
        let mut state = PollState::new(0);

        let verdict = state.observe(&snapshot(9, 100, Some(42)));
        assert_eq!(verdict, Verdict::Baseline);
        assert!(state.has_baseline);
        assert_eq!(state.last_total_pending, Some(42));
        assert_eq!(state.last_check_time, 100);
    }

    #[test]
    fn test_plateau_then_increase() {
        let mut state = PollState::new(0);

        assert_eq!(state.observe(&total(100, 5)), Verdict::Baseline);
        assert_eq!(state.observe(&total(110, 5)), Verdict::Quiet);
        assert_eq!(state.observe(&total(120, 7)), Verdict::Alert);
        assert_eq!(state.last_total_pending, Some(7));
        assert_eq!(state.observe(&total(130, 7)), Verdict::Quiet);
    }

    #[test]
    fn test_decrease_is_quiet_and_lowers_baseline() {
        let mut state = PollState::new(0);

        state.observe(&total(100, 5));
        assert_eq!(state.observe(&total(110, 3)), Verdict::Quiet);
        assert_eq!(state.observe(&total(120, 4)), Verdict::Alert);
    }

    #[test]
    fn test_total_pending_wins_over_count() {
        let mut state = PollState::new(0);

        state.observe(&total(100, 5));
        assert_eq!(state.observe(&snapshot(3, 110, Some(5))), Verdict::Quiet);
        assert_eq!(state.observe(&snapshot(0, 120, Some(6))), Verdict::Alert);
    }

    #[test]
    fn test_count_fallback_without_total_pending() {
        let mut state = PollState::new(0);

        state.observe(&snapshot(0, 100, None));
        assert_eq!(state.observe(&snapshot(0, 110, None)), Verdict::Quiet);
        assert_eq!(state.observe(&snapshot(2, 120, None)), Verdict::Alert);

        // Known now, unknown before: still decided by count.
        assert_eq!(state.observe(&snapshot(0, 130, Some(4))), Verdict::Quiet);
        assert_eq!(state.last_total_pending, Some(4));

        // Absent again: the stored baseline stays.
        assert_eq!(state.observe(&snapshot(1, 140, None)), Verdict::Alert);
        assert_eq!(state.last_total_pending, Some(4));
    }

    #[test]
    fn test_baseline_adopts_server_clock() {
        let mut state = PollState::new(1_800_000_000);

        assert_eq!(state.observe(&total(1_700_000_000, 1)), Verdict::Baseline);
        assert_eq!(state.last_check_time, 1_700_000_000);

        // A re-armed baseline keeps the clock monotonic.
        state.reset_baseline();
        assert_eq!(state.observe(&total(1_600_000_000, 1)), Verdict::Baseline);
        assert_eq!(state.last_check_time, 1_700_000_000);
    }

    #[test]
    fn test_last_check_time_never_moves_back() {
        let mut state = PollState::new(50);

        state.observe(&total(40, 1));
        assert_eq!(state.last_check_time, 40);

        let mut previous = state.last_check_time;
        for ts in [100, 90, 120, 120, 10, 130] {
            state.observe(&total(ts, 1));
            assert!(state.last_check_time >= previous);
            previous = state.last_check_time;
        }
        assert_eq!(state.last_check_time, 130);
    }

    #[test]
    fn test_reset_rearms_without_alert() {
        let mut state = PollState::new(0);

        state.observe(&total(100, 5));
        state.reset_baseline();
        assert!(!state.has_baseline);
        assert_eq!(state.last_total_pending, None);

        assert_eq!(state.observe(&total(110, 50)), Verdict::Baseline);
        assert_eq!(state.observe(&total(120, 51)), Verdict::Alert);
    }
}
