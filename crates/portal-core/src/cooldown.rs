//! Cooldown gate
//!
//! Pure computation of the lockout remaining after a completed run. Callers
//! pass the clock reading so the gate stays free of side effects.

use std::time::{Duration, Instant};

/// Remaining lockout for a run that finished at `last_finish`
///
/// Returns `window - (now - last_finish)`, saturating at zero, or zero when no
/// run has finished since the last reset. A `now` earlier than `last_finish`
/// counts as no time elapsed.
pub fn remaining(last_finish: Option<Instant>, now: Instant, window: Duration) -> Duration {
    match last_finish {
        Some(finished) => window.saturating_sub(now.saturating_duration_since(finished)),
        None => Duration::ZERO,
    }
}

/// Seconds rounded to one decimal place, for display only
///
/// Admission must compare the raw [`Duration`]: a value that displays as
/// `0.0` can still be a positive lockout.
pub fn display_secs(remaining: Duration) -> f64 {
    (remaining.as_secs_f64() * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(30);

    #[test]
    fn test_no_finish_means_no_cooldown() {
        assert_eq!(remaining(None, Instant::now(), WINDOW), Duration::ZERO);
    }

    #[test]
    fn test_remaining_counts_down() {
        let finished = Instant::now();
        let now = finished + Duration::from_secs(12);
        assert_eq!(remaining(Some(finished), now, WINDOW), Duration::from_secs(18));
    }

    #[test]
    fn test_remaining_never_negative() {
        let finished = Instant::now();
        let now = finished + Duration::from_secs(90);
        assert_eq!(remaining(Some(finished), now, WINDOW), Duration::ZERO);
        assert_eq!(
            remaining(Some(finished), finished + WINDOW, WINDOW),
            Duration::ZERO
        );
    }

    #[test]
    fn test_clock_before_finish_is_full_window() {
        let now = Instant::now();
        let finished = now + Duration::from_secs(1);
        assert_eq!(remaining(Some(finished), now, WINDOW), WINDOW);
    }

    #[test]
    fn test_display_rounding_hides_small_remainder() {
        let tiny = Duration::from_millis(40);
        assert_eq!(display_secs(tiny), 0.0);
        assert!(tiny > Duration::ZERO);
        assert_eq!(display_secs(Duration::from_millis(12_345)), 12.3);
        assert_eq!(display_secs(Duration::from_millis(12_380)), 12.4);
    }
}
