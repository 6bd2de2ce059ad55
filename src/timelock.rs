//! Timelock gate.
//!
//! Pure functions over timestamps; no state. A queued multi-sig transaction
//! may only execute once the configured delay has elapsed since submission,
//! giving signers a review/veto window after quorum.

/// Seconds left before the gate opens. Never negative; zero for every
/// `now >= submission_time + delay_secs`.
pub fn remaining(submission_time: u64, delay_secs: u64, now: u64) -> u64 {
    (submission_time + delay_secs).saturating_sub(now)
}

/// Whether execution is still gated.
pub fn is_locked(submission_time: u64, delay_secs: u64, now: u64, executed: bool) -> bool {
    !executed && remaining(submission_time, delay_secs, now) > 0
}

/// Human-readable countdown, e.g. `"1h 3m 20s"`. Presentation only.
pub fn format(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}
