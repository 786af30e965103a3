use chrono::{DateTime, Utc};

/// Persisted countdown state: seconds left and when they were last written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub remaining_secs: u32,
    pub last_active_at: DateTime<Utc>,
}

impl TimerSnapshot {
    #[must_use]
    pub fn new(remaining_secs: u32, last_active_at: DateTime<Utc>) -> Self {
        Self {
            remaining_secs,
            last_active_at,
        }
    }

    /// Whole seconds elapsed since the snapshot was written. Negative if the clock moved back.
    #[must_use]
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_active_at).num_milliseconds().div_euclid(1000)
    }

    /// Remaining seconds after accounting for time spent away, clamped to `[0, limit_secs]`.
    #[must_use]
    pub fn effective_remaining(&self, now: DateTime<Utc>, limit_secs: u32) -> u32 {
        let remaining = i64::from(self.remaining_secs).saturating_sub(self.elapsed_secs(now));
        let clamped = remaining.clamp(0, i64::from(limit_secs));
        u32::try_from(clamped).unwrap_or(limit_secs)
    }
}

/// Formats a countdown as `{minutes}m:{seconds:02}s`.
#[must_use]
pub fn format_remaining(secs: u32) -> String {
    format!("{}m:{:02}s", secs / 60, secs % 60)
}
