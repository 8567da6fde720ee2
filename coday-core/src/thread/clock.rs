use chrono::SecondsFormat;
use chrono::Utc;
use std::sync::Mutex;

/// Hands out ISO-8601 timestamps that are strictly increasing even when two
/// calls land in the same microsecond, so the "timestamps are unique within
/// a thread" invariant (§3) holds regardless of wall-clock resolution.
#[derive(Debug, Default)]
pub(super) struct MonotonicClock {
    last: Mutex<Option<chrono::DateTime<Utc>>>,
}

impl MonotonicClock {
    pub(super) fn next(&self) -> String {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now();
        let stamped = match *last {
            Some(prev) if prev >= now => prev + chrono::Duration::microseconds(1),
            _ => now,
        };
        *last = Some(stamped);
        stamped.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

impl Clone for MonotonicClock {
    fn clone(&self) -> Self {
        let last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Self {
            last: Mutex::new(*last),
        }
    }
}
