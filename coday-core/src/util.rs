use chrono::SecondsFormat;
use chrono::Utc;

/// Current instant as an ISO-8601 string, for transient events (heartbeats,
/// provisional tool responses) that are not subject to the thread's
/// uniqueness invariant.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
