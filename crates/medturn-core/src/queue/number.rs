//! Turn number generation.

use chrono::{DateTime, Utc};

/// Build a display code from a service prefix and epoch milliseconds.
///
/// The suffix is the last three digits of the timestamp. Codes can repeat.
pub fn generate_turn_number(prefix: &str, epoch_millis: i64) -> String {
    format!("{}-{:03}", prefix, epoch_millis.rem_euclid(1000))
}

/// Turn number for a request made at `now`.
pub fn turn_number_at(prefix: &str, now: &DateTime<Utc>) -> String {
    generate_turn_number(prefix, now.timestamp_millis())
}
