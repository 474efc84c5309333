//! Human-readable time formatting

use chrono::{DateTime, Local};

/// Format an epoch-milliseconds timestamp as local `YYYY-MM-DD HH:MM:SS`
///
/// Returns `None` for timestamps outside chrono's representable range.
pub fn format_datetime(epoch_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(epoch_ms)
        .map(|utc| utc.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Format a signed millisecond delta (`+42s`, `+5m 3s`, `-2h 10m`)
pub fn format_delta(delta_ms: i64) -> String {
    let sign = if delta_ms >= 0 { '+' } else { '-' };
    let seconds = delta_ms.unsigned_abs() / 1000;

    if seconds < 60 {
        format!("{}{}s", sign, seconds)
    } else if seconds < 3600 {
        format!("{}{}m {}s", sign, seconds / 60, seconds % 60)
    } else {
        format!("{}{}h {}m", sign, seconds / 3600, (seconds % 3600) / 60)
    }
}
