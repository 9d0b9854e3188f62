//! Parsing utilities for human-readable configuration values

use std::time::Duration;

use tracing::warn;

/// Parse duration string (e.g., "30s", "5m", "1h", "100ms")
///
/// Returns Duration. Falls back to 30 seconds, with a warning, if parsing
/// fails.
///
/// # Supported formats
/// - `"1h"` - hours
/// - `"5m"` - minutes
/// - `"30s"` or `"30"` - seconds
/// - `"100ms"` - milliseconds
pub fn parse_duration(s: &str) -> Duration {
    let lowered = s.trim().to_lowercase();
    let (num_str, multiplier) = if lowered.ends_with("ms") {
        (&lowered[..lowered.len() - 2], 1)
    } else if lowered.ends_with('s') {
        (&lowered[..lowered.len() - 1], 1000)
    } else if lowered.ends_with('m') {
        (&lowered[..lowered.len() - 1], 60 * 1000)
    } else if lowered.ends_with('h') {
        (&lowered[..lowered.len() - 1], 60 * 60 * 1000)
    } else {
        (lowered.as_str(), 1000)
    };

    match num_str.trim().parse::<u64>() {
        Ok(n) => Duration::from_millis(n * multiplier),
        Err(_) => {
            warn!(input = %s, "Unrecognized duration, using 30s default");
            Duration::from_secs(30)
        }
    }
}
