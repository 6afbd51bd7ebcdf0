// Human-readable byte and duration formatting for log output

/// Largest integer a JSON number represents exactly; systemd reports
/// u64::MAX (and similar) for "unset" counters.
const MAX_EXACT_INTEGER: u64 = (1 << 53) - 1;

const UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Formats bytes with 1024-based units, e.g. `1536` -> `"1.5 KB"`.
pub fn format_bytes(bytes: u64, decimals: usize) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    if bytes > MAX_EXACT_INTEGER {
        return "N/A".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rendered = format!("{:.*}", decimals, value);
    // Drop trailing zeros the way a float round-trip would ("1.50" -> "1.5").
    let rendered = if rendered.contains('.') {
        rendered.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        rendered
    };
    format!("{} {}", rendered, UNITS[unit])
}

/// Humanized duration ("a few seconds", "3 hours", "a day"). "N/A" when
/// the value does not fit a `TimeDelta`.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    let Some(d) = i64::try_from(seconds)
        .ok()
        .and_then(chrono::TimeDelta::try_seconds)
    else {
        return "N/A".to_string();
    };
    let secs = d.num_seconds() as f64;
    let minutes = secs / 60.0;
    let hours = minutes / 60.0;
    let days = hours / 24.0;

    if secs < 45.0 {
        "a few seconds".to_string()
    } else if secs < 90.0 {
        "a minute".to_string()
    } else if minutes < 45.0 {
        format!("{} minutes", minutes.round() as u64)
    } else if minutes < 90.0 {
        "an hour".to_string()
    } else if hours < 22.0 {
        format!("{} hours", hours.round() as u64)
    } else if hours < 36.0 {
        "a day".to_string()
    } else if days < 26.0 {
        format!("{} days", days.round() as u64)
    } else if days < 45.0 {
        "a month".to_string()
    } else if days < 320.0 {
        format!("{} months", (days / 30.0).round().max(2.0) as u64)
    } else if days < 548.0 {
        "a year".to_string()
    } else {
        format!("{} years", (days / 365.0).round() as u64)
    }
}
