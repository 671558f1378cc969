use chrono::{DateTime, FixedOffset, Utc};

/// Output mode determines how results are formatted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputMode {
    Tty,
    Json,
}

/// Detect the appropriate output mode.
pub fn detect_output_mode(json_flag: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }
    OutputMode::Tty
}

/// `2024-01-10 15:00` in the display timezone.
pub fn format_time(dt: &DateTime<Utc>, tz: &FixedOffset) -> String {
    dt.with_timezone(tz).format("%Y-%m-%d %H:%M").to_string()
}

/// "1 document", "3 documents".
pub fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("{} {}", count, noun)
    } else {
        format!("{} {}s", count, noun)
    }
}
