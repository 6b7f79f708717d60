//! Date/time helpers shared by the planner and the output stage

use chrono::{Local, NaiveDateTime, TimeZone};
use std::time::SystemTime;

/// Layout of explicit timestamps in build configs, e.g. `2023-06-01 18-30-00`
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H-%M-%S";

/// Parse a config timestamp in [`DATETIME_FORMAT`]
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT).ok()
}

/// Interpret a naive timestamp in the local timezone
pub fn local_system_time(datetime: &NaiveDateTime) -> Option<SystemTime> {
    Local
        .from_local_datetime(datetime)
        .earliest()
        .map(SystemTime::from)
}

/// Human readable timestamp for reports and metadata tags
pub fn format_system_time(time: SystemTime) -> String {
    let local: chrono::DateTime<Local> = time.into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a byte count with a binary unit
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
