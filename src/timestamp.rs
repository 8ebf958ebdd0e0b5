/// Formats a microsecond timestamp as `hh:mm:ss.uuuuuu`.
pub fn timestamp_str(micros: u64) -> String {
    let hours = micros / 3_600_000_000;
    let minutes = (micros % 3_600_000_000) / 60_000_000;
    let seconds = (micros % 60_000_000) / 1_000_000;
    let fraction = micros % 1_000_000;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{fraction:06}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Formats a duration in seconds the same way, rounded to the microsecond.
pub fn duration_str(sec: f64) -> String {
    timestamp_str((sec.max(0.0) * 1e6).round() as u64)
}
