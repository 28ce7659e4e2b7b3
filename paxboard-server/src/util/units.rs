//! Unit normalization shared by the samplers.

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Bytes to GB, rounded to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    round_to(bytes as f64 / GB, 2)
}

/// `used / total` as a percentage with one decimal; a zero total reads as 0%.
pub fn usage_percent(used: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    (used / total * 1000.0).round() / 10.0
}

/// Human readable magnitude using 1024 steps, e.g. `2048.0` -> `"2.0 KB"`.
pub fn format_bytes(bytes: f64) -> String {
    if bytes < KB {
        format!("{bytes:.0} B")
    } else if bytes < MB {
        format!("{:.1} KB", bytes / KB)
    } else if bytes < GB {
        format!("{:.1} MB", bytes / MB)
    } else {
        format!("{:.1} GB", bytes / GB)
    }
}

pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec))
}
