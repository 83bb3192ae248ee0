//! Shared formatting helpers for the presenter.
//!
//! All pure formatting functions (no ratatui styles, no UI layout) live here.
//! Zero values render as an empty string so idle rows stay visually quiet.

use crate::model::CounterKind;

/// Controls compact (table columns) vs verbose (header line) output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FmtStyle {
    /// Compact: no spaces ("3m5s")
    Compact,
    /// Detail: spaces between units ("3m 5s")
    Detail,
}

// ---------------------------------------------------------------------------
// Counter values
// ---------------------------------------------------------------------------

/// Format a performance_schema timer value (picoseconds).
///
/// `"750 ps"`, `"12.50 ns"`, `"3.20 us"`, `"1.05 ms"`, `"2.00 s"`, `"4.50 m"`,
/// `"1.20 h"`.
pub fn format_time(picoseconds: u64) -> String {
    if picoseconds == 0 {
        return String::new();
    }
    let ps = picoseconds as f64;
    if picoseconds < 1_000 {
        format!("{} ps", picoseconds)
    } else if picoseconds < 1_000_000 {
        format!("{:.2} ns", ps / 1e3)
    } else if picoseconds < 1_000_000_000 {
        format!("{:.2} us", ps / 1e6)
    } else if picoseconds < 1_000_000_000_000 {
        format!("{:.2} ms", ps / 1e9)
    } else if picoseconds < 60_000_000_000_000 {
        format!("{:.2} s", ps / 1e12)
    } else if picoseconds < 3_600_000_000_000_000 {
        format!("{:.2} m", ps / 60e12)
    } else {
        format!("{:.2} h", ps / 3600e12)
    }
}

/// Format a count with 1000-based magnitude suffix: `"999"`, `"1.50 k"`,
/// `"2.00 M"`, up to `P`.
pub fn format_amount(amount: u64) -> String {
    if amount == 0 {
        return String::new();
    }
    if amount < 1_000 {
        return amount.to_string();
    }
    const SUFFIXES: [&str; 5] = ["k", "M", "G", "T", "P"];
    let mut value = amount as f64 / 1_000.0;
    let mut idx = 0;
    while value >= 1_000.0 && idx < SUFFIXES.len() - 1 {
        value /= 1_000.0;
        idx += 1;
    }
    format!("{:.2} {}", value, SUFFIXES[idx])
}

/// Format byte count with 1024-based suffix.
///
/// `"512 B"`, `"50.0 K"`, `"100.3 M"`, `"1.5 G"`, `"2.0 T"`
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return String::new();
    }
    let f = bytes as f64;
    if bytes >= 1 << 40 {
        format!("{:.1} T", f / (1u64 << 40) as f64)
    } else if bytes >= 1 << 30 {
        format!("{:.1} G", f / (1u64 << 30) as f64)
    } else if bytes >= 1 << 20 {
        format!("{:.1} M", f / (1u64 << 20) as f64)
    } else if bytes >= 1 << 10 {
        format!("{:.1} K", f / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}

/// Formats one counter according to its kind.
pub fn format_counter(value: u64, kind: CounterKind) -> String {
    match kind {
        CounterKind::Time => format_time(value),
        CounterKind::Count => format_amount(value),
        CounterKind::Bytes => format_bytes(value),
    }
}

/// `part / total`, or 0 when `total` is 0.
pub fn divide(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Format a ratio as a percentage (`"12.3%"`); empty for zero.
pub fn format_pct(ratio: f64) -> String {
    if ratio <= 0.0 || !ratio.is_finite() {
        String::new()
    } else {
        format!("{:.1}%", ratio * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Durations and text
// ---------------------------------------------------------------------------

/// Format duration in seconds as human-readable.
///
/// Compact: `"3m5s"`
/// Detail:  `"3m 5s"`
pub fn format_duration(secs: u64, style: FmtStyle) -> String {
    let sep = match style {
        FmtStyle::Compact => "",
        FmtStyle::Detail => " ",
    };
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m{}{}s", secs / 60, sep, secs % 60)
    } else if secs < 86400 {
        format!("{}h{}{}m", secs / 3600, sep, (secs % 3600) / 60)
    } else {
        format!("{}d{}{}h", secs / 86400, sep, (secs % 86400) / 3600)
    }
}

/// Truncate string to `max_len` characters with unicode ellipsis (`…`).
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max_len.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_scales() {
        assert_eq!(format_time(0), "");
        assert_eq!(format_time(750), "750 ps");
        assert_eq!(format_time(12_500), "12.50 ns");
        assert_eq!(format_time(3_200_000), "3.20 us");
        assert_eq!(format_time(1_050_000_000), "1.05 ms");
        assert_eq!(format_time(2_000_000_000_000), "2.00 s");
        assert_eq!(format_time(270_000_000_000_000), "4.50 m");
        assert_eq!(format_time(4_320_000_000_000_000), "1.20 h");
    }

    #[test]
    fn amount_abbreviation() {
        assert_eq!(format_amount(0), "");
        assert_eq!(format_amount(999), "999");
        assert_eq!(format_amount(1_500), "1.50 k");
        assert_eq!(format_amount(2_000_000), "2.00 M");
        assert_eq!(format_amount(7_000_000_000_000_000), "7.00 P");
        assert_eq!(format_amount(u64::MAX), "18446.74 P");
    }

    #[test]
    fn bytes_scales() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(51_200), "50.0 K");
        assert_eq!(format_bytes(1_610_612_736), "1.5 G");
        assert_eq!(format_bytes(2 << 40), "2.0 T");
    }

    #[test]
    fn percentage() {
        assert_eq!(format_pct(divide(25, 200)), "12.5%");
        assert_eq!(format_pct(divide(5, 0)), "");
        assert_eq!(format_pct(divide(200, 200)), "100.0%");
    }

    #[test]
    fn counter_dispatch() {
        assert_eq!(format_counter(1_500, CounterKind::Count), "1.50 k");
        assert_eq!(format_counter(2048, CounterKind::Bytes), "2.0 K");
        assert_eq!(format_counter(750, CounterKind::Time), "750 ps");
    }

    #[test]
    fn duration_styles() {
        assert_eq!(format_duration(185, FmtStyle::Compact), "3m5s");
        assert_eq!(format_duration(185, FmtStyle::Detail), "3m 5s");
        assert_eq!(format_duration(90_000, FmtStyle::Detail), "1d 1h");
    }

    #[test]
    fn truncate_is_char_safe() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("ééééé", 3), "éé…");
    }
}
