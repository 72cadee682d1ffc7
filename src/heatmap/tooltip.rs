use chrono::NaiveDate;
use num_format::{Locale, ToFormattedString};

/// Formats a volume in milliliters, e.g. "2,500 mL" or "250.5 mL".
pub fn format_volume(volume: f64) -> String {
    let rounded = format!("{:.3}", volume.abs());
    let (whole, fraction) = rounded.split_once('.').unwrap_or((rounded.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let whole = whole
        .parse::<u64>()
        .map_or_else(|_| whole.to_owned(), |n| n.to_formatted_string(&Locale::en));
    let sign = if volume < 0.0 && (whole != "0" || !fraction.is_empty()) {
        "-"
    } else {
        ""
    };

    if fraction.is_empty() {
        format!("{sign}{whole} mL")
    } else {
        format!("{sign}{whole}.{fraction} mL")
    }
}

/// Label of one calendar cell, e.g. "500 mL on Jan 3, 2024".
pub fn format_tooltip(day: NaiveDate, volume: f64) -> String {
    format!("{} on {}", format_volume(volume), day.format("%b %-d, %Y"))
}
