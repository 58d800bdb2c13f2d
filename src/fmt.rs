//! Formatting helpers shared by the exporter and the `show` command.

/// Format a percentage with exactly two decimal digits, truncating (never rounding).
///
/// `0.19123` -> `"0.19%"`, `12.5436` -> `"12.54%"`, `0.0043` -> `"0.00%"`.
/// Negative values keep their sign so the validator can reject them.
pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}%", value);
    }
    let sign = if value < 0.0 { "-" } else { "" };
    // Cut the shortest decimal representation instead of scaling, so 12.05
    // keeps its digits and 99.999999999995 stays below 100.
    let digits = value.abs().to_string();
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits.as_str(), ""));
    let mut hundredths: String = fraction.chars().take(2).collect();
    while hundredths.len() < 2 {
        hundredths.push('0');
    }
    format!("{}{}.{}%", sign, whole, hundredths)
}

/// Parse the numeric part of a percent token produced by [`format_percent`].
///
/// The trailing `%` is optional here; format checks belong to the validator.
pub fn parse_percent(token: &str) -> Option<f64> {
    token.strip_suffix('%').unwrap_or(token).parse().ok()
}
