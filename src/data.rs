//! Value parse rules shared by both inference passes.
//!
//! Every rule takes a raw (sentinel-normalized) field and either returns the
//! canonical text the value is loaded as, or fails. Pass 1 only cares about
//! success or failure; pass 2 keeps the rendered text.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow, bail};
use chrono::{NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;

/// Spreadsheet error marker exported in place of a failed division.
pub const DIV_ZERO_SENTINEL: &str = "#DIV/0!";

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").expect("date shape pattern"));

/// Maps the `#DIV/0!` sentinel to the empty string and leaves everything else alone.
pub fn normalize_sentinel(value: &str) -> &str {
    if value == DIV_ZERO_SENTINEL { "" } else { value }
}

/// Parses a `YYYY-MM-DD` date and renders midnight UTC as RFC 3339.
pub fn parse_date(value: &str) -> Result<String> {
    if !DATE_SHAPE.is_match(value) {
        bail!("Failed to parse '{value}' as date");
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Failed to parse '{value}' as date"))?;
    let instant = Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN));
    Ok(instant.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Parses a signed base-10 integer, ignoring `,` thousands separators.
pub fn parse_integer(value: &str) -> Result<String> {
    let stripped = strip_thousands(value);
    let parsed: i64 = stripped
        .parse()
        .with_context(|| format!("Failed to parse '{value}' as integer"))?;
    Ok(parsed.to_string())
}

/// Parses a float, ignoring `,` thousands separators, rendered with six fractional digits.
pub fn parse_float(value: &str) -> Result<String> {
    let stripped = strip_thousands(value);
    let parsed: f64 = stripped
        .parse()
        .with_context(|| format!("Failed to parse '{value}' as float"))?;
    Ok(format_fixed(parsed))
}

/// Parses `<float>%`; the stored value is the bare number, not divided by 100.
pub fn parse_percent(value: &str) -> Result<String> {
    let number = value
        .strip_suffix('%')
        .ok_or_else(|| anyhow!("Failed to parse '{value}' as percent: no trailing '%'"))?;
    let parsed: f64 = number
        .parse()
        .with_context(|| format!("Failed to parse '{value}' as percent"))?;
    Ok(format_fixed(parsed))
}

fn strip_thousands(value: &str) -> String {
    value.replace(',', "")
}

/// Fixed-point rendering with six fractional digits, using PostgreSQL's
/// spellings for the non-finite values.
pub fn format_fixed(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value.is_sign_negative() {
            "-Infinity".to_string()
        } else {
            "Infinity".to_string()
        }
    } else {
        format!("{value:.6}")
    }
}
