use crate::error::{MeterError, Result};
use chrono::{Datelike, NaiveDate, Utc};
use rand::{distributions::Alphanumeric, Rng};

const GERMAN_SHORT_MONTHS: [&str; 12] = [
    "Jan.", "Feb.", "März", "Apr.", "Mai", "Juni", "Juli", "Aug.", "Sept.", "Okt.", "Nov.", "Dez.",
];

/// Parses a calendar date written as ISO (`YYYY-M-D`), German (`D.M.YYYY`)
/// or US (`M/D/YYYY`), tried in that order.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return Err(MeterError::InvalidDate("empty date".to_string()));
    }

    let parsed = if let Some([year, month, day]) = split_date(text, '-', [4, 2, 2]) {
        Some((year, month, day))
    } else if let Some([day, month, year]) = split_date(text, '.', [2, 2, 4]) {
        Some((year, month, day))
    } else if let Some([month, day, year]) = split_date(text, '/', [2, 2, 4]) {
        Some((year, month, day))
    } else {
        None
    };

    let (year, month, day) = parsed.ok_or_else(|| {
        MeterError::InvalidDate(format!(
            "'{}' is not in YYYY-MM-DD, DD.MM.YYYY or MM/DD/YYYY format",
            text
        ))
    })?;

    NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| MeterError::InvalidDate(format!("'{}' is not a calendar date", text)))
}

/// Splits `text` into exactly three all-digit parts. A part whose maximum
/// width is 4 must be exactly four digits wide; the others take one or two.
fn split_date(text: &str, separator: char, widths: [usize; 3]) -> Option<[u32; 3]> {
    let parts: Vec<&str> = text.split(separator).collect();
    if parts.len() != 3 {
        return None;
    }

    let mut out = [0u32; 3];
    for (i, part) in parts.iter().enumerate() {
        let width_ok = if widths[i] == 4 {
            part.len() == 4
        } else {
            (1..=widths[i]).contains(&part.len())
        };
        if !width_ok || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        out[i] = part.parse().ok()?;
    }
    Some(out)
}

pub fn format_iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Normalizes any accepted date spelling to zero-padded ISO form.
pub fn normalize_date(text: &str) -> Result<String> {
    parse_date(text).map(format_iso_date)
}

/// Parses a number that may use a German decimal comma.
///
/// The first comma becomes a decimal point and every character other than
/// digits, `.` and `-` is dropped. The longest numeric prefix of what
/// remains is the value, so `"1.234,5"` reads as `1.234`.
pub fn parse_decimal(text: &str) -> Result<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MeterError::InvalidNumber("empty field".to_string()));
    }

    let cleaned: String = trimmed
        .replacen(',', ".", 1)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let bytes = cleaned.as_bytes();
    let mut end = 0;
    if bytes.first() == Some(&b'-') {
        end = 1;
    }
    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        end = frac_end;
    }

    if digits == 0 {
        return Err(MeterError::InvalidNumber(format!(
            "'{}' contains no number",
            trimmed
        )));
    }

    cleaned[..end]
        .parse::<f64>()
        .map_err(|e| MeterError::InvalidNumber(format!("'{}': {}", trimmed, e)))
}

/// Field-level fallback: a missing or unparsable value counts as zero.
pub fn parse_decimal_or_zero(text: Option<&str>) -> f64 {
    text.and_then(|t| parse_decimal(t).ok()).unwrap_or(0.0)
}

/// Renders a value with a decimal comma, e.g. `12.5` as `"12,5"`.
pub fn format_decimal(value: f64) -> String {
    value.to_string().replace('.', ",")
}

/// Lowercases and drops everything that is not an ASCII letter or digit.
pub fn normalize_header(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// German short month plus year, e.g. `"Jan. 2024"` or `"März 2024"`.
pub fn month_label(date: NaiveDate) -> String {
    format!("{} {}", GERMAN_SHORT_MONTHS[date.month0() as usize], date.year())
}

/// Base-36 millisecond timestamp followed by a random alphanumeric suffix.
pub fn generate_id() -> String {
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("{}{}", to_base36(millis), suffix.to_lowercase())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
