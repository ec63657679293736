//! Input validation for intake fields and admin amounts
//!
//! All functions are pure. Persian (U+06F0..) and Arabic-Indic (U+0660..)
//! digits are folded to ASCII before matching.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\+98|0098|98|0)?(9[0-9]{9})$").expect("phone pattern"));

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").expect("email pattern")
});

/// Currency words an admin may append to a price
const CURRENCY_SUFFIXES: [&str; 6] = ["تومان", "ریال", "toman", "rial", "irt", "irr"];

/// Input that marks an optional field as skipped
pub const SKIP_TOKEN: &str = ".";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must be at least 2 characters")]
    NameTooShort,
    #[error("not an Iranian mobile number")]
    InvalidPhone,
    #[error("not a valid email address")]
    InvalidEmail,
    #[error("value must not be empty")]
    Empty,
    #[error("not a non-negative whole amount")]
    InvalidAmount,
}

/// Fold Persian and Arabic-Indic digits to ASCII
pub fn normalize_digits(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => shift_digit(c, '\u{06F0}'),
            '\u{0660}'..='\u{0669}' => shift_digit(c, '\u{0660}'),
            other => other,
        })
        .collect()
}

fn shift_digit(c: char, zero: char) -> char {
    let offset = u32::from(c) - u32::from(zero);
    char::from_digit(offset, 10).unwrap_or(c)
}

/// Trimmed name with at least two characters
pub fn name(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.chars().count() < 2 {
        return Err(ValidationError::NameTooShort);
    }
    Ok(trimmed.to_string())
}

/// Iranian mobile number, returned in `09xxxxxxxxx` form
pub fn phone(input: &str) -> Result<String, ValidationError> {
    let compact: String = normalize_digits(input)
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.' | '\u{200c}') && !c.is_whitespace())
        .collect();

    PHONE_RE
        .captures(&compact)
        .and_then(|caps| caps.get(1))
        .map(|subscriber| format!("0{}", subscriber.as_str()))
        .ok_or(ValidationError::InvalidPhone)
}

/// Optional email; the skip token yields an empty string
pub fn email(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed == SKIP_TOKEN {
        return Ok(String::new());
    }
    if EMAIL_RE.is_match(trimmed) {
        Ok(trimmed.to_string())
    } else {
        Err(ValidationError::InvalidEmail)
    }
}

/// Required free text
pub fn non_empty(input: &str) -> Result<String, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        Err(ValidationError::Empty)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Optional free text; `.` or `-` alone means empty
pub fn optional_text(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed == SKIP_TOKEN || trimmed == "-" {
        String::new()
    } else {
        trimmed.to_string()
    }
}

/// Parse an admin price such as `5,000,000 تومان` or `۵٬۰۰۰٬۰۰۰`
pub fn amount(input: &str) -> Result<u64, ValidationError> {
    let mut text = normalize_digits(input.trim()).to_lowercase();
    for suffix in CURRENCY_SUFFIXES {
        if let Some(stripped) = text.strip_suffix(suffix) {
            text = stripped.trim_end().to_string();
            break;
        }
    }

    let digits: String = text
        .chars()
        .filter(|c| !matches!(c, ',' | '\u{066C}' | '\u{060C}' | '_' | '\'') && !c.is_whitespace())
        .collect();

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidAmount);
    }
    digits.parse().map_err(|_| ValidationError::InvalidAmount)
}

/// Recognize yes/no answers typed as text
pub fn yes_no(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "بله" | "بلی" | "آره" | "yes" | "y" | "دارم" | "میخواهم" | "می‌خواهم" => Some(true),
        "خیر" | "نه" | "no" | "n" | "ندارم" | "نمیخواهم" | "نمی‌خواهم" => Some(false),
        _ => None,
    }
}
