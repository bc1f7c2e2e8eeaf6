//! Field-level input rules shared by the services.
//!
//! Each helper returns the normalised value (trimmed, lower-cased where it
//! matters) or a `ServerError::Validation` naming the field.

use chrono::DateTime;

use crate::error::{Result, ServerError};

/// Trimmed text with a character count in `min..=max`
pub fn text(field: &str, value: &str, min: usize, max: usize) -> Result<String> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < min {
        return Err(if min <= 1 {
            ServerError::validation(format!("{} is required", field))
        } else {
            ServerError::validation(format!("{} must be at least {} characters", field, min))
        });
    }
    if len > max {
        return Err(ServerError::validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(trimmed.to_string())
}

/// Non-empty trimmed text up to 200 characters
pub fn required(field: &str, value: &str) -> Result<String> {
    text(field, value, 1, 200)
}

/// Optional text; blank input becomes `None`
pub fn optional_text(field: &str, value: Option<&str>, max: usize) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => text(field, v, 1, max).map(Some),
    }
}

/// Lower-cased, trimmed email address
pub fn email(value: &str) -> Result<String> {
    let email = value.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 254 {
        return Err(ServerError::validation("email is not valid"));
    }
    Ok(email)
}

pub fn optional_email(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => email(v).map(Some),
    }
}

/// http(s) URL with a host part
pub fn website(value: &str) -> Result<String> {
    let url = value.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ServerError::validation("website must be an http or https URL"))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || url.chars().any(char::is_whitespace) {
        return Err(ServerError::validation("website must be an http or https URL"));
    }
    Ok(url.to_string())
}

pub fn optional_website(value: Option<&str>) -> Result<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => website(v).map(Some),
    }
}

pub fn positive_id(field: &str, value: i32) -> Result<i32> {
    if value <= 0 {
        return Err(ServerError::validation(format!("{} must be a positive id", field)));
    }
    Ok(value)
}

pub fn estimated_value(value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(ServerError::validation("estimatedValue cannot be negative"));
    }
    Ok(value)
}

pub fn probability(value: f64) -> Result<f64> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ServerError::validation("probability must be between 0 and 1"));
    }
    Ok(value)
}

/// RFC 3339 date-time as Unix seconds
pub fn timestamp(field: &str, value: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.timestamp())
        .map_err(|_| ServerError::validation(format!("{} must be an RFC 3339 date-time", field)))
}

pub fn optional_timestamp(field: &str, value: Option<&str>) -> Result<Option<i64>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => timestamp(field, v).map(Some),
    }
}

pub fn password(value: &str) -> Result<()> {
    let len = value.chars().count();
    if len < 6 {
        return Err(ServerError::validation("password must be at least 6 characters"));
    }
    if len > 200 {
        return Err(ServerError::validation("password must be at most 200 characters"));
    }
    Ok(())
}
