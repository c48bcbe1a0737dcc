//! Input validation helpers

use once_cell::sync::Lazy;
use regex::Regex;
use validator::{ValidationError, ValidationErrors};

/// E.164: leading plus, country code, up to 15 digits in total
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+[1-9][0-9]{7,14}$").unwrap());

/// Field name quoted by serde in "missing field `x`" style messages
static SERDE_FIELD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"field `([A-Za-z0-9_]+)`").unwrap());

/// Leading path segment in "target type: price: invalid type" style messages
static SERDE_PATH_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"target type: ([A-Za-z0-9_]+)(?:[.\[][^:]*)?: ").unwrap());

/// Drop the separators people type into phone numbers.
pub fn normalize_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

pub fn is_valid_phone(raw: &str) -> bool {
    PHONE_REGEX.is_match(&normalize_phone(raw))
}

/// `validator` hook for phone number fields
pub fn validate_phone(raw: &str) -> Result<(), ValidationError> {
    if is_valid_phone(raw) {
        Ok(())
    } else {
        Err(ValidationError::new("phone"))
    }
}

pub fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

/// Offending fields in boundary (camelCase) spelling, sorted.
pub fn invalid_fields(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<String> = errors
        .field_errors()
        .keys()
        .map(|name| to_camel_case(name))
        .collect();
    fields.sort();
    fields
}

/// Best effort field name from a JSON body deserialization error.
pub fn field_from_serde_message(message: &str) -> Option<String> {
    SERDE_FIELD_REGEX
        .captures(message)
        .or_else(|| SERDE_PATH_REGEX.captures(message))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
