//! Input validation helpers
//!
//! Validation failures are collected per field so the API can report every
//! problem with a request at once.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub const REQUIRED: &str = "This field is required.";
pub const BLANK: &str = "This field may not be blank.";

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors holding a single message for one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<(), FieldErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Record an error if `value` is blank or longer than `max_len` characters
    pub fn check_text(&mut self, field: &str, value: &str, max_len: usize) {
        if value.trim().is_empty() {
            self.add(field, BLANK);
        } else if value.chars().count() > max_len {
            self.add(
                field,
                format!("Ensure this field has no more than {} characters.", max_len),
            );
        }
    }

    pub fn check_email(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, BLANK);
        } else if !is_valid_email(value) {
            self.add(field, "Enter a valid email address.");
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE
        .as_ref()
        .map(|re| re.is_match(email.trim()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collects_errors() {
        let mut errors = FieldErrors::new();
        assert!(errors.clone().into_result().is_ok());

        errors.check_text("title", "   ", 10);
        errors.check_text("tagline", "abcdefghijk", 10);
        errors.check_text("about", "fine", 10);

        assert_eq!(errors.get("title"), Some(&[BLANK.to_string()][..]));
        assert!(errors.get("tagline").is_some());
        assert!(errors.get("about").is_none());
        assert!(errors.into_result().is_err());
    }

    #[test]
    fn test_serializes_as_map() {
        let errors = FieldErrors::single("email", "Enter a valid email address.");
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            serde_json::json!({"email": ["Enter a valid email address."]})
        );
        assert_eq!(errors.to_string(), "email: Enter a valid email address.");
    }

    #[test]
    fn test_email_format() {
        assert!(is_valid_email("ann@example.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
        assert!(!is_valid_email("ann"));
        assert!(!is_valid_email("ann@example"));
        assert!(!is_valid_email("a n@example.com"));
        assert!(!is_valid_email("@example.com"));
    }
}
