//! Field-level input validation.
//!
//! Request types implement [`Validate`] and collect every problem into [`ValidationErrors`] so
//! the client gets all field messages in one 422 response rather than one at a time.

use chrono::{Datelike, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::errors::Error;

/// Messages keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(())` when nothing was recorded, otherwise a 422 error carrying every message.
    pub fn into_result(self) -> Result<(), Error> {
        if self.is_empty() { Ok(()) } else { Err(Error::Validation { errors: self }) }
    }

    pub fn require_non_blank(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.add(field, "must not be blank");
        }
    }

    pub fn require_non_blank_opt(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value {
            self.require_non_blank(field, value);
        }
    }

    pub fn max_length(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.add(field, format!("must be at most {max} characters"));
        }
    }

    pub fn email(&mut self, field: &str, value: Option<&str>) {
        if let Some(value) = value
            && !is_valid_email(value)
        {
            self.add(field, "must be a valid email address");
        }
    }

    pub fn positive_amount(&mut self, field: &str, value: Decimal) {
        if value <= Decimal::ZERO {
            self.add(field, "must be greater than zero");
        }
    }

    pub fn non_negative(&mut self, field: &str, value: Option<f64>) {
        if let Some(value) = value
            && (value.is_nan() || value < 0.0)
        {
            self.add(field, "must not be negative");
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    f.write_str("; ")?;
                }
                write!(f, "{field} {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Implemented by request bodies that can be checked before touching storage.
pub trait Validate {
    fn validate(&self) -> Result<(), Error>;
}

/// Loose structural check: one `@`, non-empty local part, a dot in the domain, no whitespace.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

/// Brazilian plates, both the old `ABC-1234` / `ABC1234` form and Mercosur `ABC1D23`.
pub fn is_valid_plate(value: &str) -> bool {
    let normalized: Vec<char> = value.chars().filter(|c| *c != '-').collect();
    if normalized.len() != 7 {
        return false;
    }
    let letters = normalized[..3].iter().all(|c| c.is_ascii_alphabetic());
    let digit_at = |i: usize| normalized[i].is_ascii_digit();
    let mercosur = normalized[4].is_ascii_alphabetic();
    letters && digit_at(3) && (normalized[4].is_ascii_digit() || mercosur) && digit_at(5) && digit_at(6)
}

/// Uppercased plate without separators, used for storage and uniqueness.
pub fn normalize_plate(value: &str) -> String {
    value.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect::<String>().to_ascii_uppercase()
}

/// Model years accepted for vehicles.
pub fn is_valid_vehicle_year(year: i32) -> bool {
    (1950..=Utc::now().year() + 1).contains(&year)
}

/// Three uppercase ASCII letters.
pub fn is_valid_currency(value: &str) -> bool {
    value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("ops@fleet.example.com"));
        assert!(!is_valid_email("ops@localhost"));
        assert!(!is_valid_email("@fleet.com"));
        assert!(!is_valid_email("ops@@fleet.com"));
        assert!(!is_valid_email("o ps@fleet.com"));
        assert!(!is_valid_email("ops.fleet.com"));
    }

    #[test]
    fn test_plate_validation() {
        assert!(is_valid_plate("ABC-1234"));
        assert!(is_valid_plate("ABC1234"));
        assert!(is_valid_plate("BRA2E19"));
        assert!(is_valid_plate("bra2e19"));
        assert!(!is_valid_plate("AB-12345"));
        assert!(!is_valid_plate("ABCD123"));
        assert!(!is_valid_plate(""));
        assert_eq!(normalize_plate("abc-1234"), "ABC1234");
    }

    #[test]
    fn test_year_and_currency() {
        assert!(is_valid_vehicle_year(2020));
        assert!(!is_valid_vehicle_year(1900));
        assert!(!is_valid_vehicle_year(Utc::now().year() + 5));
        assert!(is_valid_currency("BRL"));
        assert!(!is_valid_currency("brl"));
        assert!(!is_valid_currency("EURO"));
    }

    #[test]
    fn test_errors_collect_per_field() {
        let mut errors = ValidationErrors::new();
        errors.require_non_blank("name", "  ");
        errors.positive_amount("amount", Decimal::ZERO);
        errors.add("name", "is reserved");

        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["amount", "name"]);
        assert_eq!(errors.messages("name").len(), 2);
        assert_eq!(errors.to_string(), "amount must be greater than zero; name must not be blank; name is reserved");
        assert!(matches!(errors.into_result(), Err(Error::Validation { .. })));
    }

    #[test]
    fn test_empty_errors_are_ok() {
        assert!(ValidationErrors::new().into_result().is_ok());
    }
}
