// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use time::macros::format_description;
use time::{Date, Month};

use crate::{FieldKind, FieldSchema, Schema, Values, value_is_empty};

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";
pub const MONTH_LAYOUT: &str = "YYYY-MM";

/// Field key to the message shown under that field.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    Required,
    InvalidNumber,
    InvalidDate,
    InvalidMonth,
    UnknownOption,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required => f.write_str("is required"),
            Self::InvalidNumber => f.write_str("must be a number"),
            Self::InvalidDate => write!(f, "must be a date ({DATE_LAYOUT})"),
            Self::InvalidMonth => write!(f, "must be a month ({MONTH_LAYOUT})"),
            Self::UnknownOption => f.write_str("must be one of the listed options"),
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = std::result::Result<T, ValidationError>;

impl ValidationError {
    pub fn message_for(self, field: &FieldSchema) -> String {
        format!("{} {self}", field.label)
    }
}

/// Checks every active field and returns one message per violated field.
///
/// Fields whose `required_if` is false are skipped entirely. Resolved values
/// of dependent fields are never consulted.
pub fn validate(schema: &Schema, values: &Values) -> FieldErrors {
    schema
        .active_fields(values)
        .filter_map(|field| {
            check_field(field, values)
                .err()
                .map(|error| (field.key.clone(), error.message_for(field)))
        })
        .collect()
}

pub fn check_field(field: &FieldSchema, values: &Values) -> ValidationResult<()> {
    if value_is_empty(values, &field.key) {
        return if field.is_required(values) {
            Err(ValidationError::Required)
        } else {
            Ok(())
        };
    }
    if field.readonly {
        return Ok(());
    }

    let raw = values.get(&field.key).map_or("", String::as_str);
    match field.kind {
        FieldKind::Number => parse_number(raw).map(|_| ()),
        FieldKind::Date => parse_date(raw).map(|_| ()),
        FieldKind::Month => parse_month(raw).map(|_| ()),
        FieldKind::Select if !field.options.is_empty() => {
            if field.option_label(raw).is_some() {
                Ok(())
            } else {
                Err(ValidationError::UnknownOption)
            }
        }
        FieldKind::Select | FieldKind::Text | FieldKind::Hidden | FieldKind::File => Ok(()),
    }
}

pub fn parse_number(input: &str) -> ValidationResult<f64> {
    let value: f64 = input
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidNumber)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::InvalidNumber)
    }
}

pub fn parse_date(input: &str) -> ValidationResult<Date> {
    Date::parse(input.trim(), &format_description!("[year]-[month]-[day]"))
        .map_err(|_| ValidationError::InvalidDate)
}

/// Parses a strict `YYYY-MM` value.
pub fn parse_month(input: &str) -> ValidationResult<(i32, Month)> {
    let bytes = input.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return Err(ValidationError::InvalidMonth);
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return Err(ValidationError::InvalidMonth);
    }
    let year: i32 = input[..4]
        .parse()
        .map_err(|_| ValidationError::InvalidMonth)?;
    let month: u8 = input[5..]
        .parse()
        .map_err(|_| ValidationError::InvalidMonth)?;
    let month = Month::try_from(month).map_err(|_| ValidationError::InvalidMonth)?;
    Ok((year, month))
}

#[cfg(test)]
mod tests {
    use super::{ValidationError, check_field, parse_date, parse_month, validate};
    use crate::{FieldSchema, Schema, SelectOption, Values};
    use time::Month;

    fn values(pairs: &[(&str, &str)]) -> Values {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect()
    }

    fn loan_schema() -> Schema {
        Schema::new(vec![
            FieldSchema::date("apply_date", "Tanggal Pengajuan").required(),
            FieldSchema::number("amount", "Besar Pinjaman").required(),
            FieldSchema::select(
                "status",
                "Status",
                [
                    SelectOption::new("approved", "Disetujui"),
                    SelectOption::new("rejected", "Ditolak"),
                ],
            ),
            FieldSchema::text("reason", "Alasan Penolakan")
                .required_if(|values| values.get("status").is_some_and(|status| status == "rejected")),
            FieldSchema::text("address", "Alamat"),
        ])
        .expect("valid loan schema")
    }

    #[test]
    fn missing_required_fields_are_reported_with_labels() {
        let errors = validate(&loan_schema(), &Values::new());
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.get("apply_date").map(String::as_str),
            Some("Tanggal Pengajuan is required")
        );
        assert_eq!(
            errors.get("amount").map(String::as_str),
            Some("Besar Pinjaman is required")
        );
    }

    #[test]
    fn whitespace_counts_as_empty() {
        let errors = validate(
            &loan_schema(),
            &values(&[("apply_date", "2024-01-05"), ("amount", "   ")]),
        );
        assert!(errors.contains_key("amount"));
    }

    #[test]
    fn conditional_field_excluded_when_predicate_is_false() {
        let base = [("apply_date", "2024-01-05"), ("amount", "100000")];

        let mut approved = values(&base);
        approved.insert("status".to_owned(), "approved".to_owned());
        assert!(!validate(&loan_schema(), &approved).contains_key("reason"));

        let mut rejected = values(&base);
        rejected.insert("status".to_owned(), "rejected".to_owned());
        let errors = validate(&loan_schema(), &rejected);
        assert_eq!(
            errors.get("reason").map(String::as_str),
            Some("Alasan Penolakan is required")
        );
    }

    #[test]
    fn inactive_conditional_field_is_not_type_checked_either() {
        let schema = Schema::new(vec![
            FieldSchema::number("fine", "Denda").required_if(|_| false),
        ])
        .expect("valid schema");
        assert!(validate(&schema, &values(&[("fine", "abc")])).is_empty());
    }

    #[test]
    fn typed_values_are_checked() {
        let errors = validate(
            &loan_schema(),
            &values(&[
                ("apply_date", "05/01/2024"),
                ("amount", "lots"),
                ("status", "pending"),
            ]),
        );
        assert_eq!(
            errors.get("apply_date").map(String::as_str),
            Some("Tanggal Pengajuan must be a date (YYYY-MM-DD)")
        );
        assert_eq!(
            errors.get("amount").map(String::as_str),
            Some("Besar Pinjaman must be a number")
        );
        assert!(errors.contains_key("status"));
    }

    #[test]
    fn readonly_values_skip_type_checks() {
        let field = FieldSchema::number("bagi_hasil", "Bagi Hasil").readonly();
        assert_eq!(check_field(&field, &values(&[("bagi_hasil", "n/a")])), Ok(()));
    }

    #[test]
    fn parse_helpers() {
        assert!(parse_date("2024-02-29").is_ok());
        assert_eq!(parse_date("2023-02-29"), Err(ValidationError::InvalidDate));
        assert_eq!(parse_month("2024-07"), Ok((2024, Month::July)));
        assert_eq!(parse_month("2024-7"), Err(ValidationError::InvalidMonth));
        assert_eq!(parse_month("2024-00"), Err(ValidationError::InvalidMonth));
    }
}
