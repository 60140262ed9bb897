//! Shared validation helpers for inbound HTTP adapters.

use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

use crate::domain::Error;

/// Validation error codes carried in `details.code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ValidationCode {
    MissingField,
    BlankField,
    InvalidUuid,
    InvalidDate,
    TooManyItems,
}

impl ValidationCode {
    fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::BlankField => "blank_field",
            Self::InvalidUuid => "invalid_uuid",
            Self::InvalidDate => "invalid_date",
            Self::TooManyItems => "too_many_items",
        }
    }
}

/// Newtype wrapper for HTTP field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct FieldName(&'static str);

impl FieldName {
    pub(crate) const fn new(name: &'static str) -> Self {
        Self(name)
    }

    pub(crate) fn as_str(self) -> &'static str {
        self.0
    }
}

fn field_error(field: FieldName, message: String, code: ValidationCode) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field.as_str(),
        "code": code.as_str(),
    }))
}

fn value_error(field: FieldName, message: String, code: ValidationCode, value: &str) -> Error {
    Error::invalid_request(message).with_details(json!({
        "field": field.as_str(),
        "value": value,
        "code": code.as_str(),
    }))
}

pub(crate) fn missing_field_error(field: FieldName) -> Error {
    let name = field.as_str();
    field_error(
        field,
        format!("missing required field: {name}"),
        ValidationCode::MissingField,
    )
}

/// Require a present, non-blank string and return it trimmed.
pub(crate) fn required_text(value: Option<String>, field: FieldName) -> Result<String, Error> {
    let Some(raw) = value else {
        return Err(missing_field_error(field));
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        let name = field.as_str();
        return Err(field_error(
            field,
            format!("{name} must not be blank"),
            ValidationCode::BlankField,
        ));
    }
    Ok(trimmed.to_owned())
}

pub(crate) fn parse_uuid(value: &str, field: FieldName) -> Result<Uuid, Error> {
    Uuid::parse_str(value).map_err(|_| {
        let name = field.as_str();
        value_error(
            field,
            format!("{name} must be a valid UUID"),
            ValidationCode::InvalidUuid,
            value,
        )
    })
}

/// Parse a `YYYY-MM-DD` calendar date.
pub(crate) fn parse_date(value: Option<String>, field: FieldName) -> Result<NaiveDate, Error> {
    let raw = required_text(value, field)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
        let name = field.as_str();
        value_error(
            field,
            format!("{name} must be a YYYY-MM-DD date"),
            ValidationCode::InvalidDate,
            &raw,
        )
    })
}

pub(crate) fn too_many_items_error(field: FieldName, limit: usize) -> Error {
    let name = field.as_str();
    Error::invalid_request(format!("{name} accepts at most {limit} items")).with_details(json!({
        "field": name,
        "limit": limit,
        "code": ValidationCode::TooManyItems.as_str(),
    }))
}
