//! Local checks run before any credentials leave the process.
//!
//! Forms derive [`Validate`]; [`check`] runs the derived rules and turns the
//! first failure into an [`Error::Validation`] naming the offending form field
//! so a front-end can show the message next to that field.

use std::borrow::Cow;

use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::{Error, Result};

/// Minimum body weight, in kilograms, for a donor to register.
pub const MIN_DONOR_WEIGHT_KG: u32 = 45;

/// Key under which `schema` level failures are reported.
const SCHEMA_FIELD: &str = "__all__";

const REQUIRED: &str = "required";

/// Fails for empty strings.
pub(crate) fn present(value: &str) -> std::result::Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(REQUIRED));
    }
    Ok(())
}

/// Fails for empty or whitespace-only strings.
pub(crate) fn not_blank(value: &str) -> std::result::Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(REQUIRED));
    }
    Ok(())
}

/// A cross-field failure.  The code carries the field to blame.
pub(crate) fn rejection(field: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(field);
    err.message = Some(Cow::Borrowed(message));
    err
}

/// Runs the derived rules of `value`.  Field failures are reported in the
/// order given by `fields`; cross-field failures come last.
pub fn check<T: Validate>(value: &T, fields: &[&str]) -> Result<()> {
    match value.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(first_error(&errors, fields)),
    }
}

fn first_error(errors: &ValidationErrors, fields: &[&str]) -> Error {
    let failures = errors.field_errors();
    let ordered = fields.iter().copied().chain(std::iter::once(SCHEMA_FIELD));
    for field in ordered {
        // A missing value is reported ahead of a malformed one.
        let Some(err) = failures.get(field).and_then(|errs| {
            errs.iter()
                .find(|err| err.code == REQUIRED)
                .or_else(|| errs.first())
        }) else {
            continue;
        };
        let param = if field == SCHEMA_FIELD {
            err.code.to_string()
        } else {
            field.to_string()
        };
        let message = match &err.message {
            Some(message) => message.to_string(),
            None => format!("{} is invalid", param),
        };
        return Error::validation(message, Some(param));
    }
    Error::validation(errors.to_string(), None)
}
