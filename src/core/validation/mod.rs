//! Validation and filtering system
//!
//! Two complementary tools live here:
//!
//! - [`FieldRules`]: closure-based filters and validators applied to JSON
//!   records (used for tours, whose updates are merged into the stored
//!   record and re-validated as a whole);
//! - `validator::Validate` derives on typed request structs, converted to
//!   the API's field errors by [`field_errors`].

pub mod extractor;
pub mod filters;
pub mod rules;
pub mod validators;

pub use extractor::ApiJson;
pub use rules::FieldRules;

use crate::core::error::{AppError, FieldValidationError};
use validator::{Validate, ValidationErrors};

/// Flatten `validator` errors into one message per field, ordered by field name
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldValidationError> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(&b.0));

    fields
        .into_iter()
        .filter_map(|(field, errs)| {
            let first = errs.first()?;
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| format!("{} is invalid", camel_case(&field)));
            Some(FieldValidationError::new(camel_case(&field), message))
        })
        .collect()
}

/// Run `validator` on `value`, mapping failures to an [`AppError`]
pub fn validate<T: Validate>(value: &T) -> Result<(), AppError> {
    value.validate().map_err(|e| AppError::from(field_errors(&e)))
}

fn camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut upper = false;
    for c in snake.chars() {
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
