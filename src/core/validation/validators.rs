//! Reusable field validators
//!
//! Each factory returns a closure checked against a field of a JSON record.
//! Missing fields are passed in as `Value::Null`; every validator except
//! [`required`] lets `null` through so optional fields stay optional.

use serde_json::Value;

pub type ValidatorFn = Box<dyn Fn(&str, &Value) -> Result<(), String> + Send + Sync>;

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Validator: field is present and not blank
pub fn required(message: &'static str) -> ValidatorFn {
    Box::new(move |_: &str, value: &Value| {
        if is_blank(value) {
            Err(message.to_string())
        } else {
            Ok(())
        }
    })
}

/// Validator: value is a JSON number
pub fn number() -> ValidatorFn {
    Box::new(|field: &str, value: &Value| match value {
        Value::Null | Value::Number(_) => Ok(()),
        _ => Err(format!("{} must be a number", field)),
    })
}

/// Validator: value is a whole, non-negative number
pub fn whole_number() -> ValidatorFn {
    Box::new(|field: &str, value: &Value| match value {
        Value::Null => Ok(()),
        Value::Number(n) if n.as_u64().is_some() => Ok(()),
        _ => Err(format!("{} must be a whole number", field)),
    })
}

/// Validator: value is a string
pub fn string() -> ValidatorFn {
    Box::new(|field: &str, value: &Value| match value {
        Value::Null | Value::String(_) => Ok(()),
        _ => Err(format!("{} must be a string", field)),
    })
}

/// Validator: value is an array of strings
pub fn string_list() -> ValidatorFn {
    Box::new(|field: &str, value: &Value| match value {
        Value::Null => Ok(()),
        Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
        _ => Err(format!("{} must be a list of strings", field)),
    })
}

/// Validator: value is a boolean
pub fn boolean() -> ValidatorFn {
    Box::new(|field: &str, value: &Value| match value {
        Value::Null | Value::Bool(_) => Ok(()),
        _ => Err(format!("{} must be true or false", field)),
    })
}

/// Validator: string length (in characters) within range
pub fn string_length(
    min: usize,
    max: usize,
    too_short: &'static str,
    too_long: &'static str,
) -> ValidatorFn {
    Box::new(move |_: &str, value: &Value| {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if len < min {
                return Err(too_short.to_string());
            }
            if len > max {
                return Err(too_long.to_string());
            }
        }
        Ok(())
    })
}

/// Validator: number must be at least `min`
pub fn min_value(min: f64, message: &'static str) -> ValidatorFn {
    Box::new(move |_: &str, value: &Value| match value.as_f64() {
        Some(num) if num < min => Err(message.to_string()),
        _ => Ok(()),
    })
}

/// Validator: number must not exceed `max`
pub fn max_value(max: f64, message: &'static str) -> ValidatorFn {
    Box::new(move |_: &str, value: &Value| match value.as_f64() {
        Some(num) if num > max => Err(message.to_string()),
        _ => Ok(()),
    })
}

/// Validator: value must be in allowed list
pub fn in_list(allowed: &'static [&'static str], message: &'static str) -> ValidatorFn {
    Box::new(move |_: &str, value: &Value| match value {
        Value::Null => Ok(()),
        Value::String(s) if allowed.contains(&s.as_str()) => Ok(()),
        _ => Err(message.to_string()),
    })
}

/// Validator: every element of an array parses as a date
pub fn date_list() -> ValidatorFn {
    Box::new(|field: &str, value: &Value| match value {
        Value::Null => Ok(()),
        Value::Array(items)
            if items.iter().all(|item| {
                item.as_str()
                    .is_some_and(|s| crate::core::timestamp::parse_loose(s).is_some())
            }) =>
        {
            Ok(())
        }
        _ => Err(format!("{} must be a list of dates", field)),
    })
}
