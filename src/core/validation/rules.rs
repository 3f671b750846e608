//! Declarative per-field rules for JSON records
//!
//! A [`FieldRules`] set holds filters (run first, on present fields only),
//! validators (run on every declared field, `null` when absent) and record
//! rules that look at several fields at once.

use super::filters::FilterFn;
use super::validators::ValidatorFn;
use crate::core::error::FieldValidationError;
use serde_json::{Map, Value};

pub type RecordRuleFn = Box<dyn Fn(&Map<String, Value>) -> Option<FieldValidationError> + Send + Sync>;

pub struct FieldRules {
    entity: &'static str,
    filters: Vec<(&'static str, FilterFn)>,
    validators: Vec<(&'static str, ValidatorFn)>,
    record_rules: Vec<RecordRuleFn>,
}

impl FieldRules {
    pub fn new(entity: &'static str) -> Self {
        Self {
            entity,
            filters: Vec::new(),
            validators: Vec::new(),
            record_rules: Vec::new(),
        }
    }

    pub fn add_filter(&mut self, field: &'static str, filter: FilterFn) -> &mut Self {
        self.filters.push((field, filter));
        self
    }

    pub fn add_validator(&mut self, field: &'static str, validator: ValidatorFn) -> &mut Self {
        self.validators.push((field, validator));
        self
    }

    pub fn add_record_rule(&mut self, rule: RecordRuleFn) -> &mut Self {
        self.record_rules.push(rule);
        self
    }

    /// Filter then validate `payload`
    ///
    /// Returns the filtered record, or every failure with at most one message
    /// per field (the first failing validator, in declaration order).
    pub fn validate_and_filter(&self, payload: Value) -> Result<Value, Vec<FieldValidationError>> {
        let Value::Object(mut record) = payload else {
            return Err(vec![FieldValidationError::new(
                self.entity,
                format!("A {} must be a JSON object", self.entity),
            )]);
        };

        let mut errors: Vec<FieldValidationError> = Vec::new();

        for (field, filter) in &self.filters {
            let Some(value) = record.remove(*field) else {
                continue;
            };
            if value.is_null() {
                record.insert(field.to_string(), value);
                continue;
            }
            match filter(field, value) {
                Ok(filtered) => {
                    record.insert(field.to_string(), filtered);
                }
                Err(e) => errors.push(FieldValidationError::new(*field, e.to_string())),
            }
        }

        for (field, validator) in &self.validators {
            if errors.iter().any(|e| e.field == *field) {
                continue;
            }
            let value = record.get(*field).unwrap_or(&Value::Null);
            if let Err(message) = validator(field, value) {
                errors.push(FieldValidationError::new(*field, message));
            }
        }

        for rule in &self.record_rules {
            if let Some(error) = rule(&record) {
                if !errors.iter().any(|e| e.field == error.field) {
                    errors.push(error);
                }
            }
        }

        if errors.is_empty() {
            Ok(Value::Object(record))
        } else {
            Err(errors)
        }
    }
}
