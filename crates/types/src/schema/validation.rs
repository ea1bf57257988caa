//! Validation helpers for collected field values.
//!
//! These routines mirror the native constraints a browser enforces on the
//! rendered inputs so hosts without a browser can check a tree before submit.

use regex::Regex;
use serde_json::Value;

use super::{Constraints, PrimitiveKind};

/// Validate a scalar candidate against a primitive kind and its constraints.
///
/// `Null` is accepted here; presence is checked separately through `required`.
pub fn validate_primitive_value(candidate: &Value, kind: PrimitiveKind, constraints: &Constraints) -> Result<(), String> {
    if candidate.is_null() {
        return Ok(());
    }

    match kind {
        PrimitiveKind::Boolean => {
            if candidate.is_boolean() {
                Ok(())
            } else {
                Err("value must be true or false".to_string())
            }
        }
        PrimitiveKind::Integer => {
            let number = numeric_candidate(candidate).ok_or_else(|| "value must be a whole number".to_string())?;
            if number.fract() != 0.0 {
                return Err("value must be a whole number".to_string());
            }
            validate_number_bounds(number, constraints)
        }
        PrimitiveKind::Number => {
            let number = numeric_candidate(candidate).ok_or_else(|| "value must be a number".to_string())?;
            validate_number_bounds(number, constraints)
        }
        PrimitiveKind::String => {
            let Value::String(text) = candidate else {
                return Err("value must be text".to_string());
            };
            validate_text(text, constraints)
        }
    }
}

/// Validate a candidate against a fixed set of allowed literals.
pub fn validate_enumerated_value(candidate: &Value, allowed_values: &[Value]) -> Result<(), String> {
    if candidate.is_null() || allowed_values.iter().any(|allowed| json_values_match(allowed, candidate)) {
        Ok(())
    } else {
        Err("value is not in the allowed set".to_string())
    }
}

fn validate_text(text: &str, constraints: &Constraints) -> Result<(), String> {
    let length = text.chars().count();
    if let Some(min_length) = constraints.min_length
        && length < min_length
    {
        return Err(format!("value must be at least {} characters", min_length));
    }

    if let Some(max_length) = constraints.max_length
        && length > max_length
    {
        return Err(format!("value must be at most {} characters", max_length));
    }

    if let Some(pattern) = &constraints.pattern {
        let regex = Regex::new(pattern).map_err(|error| format!("invalid pattern '{}': {}", pattern, error))?;
        if !regex.is_match(text) {
            return Err(format!("value must match the pattern {}", pattern));
        }
    }
    Ok(())
}

fn validate_number_bounds(number: f64, constraints: &Constraints) -> Result<(), String> {
    if let Some(minimum) = constraints.minimum
        && number < minimum
    {
        return Err(format!("value must be at least {}", minimum));
    }
    if let Some(maximum) = constraints.maximum
        && number > maximum
    {
        return Err(format!("value must be at most {}", maximum));
    }
    if let Some(minimum) = constraints.exclusive_minimum
        && number <= minimum
    {
        return Err(format!("value must be greater than {}", minimum));
    }
    if let Some(maximum) = constraints.exclusive_maximum
        && number >= maximum
    {
        return Err(format!("value must be less than {}", maximum));
    }
    if let Some(step) = constraints.multiple_of
        && step > 0.0
    {
        let quotient = number / step;
        if (quotient - quotient.round()).abs() > 1e-9 {
            return Err(format!("value must be a multiple of {}", step));
        }
    }
    Ok(())
}

/// Form inputs deliver numbers as text; accept either representation.
fn numeric_candidate(candidate: &Value) -> Option<f64> {
    match candidate {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn json_values_match(expected: &Value, candidate: &Value) -> bool {
    if expected == candidate {
        return true;
    }
    match (expected, candidate) {
        (Value::String(expected_text), Value::String(candidate_text)) => expected_text == candidate_text,
        (Value::String(expected_text), other) => expected_text == &other.to_string(),
        (other, Value::String(candidate_text)) => {
            if let Ok(parsed) = serde_json::from_str::<Value>(candidate_text) {
                other == &parsed
            } else {
                false
            }
        }
        _ => false,
    }
}
