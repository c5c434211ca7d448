//! Standard comparator registry.
//!
//! Conditions name their comparator by tag; the registry owns the
//! comparison semantics. An unknown tag or an operand the comparator
//! cannot handle is an error, never a silent non-match.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use warden_core::error::{PolicyError, Result};
use warden_core::traits::ComparatorRegistry;

/// The comparator tags known to [`StandardComparators`].
pub const STANDARD_COMPARATOR_NAMES: [&str; 10] = [
    "==", "!=", "<", ">", "matches", "!matches", "in", "!in", "contains", "!contains",
];

/// The default comparator set.
///
/// * `==` / `!=` — numeric equality when both operands are numbers,
///   string equality otherwise.
/// * `<` / `>` — numeric ordering; both operands must parse as numbers.
/// * `matches` / `!matches` — full-string regular expression match.
/// * `in` / `!in` — membership in the comma-separated expected list.
/// * `contains` / `!contains` — element membership for list values,
///   substring containment for strings.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardComparators;

impl StandardComparators {
    /// Create a new registry.
    pub fn new() -> Self {
        Self
    }
}

lazy_static! {
    static ref STANDARD: StandardComparators = StandardComparators::new();
}

/// The process-wide default registry.
pub fn standard_comparators() -> &'static StandardComparators {
    &STANDARD
}

impl ComparatorRegistry for StandardComparators {
    fn compare(&self, observed: &Value, comparator: &str, expected: &str) -> Result<bool> {
        match comparator {
            "==" => equals(observed, comparator, expected),
            "!=" => equals(observed, comparator, expected).map(|r| !r),
            "<" => ordered(observed, comparator, expected, |l, r| l < r),
            ">" => ordered(observed, comparator, expected, |l, r| l > r),
            "matches" => matches(observed, comparator, expected),
            "!matches" => matches(observed, comparator, expected).map(|r| !r),
            "in" => member_of(observed, comparator, expected),
            "!in" => member_of(observed, comparator, expected).map(|r| !r),
            "contains" => contains(observed, comparator, expected),
            "!contains" => contains(observed, comparator, expected).map(|r| !r),
            other => Err(PolicyError::UnknownComparator(other.to_string()).into()),
        }
    }

    fn contains(&self, comparator: &str) -> bool {
        STANDARD_COMPARATOR_NAMES.contains(&comparator)
    }
}

fn equals(observed: &Value, comparator: &str, expected: &str) -> Result<bool> {
    if let (Some(left), Ok(right)) = (observed.as_f64(), expected.parse::<f64>()) {
        return Ok(left == right);
    }
    Ok(scalar_to_string(observed, comparator)? == expected)
}

fn ordered(
    observed: &Value,
    comparator: &str,
    expected: &str,
    cmp: fn(f64, f64) -> bool,
) -> Result<bool> {
    let left = observed
        .as_f64()
        .or_else(|| observed.as_str().and_then(|s| s.parse().ok()))
        .ok_or_else(|| compare_failed(comparator, format!("'{}' is not a number", observed)))?;
    let right = expected
        .parse::<f64>()
        .map_err(|_| compare_failed(comparator, format!("'{}' is not a number", expected)))?;
    Ok(cmp(left, right))
}

fn matches(observed: &Value, comparator: &str, expected: &str) -> Result<bool> {
    let pattern = Regex::new(&format!("^(?:{})$", expected))
        .map_err(|e| compare_failed(comparator, format!("invalid pattern '{}': {}", expected, e)))?;
    Ok(pattern.is_match(&scalar_to_string(observed, comparator)?))
}

fn member_of(observed: &Value, comparator: &str, expected: &str) -> Result<bool> {
    let value = scalar_to_string(observed, comparator)?;
    Ok(expected.split(',').any(|item| item.trim() == value))
}

fn contains(observed: &Value, comparator: &str, expected: &str) -> Result<bool> {
    match observed {
        Value::Array(items) => Ok(items
            .iter()
            .any(|item| scalar_to_string(item, comparator).map(|s| s == expected).unwrap_or(false))),
        Value::String(s) => Ok(s.contains(expected)),
        other => Err(compare_failed(
            comparator,
            format!("'{}' is neither a list nor a string", other),
        )),
    }
}

fn scalar_to_string(value: &Value, comparator: &str) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(compare_failed(
            comparator,
            format!("'{}' is not a scalar value", other),
        )),
    }
}

fn compare_failed(comparator: &str, reason: String) -> warden_core::Error {
    PolicyError::CompareFailed {
        comparator: comparator.to_string(),
        reason,
    }
    .into()
}
