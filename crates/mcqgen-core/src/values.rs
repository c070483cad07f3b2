//! Laboratory result values.
//!
//! Recorded results are either JSON numbers or free text such as
//! `"17.1 K/uL"`, `"<0.5"` or `"NEG."`. Only the leading decimal number
//! takes part in range classification; everything else is displayed as-is.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    /// Leading signed decimal, e.g. "17.1" in "17.1 K/uL" or "-2" in "-2 mmol/L"
    static ref LEADING_NUMBER: Regex = Regex::new(
        r"^\s*([-+]?(?:\d+(?:\.\d*)?|\.\d+))"
    ).unwrap();
}

/// Reference bounds for one test. Either side may be unknown.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReferenceRange {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl ReferenceRange {
    pub fn new(lower: f64, upper: f64) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    /// Fill missing bounds from `fallback`, side by side.
    pub fn or(self, fallback: ReferenceRange) -> Self {
        Self {
            lower: self.lower.or(fallback.lower),
            upper: self.upper.or(fallback.upper),
        }
    }

    /// Both bounds, when both are known.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        self.lower.zip(self.upper)
    }
}

/// Where a result falls relative to its reference range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abnormality {
    Low,
    Normal,
    High,
    /// Non-numeric result, or no bound known
    Undetermined,
}

impl Abnormality {
    pub fn is_abnormal(&self) -> bool {
        matches!(self, Abnormality::Low | Abnormality::High)
    }

    /// Coarse bucket label, if the result could be classified.
    pub fn bucket(&self) -> Option<&'static str> {
        match self {
            Abnormality::Low => Some("Low"),
            Abnormality::Normal => Some("Normal"),
            Abnormality::High => Some("High"),
            Abnormality::Undetermined => None,
        }
    }
}

/// Numeric part of a recorded value.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => LEADING_NUMBER
            .captures(s)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    }
}

/// Text rendering of a recorded value. Numbers keep their JSON spelling.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Render a bound the way the source data spells floats ("4.0", "0.5").
pub fn format_bound(bound: f64) -> String {
    if bound.is_finite() && bound.fract() == 0.0 {
        format!("{:.1}", bound)
    } else {
        bound.to_string()
    }
}

/// Classify a numeric result against its range.
///
/// A value strictly outside a known bound is abnormal. With at least one
/// known bound and no violation the value is normal.
pub fn classify(value: Option<f64>, range: ReferenceRange) -> Abnormality {
    let Some(value) = value else {
        return Abnormality::Undetermined;
    };

    match (range.lower, range.upper) {
        (None, None) => Abnormality::Undetermined,
        (Some(lower), _) if value < lower => Abnormality::Low,
        (_, Some(upper)) if value > upper => Abnormality::High,
        _ => Abnormality::Normal,
    }
}
