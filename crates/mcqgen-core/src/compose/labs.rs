//! Laboratory test formatter.
//!
//! Builds the "Laboratory Tests" text block: a header line followed by one
//! line per candidate test that the record actually contains.
//!
//! ## Selection vs. formatting
//!
//! | Concern | Decided by |
//! |---------|------------|
//! | Which tests are eligible | evaluator candidates AND record lab keys |
//! | Line order | evaluator category order, then neutral tests |
//! | Line content | [`LabFormatOptions`] |
//!
//! `only_abnormal_labs` is the one option that may drop an eligible line;
//! no option ever adds a line.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::evaluators::Evaluator;
use crate::record::{AdmissionRecord, LabTestMapping};
use crate::values::{self, Abnormality};

/// Header when reference ranges are not shown.
pub const LAB_HEADER: &str = "(<FLUID>) <TEST>: <RESULT>\n";

/// Header when reference ranges are shown.
pub const LAB_HEADER_WITH_RANGE: &str =
    "(<FLUID>) <TEST>: <RESULT> | REFERENCE RANGE (RR): [LOWER RR - UPPER RR]\n";

/// Fluid shown for tests missing from the lab test mapping.
pub const UNKNOWN_FLUID: &str = "Unknown";

/// Per-line formatting toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabFormatOptions {
    /// Append `| RR: [lower - upper]` when both bounds are known
    pub include_ref_range: bool,

    /// Replace classifiable results with Low / Normal / High
    pub bin_lab_results: bool,

    /// Bin only results outside their range
    pub bin_lab_results_abnormal: bool,

    /// Drop results classified as normal
    pub only_abnormal_labs: bool,
}

impl LabFormatOptions {
    pub fn header(&self) -> &'static str {
        if self.include_ref_range {
            LAB_HEADER_WITH_RANGE
        } else {
            LAB_HEADER
        }
    }
}

/// Format the laboratory block for one record.
pub fn format_laboratory_tests(
    record: &AdmissionRecord,
    evaluator: &dyn Evaluator,
    mapping: &LabTestMapping,
    options: &LabFormatOptions,
) -> String {
    let mut text = options.header().to_string();

    let Some(results) = record.lab_results() else {
        return text;
    };

    for test in evaluator.candidate_lab_tests() {
        let Some(value) = results.get(test) else {
            continue;
        };
        if let Some(line) = format_lab_line(test, value, record, mapping, options) {
            text.push_str(&line);
        }
    }

    text
}

/// Format a single result line, or `None` when `only_abnormal_labs`
/// suppresses it.
pub fn format_lab_line(
    test: &str,
    value: &Value,
    record: &AdmissionRecord,
    mapping: &LabTestMapping,
    options: &LabFormatOptions,
) -> Option<String> {
    let info = mapping.get(test);
    if info.is_none() {
        tracing::debug!(test, "Lab test missing from mapping");
    }

    let fluid = info.map(|i| i.fluid.as_str()).unwrap_or(UNKNOWN_FLUID);
    let label = info.and_then(|i| i.label.as_deref()).unwrap_or(test);

    let mut range = record.reference_range(test);
    if let Some(info) = info {
        range = range.or(info.default_range());
    }

    let abnormality = values::classify(values::numeric_value(value), range);
    if options.only_abnormal_labs && abnormality == Abnormality::Normal {
        return None;
    }

    let binned = options.bin_lab_results
        && (!options.bin_lab_results_abnormal || abnormality.is_abnormal());

    let result = match abnormality.bucket() {
        Some(bucket) if binned => bucket.to_string(),
        _ => {
            let raw = values::display_value(value);
            match info.and_then(|i| i.units.as_deref()) {
                Some(units) if value.is_number() => format!("{} {}", raw, units),
                _ => raw,
            }
        }
    };

    let mut line = format!("({}) {}: {}", fluid, label, result);
    if options.include_ref_range {
        if let Some((lower, upper)) = range.bounds() {
            line.push_str(&format!(
                " | RR: [{} - {}]",
                values::format_bound(lower),
                values::format_bound(upper)
            ));
        }
    }
    line.push('\n');

    Some(line)
}
