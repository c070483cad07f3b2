//! Field composition pipeline.
//!
//! An order string such as `"l"` or `"li"` selects which operations run and
//! in what sequence. Each operation receives the input accumulated so far,
//! adds or replaces derived text fields, and may hand back an auxiliary
//! artifact that travels alongside the record without being merged into it.
//!
//! After the last step the accumulated fields overwrite same-named record
//! fields, and the per-test reference-range fields are always removed from
//! the merged record, whichever operations ran.

pub mod imaging;
pub mod labs;

pub use imaging::RadiologyReport;
pub use labs::{format_laboratory_tests, LabFormatOptions, LAB_HEADER, LAB_HEADER_WITH_RANGE};

use std::fmt;

use thiserror::Error;

use crate::evaluators::Evaluator;
use crate::record::{
    AdmissionRecord, LabTestMapping, LABORATORY_TESTS, RADIOLOGY, REFERENCE_RANGE_LOWER,
    REFERENCE_RANGE_UPPER,
};

/// Errors raised while composing a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositionError {
    #[error("Unknown operation code '{0}'. Expected one of: l (laboratory tests), i (imaging)")]
    UnknownOperation(char),

    #[error("Record has no 'Laboratory Tests' mapping")]
    MissingLabResults,

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

/// A composition operation, keyed by its single-character code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    LaboratoryTests,
    Imaging,
}

impl Operation {
    pub const ALL: [Operation; 2] = [Operation::LaboratoryTests, Operation::Imaging];

    pub fn from_code(code: char) -> Result<Self, CompositionError> {
        Operation::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or(CompositionError::UnknownOperation(code))
    }

    pub fn code(&self) -> char {
        match self {
            Operation::LaboratoryTests => 'l',
            Operation::Imaging => 'i',
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Operation::LaboratoryTests => "include_laboratory_tests",
            Operation::Imaging => "include_imaging",
        }
    }

    /// Run one step against the current accumulated input.
    pub fn apply(
        &self,
        mut input: ComposedInput,
        ctx: &CompositionContext<'_>,
    ) -> Result<StepOutput, CompositionError> {
        match self {
            Operation::LaboratoryTests => {
                if ctx.record.lab_results().is_none() {
                    return Err(CompositionError::MissingLabResults);
                }
                let text =
                    labs::format_laboratory_tests(ctx.record, ctx.evaluator, ctx.mapping, ctx.options);
                input.insert(LABORATORY_TESTS, text);
                Ok(StepOutput::Input(input))
            }
            Operation::Imaging => {
                let reports = imaging::radiology_reports(ctx.record)?;
                input.insert(RADIOLOGY, imaging::format_radiology(&reports));
                Ok(StepOutput::WithArtifact(
                    input,
                    Artifact::RadiologyReports(reports),
                ))
            }
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

/// Derived text fields in insertion order. Re-inserting a field replaces
/// its text in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComposedInput {
    fields: Vec<(String, String)>,
}

impl ComposedInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, text: impl Into<String>) {
        let field = field.into();
        let text = text.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = text,
            None => self.fields.push((field, text)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, text)| text.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, t)| (n.as_str(), t.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Side output of an operation, threaded separately from the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    RadiologyReports(Vec<RadiologyReport>),
}

/// What a step hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutput {
    Input(ComposedInput),
    WithArtifact(ComposedInput, Artifact),
}

/// Everything an operation may read. Rebuilt by the composer for every step.
pub struct CompositionContext<'a> {
    pub record: &'a AdmissionRecord,
    pub evaluator: &'a dyn Evaluator,
    pub mapping: &'a LabTestMapping,
    pub options: &'a LabFormatOptions,
}

/// The merged record plus any artifacts, in step order.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub record: AdmissionRecord,
    pub artifacts: Vec<Artifact>,
}

/// Runs the operations selected by an order string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldComposer {
    operations: Vec<Operation>,
}

impl FieldComposer {
    /// Parse an order string. Fails on the first unknown code.
    pub fn from_order(order: &str) -> Result<Self, CompositionError> {
        let operations = order
            .chars()
            .map(Operation::from_code)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { operations })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// Compose one record. The input record is left untouched.
    pub fn compose(
        &self,
        record: &AdmissionRecord,
        evaluator: &dyn Evaluator,
        mapping: &LabTestMapping,
        options: &LabFormatOptions,
    ) -> Result<Composition, CompositionError> {
        let mut input = ComposedInput::new();
        let mut artifacts = Vec::new();

        for operation in &self.operations {
            let ctx = CompositionContext {
                record,
                evaluator,
                mapping,
                options,
            };
            tracing::trace!(operation = operation.name(), "Applying composition step");

            match operation.apply(input, &ctx)? {
                StepOutput::Input(next) => input = next,
                StepOutput::WithArtifact(next, artifact) => {
                    input = next;
                    artifacts.push(artifact);
                }
            }
        }

        let mut merged = record.clone();
        for (field, text) in input.iter() {
            merged.set_text(field, text);
        }
        merged.remove(REFERENCE_RANGE_LOWER);
        merged.remove(REFERENCE_RANGE_UPPER);

        Ok(Composition {
            record: merged,
            artifacts,
        })
    }
}
