//! Pathology evaluators.
//!
//! An evaluator declares which laboratory tests are clinically relevant when
//! assessing one pathology. Composition only ever reads the declared test
//! sets; scoring lives elsewhere.
//!
//! ## Lifecycle
//!
//! Evaluators carry per-use state (see [`LabPanels::consultations`]), so a
//! fresh instance is created for every patient through [`load_evaluator`] or
//! [`Pathology::evaluator`]. Instances are never cached or shared.

mod appendicitis;
mod cholecystitis;
mod diverticulitis;
mod pancreatitis;
pub mod panels;

pub use appendicitis::AppendicitisEvaluator;
pub use cholecystitis::CholecystitisEvaluator;
pub use diverticulitis::DiverticulitisEvaluator;
pub use pancreatitis::PancreatitisEvaluator;

use std::cell::Cell;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from evaluator selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("Unsupported pathology: '{0}'. Expected one of: appendicitis, cholecystitis, diverticulitis, pancreatitis")]
    UnsupportedPathology(String),
}

/// The closed set of pathologies in the four-way differential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pathology {
    Appendicitis,
    Cholecystitis,
    Diverticulitis,
    Pancreatitis,
}

impl Pathology {
    /// All pathologies, in batch order.
    pub const ALL: [Pathology; 4] = [
        Pathology::Appendicitis,
        Pathology::Cholecystitis,
        Pathology::Diverticulitis,
        Pathology::Pancreatitis,
    ];

    /// Lowercase tag used in configuration and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Pathology::Appendicitis => "appendicitis",
            Pathology::Cholecystitis => "cholecystitis",
            Pathology::Diverticulitis => "diverticulitis",
            Pathology::Pancreatitis => "pancreatitis",
        }
    }

    /// Capitalized name as it appears in answer choices.
    pub fn display_name(&self) -> &'static str {
        match self {
            Pathology::Appendicitis => "Appendicitis",
            Pathology::Cholecystitis => "Cholecystitis",
            Pathology::Diverticulitis => "Diverticulitis",
            Pathology::Pancreatitis => "Pancreatitis",
        }
    }

    /// Construct a fresh evaluator for this pathology.
    pub fn evaluator(self) -> Box<dyn Evaluator> {
        match self {
            Pathology::Appendicitis => Box::new(AppendicitisEvaluator::new()),
            Pathology::Cholecystitis => Box::new(CholecystitisEvaluator::new()),
            Pathology::Diverticulitis => Box::new(DiverticulitisEvaluator::new()),
            Pathology::Pancreatitis => Box::new(PancreatitisEvaluator::new()),
        }
    }
}

impl fmt::Display for Pathology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Pathology {
    type Err = EvaluatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Pathology::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| EvaluatorError::UnsupportedPathology(s.to_string()))
    }
}

/// Select and construct the evaluator for a pathology tag.
///
/// Must be called once per patient; the returned evaluator is never reused.
pub fn load_evaluator(tag: &str) -> Result<Box<dyn Evaluator>, EvaluatorError> {
    let pathology: Pathology = tag.parse()?;
    Ok(pathology.evaluator())
}

/// A named group of laboratory tests, in declared order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabCategory {
    pub name: String,
    pub tests: Vec<String>,
}

impl LabCategory {
    pub fn new(name: impl Into<String>, tests: &[&str]) -> Self {
        Self {
            name: name.into(),
            tests: tests.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Declared laboratory test sets of an evaluator.
#[derive(Debug)]
pub struct LabPanels {
    required: Vec<LabCategory>,
    neutral: Vec<String>,
    consultations: Cell<usize>,
}

impl LabPanels {
    pub fn new(required: Vec<LabCategory>, neutral: Vec<String>) -> Self {
        Self {
            required,
            neutral,
            consultations: Cell::new(0),
        }
    }

    /// Number of times the candidate list was requested from this instance.
    pub fn consultations(&self) -> usize {
        self.consultations.get()
    }
}

/// A per-pathology capability declaring the relevant laboratory tests.
pub trait Evaluator: Send {
    /// The pathology this evaluator assesses.
    fn pathology(&self) -> Pathology;

    /// The declared panels backing this evaluator.
    fn panels(&self) -> &LabPanels;

    /// Required tests grouped by category, in declared category order.
    fn required_lab_tests(&self) -> &[LabCategory] {
        &self.panels().required
    }

    /// Tests that are reported but carry no diagnostic weight.
    fn neutral_lab_tests(&self) -> &[String] {
        &self.panels().neutral
    }

    /// Every category's tests in declared order, then the neutral tests.
    ///
    /// Names repeated across categories appear once per occurrence.
    fn candidate_lab_tests(&self) -> Vec<&str> {
        let panels = self.panels();
        panels.consultations.set(panels.consultations.get() + 1);

        panels
            .required
            .iter()
            .flat_map(|category| category.tests.iter())
            .chain(panels.neutral.iter())
            .map(String::as_str)
            .collect()
    }
}
