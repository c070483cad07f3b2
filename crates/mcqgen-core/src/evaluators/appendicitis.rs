//! Appendicitis evaluator.
//!
//! Appendicitis is a clinical and imaging diagnosis; the only laboratory
//! signal that counts is systemic inflammation.

use super::{panels, Evaluator, LabCategory, LabPanels, Pathology};

const INFLAMMATION: &[&str] = &["White Blood Cells", "C-Reactive Protein"];

/// Evaluator for acute appendicitis.
#[derive(Debug)]
pub struct AppendicitisEvaluator {
    panels: LabPanels,
}

impl AppendicitisEvaluator {
    pub fn new() -> Self {
        Self {
            panels: LabPanels::new(
                vec![LabCategory::new("Inflammation", INFLAMMATION)],
                panels::neutral_tests(&[INFLAMMATION]),
            ),
        }
    }
}

impl Default for AppendicitisEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for AppendicitisEvaluator {
    fn pathology(&self) -> Pathology {
        Pathology::Appendicitis
    }

    fn panels(&self) -> &LabPanels {
        &self.panels
    }
}
