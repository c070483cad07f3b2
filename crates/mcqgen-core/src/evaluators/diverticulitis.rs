//! Diverticulitis evaluator.

use super::{panels, Evaluator, LabCategory, LabPanels, Pathology};

const INFLAMMATION: &[&str] = &["White Blood Cells", "C-Reactive Protein"];

/// Evaluator for acute diverticulitis.
#[derive(Debug)]
pub struct DiverticulitisEvaluator {
    panels: LabPanels,
}

impl DiverticulitisEvaluator {
    pub fn new() -> Self {
        Self {
            panels: LabPanels::new(
                vec![LabCategory::new("Inflammation", INFLAMMATION)],
                panels::neutral_tests(&[INFLAMMATION]),
            ),
        }
    }
}

impl Default for DiverticulitisEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for DiverticulitisEvaluator {
    fn pathology(&self) -> Pathology {
        Pathology::Diverticulitis
    }

    fn panels(&self) -> &LabPanels {
        &self.panels
    }
}
