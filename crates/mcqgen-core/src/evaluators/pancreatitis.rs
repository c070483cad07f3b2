//! Pancreatitis evaluator.
//!
//! Pancreatic enzymes come first, then inflammation, then the markers used
//! for severity scoring (BUN, calcium, hematocrit, triglycerides).

use super::{panels, Evaluator, LabCategory, LabPanels, Pathology};

const PANCREAS: &[&str] = &["Lipase", "Amylase"];

const INFLAMMATION: &[&str] = &["White Blood Cells", "C-Reactive Protein"];

const SERIOUSNESS: &[&str] = &["Urea Nitrogen", "Calcium, Total", "Hematocrit", "Triglycerides"];

/// Evaluator for acute pancreatitis.
#[derive(Debug)]
pub struct PancreatitisEvaluator {
    panels: LabPanels,
}

impl PancreatitisEvaluator {
    pub fn new() -> Self {
        Self {
            panels: LabPanels::new(
                vec![
                    LabCategory::new("Pancreas", PANCREAS),
                    LabCategory::new("Inflammation", INFLAMMATION),
                    LabCategory::new("Seriousness", SERIOUSNESS),
                ],
                panels::neutral_tests(&[PANCREAS, INFLAMMATION, SERIOUSNESS]),
            ),
        }
    }
}

impl Default for PancreatitisEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for PancreatitisEvaluator {
    fn pathology(&self) -> Pathology {
        Pathology::Pancreatitis
    }

    fn panels(&self) -> &LabPanels {
        &self.panels
    }
}
