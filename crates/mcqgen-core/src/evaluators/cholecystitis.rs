//! Cholecystitis evaluator.
//!
//! Requires inflammation markers and the liver / biliary panel.

use super::{panels, Evaluator, LabCategory, LabPanels, Pathology};

const INFLAMMATION: &[&str] = &["White Blood Cells", "C-Reactive Protein"];

const LIVER: &[&str] = &[
    "Alanine Aminotransferase (ALT)",
    "Asparate Aminotransferase (AST)",
    "Alkaline Phosphatase",
    "Gamma Glutamyltransferase",
    "Bilirubin, Total",
];

/// Evaluator for acute cholecystitis.
#[derive(Debug)]
pub struct CholecystitisEvaluator {
    panels: LabPanels,
}

impl CholecystitisEvaluator {
    pub fn new() -> Self {
        Self {
            panels: LabPanels::new(
                vec![
                    LabCategory::new("Inflammation", INFLAMMATION),
                    LabCategory::new("Liver", LIVER),
                ],
                panels::neutral_tests(&[INFLAMMATION, LIVER]),
            ),
        }
    }
}

impl Default for CholecystitisEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for CholecystitisEvaluator {
    fn pathology(&self) -> Pathology {
        Pathology::Cholecystitis
    }

    fn panels(&self) -> &LabPanels {
        &self.panels
    }
}
