//! Shared laboratory panels.
//!
//! Every evaluator reports the same routine panels as neutral tests, minus
//! whatever it already declares as required. Names are keys into the lab
//! test mapping, so fluid-specific duplicates (urine vs. blood glucose)
//! carry a prefix.

/// Complete blood count.
pub const COMPLETE_BLOOD_COUNT: &[&str] = &[
    "White Blood Cells",
    "Red Blood Cells",
    "Hemoglobin",
    "Hematocrit",
    "MCV",
    "MCH",
    "MCHC",
    "Platelet Count",
    "Lymphocytes",
    "Absolute Lymphocyte Count",
    "Basophils",
    "Absolute Basophil Count",
    "Eosinophils",
    "Absolute Eosinophil Count",
    "Monocytes",
    "Absolute Monocyte Count",
    "Neutrophils",
    "Absolute Neutrophil Count",
    "RDW",
    "RDW-SD",
];

/// Comprehensive metabolic panel, liver enzymes and coagulation.
pub const METABOLIC_PANEL: &[&str] = &[
    "Alanine Aminotransferase (ALT)",
    "Asparate Aminotransferase (AST)",
    "Alkaline Phosphatase",
    "Bilirubin, Total",
    "PT",
    "INR(PT)",
    "Albumin",
    "Urea Nitrogen",
    "Sodium",
    "Calcium, Total",
    "Chloride",
    "Bicarbonate",
    "Anion Gap",
    "Creatinine",
    "Glucose",
    "Phosphate",
    "Potassium",
];

/// Urinalysis.
pub const URINALYSIS: &[&str] = &[
    "Urine Color",
    "Urine Appearance",
    "Urine Mucous",
    "Urine Specific Gravity",
    "Urine Protein",
    "Urine RBC",
    "Urine WBC",
    "Urine pH",
    "Urine Bilirubin",
    "Urine Glucose",
    "Urine Urobilinogen",
    "Urine Ketone",
    "Urine Nitrite",
    "Urine Leukocytes",
    "Urine Epithelial Cells",
];

/// Routine panels in reporting order, excluding tests listed in `required`.
pub fn neutral_tests(required: &[&[&str]]) -> Vec<String> {
    COMPLETE_BLOOD_COUNT
        .iter()
        .chain(METABOLIC_PANEL)
        .chain(URINALYSIS)
        .filter(|test| !required.iter().any(|group| group.contains(*test)))
        .map(|test| test.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neutral_excludes_required() {
        let neutral = neutral_tests(&[&["White Blood Cells", "Lipase"]]);
        assert!(!neutral.iter().any(|t| t == "White Blood Cells"));
        assert_eq!(neutral[0], "Red Blood Cells");
    }

    #[test]
    fn test_neutral_keeps_panel_order() {
        let neutral = neutral_tests(&[]);
        let expected = COMPLETE_BLOOD_COUNT.len() + METABOLIC_PANEL.len() + URINALYSIS.len();
        assert_eq!(neutral.len(), expected);
        assert_eq!(neutral.last().map(String::as_str), Some("Urine Epithelial Cells"));
    }
}
