//! Imaging report formatter.

use serde::{Deserialize, Serialize};

use crate::record::{AdmissionRecord, RADIOLOGY};

use super::CompositionError;

/// One radiology report as stored in the record's `Radiology` list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RadiologyReport {
    #[serde(rename = "Note ID", default, skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,

    #[serde(rename = "Modality", default)]
    pub modality: String,

    #[serde(rename = "Region", default)]
    pub region: String,

    #[serde(rename = "Exam Name", default)]
    pub exam_name: String,

    #[serde(rename = "Report", default)]
    pub report: String,
}

impl RadiologyReport {
    /// `"<Modality> <Region>\n<Report>\n"`
    pub fn to_text(&self) -> String {
        let heading = [self.modality.trim(), self.region.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        format!("{}\n{}\n", heading, self.report.trim())
    }
}

/// Parse the record's radiology reports. A record without the field has none.
pub fn radiology_reports(record: &AdmissionRecord) -> Result<Vec<RadiologyReport>, CompositionError> {
    match record.get(RADIOLOGY) {
        None => Ok(Vec::new()),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            CompositionError::InvalidRecord(format!("{} is not a list of reports: {}", RADIOLOGY, e))
        }),
    }
}

/// Concatenated text of all reports, in record order.
pub fn format_radiology(reports: &[RadiologyReport]) -> String {
    reports.iter().map(RadiologyReport::to_text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(radiology: serde_json::Value) -> AdmissionRecord {
        AdmissionRecord::from_value(json!({ "Radiology": radiology }), "test").unwrap()
    }

    #[test]
    fn test_reports_parsed_and_formatted() {
        let record = record(json!([
            {
                "Note ID": "12345-RR-1",
                "Modality": "CT",
                "Region": "Abdomen",
                "Exam Name": "CT ABD & PELVIS WITH CONTRAST",
                "Report": "Dilated appendix with periappendiceal fat stranding."
            },
            {
                "Modality": "Ultrasound",
                "Region": "Abdomen",
                "Report": "Gallbladder unremarkable."
            }
        ]));

        let reports = radiology_reports(&record).unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].note_id.as_deref(), Some("12345-RR-1"));
        assert_eq!(
            format_radiology(&reports),
            "CT Abdomen\nDilated appendix with periappendiceal fat stranding.\n\
             Ultrasound Abdomen\nGallbladder unremarkable.\n"
        );
    }

    #[test]
    fn test_missing_field_means_no_reports() {
        let record = AdmissionRecord::from_value(json!({}), "test").unwrap();
        assert!(radiology_reports(&record).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_field_rejected() {
        let record = record(json!("CT: normal"));
        assert!(matches!(
            radiology_reports(&record),
            Err(CompositionError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_heading_skips_blank_parts() {
        let report = RadiologyReport {
            modality: "X-ray".to_string(),
            report: "No free air.".to_string(),
            ..Default::default()
        };
        assert_eq!(report.to_text(), "X-ray\nNo free air.\n");
    }
}
