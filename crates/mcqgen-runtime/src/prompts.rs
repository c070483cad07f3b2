//! Prompts for question generation.
//!
//! Every request is two messages:
//! 1. The system persona, identical for every patient
//! 2. A user turn: task instructions, the required reply shape for this
//!    patient, one worked example, then the composed record verbatim
//!
//! The correct answer written into the reply shape is the batch pathology,
//! not anything derived from the record.

use mcqgen_core::{AdmissionRecord, Pathology};

/// System persona shared by every request.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant. Carefully create questions and multiple choice answers from given medical records in a valid JSON format.";

/// Task description preceding the reply shape.
pub const TASK_INSTRUCTIONS: &str = r#"You are a medical expert. You will be provided with information about a patient suffering from an ailment.
Your task is to analyze the symptoms, laboratory results, and imaging findings from the medical record to generate
a multiple-choice question (MCQ) that asks for the most likely diagnosis.
The options should include the following diagnoses: appendicitis, cholecystitis, diverticulitis, and pancreatitis.
The correct diagnosis should be the one present in the medical record, identified in the "Discharge Diagnosis" or
"ICD Diagnosis" field or derived from the clinical data provided.
Do not explicitly state the diagnosis in the question. Include key clinical findings in your summary and question to
guide the answer. Output the MCQ in the following JSON format:
"#;

/// Formatting exemplar. Never the current patient.
pub const WORKED_EXAMPLE: &str = r#"Here is an example of how an example MCQ should look. Without newline characters, backslashes, or extraneous quotes, to be in JSON format:
{
  "id": 33677,
  "question": "Provide the most likely final diagnosis for the following patient. An otherwise healthy woman presents with periumbilical to right lower quadrant pain, nausea, and non-bloody, non-bilious vomiting. Physical examination reveals tenderness in the right lower quadrant without rebound or guarding. Laboratory results show elevated white blood cell count. CT abdomen reveals an appendicolith and an enlarged appendix with surrounding fat stranding. What is the final diagnosis for this patient?",
  "answer_choices": {
    "A": "Appendicitis",
    "B": "Cholecystitis",
    "C": "Diverticulitis",
    "D": "Pancreatitis"
  },
  "correct_answer": "(Pathology name)"
}
"#;

/// Closing checklist, followed directly by the record.
pub const CLOSING_INSTRUCTIONS: &str = r#"Please ensure that:

The summary is concise but includes the most relevant clinical information. For laboratory tests, the blood and urine reference ranges are provided as "RR" to the right of the observation.
The question does not reveal the diagnosis directly.
The JSON output is valid and properly formatted without any unnecessary escape characters.
Now it is your turn to create a JSON file based on the medical record provided."#;

/// Reply shape for one patient.
pub fn reply_shape(patient_id: &str, pathology: Pathology) -> String {
    // Bare only when the digits survive a numeric round trip ("007" stays quoted).
    let id = match patient_id.parse::<u64>() {
        Ok(numeric) if numeric.to_string() == patient_id => patient_id.to_string(),
        _ => serde_json::Value::from(patient_id).to_string(),
    };

    format!(
        r#"{{
  "id": {id},
  "question": "Provide the most likely final diagnosis for the following patient. [Condensed summary of the patient's presentation, including symptoms, physical examination findings, laboratory results, and imaging findings]. What is the final diagnosis for this patient?",
  "answer_choices": {{
    "A": "Appendicitis",
    "B": "Cholecystitis",
    "C": "Diverticulitis",
    "D": "Pancreatitis"
  }},
  "correct_answer": "{answer}"
}}
"#,
        id = id,
        answer = pathology.display_name(),
    )
}

/// Full user turn for one patient.
pub fn user_prompt(patient_id: &str, pathology: Pathology, record: &AdmissionRecord) -> String {
    let mut prompt = String::with_capacity(4096);
    prompt.push_str(TASK_INSTRUCTIONS);
    prompt.push_str(&reply_shape(patient_id, pathology));
    prompt.push_str(WORKED_EXAMPLE);
    prompt.push_str(CLOSING_INSTRUCTIONS);
    prompt.push_str(&record.to_prompt_text());
    prompt
}
