use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A document submitted for analysis.
///
/// The document is buffered once; every consumer gets its own `Bytes` view via
/// [`AnalysisRequest::document_view`], so no consumer can drain a shared cursor.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub document_name: String,
    document: Bytes,
}

impl AnalysisRequest {
    pub fn new(document_name: impl Into<String>, document: impl Into<Bytes>) -> Self {
        Self {
            document_name: document_name.into(),
            document: document.into(),
        }
    }

    /// An independent, cheaply cloned view of the document bytes.
    pub fn document_view(&self) -> Bytes {
        self.document.clone()
    }

    pub fn size_bytes(&self) -> usize {
        self.document.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnalysisStatus {
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, AnalysisStatus::Processing)
    }
}

/// Keys of the structured fields pulled out of a CV.
/// Serialized as their variant names, e.g. `"FullName"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum FieldName {
    Email,
    Phone,
    FullName,
    Skills,
    Education,
    Experience,
}

impl FieldName {
    pub const ALL: [FieldName; 6] = [
        FieldName::Email,
        FieldName::Phone,
        FieldName::FullName,
        FieldName::Skills,
        FieldName::Education,
        FieldName::Experience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldName::Email => "Email",
            FieldName::Phone => "Phone",
            FieldName::FullName => "FullName",
            FieldName::Skills => "Skills",
            FieldName::Education => "Education",
            FieldName::Experience => "Experience",
        }
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field is present only if one of its rules matched.
pub type ExtractedFields = BTreeMap<FieldName, String>;

/// Outcome of one CV analysis.
///
/// Only the analyzer drives the state machine (`begin` → `complete` | `fail`);
/// callers receive the value once it is terminal and can only read it.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    id: Uuid,
    document_name: String,
    uploaded_at: DateTime<Utc>,
    analyzed_at: Option<DateTime<Utc>>,
    normalized_text: String,
    extracted_fields: ExtractedFields,
    status: AnalysisStatus,
    error_message: Option<String>,
}

impl AnalysisResult {
    pub(crate) fn begin(document_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_name: document_name.to_string(),
            uploaded_at: Utc::now(),
            analyzed_at: None,
            normalized_text: String::new(),
            extracted_fields: ExtractedFields::new(),
            status: AnalysisStatus::Processing,
            error_message: None,
        }
    }

    pub(crate) fn complete(mut self, normalized_text: String, fields: ExtractedFields) -> Self {
        debug_assert_eq!(self.status, AnalysisStatus::Processing);
        self.normalized_text = normalized_text;
        self.extracted_fields = fields;
        self.status = AnalysisStatus::Completed;
        self.analyzed_at = Some(Utc::now());
        self
    }

    /// No partial success: a failed analysis carries no text and no fields.
    pub(crate) fn fail(mut self, message: impl Into<String>) -> Self {
        debug_assert_eq!(self.status, AnalysisStatus::Processing);
        self.normalized_text.clear();
        self.extracted_fields.clear();
        self.status = AnalysisStatus::Failed;
        self.error_message = Some(message.into());
        self.analyzed_at = Some(Utc::now());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn uploaded_at(&self) -> DateTime<Utc> {
        self.uploaded_at
    }

    pub fn analyzed_at(&self) -> Option<DateTime<Utc>> {
        self.analyzed_at
    }

    pub fn normalized_text(&self) -> &str {
        &self.normalized_text
    }

    pub fn extracted_fields(&self) -> &ExtractedFields {
        &self.extracted_fields
    }

    pub fn status(&self) -> AnalysisStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

#[cfg(test)]
impl AnalysisResult {
    pub fn field(&self, name: FieldName) -> Option<&str> {
        self.extracted_fields.get(&name).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_views_are_independent() {
        let request = AnalysisRequest::new("cv.pdf", b"%PDF-1.7".to_vec());
        let first = request.document_view();
        let second = request.document_view();
        drop(first);
        assert_eq!(&second[..], b"%PDF-1.7");
        assert_eq!(request.size_bytes(), 8);
    }

    #[test]
    fn test_result_starts_processing() {
        let result = AnalysisResult::begin("cv.png");
        assert_eq!(result.status(), AnalysisStatus::Processing);
        assert!(!result.status().is_terminal());
        assert!(result.analyzed_at().is_none());
    }

    #[test]
    fn test_complete_sets_text_and_fields() {
        let mut fields = ExtractedFields::new();
        fields.insert(FieldName::Email, "a@example.com".to_string());
        let result = AnalysisResult::begin("cv.png").complete("Email: a@example.com".into(), fields);
        assert_eq!(result.status(), AnalysisStatus::Completed);
        assert_eq!(result.field(FieldName::Email), Some("a@example.com"));
        assert!(result.error_message().is_none());
        assert!(result.analyzed_at().is_some());
    }

    #[test]
    fn test_fail_records_message() {
        let result = AnalysisResult::begin("cv.png").fail("document unreadable");
        assert_eq!(result.status(), AnalysisStatus::Failed);
        assert_eq!(result.error_message(), Some("document unreadable"));
        assert!(result.extracted_fields().is_empty());
    }

    #[test]
    fn test_fields_serialize_with_string_keys() {
        let mut fields = ExtractedFields::new();
        fields.insert(FieldName::FullName, "Nguyen Van A".to_string());
        fields.insert(FieldName::Phone, "0987654321".to_string());
        let json = serde_json::to_value(&fields).unwrap();
        assert_eq!(json["FullName"], "Nguyen Van A");
        assert_eq!(json["Phone"], "0987654321");
    }
}
