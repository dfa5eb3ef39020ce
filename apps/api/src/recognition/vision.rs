//! Free-form OCR backend built on the Computer Vision Read API.
//!
//! Submit: `POST {endpoint}/vision/v3.2/read/analyze` with the raw document.
//! The job id is the last path segment of the `Operation-Location` header.
//! Poll: `GET {endpoint}/vision/v3.2/read/analyzeResults/{id}`.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::recognition::{JobHandle, JobStatus, RecognitionBackend, RecognitionError, Submission};
use crate::service_client::{join_url, ServiceClient};

const NAME: &str = "vision-read";
const ANALYZE_PATH: &str = "vision/v3.2/read/analyze";
const RESULTS_PATH: &str = "vision/v3.2/read/analyzeResults";

pub struct VisionReadBackend {
    client: ServiceClient,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadOperation {
    status: String,
    analyze_result: Option<ReadAnalyzeResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadAnalyzeResult {
    #[serde(default)]
    read_results: Vec<ReadPage>,
}

#[derive(Debug, Deserialize)]
struct ReadPage {
    #[serde(default)]
    lines: Vec<ReadLine>,
}

#[derive(Debug, Deserialize)]
struct ReadLine {
    text: String,
}

impl ReadOperation {
    fn into_status(self) -> JobStatus {
        let analyze_result = self.analyze_result;
        JobStatus::from_service(
            &self.status,
            || {
                analyze_result
                    .map(|r| {
                        r.read_results
                            .into_iter()
                            .flat_map(|page| page.lines)
                            .map(|line| line.text)
                            .collect()
                    })
                    .unwrap_or_default()
            },
            None,
        )
    }
}

impl VisionReadBackend {
    pub fn new(client: ServiceClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RecognitionBackend for VisionReadBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn submit(&self, document: Bytes) -> Result<Submission, RecognitionError> {
        let url = join_url(&self.endpoint, ANALYZE_PATH);
        let location = self
            .client
            .submit_document(&url, document)
            .await
            .map_err(|e| RecognitionError::from_service(NAME, e))?;
        let job_id = job_id_from_location(&location)?;
        debug!("Read job submitted: {job_id}");
        Ok(Submission::Pending(JobHandle::new(job_id)))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, RecognitionError> {
        let url = join_url(
            &self.endpoint,
            &format!("{RESULTS_PATH}/{}", handle.as_str()),
        );
        let operation: ReadOperation = self
            .client
            .get_json(&url)
            .await
            .map_err(|e| RecognitionError::from_service(NAME, e))?;
        Ok(operation.into_status())
    }
}

/// The Read API reports `.../analyzeResults/{operation-id}`; only the id is kept.
fn job_id_from_location(location: &str) -> Result<String, RecognitionError> {
    let id = location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|s| s.split('?').next().unwrap_or(s))
        .unwrap_or_default();
    if id.is_empty() {
        return Err(RecognitionError::RecognitionFailed {
            backend: NAME,
            reason: format!("Malformed Operation-Location header '{location}'"),
        });
    }
    Ok(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_is_last_path_segment() {
        let location = "https://cv.example.com/vision/v3.2/read/analyzeResults/49a36324-fc4b-4387-aa06-090cfbf0064f";
        assert_eq!(
            job_id_from_location(location).unwrap(),
            "49a36324-fc4b-4387-aa06-090cfbf0064f"
        );
    }

    #[test]
    fn test_job_id_ignores_query_string() {
        let location = "https://cv.example.com/read/analyzeResults/abc123?api-version=3.2";
        assert_eq!(job_id_from_location(location).unwrap(), "abc123");
    }

    #[test]
    fn test_empty_location_is_rejected() {
        assert!(job_id_from_location("").is_err());
    }

    #[test]
    fn test_succeeded_operation_flattens_pages() {
        let json = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "readResults": [
                    {"page": 1, "lines": [{"text": "Name: Nguyen Van A"}, {"text": "Email: a@example.com"}]},
                    {"page": 2, "lines": [{"text": "Skills: Rust, SQL"}]}
                ]
            }
        }"#;
        let op: ReadOperation = serde_json::from_str(json).unwrap();
        assert_eq!(
            op.into_status(),
            JobStatus::Succeeded(vec![
                "Name: Nguyen Van A".to_string(),
                "Email: a@example.com".to_string(),
                "Skills: Rust, SQL".to_string(),
            ])
        );
    }

    #[test]
    fn test_running_operation_has_no_result() {
        let op: ReadOperation = serde_json::from_str(r#"{"status": "running"}"#).unwrap();
        assert_eq!(op.into_status(), JobStatus::Running);
    }

    #[test]
    fn test_succeeded_without_result_is_empty_success() {
        let op: ReadOperation = serde_json::from_str(r#"{"status": "succeeded"}"#).unwrap();
        assert_eq!(op.into_status(), JobStatus::Succeeded(vec![]));
    }
}
