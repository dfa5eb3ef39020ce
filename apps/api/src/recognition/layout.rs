//! Structure-aware backend built on the Document Intelligence prebuilt layout model.
//!
//! The `Operation-Location` header is a complete result URL, so it is used as
//! the job handle verbatim. Page lines come first, then the text of every table
//! cell, which the read model tends to miss or scramble.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use crate::recognition::{JobHandle, JobStatus, RecognitionBackend, RecognitionError, Submission};
use crate::service_client::{join_url, ServiceClient};

const NAME: &str = "document-layout";
const ANALYZE_PATH: &str =
    "formrecognizer/documentModels/prebuilt-layout:analyze?api-version=2023-07-31";

pub struct LayoutBackend {
    client: ServiceClient,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutOperation {
    status: String,
    analyze_result: Option<LayoutResult>,
    error: Option<LayoutError>,
}

#[derive(Debug, Deserialize)]
struct LayoutError {
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct LayoutResult {
    #[serde(default)]
    pages: Vec<LayoutPage>,
    #[serde(default)]
    tables: Vec<LayoutTable>,
}

#[derive(Debug, Deserialize)]
struct LayoutPage {
    #[serde(default)]
    lines: Vec<LayoutText>,
}

#[derive(Debug, Deserialize)]
struct LayoutTable {
    #[serde(default)]
    cells: Vec<LayoutText>,
}

#[derive(Debug, Deserialize)]
struct LayoutText {
    content: String,
}

impl LayoutResult {
    fn into_lines(self) -> Vec<String> {
        let page_lines = self.pages.into_iter().flat_map(|p| p.lines);
        let cell_lines = self.tables.into_iter().flat_map(|t| t.cells);
        page_lines.chain(cell_lines).map(|t| t.content).collect()
    }
}

impl LayoutOperation {
    fn into_status(self) -> JobStatus {
        let result = self.analyze_result;
        JobStatus::from_service(
            &self.status,
            || result.map(LayoutResult::into_lines).unwrap_or_default(),
            self.error.map(|e| e.message),
        )
    }
}

impl LayoutBackend {
    pub fn new(client: ServiceClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl RecognitionBackend for LayoutBackend {
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
        debug!("Layout job submitted: {location}");
        Ok(Submission::Pending(JobHandle::new(location)))
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobStatus, RecognitionError> {
        let operation: LayoutOperation = self
            .client
            .get_json(handle.as_str())
            .await
            .map_err(|e| RecognitionError::from_service(NAME, e))?;
        Ok(operation.into_status())
    }
}
