//! `SemanticAnalyzer` backed by the Language service `analyze-text` endpoint.
//! One request per analysis kind, each with a single document.

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::enrichment::{EnrichmentError, SemanticAnalyzer};
use crate::models::{Entity, EntityCategory};
use crate::service_client::{join_url, ServiceClient};

const ANALYZE_TEXT_PATH: &str = "language/:analyze-text?api-version=2023-04-01";
/// Per-document character limit of the synchronous endpoint.
const MAX_DOCUMENT_CHARS: usize = 5120;
const DOCUMENT_ID: &str = "1";

#[derive(Clone)]
pub struct LanguageServiceClient {
    client: ServiceClient,
    endpoint: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeTextRequest<'a> {
    kind: &'a str,
    analysis_input: AnalysisInput<'a>,
}

#[derive(Debug, Serialize)]
struct AnalysisInput<'a> {
    documents: Vec<TextDocument<'a>>,
}

#[derive(Debug, Serialize)]
struct TextDocument<'a> {
    id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeTextResponse<T> {
    results: AnalyzeTextResults<T>,
}

#[derive(Debug, Deserialize)]
struct AnalyzeTextResults<T> {
    #[serde(default = "Vec::new")]
    documents: Vec<T>,
    #[serde(default)]
    errors: Vec<DocumentError>,
}

#[derive(Debug, Deserialize)]
struct DocumentError {
    error: DocumentErrorBody,
}

#[derive(Debug, Deserialize)]
struct DocumentErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LanguageDocument {
    detected_language: DetectedLanguage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetectedLanguage {
    iso6391_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyPhraseDocument {
    #[serde(default)]
    key_phrases: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EntityDocument {
    #[serde(default)]
    entities: Vec<EntityItem>,
}

#[derive(Debug, Deserialize)]
struct EntityItem {
    text: String,
    category: String,
}

impl<T> AnalyzeTextResponse<T> {
    /// The single document's result, or the service's per-document error.
    fn into_document(self) -> Result<T, EnrichmentError> {
        let AnalyzeTextResults { documents, errors } = self.results;
        if let Some(doc) = documents.into_iter().next() {
            return Ok(doc);
        }
        let message = errors
            .into_iter()
            .next()
            .map(|e| e.error.message)
            .unwrap_or_else(|| "no document in response".to_string());
        Err(EnrichmentError::Unavailable(message))
    }
}

impl LanguageServiceClient {
    pub fn new(client: ServiceClient, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    async fn analyze<T: DeserializeOwned>(&self, kind: &str, text: &str) -> Result<T, EnrichmentError> {
        let request = AnalyzeTextRequest {
            kind,
            analysis_input: AnalysisInput {
                documents: vec![TextDocument {
                    id: DOCUMENT_ID,
                    text: truncate_chars(text, MAX_DOCUMENT_CHARS),
                }],
            },
        };
        let url = join_url(&self.endpoint, ANALYZE_TEXT_PATH);
        let response: AnalyzeTextResponse<T> = self.client.post_json(&url, &request).await?;
        response.into_document()
    }
}

#[async_trait]
impl SemanticAnalyzer for LanguageServiceClient {
    async fn detect_language(&self, text: &str) -> Result<String, EnrichmentError> {
        let doc: LanguageDocument = self.analyze("LanguageDetection", text).await?;
        Ok(doc.detected_language.iso6391_name)
    }

    async fn key_phrases(&self, text: &str) -> Result<Vec<String>, EnrichmentError> {
        let doc: KeyPhraseDocument = self.analyze("KeyPhraseExtraction", text).await?;
        Ok(doc.key_phrases)
    }

    async fn entities(&self, text: &str) -> Result<Vec<Entity>, EnrichmentError> {
        let doc: EntityDocument = self.analyze("EntityRecognition", text).await?;
        Ok(doc
            .entities
            .into_iter()
            .map(|e| Entity {
                category: EntityCategory::from_label(&e.category),
                text: e.text,
            })
            .collect())
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
