//! CV analysis: sequences the full pipeline and owns the result state machine.
//!
//! Flow: both recognition backends (concurrently, each with its own view of the
//! document) → merge → normalize → enrich (advisory) → extract → terminal result.
//!
//! Any recognition failure, poll timeout, overall timeout or cancellation turns
//! the result into `Failed` with no partial fields. Enrichment is the only stage
//! allowed to degrade instead of fail.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::enrichment::SemanticEnricher;
use crate::errors::AnalysisError;
use crate::extraction::{extract_fields, merge_outputs, normalize, normalize_lines};
use crate::models::{AnalysisRequest, AnalysisResult, ExtractedFields};
use crate::recognition::{JobPoller, RecognitionBackend};

#[derive(Clone)]
pub struct CvAnalyzer {
    ocr: Arc<dyn RecognitionBackend>,
    layout: Arc<dyn RecognitionBackend>,
    poller: JobPoller,
    enricher: Option<SemanticEnricher>,
    timeout: Duration,
}

impl CvAnalyzer {
    pub fn new(
        ocr: Arc<dyn RecognitionBackend>,
        layout: Arc<dyn RecognitionBackend>,
        poller: JobPoller,
        enricher: Option<SemanticEnricher>,
        timeout: Duration,
    ) -> Self {
        Self {
            ocr,
            layout,
            poller,
            enricher,
            timeout,
        }
    }

    /// Analyzes one document, bounded by the configured overall timeout.
    pub async fn analyze(&self, request: AnalysisRequest) -> AnalysisResult {
        self.analyze_until(request, std::future::pending()).await
    }

    /// Like [`CvAnalyzer::analyze`], but also aborts as soon as `cancel` resolves.
    /// The returned result is always terminal.
    pub async fn analyze_until<F>(&self, request: AnalysisRequest, cancel: F) -> AnalysisResult
    where
        F: Future<Output = ()>,
    {
        let result = AnalysisResult::begin(&request.document_name);
        info!(
            "Analyzing '{}' ({} bytes) as {}",
            request.document_name,
            request.size_bytes(),
            result.id()
        );

        let outcome = tokio::select! {
            outcome = self.run(&request) => outcome,
            _ = tokio::time::sleep(self.timeout) => Err(AnalysisError::TimedOut(self.timeout)),
            _ = cancel => Err(AnalysisError::Cancelled),
        };

        let result = match outcome {
            Ok((normalized_text, fields)) => {
                info!(
                    "Analysis {} completed: {} fields extracted",
                    result.id(),
                    fields.len()
                );
                result.complete(normalized_text, fields)
            }
            Err(e) => {
                warn!("Analysis {} failed: {e}", result.id());
                result.fail(e.user_message())
            }
        };
        debug_assert!(result.status().is_terminal());
        result
    }

    async fn run(
        &self,
        request: &AnalysisRequest,
    ) -> Result<(String, ExtractedFields), AnalysisError> {
        let (ocr_lines, layout_lines) = tokio::try_join!(
            self.poller
                .recognize(self.ocr.as_ref(), request.document_view()),
            self.poller
                .recognize(self.layout.as_ref(), request.document_view()),
        )?;
        info!(
            "Recognized {} lines ({}) and {} lines ({})",
            ocr_lines.len(),
            self.ocr.name(),
            layout_lines.len(),
            self.layout.name()
        );

        let merged = merge_outputs(&[ocr_lines, layout_lines]);
        let normalized_text = normalize(&merged.joined());
        let line_text = normalize_lines(merged.lines());
        info!(
            "Merged into {} unique lines, {} normalized chars",
            merged.line_count(),
            normalized_text.len()
        );

        let profile = match &self.enricher {
            Some(enricher) => enricher.enrich(&normalized_text).await,
            None => None,
        };

        let fields = extract_fields(&line_text, profile.as_ref());
        Ok((normalized_text, fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::{EnrichmentError, SemanticAnalyzer};
    use crate::models::analysis::AnalysisStatus;
    use crate::models::{Entity, FieldName};
    use crate::recognition::{
        JobHandle, JobStatus, PollPolicy, RecognitionError, Submission,
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    enum Script {
        Lines(Vec<&'static str>),
        Fail(&'static str),
        Unreachable,
        Never,
    }

    struct MockBackend {
        name: &'static str,
        script: Script,
        polls_before_done: u32,
        polls: AtomicU32,
        received: Mutex<Vec<Bytes>>,
    }

    impl MockBackend {
        fn new(name: &'static str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                name,
                script,
                polls_before_done: 2,
                polls: AtomicU32::new(0),
                received: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl RecognitionBackend for MockBackend {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn submit(&self, document: Bytes) -> Result<Submission, RecognitionError> {
            self.received.lock().unwrap().push(document);
            match self.script {
                Script::Unreachable => Err(RecognitionError::Transport {
                    backend: self.name,
                    message: "connection refused".into(),
                }),
                _ => Ok(Submission::Pending(JobHandle::new(format!("{}-job", self.name)))),
            }
        }

        async fn poll(&self, _handle: &JobHandle) -> Result<JobStatus, RecognitionError> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < self.polls_before_done {
                return Ok(JobStatus::Running);
            }
            Ok(match &self.script {
                Script::Lines(lines) => {
                    JobStatus::Succeeded(lines.iter().map(|l| l.to_string()).collect())
                }
                Script::Fail(reason) => JobStatus::Failed(reason.to_string()),
                Script::Unreachable | Script::Never => JobStatus::Running,
            })
        }
    }

    struct UnavailableAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for UnavailableAnalyzer {
        async fn detect_language(&self, _text: &str) -> Result<String, EnrichmentError> {
            Err(EnrichmentError::Unavailable("service down".into()))
        }

        async fn key_phrases(&self, _text: &str) -> Result<Vec<String>, EnrichmentError> {
            Err(EnrichmentError::Unavailable("service down".into()))
        }

        async fn entities(&self, _text: &str) -> Result<Vec<Entity>, EnrichmentError> {
            Err(EnrichmentError::Unavailable("service down".into()))
        }
    }

    struct PhraseAnalyzer;

    #[async_trait]
    impl SemanticAnalyzer for PhraseAnalyzer {
        async fn detect_language(&self, _text: &str) -> Result<String, EnrichmentError> {
            Ok("en".into())
        }

        async fn key_phrases(&self, _text: &str) -> Result<Vec<String>, EnrichmentError> {
            Ok(vec![
                "software development".into(),
                "Hanoi".into(),
                "SQL database".into(),
            ])
        }

        async fn entities(&self, _text: &str) -> Result<Vec<Entity>, EnrichmentError> {
            Err(EnrichmentError::Unavailable("entity model not deployed".into()))
        }
    }

    fn analyzer(
        ocr: Arc<MockBackend>,
        layout: Arc<MockBackend>,
        analyzer: Option<Arc<dyn SemanticAnalyzer>>,
    ) -> CvAnalyzer {
        let policy = PollPolicy {
            interval: Duration::from_secs(1),
            max_attempts: 10,
            max_elapsed: Duration::from_secs(60),
            transport_retries: 1,
        };
        CvAnalyzer::new(
            ocr,
            layout,
            JobPoller::new(policy),
            analyzer.map(|a| SemanticEnricher::new(a, Duration::from_secs(5))),
            Duration::from_secs(300),
        )
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest::new("cv.pdf", b"%PDF-1.7 fake".to_vec())
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_name_email_phone() {
        let ocr = MockBackend::new(
            "ocr",
            Script::Lines(vec!["Name: Nguyen Van A", "Email: a@example.com"]),
        );
        let layout = MockBackend::new(
            "layout",
            Script::Lines(vec!["Email: a@example.com", "0987654321"]),
        );
        let result = analyzer(ocr, layout, None).analyze(request()).await;

        assert_eq!(result.status(), AnalysisStatus::Completed);
        assert_eq!(result.extracted_fields().len(), 3);
        assert_eq!(result.field(FieldName::FullName), Some("Nguyen Van A"));
        assert_eq!(result.field(FieldName::Email), Some("a@example.com"));
        assert_eq!(result.field(FieldName::Phone), Some("0987654321"));
        assert_eq!(
            result.normalized_text(),
            "Name: Nguyen Van A Email: a@example.com 0987654321"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_recognition_is_a_valid_completion() {
        let ocr = MockBackend::new("ocr", Script::Lines(vec![]));
        let layout = MockBackend::new("layout", Script::Lines(vec![]));
        let result = analyzer(ocr, layout, Some(Arc::new(UnavailableAnalyzer)))
            .analyze(request())
            .await;

        assert_eq!(result.status(), AnalysisStatus::Completed);
        assert_eq!(result.normalized_text(), "");
        assert!(result.extracted_fields().is_empty());
        assert!(result.error_message().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_backend_failure_fails_whole_analysis() {
        let ocr = MockBackend::new("ocr", Script::Lines(vec!["Name: Nguyen Van A"]));
        let layout = MockBackend::new("layout", Script::Fail("The document is unreadable"));
        let result = analyzer(ocr, layout, None).analyze(request()).await;

        assert_eq!(result.status(), AnalysisStatus::Failed);
        assert_eq!(result.error_message(), Some("The document is unreadable"));
        assert!(result.extracted_fields().is_empty());
        assert_eq!(result.normalized_text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_on_submit_fails_analysis() {
        let ocr = MockBackend::new("ocr", Script::Unreachable);
        let layout = MockBackend::new("layout", Script::Lines(vec!["Skills: Rust"]));
        let result = analyzer(ocr, layout, None).analyze(request()).await;

        assert_eq!(result.status(), AnalysisStatus::Failed);
        assert_eq!(
            result.error_message(),
            Some("ocr is unreachable: connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_email_by_position_is_recorded() {
        let ocr = MockBackend::new(
            "ocr",
            Script::Lines(vec!["Primary: first@example.com", "Backup: second@example.com"]),
        );
        let layout = MockBackend::new("layout", Script::Lines(vec![]));
        let result = analyzer(ocr, layout, None).analyze(request()).await;

        assert_eq!(result.field(FieldName::Email), Some("first@example.com"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_timeout_fails_analysis() {
        let ocr = MockBackend::new("ocr", Script::Never);
        let layout = MockBackend::new("layout", Script::Lines(vec!["Name: A"]));
        let result = analyzer(ocr, layout, None).analyze(request()).await;

        assert_eq!(result.status(), AnalysisStatus::Failed);
        let message = result.error_message().unwrap();
        assert!(message.contains("did not finish after 10 polls"), "{message}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_aborts_polling() {
        let ocr = MockBackend::new("ocr", Script::Never);
        let layout = MockBackend::new("layout", Script::Never);
        let result = analyzer(ocr.clone(), layout, None)
            .analyze_until(request(), tokio::time::sleep(Duration::from_millis(2500)))
            .await;

        assert_eq!(result.status(), AnalysisStatus::Failed);
        assert_eq!(result.error_message(), Some("Analysis was cancelled"));
        // polls at t=0s, 1s and 2s; the cancel at 2.5s stops the loop
        assert_eq!(ocr.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overall_timeout_yields_failed_result() {
        let ocr = MockBackend::new("ocr", Script::Never);
        let layout = MockBackend::new("layout", Script::Never);
        let mut cv = analyzer(ocr, layout, None);
        cv.timeout = Duration::from_secs(3);
        let result = cv.analyze(request()).await;

        assert_eq!(result.status(), AnalysisStatus::Failed);
        assert_eq!(result.error_message(), Some("Analysis did not finish within 3s"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_each_backend_receives_the_full_document() {
        let ocr = MockBackend::new("ocr", Script::Lines(vec![]));
        let layout = MockBackend::new("layout", Script::Lines(vec![]));
        analyzer(ocr.clone(), layout.clone(), None)
            .analyze(request())
            .await;

        for backend in [&ocr, &layout] {
            let received = backend.received.lock().unwrap();
            assert_eq!(received.len(), 1);
            assert_eq!(&received[0][..], b"%PDF-1.7 fake");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_enrichment_supplies_skills_when_unlabelled() {
        let ocr = MockBackend::new(
            "ocr",
            Script::Lines(vec!["Name: Nguyen Van A", "Worked on software development"]),
        );
        let layout = MockBackend::new("layout", Script::Lines(vec![]));
        let result = analyzer(ocr, layout, Some(Arc::new(PhraseAnalyzer)))
            .analyze(request())
            .await;

        assert_eq!(result.status(), AnalysisStatus::Completed);
        assert_eq!(
            result.field(FieldName::Skills),
            Some("software development, SQL database")
        );
        assert_eq!(result.field(FieldName::FullName), Some("Nguyen Van A"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_enrichment_falls_back_to_regex() {
        let ocr = MockBackend::new(
            "ocr",
            Script::Lines(vec!["Skills: Rust, Go", "Education: HUST"]),
        );
        let layout = MockBackend::new("layout", Script::Lines(vec!["Experience: 4 years"]));
        let result = analyzer(ocr, layout, Some(Arc::new(UnavailableAnalyzer)))
            .analyze(request())
            .await;

        assert_eq!(result.status(), AnalysisStatus::Completed);
        assert_eq!(result.field(FieldName::Skills), Some("Rust, Go"));
        assert_eq!(result.field(FieldName::Education), Some("HUST"));
        assert_eq!(result.field(FieldName::Experience), Some("4 years"));
    }
}
