//! High-level orchestration for the fact-verification pipeline.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context, Result};
use factguard_logging::LogLevel;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::{
        FactCheckCommand, FactCheckReply, FactCheckRequest, FactCheckResponse, FeedbackResponse,
        UserFeedback,
    },
    cache::{CacheKey, ContentCache, DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS},
    clock::{Clock, SystemClock},
    config::{FactguardConfig, Provider},
    correction_memory::{CorrectionJournal, CorrectionMemory, DEFAULT_SIMILARITY_THRESHOLD},
    crossverify::{CrossCheckOutcome, CrossVerifier},
    detector::ClaimDetector,
    error::FactCheckError,
    generalizer::{Generalization, SuggestionGeneralizer},
    guard::HallucinationGuard,
    inference::{GenerativeClient, HttpInferenceClient},
    loopback::ScriptedInference,
    model::{AsIssue, CheckMode, Confidence, VerificationResult},
    normalizer::{is_checkable, normalize_markup},
    rate_limiter::RateLimiter,
    search::{HttpSearchClient, LoopbackSearchClient, WebSearchClient, WebSearcher},
    telemetry::FactCheckTelemetry,
};

/// Assembles a [`FactCheckRuntime`] from collaborators and shared services.
pub struct FactCheckRuntimeBuilder {
    inference: Arc<dyn GenerativeClient>,
    search: Arc<dyn WebSearchClient>,
    clock: Arc<dyn Clock>,
    cache: Option<Arc<ContentCache>>,
    memory: Option<Arc<CorrectionMemory>>,
    limiter: Arc<RateLimiter>,
    inference_timeout: Duration,
    search_timeout: Duration,
    max_results: usize,
    domains: Vec<String>,
    cross_verify: bool,
    telemetry: Option<FactCheckTelemetry>,
}

impl FactCheckRuntimeBuilder {
    /// Clock used by the cache and the correction memory built by default.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Shares an existing cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<ContentCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Shares an existing correction memory.
    #[must_use]
    pub fn memory(mut self, memory: Arc<CorrectionMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Shares the process-wide search throttle.
    #[must_use]
    pub fn rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Deadline of every generative call.
    #[must_use]
    pub fn inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    /// Deadline of every search call.
    #[must_use]
    pub fn search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    /// Hits requested per cross-verification query.
    #[must_use]
    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Replaces the authoritative-domain allow-list.
    #[must_use]
    pub fn domains(mut self, domains: Vec<String>) -> Self {
        self.domains = domains;
        self
    }

    /// Enables or disables web cross-verification.
    #[must_use]
    pub fn cross_verify(mut self, enabled: bool) -> Self {
        self.cross_verify = enabled;
        self
    }

    /// Attaches telemetry.
    #[must_use]
    pub fn telemetry(mut self, telemetry: FactCheckTelemetry) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Finalizes the runtime.
    #[must_use]
    pub fn build(self) -> FactCheckRuntime {
        let cache = self.cache.unwrap_or_else(|| {
            Arc::new(ContentCache::new(
                chrono::Duration::seconds(DEFAULT_TTL_SECS),
                DEFAULT_MAX_ENTRIES,
                Arc::clone(&self.clock),
            ))
        });
        let memory = self.memory.unwrap_or_else(|| {
            Arc::new(CorrectionMemory::in_memory(
                DEFAULT_SIMILARITY_THRESHOLD,
                Arc::clone(&self.clock),
            ))
        });
        let detector =
            ClaimDetector::new(Arc::clone(&self.inference)).with_timeout(self.inference_timeout);
        let generalizer = SuggestionGeneralizer::new(Arc::clone(&self.inference))
            .with_timeout(self.inference_timeout);
        let verifier = self.cross_verify.then(|| {
            let searcher = WebSearcher::new(self.search, self.limiter)
                .with_domains(self.domains)
                .with_max_results(self.max_results)
                .with_timeout(self.search_timeout);
            CrossVerifier::new(searcher, Arc::clone(&self.inference))
                .with_timeout(self.inference_timeout)
        });
        FactCheckRuntime {
            cache,
            memory,
            detector,
            guard: HallucinationGuard::default(),
            generalizer,
            verifier,
            telemetry: self.telemetry,
        }
    }
}

/// Runtime for verify-and-remember workflows.
#[derive(Debug, Clone)]
pub struct FactCheckRuntime {
    cache: Arc<ContentCache>,
    memory: Arc<CorrectionMemory>,
    detector: ClaimDetector,
    guard: HallucinationGuard,
    generalizer: SuggestionGeneralizer,
    verifier: Option<CrossVerifier>,
    telemetry: Option<FactCheckTelemetry>,
}

impl FactCheckRuntime {
    /// Starts a builder over the two external collaborators.
    #[must_use]
    pub fn builder(
        inference: Arc<dyn GenerativeClient>,
        search: Arc<dyn WebSearchClient>,
    ) -> FactCheckRuntimeBuilder {
        FactCheckRuntimeBuilder {
            inference,
            search,
            clock: Arc::new(SystemClock),
            cache: None,
            memory: None,
            limiter: Arc::new(RateLimiter::default()),
            inference_timeout: Duration::from_secs(30),
            search_timeout: Duration::from_secs(10),
            max_results: 5,
            domains: Vec::new(),
            cross_verify: true,
            telemetry: None,
        }
    }

    /// Bootstraps the runtime with loopback collaborators.
    #[must_use]
    pub fn bootstrap() -> Self {
        Self::builder(
            Arc::new(ScriptedInference::default()),
            Arc::new(LoopbackSearchClient::default()),
        )
        .build()
    }

    /// Wires collaborators, stores, and telemetry from configuration.
    pub fn from_config(config: &FactguardConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let inference: Arc<dyn GenerativeClient> = match config.inference.provider {
            Provider::Http => Arc::new(HttpInferenceClient::new(
                &config.inference.endpoint,
                &config.inference.model,
                config.inference.api_key(),
                config.inference.timeout(),
            )?),
            Provider::Loopback => Arc::new(ScriptedInference::default()),
        };
        let search: Arc<dyn WebSearchClient> = match config.search.provider {
            Provider::Http => Arc::new(HttpSearchClient::new(
                &config.search.endpoint,
                config.search.api_key(),
                config.search.timeout(),
            )?),
            Provider::Loopback => Arc::new(LoopbackSearchClient::default()),
        };
        let memory = match &config.memory.journal_dir {
            Some(dir) => CorrectionMemory::with_journal(
                CorrectionJournal::new(dir),
                config.memory.similarity_threshold,
                Arc::clone(&clock),
            )
            .with_context(|| format!("replaying correction journal {}", dir.display()))?,
            None => CorrectionMemory::in_memory(
                config.memory.similarity_threshold,
                Arc::clone(&clock),
            ),
        };
        let cache = ContentCache::new(
            config.cache.ttl(),
            config.cache.max_entries,
            Arc::clone(&clock),
        );
        let mut telemetry = FactCheckTelemetry::builder("factcheck")
            .min_level(config.logging.min_level()?);
        if let Some(path) = &config.logging.path {
            telemetry = telemetry.log_path(path);
        }
        Ok(Self::builder(inference, search)
            .clock(clock)
            .cache(Arc::new(cache))
            .memory(Arc::new(memory))
            .rate_limiter(Arc::new(RateLimiter::per_second(
                config.rate_limit.calls_per_second,
            )))
            .inference_timeout(config.inference.timeout())
            .search_timeout(config.search.timeout())
            .max_results(config.search.max_results)
            .domains(config.search.domains.clone())
            .cross_verify(config.pipeline.cross_verify)
            .telemetry(telemetry.build()?)
            .build())
    }

    fn log(&self, request_id: &str, level: LogLevel, message: &str, metadata: Value) {
        if let Some(tel) = &self.telemetry {
            let _ = tel.log_request(request_id, level, message, metadata);
        }
    }

    /// Runs the pipeline over `content` on behalf of `user_id`.
    pub async fn check(
        &self,
        user_id: &str,
        content: &str,
        mode: CheckMode,
    ) -> Result<FactCheckResponse, FactCheckError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4().to_string();
        let plain = normalize_markup(content);
        let respond = |result: VerificationResult, cached: bool, user_corrected: Option<bool>| {
            FactCheckResponse {
                mode,
                result,
                content_length: content.chars().count(),
                plain_text_length: plain.chars().count(),
                processing_time: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
                cached,
                user_corrected,
            }
        };
        self.log(
            &request_id,
            LogLevel::Debug,
            "factcheck.request.start",
            json!({ "mode": mode, "content_length": content.len(), "plain_length": plain.len() }),
        );

        if !is_checkable(&plain) {
            self.log(&request_id, LogLevel::Debug, "factcheck.request.too_short", json!({}));
            return Ok(respond(VerificationResult::empty(mode), false, None));
        }

        let key = CacheKey::for_text(&plain, mode);
        if let Some(result) = self.cache.lookup(&key) {
            self.log(
                &request_id,
                LogLevel::Info,
                "factcheck.cache.hit",
                json!({ "mode": mode, "issues": result.issue_count() }),
            );
            return Ok(respond(result, true, None));
        }

        if self.memory.has_accepted_similar(user_id, &plain) {
            self.log(
                &request_id,
                LogLevel::Info,
                "factcheck.memory.suppressed",
                json!({ "user_id": user_id }),
            );
            return Ok(respond(VerificationResult::empty(mode), false, Some(true)));
        }

        let detected = match self.detector.detect(&plain, mode).await {
            Ok(detected) => detected,
            Err(err) => {
                self.log(
                    &request_id,
                    LogLevel::Error,
                    "factcheck.detect.failed",
                    json!({ "mode": mode, "error": err.to_string() }),
                );
                return Err(err.into());
            }
        };
        self.log(
            &request_id,
            LogLevel::Info,
            "factcheck.detect.complete",
            json!({ "mode": mode, "candidates": detected.issue_count() }),
        );

        let result = match detected {
            VerificationResult::Realtime(issues) => {
                VerificationResult::Realtime(self.refine(&request_id, issues).await)
            }
            VerificationResult::Detailed(mut report) => {
                report.issues = self.refine(&request_id, report.issues).await;
                VerificationResult::Detailed(report)
            }
        };

        self.cache.store(key, result.clone());
        self.log(
            &request_id,
            LogLevel::Info,
            "factcheck.request.complete",
            json!({
                "mode": mode,
                "issues": result.issue_count(),
                "elapsed_ms": started.elapsed().as_millis(),
            }),
        );
        Ok(respond(result, false, None))
    }

    /// Filter, generalize, and cross-verify, one candidate at a time.
    async fn refine<T: AsIssue + Send>(&self, request_id: &str, candidates: Vec<T>) -> Vec<T> {
        let (mut kept, dropped) = self.guard.screen(candidates);
        for (issue, verdict) in &dropped {
            self.log(
                request_id,
                LogLevel::Debug,
                "factcheck.filter.dropped",
                json!({ "text": issue.as_issue().text, "verdict": verdict }),
            );
        }

        for issue in &mut kept {
            if let Generalization::Fallback { reason } = self.generalizer.apply(issue).await {
                self.log(
                    request_id,
                    LogLevel::Warn,
                    "factcheck.generalize.fallback",
                    json!({ "text": issue.as_issue().text, "reason": reason }),
                );
            }
        }

        let mut kept = match &self.verifier {
            Some(verifier) => {
                let texts: Vec<String> = kept.iter().map(|i| i.as_issue().text.clone()).collect();
                let (verified, outcomes) = verifier.verify_all(kept).await;
                for (text, outcome) in texts.iter().zip(&outcomes) {
                    self.log_outcome(request_id, text, outcome);
                }
                verified
            }
            None => kept,
        };
        kept.retain(|issue| issue.as_issue().confidence == Confidence::High);
        kept
    }

    fn log_outcome(&self, request_id: &str, text: &str, outcome: &CrossCheckOutcome) {
        let (level, message, detail) = match outcome {
            CrossCheckOutcome::Skipped => return,
            CrossCheckOutcome::NoEvidence => {
                (LogLevel::Info, "factcheck.verify.inconclusive", json!("no search results"))
            }
            CrossCheckOutcome::Confirmed => (LogLevel::Debug, "factcheck.verify.confirmed", Value::Null),
            CrossCheckOutcome::Downgraded => (LogLevel::Info, "factcheck.verify.downgraded", Value::Null),
            CrossCheckOutcome::Inconclusive(judgment) => (
                LogLevel::Info,
                "factcheck.verify.inconclusive",
                json!(judgment),
            ),
            CrossCheckOutcome::Failed(err) => {
                (LogLevel::Warn, "factcheck.verify.failed", json!(err.to_string()))
            }
        };
        self.log(request_id, level, message, json!({ "text": text, "detail": detail }));
    }

    /// Stores a correction decision. Persistence failures never reach the caller.
    pub fn record_feedback(&self, user_id: &str, feedback: &UserFeedback) -> FeedbackResponse {
        let record = self.memory.record(
            user_id,
            &feedback.original_text,
            &feedback.corrected_text,
            feedback.correction_type,
        );
        if let Some(tel) = &self.telemetry {
            let _ = tel.log(
                LogLevel::Info,
                "factcheck.feedback.recorded",
                json!({ "user_id": user_id, "record_id": record.id, "type": record.correction_type }),
            );
        }
        FeedbackResponse::default()
    }

    /// Validates and dispatches one endpoint request.
    pub async fn handle(
        &self,
        user_id: &str,
        request: FactCheckRequest,
    ) -> Result<FactCheckReply, FactCheckError> {
        match request.into_command()? {
            FactCheckCommand::Feedback(feedback) => {
                Ok(FactCheckReply::Feedback(self.record_feedback(user_id, &feedback)))
            }
            FactCheckCommand::Check { content, mode } => self
                .check(user_id, &content, mode)
                .await
                .map(FactCheckReply::Checked),
        }
    }

    /// Shared result cache.
    #[must_use]
    pub fn cache(&self) -> Arc<ContentCache> {
        Arc::clone(&self.cache)
    }

    /// Shared correction memory.
    #[must_use]
    pub fn memory(&self) -> Arc<CorrectionMemory> {
        Arc::clone(&self.memory)
    }

    /// Accesses the telemetry handle.
    #[must_use]
    pub const fn telemetry(&self) -> Option<&FactCheckTelemetry> {
        self.telemetry.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::ManualClock,
        error::{CollaboratorError, InputError},
        inference::InferenceTask,
        model::CorrectionType,
        search::SearchHit,
    };
    use factguard_logging::MemorySink;

    const GREAT_WALL: &str = "<p>The Great Wall of China is located in <b>Tokyo</b>.</p>";

    struct Harness {
        runtime: FactCheckRuntime,
        inference: Arc<ScriptedInference>,
        search: Arc<LoopbackSearchClient>,
        clock: Arc<ManualClock>,
        sink: Arc<MemorySink>,
    }

    fn harness(hits: Vec<SearchHit>) -> Harness {
        let inference = Arc::new(ScriptedInference::default());
        let search = Arc::new(LoopbackSearchClient::with_hits(hits));
        let clock = Arc::new(ManualClock::default());
        let sink = Arc::new(MemorySink::default());
        let telemetry = FactCheckTelemetry::builder("factcheck")
            .min_level(LogLevel::Debug)
            .sink(sink.clone())
            .build()
            .unwrap();
        let runtime = FactCheckRuntime::builder(inference.clone(), search.clone())
            .clock(clock.clone())
            .telemetry(telemetry)
            .build();
        Harness {
            runtime,
            inference,
            search,
            clock,
            sink,
        }
    }

    fn wiki_hit() -> SearchHit {
        SearchHit {
            title: "Great Wall of China".into(),
            url: "https://en.wikipedia.org/wiki/Great_Wall_of_China".into(),
            excerpt: "The Great Wall of China is a series of fortifications across northern China."
                .into(),
        }
    }

    fn issue(text: &str, confidence: &str, suggestion: &str) -> Value {
        json!({
            "text": text,
            "issueDescription": "Incorrect claim.",
            "confidence": confidence,
            "suggestion": suggestion
        })
    }

    fn script_tokyo(inference: &ScriptedInference) {
        inference.respond(
            InferenceTask::DetectRealtime,
            json!({ "issues": [issue(
                "located in Tokyo",
                "HIGH",
                "The Great Wall of China is located in China."
            )] }),
        );
        inference.respond(
            InferenceTask::Adjudicate,
            json!({
                "isAccurate": false,
                "confidence": "HIGH",
                "reasoning": "Sources place the wall in northern China."
            }),
        );
    }

    #[tokio::test]
    async fn great_wall_claim_is_flagged_once() {
        let h = harness(vec![wiki_hit()]);
        script_tokyo(&h.inference);
        let response = h
            .runtime
            .check("alice", GREAT_WALL, CheckMode::Realtime)
            .await
            .unwrap();
        let VerificationResult::Realtime(issues) = &response.result else {
            panic!("realtime shape expected");
        };
        assert_eq!(issues.len(), 1);
        assert!(issues[0].text.contains("Tokyo"));
        assert!(issues[0].suggestion.contains("China"));
        assert_eq!(issues[0].confidence, Confidence::High);
        assert!(!response.cached);
        assert_eq!(response.user_corrected, None);
        assert_eq!(response.plain_text_length, "The Great Wall of China is located in Tokyo.".len());
        assert_eq!(response.content_length, GREAT_WALL.len());
        assert_eq!(h.search.queries().len(), 1);
        assert_eq!(h.sink.count("factcheck.verify.confirmed"), 1);
    }

    #[tokio::test]
    async fn repeated_content_is_served_from_cache() {
        let h = harness(vec![wiki_hit()]);
        script_tokyo(&h.inference);
        let first = h
            .runtime
            .check("alice", GREAT_WALL, CheckMode::Realtime)
            .await
            .unwrap();
        let second = h
            .runtime
            .check(
                "bob",
                "  the great wall of china is LOCATED in tokyo.  ",
                CheckMode::Realtime,
            )
            .await
            .unwrap();
        assert!(second.cached);
        assert_eq!(first.result, second.result);
        assert_eq!(h.inference.calls(InferenceTask::DetectRealtime), 1);
        assert_eq!(h.sink.count("factcheck.cache.hit"), 1);

        let detailed = h
            .runtime
            .check("alice", GREAT_WALL, CheckMode::Detailed)
            .await
            .unwrap();
        assert!(!detailed.cached);
        assert_eq!(detailed.result.mode(), CheckMode::Detailed);
    }

    #[tokio::test]
    async fn expired_cache_entry_runs_pipeline_again() {
        let h = harness(vec![wiki_hit()]);
        script_tokyo(&h.inference);
        h.runtime
            .check("alice", GREAT_WALL, CheckMode::Realtime)
            .await
            .unwrap();
        h.clock.advance(chrono::Duration::hours(25));
        let again = h
            .runtime
            .check("alice", GREAT_WALL, CheckMode::Realtime)
            .await
            .unwrap();
        assert!(!again.cached);
        assert_eq!(h.inference.calls(InferenceTask::DetectRealtime), 2);
    }

    #[tokio::test]
    async fn only_high_confidence_issues_survive_in_both_modes() {
        let h = harness(Vec::new());
        let text = "Paris is in Spain. The Moon is made of cheese. Water boils at 50 degrees.";
        h.inference.respond(
            InferenceTask::DetectRealtime,
            json!({ "issues": [
                issue("Paris is in Spain", "HIGH", "Paris is in France."),
                issue("The Moon is made of cheese", "MEDIUM", "The Moon is made of rock."),
                issue("Water boils at 50 degrees", "LOW", "Water boils at around 100 degrees."),
            ] }),
        );
        let mut detailed_issue = issue("Paris is in Spain", "HIGH", "Paris is in France.");
        detailed_issue["category"] = json!("factual_error");
        detailed_issue["importance"] = json!("critical");
        let mut weak = issue("The Moon is made of cheese", "MEDIUM", "It is rock.");
        weak["category"] = json!("needs_verification");
        weak["importance"] = json!("minor");
        h.inference.respond(
            InferenceTask::DetectDetailed,
            json!({
                "summary": "Several errors.",
                "issues": [detailed_issue, weak],
                "verificationNeeded": []
            }),
        );
        for mode in [CheckMode::Realtime, CheckMode::Detailed] {
            let response = h.runtime.check("alice", text, mode).await.unwrap();
            let issues = response.result.issues();
            assert_eq!(issues.len(), 1, "mode {mode}");
            assert!(issues.iter().all(|i| i.confidence == Confidence::High));
            assert_eq!(response.mode, mode);
        }
        assert_eq!(h.sink.count("factcheck.verify.inconclusive"), 2);
    }

    #[tokio::test]
    async fn fabricated_suggestions_are_filtered() {
        let h = harness(Vec::new());
        h.inference.respond(
            InferenceTask::DetectRealtime,
            json!({ "issues": [
                issue("opened in the morning", "HIGH", "It opened at 3:15 PM."),
                issue(
                    "The wall is long",
                    "HIGH",
                    "The wall was built by the Emperor during the Han dynasty over one century"
                ),
            ] }),
        );
        let response = h
            .runtime
            .check(
                "alice",
                "The museum opened in the morning. The wall is long.",
                CheckMode::Realtime,
            )
            .await
            .unwrap();
        assert_eq!(response.result.issue_count(), 0);
        assert_eq!(h.sink.count("factcheck.filter.dropped"), 2);
        assert!(h.search.queries().is_empty());
    }

    #[tokio::test]
    async fn precise_suggestion_is_generalized_even_when_rewrite_fails() {
        let h = harness(Vec::new());
        h.inference.respond(
            InferenceTask::DetectRealtime,
            json!({ "issues": [issue(
                "stretches 500 kilometers",
                "HIGH",
                "stretches 21,196 kilometers"
            )] }),
        );
        let response = h
            .runtime
            .check("alice", "The Great Wall stretches 500 kilometers.", CheckMode::Realtime)
            .await
            .unwrap();
        let issues = response.result.issues();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].suggestion.contains("over 21,000"));
        assert!(!crate::generalizer::is_overly_specific(&issues[0].suggestion));
        assert_eq!(h.sink.count("factcheck.generalize.fallback"), 1);
    }

    #[tokio::test]
    async fn accepted_correction_suppresses_detection() {
        let h = harness(vec![wiki_hit()]);
        script_tokyo(&h.inference);
        let reply = h
            .runtime
            .handle(
                "alice",
                serde_json::from_value(json!({
                    "userFeedback": {
                        "correctionType": "accepted",
                        "originalText": "The Great Wall of China is located in Tokyo.",
                        "correctedText": "The Great Wall of China is located in China."
                    }
                }))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(reply, FactCheckReply::Feedback(FeedbackResponse::default()));
        assert_eq!(
            h.runtime.memory().history("alice")[0].correction_type,
            CorrectionType::Accepted
        );

        let response = h
            .runtime
            .check(
                "alice",
                "<p>The Great Wall of China is located in China.</p>",
                CheckMode::Realtime,
            )
            .await
            .unwrap();
        assert_eq!(response.user_corrected, Some(true));
        assert_eq!(response.result, VerificationResult::Realtime(Vec::new()));
        assert_eq!(h.inference.calls(InferenceTask::DetectRealtime), 0);

        let other_user = h
            .runtime
            .check(
                "bob",
                "<p>The Great Wall of China is located in China.</p>",
                CheckMode::Realtime,
            )
            .await
            .unwrap();
        assert_eq!(other_user.user_corrected, None);
        assert_eq!(h.inference.calls(InferenceTask::DetectRealtime), 1);
    }

    #[tokio::test]
    async fn detection_failure_is_an_error_and_not_cached() {
        let h = harness(Vec::new());
        h.inference
            .fail_task(InferenceTask::DetectRealtime, "model unavailable");
        let err = h
            .runtime
            .check("alice", GREAT_WALL, CheckMode::Realtime)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FactCheckError::Collaborator(CollaboratorError::Transport { .. })
        ));
        assert!(h.runtime.cache().is_empty());
        assert_eq!(h.sink.count("factcheck.detect.failed"), 1);
    }

    #[tokio::test]
    async fn malformed_detection_reply_is_not_cached() {
        let h = harness(Vec::new());
        h.inference
            .respond(InferenceTask::DetectRealtime, json!({ "error": "rate limited" }));
        for _ in 0..2 {
            let err = h
                .runtime
                .check("alice", GREAT_WALL, CheckMode::Realtime)
                .await
                .unwrap_err();
            assert!(matches!(
                err,
                FactCheckError::Collaborator(CollaboratorError::Schema { .. })
            ));
        }
        assert!(h.runtime.cache().is_empty());
        assert_eq!(h.inference.calls(InferenceTask::DetectRealtime), 2);
    }

    #[tokio::test]
    async fn short_text_short_circuits() {
        let h = harness(Vec::new());
        let response = h
            .runtime
            .check("alice", "<p> a </p>", CheckMode::Detailed)
            .await
            .unwrap();
        assert_eq!(response.result, VerificationResult::empty(CheckMode::Detailed));
        assert!(h.inference.requests().is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_are_input_errors() {
        let h = harness(Vec::new());
        let err = h
            .runtime
            .handle("alice", FactCheckRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, FactCheckError::Input(InputError::MissingContent)));
    }

    #[tokio::test]
    async fn disabled_cross_verification_skips_search() {
        let inference = Arc::new(ScriptedInference::default());
        script_tokyo(&inference);
        let search = Arc::new(LoopbackSearchClient::with_hits(vec![wiki_hit()]));
        let runtime = FactCheckRuntime::builder(inference.clone(), search.clone())
            .cross_verify(false)
            .build();
        let response = runtime
            .check("alice", GREAT_WALL, CheckMode::Realtime)
            .await
            .unwrap();
        assert_eq!(response.result.issue_count(), 1);
        assert!(search.queries().is_empty());
        assert_eq!(inference.calls(InferenceTask::Adjudicate), 0);
    }

    #[test]
    fn from_config_wires_loopback_collaborators() {
        let dir = tempfile::tempdir().unwrap();
        let config = FactguardConfig::parse(
            r#"
[inference]
provider = "loopback"

[search]
provider = "loopback"

[memory]
journal_dir = "corrections"

[logging]
path = "logs/factcheck.log"
"#,
            dir.path(),
        )
        .unwrap();
        let runtime = FactCheckRuntime::from_config(&config).unwrap();
        runtime.record_feedback(
            "alice",
            &UserFeedback {
                correction_type: CorrectionType::Rejected,
                original_text: "x".into(),
                corrected_text: "y".into(),
            },
        );
        assert!(dir.path().join("corrections").is_dir());
        assert!(dir.path().join("logs/factcheck.log").is_file());
        assert!(runtime.telemetry().is_some());
    }
}
