use std::{fmt, sync::Arc, time::Duration};

use serde::Deserialize;

use crate::{
    error::CollaboratorError,
    inference::{
        bounded, parse_structured, GenerativeClient, InferenceRequest, InferenceTask,
        INFERENCE_SERVICE,
    },
    model::{AsIssue, CheckMode, DetailedIssue, DetailedReport, FactCheckIssue, VerificationResult},
    prompts,
};

#[derive(Deserialize)]
#[serde(untagged)]
enum RealtimeAnswer {
    Wrapped { issues: Vec<FactCheckIssue> },
    Bare(Vec<FactCheckIssue>),
}

impl RealtimeAnswer {
    fn into_issues(self) -> Vec<FactCheckIssue> {
        match self {
            Self::Wrapped { issues } | Self::Bare(issues) => issues,
        }
    }
}

/// Detailed reply as the collaborator must send it; every field is required.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailedAnswer {
    summary: String,
    issues: Vec<DetailedIssue>,
    verification_needed: Vec<String>,
}

impl From<DetailedAnswer> for DetailedReport {
    fn from(answer: DetailedAnswer) -> Self {
        Self {
            summary: answer.summary,
            issues: answer.issues,
            verification_needed: answer.verification_needed,
        }
    }
}

/// Keeps at most `ceiling` candidates whose text can be located in `source`.
fn retain_locatable<T: AsIssue>(issues: &mut Vec<T>, source: &str, ceiling: usize) -> usize {
    let before = issues.len();
    issues.retain(|issue| {
        let text = issue.as_issue().text.trim();
        !text.is_empty() && source.contains(text)
    });
    let unlocatable = before - issues.len();
    issues.truncate(ceiling);
    unlocatable
}

/// Claim detection backed by one constrained generative call per request.
#[derive(Clone)]
pub struct ClaimDetector {
    client: Arc<dyn GenerativeClient>,
    timeout: Duration,
}

impl fmt::Debug for ClaimDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimDetector")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ClaimDetector {
    /// Detector backed by `client`.
    #[must_use]
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the per-call deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(text: &str, mode: CheckMode) -> InferenceRequest {
        let (task, temperature, max_tokens) = match mode {
            CheckMode::Realtime => (InferenceTask::DetectRealtime, 0.1, 2_000),
            CheckMode::Detailed => (InferenceTask::DetectDetailed, 0.2, 4_000),
        };
        InferenceRequest {
            task,
            instructions: prompts::detection_instructions(mode).to_string(),
            input: text.to_string(),
            schema: prompts::detection_schema(mode),
            temperature,
            max_tokens,
        }
    }

    /// Produces the raw candidate list for normalized `text`.
    ///
    /// Candidates whose `text` is not a substring of the input are discarded
    /// and the list is cut at the mode's ceiling. Transport failures, timeouts,
    /// and schema violations are returned as errors; no partial result is
    /// ever produced.
    pub async fn detect(
        &self,
        text: &str,
        mode: CheckMode,
    ) -> Result<VerificationResult, CollaboratorError> {
        let request = Self::request(text, mode);
        let raw = bounded(INFERENCE_SERVICE, self.timeout, self.client.complete(&request)).await?;
        let ceiling = mode.default_ceiling();
        let (result, unlocatable) = match mode {
            CheckMode::Realtime => {
                let mut issues = parse_structured::<RealtimeAnswer>(&raw)?.into_issues();
                let unlocatable = retain_locatable(&mut issues, text, ceiling);
                (VerificationResult::Realtime(issues), unlocatable)
            }
            CheckMode::Detailed => {
                let mut report = DetailedReport::from(parse_structured::<DetailedAnswer>(&raw)?);
                let unlocatable = retain_locatable(&mut report.issues, text, ceiling);
                (VerificationResult::Detailed(report), unlocatable)
            }
        };
        if unlocatable > 0 {
            tracing::debug!(unlocatable, mode = %mode, "discarded candidates not found in text");
        }
        Ok(result)
    }
}
