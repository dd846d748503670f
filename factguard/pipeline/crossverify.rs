use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::CollaboratorError,
    inference::{
        bounded, parse_structured, GenerativeClient, InferenceRequest, InferenceTask,
        INFERENCE_SERVICE,
    },
    model::{AsIssue, Confidence},
    prompts,
    search::{SearchHit, WebSearcher},
};

/// Appended to a suggestion when web evidence backs the original text.
pub const SUPPORT_NOTE: &str = "(Note: web sources may support the original statement.)";

const QUERY_CHARS: usize = 200;
const EXCERPT_CHARS: usize = 500;
const EVIDENCE_CHARS: usize = 3_000;

/// Judge's answer about the original text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Adjudication {
    /// Whether the excerpts support the original text.
    pub is_accurate: bool,
    /// Judge's certainty.
    pub confidence: Confidence,
    /// Short justification.
    #[serde(default)]
    pub reasoning: String,
}

/// What cross-verification did to one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossCheckOutcome {
    /// Candidate was not HIGH and was not checked.
    Skipped,
    /// The search returned nothing; candidate unchanged.
    NoEvidence,
    /// Evidence contradicts the original text; candidate confirmed.
    Confirmed,
    /// Evidence supports the original text; candidate downgraded to LOW.
    Downgraded,
    /// The judgment was not decisive; candidate unchanged.
    Inconclusive(Adjudication),
    /// Search or judgment failed; candidate unchanged.
    Failed(CollaboratorError),
}

fn clip(text: &str, max_chars: usize) -> &str {
    text.char_indices()
        .nth(max_chars)
        .map_or(text, |(idx, _)| &text[..idx])
}

/// Concatenates truncated excerpts until the evidence budget is spent.
fn evidence_block(hits: &[SearchHit]) -> String {
    let mut evidence = String::new();
    for hit in hits {
        let entry = format!(
            "Source: {} ({})\n{}\n\n",
            hit.title,
            hit.url,
            clip(hit.excerpt.trim(), EXCERPT_CHARS)
        );
        let remaining = EVIDENCE_CHARS.saturating_sub(evidence.chars().count());
        if remaining == 0 {
            break;
        }
        evidence.push_str(clip(&entry, remaining));
    }
    evidence
}

/// Checks HIGH-confidence candidates against live web evidence.
#[derive(Clone)]
pub struct CrossVerifier {
    searcher: WebSearcher,
    client: Arc<dyn GenerativeClient>,
    timeout: Duration,
}

impl fmt::Debug for CrossVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrossVerifier")
            .field("searcher", &self.searcher)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl CrossVerifier {
    /// Verifier searching through `searcher` and judging with `client`.
    #[must_use]
    pub fn new(searcher: WebSearcher, client: Arc<dyn GenerativeClient>) -> Self {
        Self {
            searcher,
            client,
            timeout: Duration::from_secs(30),
        }
    }

    /// Sets the deadline of the judgment call.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn adjudicate(
        &self,
        text: &str,
        hits: &[SearchHit],
    ) -> Result<Adjudication, CollaboratorError> {
        let request = InferenceRequest {
            task: InferenceTask::Adjudicate,
            instructions: prompts::adjudicate_instructions().to_string(),
            input: format!(
                "ORIGINAL TEXT:\n{text}\n\nWEB EXCERPTS:\n{}",
                evidence_block(hits)
            ),
            schema: prompts::adjudicate_schema(),
            temperature: 0.0,
            max_tokens: 300,
        };
        let raw = bounded(INFERENCE_SERVICE, self.timeout, self.client.complete(&request)).await?;
        parse_structured(&raw)
    }

    /// Verifies one candidate, adjusting its confidence in place.
    pub async fn verify<T: AsIssue + Send>(&self, candidate: &mut T) -> CrossCheckOutcome {
        let issue = candidate.as_issue();
        if issue.confidence != Confidence::High {
            return CrossCheckOutcome::Skipped;
        }
        let text = issue.text.clone();
        let hits = match self.searcher.search(clip(&text, QUERY_CHARS)).await {
            Ok(hits) => hits,
            Err(err) => return CrossCheckOutcome::Failed(err),
        };
        if hits.is_empty() {
            return CrossCheckOutcome::NoEvidence;
        }
        let judgment = match self.adjudicate(&text, &hits).await {
            Ok(judgment) => judgment,
            Err(err) => return CrossCheckOutcome::Failed(err),
        };
        match (judgment.is_accurate, judgment.confidence) {
            (true, Confidence::High) => {
                let issue = candidate.as_issue_mut();
                issue.confidence = Confidence::Low;
                issue.suggestion = format!("{} {SUPPORT_NOTE}", issue.suggestion.trim_end());
                CrossCheckOutcome::Downgraded
            }
            (false, Confidence::High) => CrossCheckOutcome::Confirmed,
            _ => CrossCheckOutcome::Inconclusive(judgment),
        }
    }

    /// Verifies `candidates` one at a time and keeps only those still HIGH.
    /// The outcome list is parallel to the input order.
    pub async fn verify_all<T: AsIssue + Send>(
        &self,
        candidates: Vec<T>,
    ) -> (Vec<T>, Vec<CrossCheckOutcome>) {
        let mut kept = Vec::with_capacity(candidates.len());
        let mut outcomes = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            outcomes.push(self.verify(&mut candidate).await);
            if candidate.as_issue().confidence == Confidence::High {
                kept.push(candidate);
            }
        }
        (kept, outcomes)
    }
}
