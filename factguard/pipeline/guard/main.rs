//! Textual guards against fabricated suggestions.

/// Fabricated-precision patterns.
pub mod indicators;
/// Unsupported-fact detection.
pub mod injection;

pub use indicators::{first_indicator, Indicator};
pub use injection::{novel_markers, FACT_MARKERS, MAX_NOVEL_MARKERS};

use serde::Serialize;

use crate::model::{AsIssue, Confidence, FactCheckIssue};

/// Outcome of inspecting one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum GuardVerdict {
    /// Candidate may proceed.
    Pass,
    /// Confidence was not HIGH.
    LowConfidence,
    /// Suggestion matched a fabricated-precision pattern.
    Hallucination {
        /// Label of the matching pattern.
        indicator: &'static str,
    },
    /// Suggestion introduced too many factual markers absent from the text.
    FactInjection {
        /// The novel markers.
        markers: Vec<String>,
    },
}

impl GuardVerdict {
    /// True when the candidate survives.
    #[must_use]
    pub const fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

/// Drops candidates whose suggestion looks fabricated.
#[derive(Debug, Clone, Copy)]
pub struct HallucinationGuard {
    max_novel_markers: usize,
}

impl Default for HallucinationGuard {
    fn default() -> Self {
        Self::new(MAX_NOVEL_MARKERS)
    }
}

impl HallucinationGuard {
    /// Guard tolerating up to `max_novel_markers` ungrounded factual markers.
    #[must_use]
    pub const fn new(max_novel_markers: usize) -> Self {
        Self { max_novel_markers }
    }

    /// Classifies one candidate. Confidence is checked first since it is cheapest.
    #[must_use]
    pub fn inspect(&self, issue: &FactCheckIssue) -> GuardVerdict {
        if issue.confidence != Confidence::High {
            return GuardVerdict::LowConfidence;
        }
        if let Some(indicator) = first_indicator(&issue.suggestion) {
            return GuardVerdict::Hallucination { indicator };
        }
        let markers = novel_markers(&issue.text, &issue.suggestion);
        if markers.len() > self.max_novel_markers {
            return GuardVerdict::FactInjection { markers };
        }
        GuardVerdict::Pass
    }

    /// Splits `issues` into survivors and rejected candidates with their verdicts.
    #[must_use]
    pub fn screen<T: AsIssue>(&self, issues: Vec<T>) -> (Vec<T>, Vec<(T, GuardVerdict)>) {
        let mut kept = Vec::with_capacity(issues.len());
        let mut dropped = Vec::new();
        for issue in issues {
            let verdict = self.inspect(issue.as_issue());
            if verdict.is_pass() {
                kept.push(issue);
            } else {
                dropped.push((issue, verdict));
            }
        }
        (kept, dropped)
    }
}
