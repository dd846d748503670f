use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::InputError;

/// Verification depth requested by the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckMode {
    /// Lightweight pass flagging only obvious errors.
    #[default]
    Realtime,
    /// Comprehensive pass with categories, importance, and a summary.
    Detailed,
}

impl CheckMode {
    /// Wire label of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Detailed => "detailed",
        }
    }

    /// Upper bound on candidates accepted from the detector.
    #[must_use]
    pub const fn default_ceiling(self) -> usize {
        match self {
            Self::Realtime => 15,
            Self::Detailed => 25,
        }
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckMode {
    type Err = InputError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "realtime" => Ok(Self::Realtime),
            "detailed" => Ok(Self::Detailed),
            other => Err(InputError::InvalidMode(other.to_string())),
        }
    }
}

/// Ordinal certainty attached to a candidate issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// Survives to the response.
    #[serde(rename = "HIGH", alias = "high", alias = "High")]
    High,
    /// Filtered out.
    #[serde(rename = "MEDIUM", alias = "medium", alias = "Medium")]
    Medium,
    /// Filtered out.
    #[serde(rename = "LOW", alias = "low", alias = "Low")]
    Low,
}

/// Kind of problem reported in detailed mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// The claim is wrong.
    FactualError,
    /// The claim cannot be confirmed without a source.
    NeedsVerification,
    /// Technically true but gives a false impression.
    Misleading,
    /// Was true once, no longer is.
    Outdated,
}

/// Weight of a detailed-mode issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Changes the meaning of the text.
    Critical,
    /// Worth fixing.
    Moderate,
    /// Cosmetic.
    Minor,
}

/// One candidate problem found in the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckIssue {
    /// Exact substring of the normalized input being challenged.
    pub text: String,
    /// What is wrong with it.
    pub issue_description: String,
    /// Detector (or cross-verifier) certainty.
    pub confidence: Confidence,
    /// Proposed corrected phrasing.
    pub suggestion: String,
}

/// Detailed-mode issue: the common fields plus category and importance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetailedIssue {
    /// Common issue fields.
    #[serde(flatten)]
    pub issue: FactCheckIssue,
    /// Kind of problem.
    pub category: IssueCategory,
    /// Weight of the problem.
    pub importance: Importance,
}

/// Structured detailed-mode result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DetailedReport {
    /// Overall assessment of the text.
    #[serde(default)]
    pub summary: String,
    /// Surviving issues.
    #[serde(default)]
    pub issues: Vec<DetailedIssue>,
    /// Claims the reader should check independently.
    #[serde(default)]
    pub verification_needed: Vec<String>,
}

/// Mode-dependent verification output.
///
/// Serialized untagged: realtime is a JSON array, detailed a JSON object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum VerificationResult {
    /// Flat issue list.
    Realtime(Vec<FactCheckIssue>),
    /// Summary, issues, and verification hints.
    Detailed(DetailedReport),
}

impl VerificationResult {
    /// Empty result with the shape of `mode`.
    #[must_use]
    pub fn empty(mode: CheckMode) -> Self {
        match mode {
            CheckMode::Realtime => Self::Realtime(Vec::new()),
            CheckMode::Detailed => Self::Detailed(DetailedReport::default()),
        }
    }

    /// Mode the result shape belongs to.
    #[must_use]
    pub const fn mode(&self) -> CheckMode {
        match self {
            Self::Realtime(_) => CheckMode::Realtime,
            Self::Detailed(_) => CheckMode::Detailed,
        }
    }

    /// Common view over the issues regardless of shape.
    #[must_use]
    pub fn issues(&self) -> Vec<&FactCheckIssue> {
        match self {
            Self::Realtime(issues) => issues.iter().collect(),
            Self::Detailed(report) => report.issues.iter().map(AsIssue::as_issue).collect(),
        }
    }

    /// Number of issues carried.
    #[must_use]
    pub fn issue_count(&self) -> usize {
        match self {
            Self::Realtime(issues) => issues.len(),
            Self::Detailed(report) => report.issues.len(),
        }
    }
}

/// Access to the common fields of either issue shape, so the filter stages
/// can run over both without erasing the shape.
pub trait AsIssue {
    /// Shared view.
    fn as_issue(&self) -> &FactCheckIssue;
    /// Mutable view.
    fn as_issue_mut(&mut self) -> &mut FactCheckIssue;
}

impl AsIssue for FactCheckIssue {
    fn as_issue(&self) -> &FactCheckIssue {
        self
    }

    fn as_issue_mut(&mut self) -> &mut FactCheckIssue {
        self
    }
}

impl AsIssue for DetailedIssue {
    fn as_issue(&self) -> &FactCheckIssue {
        &self.issue
    }

    fn as_issue_mut(&mut self) -> &mut FactCheckIssue {
        &mut self.issue
    }
}

/// What the user did with a suggested correction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionType {
    /// Applied the suggestion.
    Accepted,
    /// Dismissed the suggestion.
    Rejected,
    /// Left the suggestion untouched.
    Ignored,
}
