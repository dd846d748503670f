//! Wire types of the fact-check endpoint.

use serde::{Deserialize, Serialize};

use crate::{
    error::InputError,
    model::{CheckMode, CorrectionType, VerificationResult},
};

/// Message returned after feedback is stored.
pub const FEEDBACK_RECORDED: &str = "Feedback recorded";

/// User reaction to a previously suggested correction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserFeedback {
    /// What the user did.
    pub correction_type: CorrectionType,
    /// Text the suggestion applied to.
    #[serde(default)]
    pub original_text: String,
    /// Text after the user's decision.
    #[serde(default)]
    pub corrected_text: String,
}

/// Body of `POST /api/fact-check`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckRequest {
    /// Markup or plain text to verify.
    #[serde(default)]
    pub content: Option<String>,
    /// `realtime` (default) or `detailed`.
    #[serde(default)]
    pub mode: Option<String>,
    /// When present the call only records feedback.
    #[serde(default)]
    pub user_feedback: Option<UserFeedback>,
}

/// Validated intent of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactCheckCommand {
    /// Run the pipeline.
    Check {
        /// Raw content as received.
        content: String,
        /// Requested depth.
        mode: CheckMode,
    },
    /// Store a correction decision.
    Feedback(UserFeedback),
}

impl FactCheckRequest {
    /// Validates the request. Feedback takes precedence over content.
    pub fn into_command(self) -> Result<FactCheckCommand, InputError> {
        if let Some(feedback) = self.user_feedback {
            if feedback.original_text.trim().is_empty() {
                return Err(InputError::EmptyFeedbackField("originalText"));
            }
            if feedback.correction_type == CorrectionType::Accepted
                && feedback.corrected_text.trim().is_empty()
            {
                return Err(InputError::EmptyFeedbackField("correctedText"));
            }
            return Ok(FactCheckCommand::Feedback(feedback));
        }
        let content = self
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or(InputError::MissingContent)?;
        let mode = match self.mode.as_deref() {
            None => CheckMode::default(),
            Some(raw) => raw.parse()?,
        };
        Ok(FactCheckCommand::Check { content, mode })
    }
}

/// Successful verification response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FactCheckResponse {
    /// Mode the result was produced in.
    pub mode: CheckMode,
    /// Mode-shaped issues.
    pub result: VerificationResult,
    /// Characters in the raw content.
    pub content_length: usize,
    /// Characters after markup removal.
    pub plain_text_length: usize,
    /// Wall-clock milliseconds spent.
    pub processing_time: u64,
    /// Whether the result came from the cache.
    pub cached: bool,
    /// Set when a prior accepted correction suppressed the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_corrected: Option<bool>,
}

/// Acknowledgement of stored feedback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackResponse {
    /// Fixed acknowledgement text.
    pub message: String,
}

impl Default for FeedbackResponse {
    fn default() -> Self {
        Self {
            message: FEEDBACK_RECORDED.into(),
        }
    }
}

/// Either response body of the endpoint.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum FactCheckReply {
    /// Verification result.
    Checked(FactCheckResponse),
    /// Feedback acknowledgement.
    Feedback(FeedbackResponse),
}
