#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Precision-biased fact-verification pipeline: claim detection, hallucination
//! filtering, suggestion generalization, and web cross-verification.

/// Request and response wire types.
#[path = "../api.rs"]
pub mod api;

/// Content-addressed result cache.
#[path = "../cache.rs"]
pub mod cache;

/// Injectable time sources.
#[path = "../clock.rs"]
pub mod clock;

/// TOML service configuration.
#[path = "../config.rs"]
pub mod config;

/// Per-user correction history.
#[path = "../correction_memory.rs"]
pub mod correction_memory;

/// Web cross-verification of candidates.
#[path = "../crossverify.rs"]
pub mod crossverify;

/// Generative claim detection.
#[path = "../detector.rs"]
pub mod detector;

/// Error taxonomy.
#[path = "../error.rs"]
pub mod error;

/// Suggestion generalization.
#[path = "../generalizer.rs"]
pub mod generalizer;

/// Anti-hallucination filter.
#[path = "../guard/main.rs"]
pub mod guard;

/// Generative collaborator seam.
#[path = "../inference.rs"]
pub mod inference;

/// Scripted collaborators for offline runs.
#[path = "../loopback.rs"]
pub mod loopback;

/// Domain model.
#[path = "../model.rs"]
pub mod model;

/// Markup normalization and digests.
#[path = "../normalizer.rs"]
pub mod normalizer;

/// Instruction texts and schemas.
#[path = "../prompts.rs"]
pub mod prompts;

/// Outbound search throttle.
#[path = "../rate_limiter.rs"]
pub mod rate_limiter;

/// Web-search collaborator seam.
#[path = "../search.rs"]
pub mod search;

/// Telemetry helpers.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// High-level orchestration entry point.
#[path = "../main.rs"]
pub mod orchestration_entry;

pub use api::{
    FactCheckCommand, FactCheckReply, FactCheckRequest, FactCheckResponse, FeedbackResponse,
    UserFeedback, FEEDBACK_RECORDED,
};
pub use cache::{CacheEntry, CacheKey, ContentCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{FactguardConfig, Provider};
pub use correction_memory::{similarity, CorrectionJournal, CorrectionMemory, CorrectionRecord};
pub use crossverify::{Adjudication, CrossCheckOutcome, CrossVerifier};
pub use detector::ClaimDetector;
pub use error::{CollaboratorError, FactCheckError, InputError, StorageError};
pub use generalizer::{fallback_generalize, is_overly_specific, Generalization, SuggestionGeneralizer};
pub use guard::{GuardVerdict, HallucinationGuard};
pub use inference::{GenerativeClient, HttpInferenceClient, InferenceRequest, InferenceTask};
pub use loopback::ScriptedInference;
pub use model::{
    AsIssue, CheckMode, Confidence, CorrectionType, DetailedIssue, DetailedReport,
    FactCheckIssue, Importance, IssueCategory, VerificationResult,
};
pub use normalizer::{content_digest, normalize_markup};
pub use orchestration_entry::{FactCheckRuntime, FactCheckRuntimeBuilder};
pub use rate_limiter::RateLimiter;
pub use search::{HttpSearchClient, LoopbackSearchClient, SearchHit, SearchQuery, WebSearchClient, WebSearcher};
pub use telemetry::{FactCheckTelemetry, FactCheckTelemetryBuilder};
