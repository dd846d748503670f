use thiserror::Error;

/// Invalid caller input; surfaced as a 4xx, never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InputError {
    /// `content` missing or blank after trimming.
    #[error("content is required")]
    MissingContent,
    /// `mode` is neither `realtime` nor `detailed`.
    #[error("invalid mode '{0}': expected 'realtime' or 'detailed'")]
    InvalidMode(String),
    /// A feedback field was blank.
    #[error("feedback field '{0}' must not be empty")]
    EmptyFeedbackField(&'static str),
}

/// Failure of an external collaborator call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollaboratorError {
    /// Network failure or unreadable body.
    #[error("{service} request failed: {message}")]
    Transport {
        /// Collaborator name.
        service: &'static str,
        /// Underlying failure.
        message: String,
    },
    /// Non-success HTTP status.
    #[error("{service} returned status {status}")]
    Status {
        /// Collaborator name.
        service: &'static str,
        /// HTTP status code.
        status: u16,
    },
    /// Response did not match the requested schema.
    #[error("{service} response violated schema: {message}")]
    Schema {
        /// Collaborator name.
        service: &'static str,
        /// What was wrong with the payload.
        message: String,
    },
    /// The explicit per-call deadline elapsed.
    #[error("{service} call timed out after {elapsed_ms} ms")]
    Timeout {
        /// Collaborator name.
        service: &'static str,
        /// Deadline that elapsed.
        elapsed_ms: u64,
    },
}

impl CollaboratorError {
    /// Wraps a transport-level failure.
    #[must_use]
    pub fn transport(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            service,
            message: err.to_string(),
        }
    }

    /// Wraps a payload that did not match the expected schema.
    #[must_use]
    pub fn schema(service: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Schema {
            service,
            message: err.to_string(),
        }
    }
}

/// Failure persisting correction history; always absorbed by callers.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error returned by the pipeline entry points.
#[derive(Debug, Error)]
pub enum FactCheckError {
    /// Caller input was rejected.
    #[error(transparent)]
    Input(#[from] InputError),
    /// Claim detection could not produce a result.
    #[error("claim detection failed: {0}")]
    Collaborator(#[from] CollaboratorError),
}
