use std::{future::Future, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::CollaboratorError;

/// Collaborator name used in errors and logs.
pub const INFERENCE_SERVICE: &str = "inference";

/// Purpose of a generative call; also names the response schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceTask {
    /// Realtime claim detection.
    DetectRealtime,
    /// Detailed claim detection.
    DetectDetailed,
    /// Rewrite of an overly precise suggestion.
    Generalize,
    /// Judgment of a claim against web excerpts.
    Adjudicate,
}

impl InferenceTask {
    /// Schema name sent to the collaborator.
    #[must_use]
    pub const fn schema_name(self) -> &'static str {
        match self {
            Self::DetectRealtime => "fact_check_realtime",
            Self::DetectDetailed => "fact_check_detailed",
            Self::Generalize => "generalized_suggestion",
            Self::Adjudicate => "claim_adjudication",
        }
    }
}

/// Instruction/schema pair for one generative call.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// What the call is for.
    pub task: InferenceTask,
    /// System instructions.
    pub instructions: String,
    /// User content.
    pub input: String,
    /// JSON schema the answer must satisfy.
    pub schema: Value,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token ceiling.
    pub max_tokens: u32,
}

/// Generative-inference collaborator returning JSON text.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    /// Runs one constrained completion and returns the raw JSON text.
    async fn complete(&self, request: &InferenceRequest) -> Result<String, CollaboratorError>;
}

/// Runs `future` under an explicit deadline.
pub async fn bounded<T, F>(
    service: &'static str,
    limit: Duration,
    future: F,
) -> Result<T, CollaboratorError>
where
    F: Future<Output = Result<T, CollaboratorError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(CollaboratorError::Timeout {
            service,
            elapsed_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}

/// Parses the collaborator's JSON answer, tolerating prose around the JSON.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T, CollaboratorError> {
    match serde_json::from_str::<T>(text.trim()) {
        Ok(value) => Ok(value),
        Err(direct) => {
            let slice = extract_json_block(text)
                .ok_or_else(|| CollaboratorError::schema(INFERENCE_SERVICE, direct))?;
            serde_json::from_str(slice).map_err(|err| CollaboratorError::schema(INFERENCE_SERVICE, err))
        }
    }
}

fn extract_json_block(text: &str) -> Option<&str> {
    let object = text.find('{').zip(text.rfind('}'));
    let array = text.find('[').zip(text.rfind(']'));
    let (start, end) = match (object, array) {
        (Some(obj), Some(arr)) => {
            if arr.0 < obj.0 {
                arr
            } else {
                obj
            }
        }
        (Some(obj), None) => obj,
        (None, Some(arr)) => arr,
        (None, None) => return None,
    };
    (end >= start).then(|| &text[start..=end])
}

/// OpenAI-compatible chat-completions client with JSON-schema output.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpInferenceClient {
    /// Builds a client for `endpoint` (the full chat-completions URL).
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .user_agent("factguard/0.1")
            .build()
            .map_err(|err| CollaboratorError::transport(INFERENCE_SERVICE, err))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            timeout,
        })
    }

    fn payload(&self, request: &InferenceRequest) -> Value {
        json!({
            "model": self.model,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "system", "content": request.instructions },
                { "role": "user", "content": request.input },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": {
                    "name": request.task.schema_name(),
                    "strict": true,
                    "schema": request.schema,
                }
            }
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl GenerativeClient for HttpInferenceClient {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, CollaboratorError> {
        let mut call = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(&self.payload(request));
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key);
        }
        let response = call.send().await.map_err(|err| {
            if err.is_timeout() {
                CollaboratorError::Timeout {
                    service: INFERENCE_SERVICE,
                    elapsed_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                }
            } else {
                CollaboratorError::transport(INFERENCE_SERVICE, err)
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(CollaboratorError::Status {
                service: INFERENCE_SERVICE,
                status: status.as_u16(),
            });
        }
        let completion: ChatCompletion = response
            .json()
            .await
            .map_err(|err| CollaboratorError::schema(INFERENCE_SERVICE, err))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| CollaboratorError::schema(INFERENCE_SERVICE, "completion had no content"))
    }
}
