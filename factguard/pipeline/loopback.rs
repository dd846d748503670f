//! Scripted generative collaborator for offline runs and tests.

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::{
    error::CollaboratorError,
    inference::{GenerativeClient, InferenceRequest, InferenceTask, INFERENCE_SERVICE},
};

type Scripted = Result<String, CollaboratorError>;

/// Generative client answering from per-task scripts.
///
/// One-shot answers queued with [`ScriptedInference::enqueue`] are served
/// first; afterwards the sticky answer set by [`ScriptedInference::respond`]
/// or [`ScriptedInference::fail_task`] applies. Unscripted detection calls
/// report no issues; other unscripted tasks fail with a schema error.
#[derive(Debug, Default)]
pub struct ScriptedInference {
    queued: Mutex<HashMap<InferenceTask, VecDeque<Scripted>>>,
    sticky: Mutex<HashMap<InferenceTask, Scripted>>,
    requests: Mutex<Vec<InferenceRequest>>,
    delay: Option<Duration>,
}

impl ScriptedInference {
    /// Delays every answer by `delay`.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Answers every `task` call with `answer`.
    pub fn respond(&self, task: InferenceTask, answer: Value) {
        self.sticky.lock().insert(task, Ok(answer.to_string()));
    }

    /// Answers every `task` call with the raw text `answer`.
    pub fn respond_raw(&self, task: InferenceTask, answer: impl Into<String>) {
        self.sticky.lock().insert(task, Ok(answer.into()));
    }

    /// Answers the next `task` call with `answer`.
    pub fn enqueue(&self, task: InferenceTask, answer: Value) {
        self.queued
            .lock()
            .entry(task)
            .or_default()
            .push_back(Ok(answer.to_string()));
    }

    /// Fails every `task` call.
    pub fn fail_task(&self, task: InferenceTask, message: impl Into<String>) {
        self.sticky.lock().insert(
            task,
            Err(CollaboratorError::transport(INFERENCE_SERVICE, message.into())),
        );
    }

    /// Number of calls received for `task`.
    #[must_use]
    pub fn calls(&self, task: InferenceTask) -> usize {
        self.requests
            .lock()
            .iter()
            .filter(|request| request.task == task)
            .count()
    }

    /// Every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().clone()
    }

    fn answer(&self, task: InferenceTask) -> Scripted {
        if let Some(next) = self
            .queued
            .lock()
            .get_mut(&task)
            .and_then(VecDeque::pop_front)
        {
            return next;
        }
        if let Some(sticky) = self.sticky.lock().get(&task) {
            return sticky.clone();
        }
        match task {
            InferenceTask::DetectRealtime => Ok(json!({ "issues": [] }).to_string()),
            InferenceTask::DetectDetailed => Ok(json!({
                "summary": "No issues found.",
                "issues": [],
                "verificationNeeded": []
            })
            .to_string()),
            InferenceTask::Generalize | InferenceTask::Adjudicate => Err(CollaboratorError::schema(
                INFERENCE_SERVICE,
                format!("no scripted answer for {}", task.schema_name()),
            )),
        }
    }
}

#[async_trait]
impl GenerativeClient for ScriptedInference {
    async fn complete(&self, request: &InferenceRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer(request.task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: InferenceTask) -> InferenceRequest {
        InferenceRequest {
            task,
            instructions: String::new(),
            input: "text".into(),
            schema: json!({}),
            temperature: 0.0,
            max_tokens: 16,
        }
    }

    #[tokio::test]
    async fn queued_answers_precede_sticky_ones() {
        let inference = ScriptedInference::default();
        inference.respond(InferenceTask::Adjudicate, json!({ "n": 2 }));
        inference.enqueue(InferenceTask::Adjudicate, json!({ "n": 1 }));
        let first = inference.complete(&request(InferenceTask::Adjudicate)).await.unwrap();
        let second = inference.complete(&request(InferenceTask::Adjudicate)).await.unwrap();
        assert_eq!(first, r#"{"n":1}"#);
        assert_eq!(second, r#"{"n":2}"#);
        assert_eq!(inference.calls(InferenceTask::Adjudicate), 2);
    }

    #[tokio::test]
    async fn unscripted_detection_reports_nothing() {
        let inference = ScriptedInference::default();
        let answer = inference
            .complete(&request(InferenceTask::DetectRealtime))
            .await
            .unwrap();
        assert_eq!(answer, r#"{"issues":[]}"#);
        assert!(inference
            .complete(&request(InferenceTask::Generalize))
            .await
            .is_err());
    }
}
