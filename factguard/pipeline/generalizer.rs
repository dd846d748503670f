use std::{fmt, sync::Arc, time::Duration};

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::{
    inference::{
        bounded, parse_structured, GenerativeClient, InferenceRequest, InferenceTask,
        INFERENCE_SERVICE,
    },
    guard::{first_indicator, novel_markers, MAX_NOVEL_MARKERS},
    model::AsIssue,
    prompts,
};

const UNITS: &str = "km|kilometers?|kilometres?|m|meters?|metres?|cm|mm|miles?|mi|feet|foot|ft|inches?|yards?|kg|kilograms?|g|grams?|tons?|tonnes?|lbs?|pounds?|liters?|litres?|gallons?|years?|people|residents|species";
const NUMBER: &str = r"\d[\d,]*(?:\.\d+)?";
const HEDGE: &str = r"(?:(?:over|around|about|roughly|nearly|almost|approximately|some)\s+)?";

static QUANTITY_WITH_UNIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b\d{{4,}}\s*(?:{UNITS})\b")).expect("quantity pattern"));
static EXACT_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:exactly|precisely)\s+\d").expect("exact pattern"));
static DECIMAL_MEASUREMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b\d+\.\d+\s*(?:{UNITS})\b")).expect("decimal pattern"));
static GROUPED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{1,3}(?:,\d{3})+\b").expect("grouped pattern"));
static RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:between\s+({NUMBER})\s+and\s+({NUMBER})|({NUMBER})\s*(?:-|–|to)\s*({NUMBER}))"
    ))
    .expect("range pattern")
});
static APPROXIMATELY_LARGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bapproximately\s+(?:\d{1,3}(?:,\d{3})+|\d{4,})").expect("approximately pattern")
});

static REWRITE_EXACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(?:exactly|precisely|approximately)\s+({NUMBER})")).expect("exact rewrite")
});
static REWRITE_DECIMAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b(\d+)\.\d+(\s*)({UNITS})\b")).expect("decimal rewrite")
});
static REWRITE_PRECISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b{HEDGE}(\d{{1,3}}(?:,\d{{3}})+|\d{{4,}}(?:\.\d+)?)(\s*(?:{UNITS})\b)?"
    ))
    .expect("precise rewrite")
});

fn has_precise_grouping(text: &str) -> bool {
    GROUPED
        .find_iter(text)
        .any(|found| !found.as_str().ends_with(",000"))
}

/// True when `suggestion` carries spurious precision that should be hedged.
#[must_use]
pub fn is_overly_specific(suggestion: &str) -> bool {
    QUANTITY_WITH_UNIT.is_match(suggestion)
        || EXACT_NUMBER.is_match(suggestion)
        || DECIMAL_MEASUREMENT.is_match(suggestion)
        || has_precise_grouping(suggestion)
        || RANGE.is_match(suggestion)
        || APPROXIMATELY_LARGE.is_match(suggestion)
}

fn parse_number(raw: &str) -> f64 {
    raw.replace(',', "").parse().unwrap_or(0.0)
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn nearest(value: f64) -> String {
    if value >= 10_000.0 {
        group_thousands(((value / 1_000.0).round() * 1_000.0) as u64)
    } else {
        (value.round() as u64).to_string()
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn floor_thousands(value: f64) -> String {
    if value >= 1_000.0 {
        group_thousands(((value / 1_000.0).floor() * 1_000.0) as u64)
    } else {
        (value.floor() as u64).to_string()
    }
}

/// Regex-only rewrite used when the collaborator cannot help. Never fails and
/// never returns an empty string for non-empty input.
#[must_use]
pub fn fallback_generalize(suggestion: &str) -> String {
    let text = REWRITE_EXACT.replace_all(suggestion, |caps: &Captures<'_>| {
        format!("around {}", nearest(parse_number(&caps[1])))
    });
    let text = RANGE.replace_all(&text, |caps: &Captures<'_>| {
        let low = caps.get(1).or_else(|| caps.get(3)).map_or("", |m| m.as_str());
        format!("roughly {}", nearest(parse_number(low)))
    });
    let text = REWRITE_DECIMAL.replace_all(&text, |caps: &Captures<'_>| {
        format!("about {}{}{}", &caps[1], &caps[2], &caps[3])
    });
    let text = REWRITE_PRECISE.replace_all(&text, |caps: &Captures<'_>| {
        let number = &caps[1];
        let unit = caps.get(2).map_or("", |m| m.as_str());
        let flagged = if number.contains(',') {
            !number.ends_with(",000")
        } else {
            !unit.is_empty()
        };
        if flagged {
            format!("over {}{unit}", floor_thousands(parse_number(number)))
        } else {
            caps[0].to_string()
        }
    });
    let rewritten = text.trim();
    if rewritten.is_empty() {
        suggestion.to_string()
    } else {
        rewritten.to_string()
    }
}

/// How a suggestion ended up in its final form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generalization {
    /// Suggestion was not overly specific.
    Unchanged,
    /// The collaborator produced an acceptable rewrite.
    Collaborator,
    /// The regex fallback was used.
    Fallback {
        /// Why the collaborator rewrite was not used.
        reason: String,
    },
}

#[derive(Deserialize)]
struct GeneralizedSuggestion {
    #[serde(default)]
    generalized: String,
}

/// Rewrites overly precise suggestions into hedged phrasing.
#[derive(Clone)]
pub struct SuggestionGeneralizer {
    client: Arc<dyn GenerativeClient>,
    timeout: Duration,
}

impl fmt::Debug for SuggestionGeneralizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SuggestionGeneralizer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl SuggestionGeneralizer {
    /// Generalizer backed by `client`.
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

    async fn rewrite(&self, text: &str, suggestion: &str) -> Result<String, String> {
        let request = InferenceRequest {
            task: InferenceTask::Generalize,
            instructions: prompts::generalize_instructions().to_string(),
            input: format!("Original text: {text}\nSuggested correction: {suggestion}"),
            schema: prompts::generalize_schema(),
            temperature: 0.2,
            max_tokens: 200,
        };
        let raw = bounded(INFERENCE_SERVICE, self.timeout, self.client.complete(&request))
            .await
            .map_err(|err| err.to_string())?;
        let parsed: GeneralizedSuggestion = parse_structured(&raw).map_err(|err| err.to_string())?;
        let candidate = parsed.generalized.trim();
        if candidate.is_empty() {
            return Err("empty rewrite".into());
        }
        if is_overly_specific(candidate) {
            return Err("rewrite still overly specific".into());
        }
        // The rewrite is collaborator output too and must pass the same screen.
        if let Some(label) = first_indicator(candidate) {
            return Err(format!("rewrite carries fabricated detail ({label})"));
        }
        let markers = novel_markers(text, candidate);
        if markers.len() > MAX_NOVEL_MARKERS {
            return Err(format!("rewrite injects facts: {}", markers.join(", ")));
        }
        Ok(candidate.to_string())
    }

    /// Hedges `issue.suggestion` in place when it is overly specific.
    pub async fn apply<T: AsIssue + Send>(&self, issue: &mut T) -> Generalization {
        let view = issue.as_issue();
        if !is_overly_specific(&view.suggestion) {
            return Generalization::Unchanged;
        }
        let outcome = self.rewrite(&view.text, &view.suggestion).await;
        let target = issue.as_issue_mut();
        match outcome {
            Ok(rewritten) => {
                target.suggestion = rewritten;
                Generalization::Collaborator
            }
            Err(reason) => {
                target.suggestion = fallback_generalize(&target.suggestion);
                Generalization::Fallback { reason }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loopback::ScriptedInference,
        model::{Confidence, FactCheckIssue},
    };
    use serde_json::json;

    fn issue(suggestion: &str) -> FactCheckIssue {
        FactCheckIssue {
            text: "The wall is 500 kilometers long".into(),
            issue_description: "length is wrong".into(),
            confidence: Confidence::High,
            suggestion: suggestion.into(),
        }
    }

    #[test]
    fn recognizes_overly_specific_phrasing() {
        assert!(is_overly_specific("stretches 21,196 kilometers"));
        assert!(is_overly_specific("it is exactly 42 meters tall"));
        assert!(is_overly_specific("it is 8848.86 m tall"));
        assert!(is_overly_specific("between 300 and 400 years old"));
        assert!(is_overly_specific("it took 10-15 years"));
        assert!(is_overly_specific("approximately 13000 soldiers"));
        assert!(!is_overly_specific("stretches over 21,000 kilometers"));
        assert!(!is_overly_specific("The Great Wall of China is located in China."));
    }

    #[test]
    fn fallback_hedges_and_never_empties() {
        let rewritten = fallback_generalize("stretches 21,196 kilometers");
        assert_eq!(rewritten, "stretches over 21,000 kilometers");
        assert!(!is_overly_specific(&rewritten));

        assert_eq!(fallback_generalize("exactly 42 meters"), "around 42 meters");
        assert_eq!(fallback_generalize("it took 10-15 years"), "it took roughly 10 years");
        assert_eq!(fallback_generalize("2.5 kilometers wide"), "about 2 kilometers wide");
        assert_eq!(fallback_generalize("8848.86 m tall"), "over 8,000 m tall");
        assert_eq!(
            fallback_generalize("precisely 13,000 soldiers"),
            "around 13,000 soldiers"
        );
        assert!(!fallback_generalize("   ").is_empty());
    }

    #[tokio::test]
    async fn collaborator_failure_falls_back() {
        let inference = Arc::new(ScriptedInference::default());
        inference.fail_task(InferenceTask::Generalize, "model offline");
        let generalizer = SuggestionGeneralizer::new(inference.clone());
        let mut candidate = issue("stretches 21,196 kilometers");
        let outcome = generalizer.apply(&mut candidate).await;
        assert!(matches!(outcome, Generalization::Fallback { .. }));
        assert!(candidate.suggestion.contains("over 21,000"));
        assert!(!is_overly_specific(&candidate.suggestion));
    }

    #[tokio::test]
    async fn collaborator_rewrite_is_used_when_hedged() {
        let inference = Arc::new(ScriptedInference::default());
        inference.respond(
            InferenceTask::Generalize,
            json!({ "generalized": "stretches many thousands of kilometers" }),
        );
        let generalizer = SuggestionGeneralizer::new(inference.clone());
        let mut candidate = issue("stretches 21,196 kilometers");
        assert_eq!(generalizer.apply(&mut candidate).await, Generalization::Collaborator);
        assert_eq!(candidate.suggestion, "stretches many thousands of kilometers");
    }

    #[tokio::test]
    async fn still_specific_rewrite_is_rejected() {
        let inference = Arc::new(ScriptedInference::default());
        inference.respond(
            InferenceTask::Generalize,
            json!({ "generalized": "stretches exactly 21,196 km" }),
        );
        let generalizer = SuggestionGeneralizer::new(inference.clone());
        let mut candidate = issue("stretches 21,196 kilometers");
        assert!(matches!(
            generalizer.apply(&mut candidate).await,
            Generalization::Fallback { .. }
        ));
        assert_eq!(candidate.suggestion, "stretches over 21,000 kilometers");
    }

    #[tokio::test]
    async fn fabricated_rewrite_is_rejected() {
        let inference = Arc::new(ScriptedInference::default());
        inference.enqueue(
            InferenceTask::Generalize,
            json!({
                "generalized": "stretches over 21,000 kilometers, research shows that it was finished on a Monday at 3:15 PM"
            }),
        );
        inference.enqueue(
            InferenceTask::Generalize,
            json!({
                "generalized": "stretches over 21,000 kilometers, built by an emperor of the Ming dynasty in the third century"
            }),
        );
        let generalizer = SuggestionGeneralizer::new(inference.clone());
        for _ in 0..2 {
            let mut candidate = issue("stretches 21,196 kilometers");
            assert!(matches!(
                generalizer.apply(&mut candidate).await,
                Generalization::Fallback { .. }
            ));
            assert_eq!(candidate.suggestion, "stretches over 21,000 kilometers");
            assert_eq!(first_indicator(&candidate.suggestion), None);
        }
    }

    #[tokio::test]
    async fn plain_suggestion_skips_collaborator() {
        let inference = Arc::new(ScriptedInference::default());
        let generalizer = SuggestionGeneralizer::new(inference.clone());
        let mut candidate = issue("located in China");
        assert_eq!(generalizer.apply(&mut candidate).await, Generalization::Unchanged);
        assert_eq!(inference.calls(InferenceTask::Generalize), 0);
    }
}
