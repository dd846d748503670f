//! Instruction texts and response schemas for every generative call.

use serde_json::{json, Value};

use crate::model::CheckMode;

const REALTIME_INSTRUCTIONS: &str = "You are a cautious fact-checker reviewing prose while it is being written. \
Flag ONLY claims that are obviously and universally wrong (wrong country, wrong century, \
impossible quantities). Do not flag opinions, predictions, style, or anything debatable. \
Quote the exact wrong phrase from the text in `text`, character for character. \
Corrections must use broad, approximate language (\"over\", \"around\", \"many\", \"several\") \
instead of exact numbers, dates, times, or measurements, and must never add facts the \
writer did not mention. Use HIGH confidence only when you are certain. \
Return at most 15 issues; return an empty list when nothing is clearly wrong.";

const DETAILED_INSTRUCTIONS: &str = "You are a meticulous fact-checker performing a comprehensive review. \
Identify factual errors, claims that need verification, misleading statements, and outdated \
information. Quote the exact phrase from the text in `text`, character for character. \
Classify each issue with a category (factual_error, needs_verification, misleading, outdated) \
and an importance (critical, moderate, minor). Corrections must prefer hedged, approximate \
language over exact dates, counts, or measurements and must not introduce facts absent from \
the text. Summarize the overall accuracy in one or two sentences and list claims the reader \
should verify independently. Return at most 25 issues.";

const GENERALIZE_INSTRUCTIONS: &str = "Rewrite the suggested correction so it stays truthful but avoids \
spurious precision. Replace exact dates, counts, and measurements with hedged quantifiers \
such as \"over\", \"around\", \"approximately\", \"many\", or \"several\". Keep the meaning of the \
correction, keep it short, and do not add any new facts.";

const ADJUDICATE_INSTRUCTIONS: &str = "Decide whether the ORIGINAL TEXT is factually accurate using ONLY \
the provided web excerpts. Ignore your own knowledge. If the excerpts do not address the \
claim, answer with LOW confidence. Answer isAccurate=true only when the excerpts support the \
original text.";

/// System instructions for the detector in `mode`.
#[must_use]
pub const fn detection_instructions(mode: CheckMode) -> &'static str {
    match mode {
        CheckMode::Realtime => REALTIME_INSTRUCTIONS,
        CheckMode::Detailed => DETAILED_INSTRUCTIONS,
    }
}

/// Instructions for the suggestion generalizer.
#[must_use]
pub const fn generalize_instructions() -> &'static str {
    GENERALIZE_INSTRUCTIONS
}

/// Instructions for the cross-verification judge.
#[must_use]
pub const fn adjudicate_instructions() -> &'static str {
    ADJUDICATE_INSTRUCTIONS
}

fn issue_properties(detailed: bool) -> (Value, Vec<&'static str>) {
    let mut properties = json!({
        "text": { "type": "string" },
        "issueDescription": { "type": "string" },
        "confidence": { "type": "string", "enum": ["HIGH", "MEDIUM", "LOW"] },
        "suggestion": { "type": "string" },
    });
    let mut required = vec!["text", "issueDescription", "confidence", "suggestion"];
    if detailed {
        properties["category"] = json!({
            "type": "string",
            "enum": ["factual_error", "needs_verification", "misleading", "outdated"]
        });
        properties["importance"] = json!({
            "type": "string",
            "enum": ["critical", "moderate", "minor"]
        });
        required.extend(["category", "importance"]);
    }
    (properties, required)
}

/// Response schema for the detector in `mode`.
#[must_use]
pub fn detection_schema(mode: CheckMode) -> Value {
    let detailed = mode == CheckMode::Detailed;
    let (properties, required) = issue_properties(detailed);
    let issues = json!({
        "type": "array",
        "maxItems": mode.default_ceiling(),
        "items": {
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        }
    });
    if detailed {
        json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string" },
                "issues": issues,
                "verificationNeeded": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["summary", "issues", "verificationNeeded"],
            "additionalProperties": false
        })
    } else {
        json!({
            "type": "object",
            "properties": { "issues": issues },
            "required": ["issues"],
            "additionalProperties": false
        })
    }
}

/// Response schema for the generalizer.
#[must_use]
pub fn generalize_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "generalized": { "type": "string" } },
        "required": ["generalized"],
        "additionalProperties": false
    })
}

/// Response schema for the cross-verification judge.
#[must_use]
pub fn adjudicate_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "isAccurate": { "type": "boolean" },
            "confidence": { "type": "string", "enum": ["HIGH", "MEDIUM", "LOW"] },
            "reasoning": { "type": "string" }
        },
        "required": ["isAccurate", "confidence", "reasoning"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detailed_schema_requires_category_and_importance() {
        let schema = detection_schema(CheckMode::Detailed);
        let required = &schema["properties"]["issues"]["items"]["required"];
        assert!(required.as_array().unwrap().iter().any(|v| v == "category"));
        assert_eq!(schema["properties"]["issues"]["maxItems"], 25);
    }

    #[test]
    fn realtime_schema_omits_detailed_fields() {
        let schema = detection_schema(CheckMode::Realtime);
        let items = &schema["properties"]["issues"]["items"];
        assert!(items["properties"].get("category").is_none());
        assert_eq!(schema["properties"]["issues"]["maxItems"], 15);
    }
}
