use once_cell::sync::Lazy;
use regex::Regex;

/// Pattern denoting fabricated precision in a suggested correction.
#[derive(Debug)]
pub struct Indicator {
    /// Short name reported when the pattern fires.
    pub label: &'static str,
    pattern: Regex,
}

impl Indicator {
    fn new(label: &'static str, pattern: &str) -> Self {
        Self {
            label,
            pattern: Regex::new(pattern).expect("indicator pattern"),
        }
    }

    /// True when the pattern occurs in `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

const MONTHS: &str =
    "january|february|march|april|may|june|july|august|september|october|november|december";
const UNITS: &str = "kg|kilograms?|g|grams?|lbs?|pounds?|tons?|tonnes?|ounces?|oz|km|kilometers?|kilometres?|m|meters?|metres?|cm|mm|miles?|feet|foot|ft|inches?|liters?|litres?|gallons?";

static INDICATORS: Lazy<Vec<Indicator>> = Lazy::new(|| {
    vec![
        Indicator::new(
            "clock_time",
            r"(?i)\b\d{1,2}:\d{2}(?::\d{2})?\s*(?:[ap]\.?m\.?)?",
        ),
        Indicator::new(
            "weekday",
            r"(?i)\b(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
        ),
        Indicator::new(
            "month_year",
            &format!(r"(?i)\b(?:{MONTHS})\s+(?:\d{{1,2}}(?:st|nd|rd|th)?,?\s+)?\d{{4}}\b"),
        ),
        Indicator::new(
            "currency_cents",
            r"(?i)(?:[$€£¥]\s?\d[\d,]*\.\d{2}\b|\b\d[\d,]*\.\d{2}\s*(?:dollars|euros|pounds|usd|eur|gbp)\b)",
        ),
        Indicator::new("percentage_of", r"(?i)\b\d+(?:\.\d+)?\s*(?:%|percent)\s+of\b"),
        Indicator::new(
            "exact_measurement",
            &format!(r"(?i)\bexactly\s+\d[\d,]*(?:\.\d+)?\s*(?:{UNITS})\b"),
        ),
        Indicator::new(
            "unnamed_study",
            r"(?i)\b(?:a|one|another)\s+(?:recent\s+|new\s+)?study\b",
        ),
        Indicator::new("research_shows", r"(?i)\bresearch\s+shows\s+that\b"),
    ]
});

/// Label of the first indicator found in `suggestion`, if any.
#[must_use]
pub fn first_indicator(suggestion: &str) -> Option<&'static str> {
    INDICATORS
        .iter()
        .find(|indicator| indicator.matches(suggestion))
        .map(|indicator| indicator.label)
}
