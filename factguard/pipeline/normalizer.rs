use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Shortest plain text worth sending to the detector.
pub const MIN_TEXT_CHARS: usize = 2;

static BLOCK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)</?(?:p|div|br|hr|li|ul|ol|h[1-6]|tr|td|th|table|blockquote|section|article)\b[^>]*>")
        .expect("block tag pattern")
});
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));

// `&amp;` last so that `&amp;lt;` decodes to `&lt;` and not `<`.
const ENTITIES: [(&str, &str); 6] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&amp;", "&"),
];

/// Strips markup to plain text: tags removed, common entities decoded,
/// whitespace runs collapsed, ends trimmed. Block-level tags become a space
/// so adjacent paragraphs do not fuse; inline tags vanish.
#[must_use]
pub fn normalize_markup(raw: &str) -> String {
    let spaced = BLOCK_TAG.replace_all(raw, " ");
    let mut text = TAG.replace_all(&spaced, "").into_owned();
    for (entity, replacement) in ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// True when the normalized text is long enough to verify.
#[must_use]
pub fn is_checkable(text: &str) -> bool {
    text.chars().count() >= MIN_TEXT_CHARS
}

/// Hex SHA-256 of the trimmed, lower-cased text.
#[must_use]
pub fn content_digest(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().to_lowercase().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_entities() {
        let plain = normalize_markup(
            "<p>The Great Wall&nbsp;is in <b>China</b>.</p>\n\n<p>Tom &amp; Jerry &lt;3 &quot;cats&quot; &#39;n dogs</p>",
        );
        assert_eq!(
            plain,
            "The Great Wall is in China. Tom & Jerry <3 \"cats\" 'n dogs"
        );
    }

    #[test]
    fn double_encoded_entities_decode_once() {
        assert_eq!(normalize_markup("a &amp;lt; b"), "a &lt; b");
    }

    #[test]
    fn short_or_empty_text_is_not_checkable() {
        assert!(!is_checkable(&normalize_markup("<br/>  ")));
        assert!(!is_checkable("a"));
        assert!(is_checkable("ok"));
    }

    #[test]
    fn digest_ignores_case_and_outer_whitespace() {
        assert_eq!(
            content_digest("  The Wall is LONG "),
            content_digest("the wall is long")
        );
        assert_ne!(content_digest("the wall"), content_digest("the walls"));
        assert_eq!(content_digest("x").len(), 64);
    }
}
