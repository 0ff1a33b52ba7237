//! Value records produced by the extraction and sanitization layers.
//!
//! Everything here is a plain immutable record once constructed; the DOM
//! arena the pipeline mutates never leaks through these types.

use serde::Serialize;

/// One question/answer exchange.
///
/// A turn without answer markup is invalid and is discarded by the
/// extractor before it ever reaches rendering.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Turn {
    /// Plain-text question, best effort.
    pub question: String,
    /// Sanitized rich HTML of the question, empty when only text was found.
    #[serde(rename = "questionHtml")]
    pub question_html: String,
    /// Sanitized HTML of quoted/attached content, possibly empty.
    #[serde(rename = "quoteHtml")]
    pub quote_html: String,
    /// Sanitized, non-empty answer HTML.
    #[serde(rename = "answerHtml")]
    pub answer_html: String,
}

impl Turn {
    /// Minimum answer length below which a turn is considered empty.
    pub const MIN_ANSWER_LEN: usize = 10;

    /// A turn is only valid with a real answer.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.answer_html.trim().len() >= Self::MIN_ANSWER_LEN
    }
}

/// A normalized citation card mined from a source-panel subtree.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SourceCard {
    /// Absolute http(s) target, redirect wrappers already unwrapped.
    pub href: String,
    /// De-noised, non-empty title.
    pub title: String,
    /// Hostname or short site label.
    pub site: String,
    /// Short description, empty when none was recoverable.
    pub snippet: String,
    /// Favicon-like image, falling back to a favicon proxy URL.
    pub icon_url: Option<String>,
    /// Preview image, when the card had one.
    pub thumb_url: Option<String>,
}

impl SourceCard {
    /// Dedup key: two cards with the same normalized href collapse into one.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        self.href.trim().to_lowercase()
    }
}

/// `{language, code}` pair recovered from a code side channel.
///
/// `None` at the extraction site means "use the visible text as-is".
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CodePayload {
    pub language: String,
    pub code: String,
}

/// A normalized place card (maps/business listing) found in an answer.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct PlaceCard {
    pub url: String,
    pub title: String,
    pub image_src: String,
    pub rating: String,
    pub reviews: String,
    pub kind: String,
    pub meta: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_without_answer_is_invalid() {
        let turn = Turn {
            question: "What is Rust?".into(),
            question_html: String::new(),
            quote_html: String::new(),
            answer_html: "   ".into(),
        };
        assert!(!turn.is_valid());
    }

    #[test]
    fn dedup_key_is_case_insensitive() {
        let a = SourceCard {
            href: "https://Example.com/a".into(),
            title: "t".into(),
            site: "example.com".into(),
            snippet: String::new(),
            icon_url: None,
            thumb_url: None,
        };
        let b = SourceCard {
            href: "https://example.com/a".into(),
            ..a.clone()
        };
        assert_eq!(a.dedup_key(), b.dedup_key());
    }
}
