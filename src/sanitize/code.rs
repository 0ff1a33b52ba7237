//! Code block normalization and language labeling.
//!
//! The page keeps the original source for each block in an HTML comment of
//! the form `Sv6Kpe[["lang","code"],...]`; payloads are matched to `<pre>`
//! blocks in document order.

use std::sync::LazyLock;

use anyhow::Result;
use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;
use regex::Regex;
use serde_json::Value;

use crate::config::SelectorProfile;
use crate::model::CodePayload;
use crate::sanitize::dom;
use crate::sanitize::text::normalize_text;

static LANGUAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9+#.\-]{1,20}$").expect("language name: hardcoded regex is valid")
});

/// Restores code text from side-channel payloads and labels each block.
pub fn process_code_blocks(profile: &SelectorProfile, container: &NodeRef) -> Result<()> {
    let code_blocks = dom::collect_matches(container, "pre")?;
    if code_blocks.is_empty() {
        return Ok(());
    }

    let payloads = extract_code_payloads(container);
    let mut payload_index = 0usize;

    for pre in &code_blocks {
        let pre_node = pre.as_node();
        let code_node = dom::select_first(pre_node, "code")?
            .map(|c| c.as_node().clone())
            .unwrap_or_else(|| pre_node.clone());

        let payload = payloads.get(payload_index);
        if payload.is_some() {
            payload_index += 1;
        }

        let lang_key = match payload {
            Some(p) => normalize_language_name(profile, &p.language),
            None => detect_code_language_near(profile, pre_node),
        };

        let display_source = lang_key
            .clone()
            .or_else(|| payload.map(|p| p.language.clone()));
        let display_lang = display_source.and_then(|l| format_language_label(profile, &l));

        match payload {
            Some(p) if !p.code.is_empty() => {
                dom::set_text(&code_node, &normalize_code_text(&p.code));
            }
            _ => {
                let text = code_node.text_contents();
                dom::set_text(&code_node, &normalize_code_text(&text));
            }
        }

        if let Some(label) = display_lang {
            dom::set_attr(pre_node, "data-lang", &label);
        }

        if let Some(key) = lang_key {
            if let Some(label_node) = find_closest_language_label(pre_node, &key) {
                label_node.detach();
            }
        }
    }

    // Inline code copies outside pre need the same text normalization.
    for selector in &profile.inline_code_selectors {
        for code in dom::collect_matches(container, selector)? {
            let node = code.as_node();
            if dom::closest(node, "pre").is_some() {
                continue;
            }
            let text = node.text_contents();
            dom::set_text(node, &normalize_code_text(&text));
        }
    }

    Ok(())
}

/// All code payloads hidden in comments, in document order.
#[must_use]
pub fn extract_code_payloads(container: &NodeRef) -> Vec<CodePayload> {
    container
        .inclusive_descendants()
        .comments()
        .filter_map(|comment| parse_code_comment_payload(&comment.borrow()))
        .collect()
}

/// Parses one `Sv6Kpe[...]` comment into its first language/code pair.
///
/// The comment text is valid JSON as-is; entities inside string values
/// (`&quot;` for quotes in the code) are decoded after parsing, so they
/// cannot break the payload structure.
#[must_use]
pub fn parse_code_comment_payload(comment: &str) -> Option<CodePayload> {
    if !comment.contains("Sv6Kpe[") {
        return None;
    }

    let payload_start = comment.find('[')?;
    let parsed: Value = serde_json::from_str(&comment[payload_start..]).ok()?;
    let entries = parsed.as_array()?;
    let first = entries.first()?.as_array()?;
    if first.len() < 2 {
        return None;
    }

    let language = decode_payload_entities(first[0].as_str().unwrap_or_default().trim());
    let code = decode_payload_entities(first[1].as_str().unwrap_or_default());

    if !LANGUAGE_NAME.is_match(&language) || language.is_empty() || code.is_empty() {
        return None;
    }

    Some(CodePayload { language, code })
}

fn decode_payload_entities(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Normalizes code text while preserving line structure.
#[must_use]
pub fn normalize_code_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    static TRAILING_LINE_SPACE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"[ \t]+\n").expect("trailing line space: hardcoded regex is valid")
    });
    static BLANK_RUN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank run: hardcoded regex is valid"));

    let value = text
        .replace('\u{a0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\t', "    ");
    let value = TRAILING_LINE_SPACE.replace_all(&value, "\n");
    let value = BLANK_RUN.replace_all(&value, "\n\n");
    value.trim_end().to_string()
}

/// The identifier when it is a known language, `None` otherwise.
#[must_use]
pub fn normalize_language_name(profile: &SelectorProfile, language: &str) -> Option<String> {
    let normalized = normalize_text(language).to_lowercase();
    if normalized.is_empty() || !profile.is_known_language(&normalized) {
        return None;
    }
    Some(normalized)
}

/// Human label for the block header, `None` for implausible identifiers.
#[must_use]
pub fn format_language_label(profile: &SelectorProfile, language: &str) -> Option<String> {
    if language.is_empty() {
        return None;
    }
    let normalized = normalize_language_name(profile, language)
        .unwrap_or_else(|| normalize_text(language).to_lowercase());
    if normalized.is_empty() || normalized.chars().count() > 20 {
        return None;
    }
    Some(profile.display_language(&normalized))
}

fn language_label_candidate(pre: &NodeRef) -> Option<NodeRef> {
    let parent = pre.parent()?;
    parent
        .preceding_siblings()
        .elements()
        .next()
        .map(|el| el.as_node().clone())
}

/// Language guessed from a short label right before the block.
#[must_use]
pub fn detect_code_language_near(profile: &SelectorProfile, pre: &NodeRef) -> Option<String> {
    let candidate = language_label_candidate(pre)?;
    let text = dom::normalized_text(&candidate).to_lowercase();
    if text.is_empty() || text.chars().count() > 20 {
        return None;
    }
    profile.is_known_language(&text).then_some(text)
}

fn find_closest_language_label(pre: &NodeRef, language_key: &str) -> Option<NodeRef> {
    let candidate = language_label_candidate(pre)?;
    is_standalone_language_label(&candidate, language_key).then_some(candidate)
}

fn is_standalone_language_label(node: &NodeRef, language_key: &str) -> bool {
    if dom::select_first(node, "pre, code, table, ul, ol, button, svg")
        .ok()
        .flatten()
        .is_some()
    {
        return false;
    }
    let text = dom::normalized_text(node).to_lowercase();
    !text.is_empty() && text.chars().count() <= 20 && text == language_key
}
