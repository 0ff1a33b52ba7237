//! Text normalization and label de-noising helpers.
//!
//! Whitespace handling mirrors what browsers and card layouts produce:
//! NBSP is a space, runs collapse, trailing site labels get stripped.

use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace run: hardcoded regex is valid"));

static TRAILING_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,.]+\s*$").expect("trailing punct: hardcoded regex is valid"));

static TRAILING_SEPARATORS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[|\-–—:;,.]+\s*$").expect("trailing separators: hardcoded regex is valid")
});

static DOMAIN_LIKE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("domain like: hardcoded regex is valid")
});

/// Collapses all whitespace (including NBSP) to single spaces and trims.
#[must_use]
pub fn normalize_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let replaced = text.replace('\u{a0}', " ");
    WHITESPACE_RUN.replace_all(&replaced, " ").trim().to_string()
}

/// Normalizes user-entered text while keeping line structure.
#[must_use]
pub fn normalize_user_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    text.replace('\u{a0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

/// True when both texts are non-empty and equal after normalization.
#[must_use]
pub fn is_same_text(a: &str, b: &str) -> bool {
    let left = normalize_text(a).to_lowercase();
    let right = normalize_text(b).to_lowercase();
    !left.is_empty() && left == right
}

/// True for bare `host.tld` strings (no spaces, plausible length).
#[must_use]
pub fn is_domain_like(text: &str) -> bool {
    let value = text.trim();
    if value.is_empty() || value.contains(' ') {
        return false;
    }
    if value.len() < 4 || value.len() > 80 {
        return false;
    }
    DOMAIN_LIKE.is_match(value)
}

/// Collapses a repeated trailing word or glued substring.
///
/// `"Freepik Freepik Freepik"` and `"FreepikFreepikFreepik"` both become
/// `"Freepik"`. Card layouts duplicate the site label this way.
#[must_use]
pub fn collapse_repeated_suffix(text: &str) -> String {
    let mut value = text.trim().to_string();
    if value.is_empty() {
        return value;
    }

    let words: Vec<&str> = value.split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() >= 2 {
        let last = words[words.len() - 1].to_lowercase();
        let mut count = 1;
        for word in words[..words.len() - 1].iter().rev() {
            if word.to_lowercase() != last {
                break;
            }
            count += 1;
        }
        if count >= 2 {
            value = words[..words.len() - (count - 1)].join(" ");
        }
    }

    for len in 3..=18usize {
        if value.chars().count() < len * 2 {
            continue;
        }
        let chars: Vec<char> = value.chars().collect();
        let chunk: String = chars[chars.len() - len..].iter().collect();
        if !chunk
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        {
            continue;
        }

        let chunk_lower = chunk.to_lowercase();
        let mut repeats = 1;
        let mut pos = chars.len() - len;
        while pos >= len {
            let prev: String = chars[pos - len..pos].iter().collect();
            if prev.to_lowercase() != chunk_lower {
                break;
            }
            repeats += 1;
            pos -= len;
        }

        if repeats >= 2 {
            let keep: String = chars[..chars.len() - len * (repeats - 1)].iter().collect();
            value = keep.trim().to_string();
            break;
        }
    }

    value
}

/// Inserts a space before a glued trailing label: `"carsPkautosmart"` with
/// label `"Pkautosmart"` becomes `"cars Pkautosmart"`.
#[must_use]
pub fn insert_space_before_trailing_label(text: &str, label: &str) -> String {
    if text.is_empty() || label.is_empty() {
        return text.to_string();
    }
    let lower = text.to_lowercase();
    let lab_lower = label.to_lowercase();
    if !lower.ends_with(&lab_lower) || text.len() <= label.len() {
        return text.to_string();
    }

    let start = text.len() - label.len();
    if !text.is_char_boundary(start) || start == 0 {
        return text.to_string();
    }
    let prev = match text[..start].chars().next_back() {
        Some(c) => c,
        None => return text.to_string(),
    };
    if prev.is_whitespace()
        || matches!(prev, '|' | '-' | ':' | ';' | ',' | '.' | ')' | ']' | '}' | '/')
    {
        return text.to_string();
    }
    if prev.is_ascii_alphanumeric() {
        return format!("{} {}", &text[..start], &text[start..]);
    }
    text.to_string()
}

/// Removes a repeated site label from the end of a title.
#[must_use]
pub fn strip_trailing_label(text: &str, label: &str) -> String {
    let mut value = text.trim().to_string();
    let lab = label.trim();
    if value.is_empty() || lab.is_empty() {
        return value;
    }
    let lab_lower = lab.to_lowercase();
    if value.to_lowercase() == lab_lower {
        return value;
    }

    for _ in 0..3 {
        let lower = value.to_lowercase();
        if !lower.ends_with(&lab_lower) {
            break;
        }
        let cut = value.len() - lab.len();
        if !value.is_char_boundary(cut) {
            break;
        }
        value.truncate(cut);
        value = value.trim().to_string();
        value = TRAILING_SEPARATORS.replace(&value, "").trim().to_string();
    }

    TRAILING_PUNCT.replace(&value, "").trim().to_string()
}

/// Shortens an overlong card title at a natural break point.
#[must_use]
pub fn shorten_card_title(text: &str) -> String {
    let mut value = normalize_text(text);
    if value.is_empty() {
        return value;
    }

    for sep in [" | ", " - ", " — ", " – ", " · ", " • "] {
        if let Some(idx) = value.find(sep) {
            if idx > 18 {
                value = value[..idx].trim().to_string();
                break;
            }
        }
    }

    if value.len() > 110 {
        if let Some(dot) = value.find(". ") {
            if dot > 30 && dot < 110 {
                value = value[..dot].trim().to_string();
            }
        }
    }

    let words: Vec<&str> = value.split(' ').filter(|w| !w.is_empty()).collect();
    if words.len() > 18 {
        return format!("{}...", words[..18].join(" ").trim());
    }

    if value.len() > 95 {
        let mut cut = 92;
        while cut > 0 && !value.is_char_boundary(cut) {
            cut -= 1;
        }
        value = format!("{}...", value[..cut].trim());
    }

    value
}

/// Turns a hostname into its registrable token: `docs.rs` -> `docs`,
/// `example.co.uk` -> `example`.
#[must_use]
pub fn host_token_label(hostname: &str) -> String {
    let host = normalize_text(hostname).to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        return String::new();
    }

    let parts: Vec<&str> = host.split('.').filter(|p| !p.is_empty()).collect();
    if parts.len() < 2 {
        return host.to_string();
    }

    let mut sld = parts[parts.len() - 2];
    if parts.len() >= 3 && matches!(sld, "co" | "com" | "org" | "net" | "gov" | "edu") {
        sld = parts[parts.len() - 3];
    }
    sld.to_string()
}
