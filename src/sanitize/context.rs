//! Per-run sanitization state.
//!
//! One `SanitizeContext` lives for the duration of a single document run.
//! Derived lookups (the deferred image-source map) are computed lazily from
//! the document and never shared across runs.

use std::collections::HashMap;
use std::sync::LazyLock;

use kuchiki::NodeRef;
use once_cell::unsync::OnceCell;
use regex::Regex;

use crate::config::{SelectorProfile, Tunables};
use crate::sanitize::dom;
use crate::sanitize::text::normalize_text;

static SET_IMAGE_SRC_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"_setImageSrc\(\s*['"]([^'"]+)['"]\s*,\s*['"]((?:\\.|[^'"\\])*)['"]\s*\)"#)
        .expect("set image src call: hardcoded regex is valid")
});

static HEX_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\x([0-9a-fA-F]{2})|\\u([0-9a-fA-F]{4})")
        .expect("hex escape: hardcoded regex is valid")
});

/// Converts an inert image reference (usually a `blob:` URL) into a durable
/// data URL. The pipeline itself cannot rasterize; embedders that can reach
/// the live page plug their implementation in here.
pub trait BlobRasterizer {
    fn rasterize(&self, source: &str) -> Option<String>;
}

/// Default rasterizer for static snapshots: nothing to draw with.
#[derive(Debug, Default)]
pub struct NoopRasterizer;

impl BlobRasterizer for NoopRasterizer {
    fn rasterize(&self, _source: &str) -> Option<String> {
        None
    }
}

/// Shared state for one sanitization run.
pub struct SanitizeContext<'a> {
    pub profile: &'a SelectorProfile,
    pub tunables: &'a Tunables,
    pub rasterizer: &'a dyn BlobRasterizer,
    /// Document root the run was started from, used for whole-page lookups.
    document: NodeRef,
    deferred_sources: OnceCell<HashMap<String, String>>,
}

impl<'a> SanitizeContext<'a> {
    pub fn new(
        profile: &'a SelectorProfile,
        tunables: &'a Tunables,
        rasterizer: &'a dyn BlobRasterizer,
        document: NodeRef,
    ) -> Self {
        Self {
            profile,
            tunables,
            rasterizer,
            document,
            deferred_sources: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn document(&self) -> &NodeRef {
        &self.document
    }

    /// URL a lazy-loading script would have assigned to the image with `id`.
    #[must_use]
    pub fn deferred_source(&self, id: &str) -> Option<String> {
        let id = normalize_text(id);
        if id.is_empty() {
            return None;
        }
        self.deferred_sources
            .get_or_init(|| collect_deferred_sources(&self.document))
            .get(&id)
            .cloned()
    }
}

/// Scans inline scripts for `_setImageSrc(id, url)` assignments.
fn collect_deferred_sources(document: &NodeRef) -> HashMap<String, String> {
    let mut map = HashMap::new();
    let scripts = match dom::collect_matches(document, "script") {
        Ok(scripts) => scripts,
        Err(_) => return map,
    };

    for script in scripts {
        let text = script.as_node().text_contents();
        if !text.contains("_setImageSrc(") {
            continue;
        }
        for capture in SET_IMAGE_SRC_CALL.captures_iter(&text) {
            let id = normalize_text(&capture[1]);
            let source = decode_escaped_script_string(&capture[2]);
            if !id.is_empty() && !source.is_empty() {
                map.entry(id).or_insert(source);
            }
        }
    }

    log::debug!("collected {} deferred image sources", map.len());
    map
}

/// Decodes `\xNN`, `\uNNNN` and common backslash escapes from script text.
#[must_use]
pub fn decode_escaped_script_string(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let decoded = HEX_ESCAPE.replace_all(value, |caps: &regex::Captures<'_>| {
        let hex = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        u32::from_str_radix(hex, 16)
            .ok()
            .and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });

    decoded
        .replace("\\/", "/")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
        .replace("\\t", "\t")
        .replace("\\\"", "\"")
        .replace("\\'", "'")
        .replace("\\\\", "\\")
        .trim()
        .to_string()
}
