//! Chrome removal: toolbars, dialogs, disclaimers and feedback forms.
//!
//! The feedback form is the riskiest target because its option labels
//! ("helpful", "clear", "other") are ordinary words. Removal is layered:
//! token-only clusters first, then snippet-matched blocks smallest-first,
//! then leaf cleanup that only fires with cluster context around it.

use std::collections::HashSet;

use anyhow::Result;
use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;

use crate::sanitize::context::SanitizeContext;
use crate::sanitize::dom;
use crate::sanitize::sources::remove_source_panels;
use crate::sanitize::text::normalize_text;

const STRUCTURAL_CONTENT_SELECTOR: &str = "pre, code, table, math, details, img, blockquote";

/// True when the text is a known UI phrase (possibly with a short suffix).
#[must_use]
pub fn is_ui_text(ctx: &SanitizeContext<'_>, text: &str) -> bool {
    let lower = normalize_text(text).to_lowercase();
    if lower.is_empty() {
        return true;
    }
    matches_ui_phrase(ctx, &lower, ctx.tunables.ui_text_slack)
}

fn matches_ui_phrase(ctx: &SanitizeContext<'_>, lower: &str, slack: usize) -> bool {
    let len = lower.chars().count();
    ctx.profile.ui_texts.iter().any(|ui| {
        lower == ui || (lower.starts_with(ui.as_str()) && len < ui.chars().count() + slack)
    })
}

/// Strips UI chrome from the cloned turn container.
pub fn remove_ui_elements(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for selector in &ctx.profile.ui_chrome_selectors {
        for el in dom::collect_matches(container, selector)? {
            el.as_node().detach();
        }
    }

    remove_source_panels(ctx, container)?;

    let mut doomed = Vec::new();
    let mut seen = HashSet::new();
    for node in container.inclusive_descendants().elements() {
        let node = node.as_node().clone();
        if dom::is_inside_tag(&node, &["pre", "code", "math"]) {
            continue;
        }

        let text = dom::normalized_text(&node).to_lowercase();
        if !text.is_empty()
            && matches_ui_phrase(ctx, &text, ctx.tunables.ui_element_slack)
            && dom::child_element_count(&node) < ctx.tunables.ui_max_children
        {
            if seen.insert(dom::node_key(&node)) {
                doomed.push(node.clone());
            }
            continue;
        }

        let role = dom::get_attr(&node, "role").unwrap_or_default();
        let is_popover = dom::get_attr(&node, "popover").as_deref() == Some("manual");
        if (role == "dialog" || role == "status" || is_popover)
            && seen.insert(dom::node_key(&node))
        {
            doomed.push(node);
        }
    }
    for node in doomed {
        node.detach();
    }

    // Card discovery may have left new panel shapes exposed.
    remove_source_panels(ctx, container)
}

/// Drops the short "AI responses may include mistakes" paragraphs.
///
/// Only leaf-like elements qualify: a container whose first paragraph is
/// the disclaimer matches the prefix on its whole text and must not be
/// deleted along with the answer it holds.
pub fn remove_ai_disclaimer_blocks(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for el in dom::collect_matches(container, "div, p, span, li, section")? {
        let node = el.as_node();
        if dom::is_inside_tag(node, &["pre", "code", "math"]) {
            continue;
        }
        if dom::select_first(
            node,
            "pre, code, table, ul, ol, math, details, img, blockquote, h1, h2, h3",
        )?
        .is_some()
        {
            continue;
        }
        if !is_leaf_like(node) {
            continue;
        }

        let text = dom::normalized_text(node).to_lowercase();
        if text.is_empty() || text.chars().count() > ctx.tunables.disclaimer_max_len {
            continue;
        }

        let is_disclaimer = ctx.profile.disclaimer_patterns.iter().any(|pattern| {
            text == *pattern
                || text.starts_with(&format!("{pattern}."))
                || text.starts_with(&format!("{pattern} "))
                || text.contains(&format!("{pattern}. подробнее"))
                || text.contains(&format!("{pattern}. learn more"))
        });
        if is_disclaimer {
            node.detach();
        }
    }
    Ok(())
}

/// True when all element children are inline, so the element's text reads
/// as one run rather than a stack of blocks.
fn is_leaf_like(node: &NodeRef) -> bool {
    node.children().all(|child| {
        child.as_element().is_none()
            || matches!(dom::classify(&child), dom::NodeKind::Inline)
            || dom::local_name(&child).as_deref() == Some("br")
    })
}

/// Per-element tally of feedback-form token occurrences.
#[derive(Debug, Default, Clone, Copy)]
struct FeedbackTokenStats {
    token_count: usize,
    core_count: usize,
    other_count: usize,
    other_text_len: usize,
    has_feedback_label: bool,
    unique_option_count: usize,
    has_other_token: bool,
}

impl FeedbackTokenStats {
    fn token_only(self) -> bool {
        self.other_count == 0 && self.other_text_len == 0
    }

    /// Leftover option strip, e.g. "Other Other" after partial cleanup.
    fn is_option_residue(self) -> bool {
        self.token_only()
            && self.core_count == 0
            && self.token_count >= 2
            && self.unique_option_count == 1
            && self.has_other_token
    }

    fn is_option_set(self) -> bool {
        self.token_only()
            && self.core_count == 0
            && self.token_count >= 3
            && self.unique_option_count >= 2
            && self.has_other_token
    }
}

fn gather_feedback_stats(ctx: &SanitizeContext<'_>, root: &NodeRef) -> FeedbackTokenStats {
    let profile = ctx.profile;
    let mut stats = FeedbackTokenStats::default();
    let mut seen_options = HashSet::new();

    for text_node in root.inclusive_descendants().text_nodes() {
        let value = normalize_text(&text_node.borrow()).to_lowercase();
        if value.is_empty() {
            continue;
        }

        if value.contains("feedback") {
            stats.has_feedback_label = true;
        }

        let is_core = profile.feedback_core_tokens.contains(&value);
        let is_option = profile.feedback_option_tokens.contains(&value);
        if is_core || is_option {
            stats.token_count += 1;
            if is_core {
                stats.core_count += 1;
            }
            if is_option {
                seen_options.insert(value.clone());
            }
            if value == "other" {
                stats.has_other_token = true;
            }
            continue;
        }

        stats.other_count += 1;
        stats.other_text_len += value.chars().count();
    }

    stats.unique_option_count = seen_options.len();
    stats
}

fn count_unique_feedback_token_hits(ctx: &SanitizeContext<'_>, lower: &str) -> usize {
    let profile = ctx.profile;
    profile
        .feedback_core_tokens
        .iter()
        .chain(profile.feedback_option_tokens.iter())
        .filter(|token| lower.contains(token.as_str()))
        .count()
}

fn count_core_token_hits(ctx: &SanitizeContext<'_>, lower: &str) -> usize {
    ctx.profile
        .feedback_core_tokens
        .iter()
        .filter(|token| lower.contains(token.as_str()))
        .count()
}

/// True when the full text reads like a dense feedback option menu.
fn is_feedback_cluster_text(ctx: &SanitizeContext<'_>, lower: &str) -> bool {
    if lower.is_empty() {
        return false;
    }
    if count_unique_feedback_token_hits(ctx, lower) < ctx.tunables.feedback_cluster_min_hits {
        return false;
    }
    lower.contains("feedback") || count_core_token_hits(ctx, lower) >= 3
}

fn has_structural_content(node: &NodeRef) -> bool {
    dom::select_first(node, STRUCTURAL_CONTENT_SELECTOR)
        .ok()
        .flatten()
        .is_some()
}

fn descendant_count(node: &NodeRef) -> usize {
    node.inclusive_descendants().elements().count()
}

/// Smallest-first pick of non-nested removal targets.
fn select_non_nested(mut candidates: Vec<NodeRef>) -> Vec<NodeRef> {
    candidates.sort_by_key(descendant_count);

    let mut chosen: Vec<NodeRef> = Vec::new();
    for candidate in candidates {
        let nested = chosen.iter().any(|picked| {
            dom::contains(&candidate, picked) || dom::contains(picked, &candidate)
        });
        if !nested {
            chosen.push(candidate);
        }
    }
    chosen
}

/// Removes feedback-form UI that leaked into the answer DOM.
pub fn remove_feedback_ui_blocks(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    remove_feedback_clusters(ctx, container)?;
    remove_option_only_islands(ctx, container)?;
    remove_snippet_matched_blocks(ctx, container)?;
    remove_feedback_leaves(ctx, container)?;
    remove_paired_other_leaves(ctx, container)?;
    Ok(())
}

/// Containers whose text consists almost entirely of feedback tokens.
fn remove_feedback_clusters(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    let mut candidates = Vec::new();

    for el in dom::collect_matches(container, "div, section, aside, form, ul, ol, span, p, li")? {
        let node = el.as_node();
        if dom::is_inside_tag(node, &["pre", "code", "math"]) || has_structural_content(node) {
            continue;
        }

        let stats = gather_feedback_stats(ctx, node);
        if stats.token_count == 0 {
            continue;
        }

        if stats.token_only() && stats.core_count == 0 {
            if stats.is_option_set() || stats.is_option_residue() {
                candidates.push(node.clone());
            }
            continue;
        }

        if stats.token_count < ctx.tunables.feedback_cluster_min_hits + 1 {
            continue;
        }
        if stats.other_text_len > ctx.tunables.feedback_other_text_max {
            continue;
        }

        let full_text = dom::normalized_text(node).to_lowercase();
        if stats.has_feedback_label
            || stats.core_count >= 4
            || is_feedback_cluster_text(ctx, &full_text)
        {
            candidates.push(node.clone());
        }
    }

    for node in select_non_nested(candidates) {
        node.detach();
    }
    Ok(())
}

/// Leftover strips whose words are all option tokens ("clear other other").
fn remove_option_only_islands(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    let mut candidates = Vec::new();

    for el in dom::collect_matches(container, "div, span, p, li, section, aside")? {
        let node = el.as_node();
        if dom::is_inside_tag(node, &["pre", "code", "math"]) || has_structural_content(node) {
            continue;
        }

        let text = dom::normalized_text(node).to_lowercase();
        let parts: Vec<&str> = text.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() < 2 {
            continue;
        }

        let all_options = parts
            .iter()
            .all(|part| ctx.profile.feedback_option_tokens.iter().any(|t| t == part));
        if all_options && parts.contains(&"other") {
            candidates.push(node.clone());
        }
    }

    for node in select_non_nested(candidates) {
        node.detach();
    }
    Ok(())
}

/// Blocks matched by the long privacy/feedback disclaimer snippets.
fn remove_snippet_matched_blocks(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    let mut candidates = Vec::new();

    for el in dom::collect_matches(container, "div, section, aside, form, ul, ol, p, span")? {
        let node = el.as_node();
        if dom::is_inside_tag(node, &["pre", "code", "math"]) || has_structural_content(node) {
            continue;
        }

        let text = dom::normalized_text(node).to_lowercase();
        if text.chars().count() < 20 {
            continue;
        }

        let strong_hit = ctx
            .profile
            .feedback_strong_snippets
            .iter()
            .any(|s| text.contains(s.as_str()));
        let weak_hit = ctx
            .profile
            .feedback_weak_snippets
            .iter()
            .any(|s| text.contains(s.as_str()));
        let has_both_headers =
            text.contains("positive feedback") && text.contains("negative feedback");
        let token_hits = count_unique_feedback_token_hits(ctx, &text);

        let looks_like_feedback = strong_hit
            || (has_both_headers && weak_hit)
            || (token_hits >= 4 && weak_hit)
            || is_feedback_cluster_text(ctx, &text);
        if looks_like_feedback {
            candidates.push(node.clone());
        }
    }

    for node in select_non_nested(candidates) {
        node.detach();
    }
    Ok(())
}

/// Single leaf elements holding one token, removed with ancestor context.
fn remove_feedback_leaves(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    let radius = ctx.tunables.feedback_ancestor_radius;

    for el in dom::collect_matches(container, "div, span, p, li")? {
        let node = el.as_node();
        if dom::child_element_count(node) > 0 {
            continue;
        }
        if dom::is_inside_tag(node, &["pre", "code", "math"]) {
            continue;
        }

        let text = dom::normalized_text(node).to_lowercase();
        if text.is_empty() {
            continue;
        }

        let is_core = ctx.profile.feedback_core_tokens.contains(&text);
        let is_option = ctx.profile.feedback_option_tokens.contains(&text);
        if !is_core && !is_option {
            continue;
        }

        // Core tokens never appear as answer content.
        if is_core {
            node.detach();
            continue;
        }

        if text == "other" {
            let residue = node
                .ancestors()
                .take(radius)
                .take_while(|a| a.as_element().is_some())
                .find(|a| gather_feedback_stats(ctx, a).is_option_residue());
            if let Some(ancestor) = residue {
                ancestor.detach();
                continue;
            }
        }

        for ancestor in node.ancestors().take(radius) {
            if ancestor.as_element().is_none() {
                break;
            }
            let ancestor_text = dom::normalized_text(&ancestor).to_lowercase();
            if is_feedback_cluster_text(ctx, &ancestor_text)
                || gather_feedback_stats(ctx, &ancestor).is_option_set()
            {
                node.detach();
                break;
            }
        }
    }
    Ok(())
}

/// Two or more bare "Other" leaves are always the leftover option pair.
fn remove_paired_other_leaves(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    let _ = ctx;
    let mut leaves = Vec::new();

    for el in dom::collect_matches(container, "span, div, p, li")? {
        let node = el.as_node();
        if dom::child_element_count(node) > 0 {
            continue;
        }
        if dom::is_inside_tag(node, &["pre", "code", "math"]) {
            continue;
        }
        if dom::normalized_text(node).to_lowercase() == "other" {
            leaves.push(node.clone());
        }
    }

    if leaves.len() >= 2 {
        for leaf in leaves {
            leaf.detach();
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SelectorProfile, Tunables};
    use crate::sanitize::context::NoopRasterizer;
    use crate::sanitize::dom::parse_body_fragment;

    fn fixture<'a>(
        profile: &'a SelectorProfile,
        tunables: &'a Tunables,
        rasterizer: &'a NoopRasterizer,
        html: &str,
    ) -> (SanitizeContext<'a>, NodeRef) {
        let body = parse_body_fragment(html).unwrap();
        let ctx = SanitizeContext::new(profile, tunables, rasterizer, body.clone());
        (ctx, body)
    }

    #[test]
    fn ui_phrases_match_with_slack() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, _) = fixture(&profile, &tunables, &rasterizer, "<div></div>");

        assert!(is_ui_text(&ctx, "Копировать"));
        assert!(is_ui_text(&ctx, "копировать!"));
        assert!(is_ui_text(&ctx, ""));
        assert!(!is_ui_text(&ctx, "Копировать данные можно из панели настроек приложения"));
    }

    #[test]
    fn chrome_and_dialogs_are_removed() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            r#"<div class="P8PNlb">toolbar</div>"#,
            r#"<div role="dialog">popup</div>"#,
            r#"<div popover="manual">hint</div>"#,
            "<p>Real answer paragraph that stays in place.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ui_elements(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, ".P8PNlb").unwrap().is_none());
        assert!(dom::select_first(&body, "[role=\"dialog\"]").unwrap().is_none());
        assert!(dom::select_first(&body, "[popover]").unwrap().is_none());
        assert!(dom::normalized_text(&body).contains("Real answer paragraph"));
    }

    #[test]
    fn short_ui_leaves_go_but_content_stays() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            "<span>Поделиться</span>",
            "<p>Ответ модели с настоящим содержимым остаётся на месте.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ui_elements(&ctx, &body).unwrap();
        let text = dom::normalized_text(&body);
        assert!(!text.contains("Поделиться"));
        assert!(text.contains("настоящим содержимым"));
    }

    #[test]
    fn disclaimer_paragraph_is_removed() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            "<p>AI responses may include mistakes. Learn more</p>",
            "<p>An actual answer paragraph about error handling in Rust.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ai_disclaimer_blocks(&ctx, &body).unwrap();
        let text = dom::normalized_text(&body);
        assert!(!text.contains("may include mistakes"));
        assert!(text.contains("error handling"));
    }

    #[test]
    fn disclaimer_with_inline_link_is_removed() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            r##"<p>AI responses may include mistakes. <a href="#">Learn more</a></p>"##,
            "<p>Borrow checking is explained in the paragraph that stays.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ai_disclaimer_blocks(&ctx, &body).unwrap();
        let text = dom::normalized_text(&body);
        assert!(!text.contains("may include mistakes"));
        assert!(text.contains("Borrow checking"));
    }

    #[test]
    fn answer_starting_with_disclaimer_paragraph_keeps_its_text() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div><div id=\"answer\">",
            "<p>AI responses may include mistakes.</p>",
            "<p>Short reply.</p>",
            "</div></div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ai_disclaimer_blocks(&ctx, &body).unwrap();
        // The wrapping div matches the prefix on its combined text but
        // only the leaf paragraph goes.
        assert!(dom::select_first(&body, "#answer").unwrap().is_some());
        assert!(dom::normalized_text(&body).contains("Short reply."));
    }

    #[test]
    fn chrome_selectors_come_from_the_profile() {
        let mut profile = SelectorProfile::default();
        profile.ui_chrome_selectors = vec![".custom-bar".to_string()];
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            r#"<div class="custom-bar">Export as PDF or print this page</div>"#,
            r#"<div class="P8PNlb">Toolbar text long enough to stay without its selector.</div>"#,
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ui_elements(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, ".custom-bar").unwrap().is_none());
        assert!(dom::select_first(&body, ".P8PNlb").unwrap().is_some());
    }

    #[test]
    fn disclaimer_next_to_structure_is_kept() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div><p>ai may make mistakes</p>",
            "<pre><code>let x = 1;</code></pre></div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_ai_disclaimer_blocks(&ctx, &body).unwrap();
        // The outer div holds a pre, only the bare paragraph goes.
        assert!(dom::select_first(&body, "pre").unwrap().is_some());
        assert!(!dom::normalized_text(&body).contains("mistakes"));
    }

    #[test]
    fn feedback_form_cluster_is_removed_whole() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            "<div id=\"form\">",
            "<span>Positive feedback</span><span>Negative feedback</span>",
            "<span>Helpful</span><span>Comprehensive</span><span>Clear</span>",
            "<span>Other</span><span>Saved time</span><span>Not working</span>",
            "</div>",
            "<p>The helpful part of the answer itself survives this pass untouched.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_feedback_ui_blocks(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, "#form").unwrap().is_none());
        assert!(dom::normalized_text(&body).contains("survives this pass"));
    }

    #[test]
    fn option_only_residue_is_removed() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            "<div><span>Other</span><span>Other</span></div>",
            "<p>Content paragraph long enough to look like a normal answer.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_feedback_ui_blocks(&ctx, &body).unwrap();
        let text = dom::normalized_text(&body);
        assert!(!text.to_lowercase().contains("other"));
        assert!(text.contains("Content paragraph"));
    }

    #[test]
    fn single_other_in_content_is_kept() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            "<p>Some options are listed below.</p>",
            "<span>Other</span>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_feedback_ui_blocks(&ctx, &body).unwrap();
        assert!(dom::normalized_text(&body).contains("Other"));
    }

    #[test]
    fn strong_snippet_block_is_removed_smallest_first() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            "<div>",
            "<div><p>A copy of this chat will be included with your feedback</p></div>",
            "<p>Answer text that must not disappear with the feedback banner.</p>",
            "</div>",
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_feedback_ui_blocks(&ctx, &body).unwrap();
        let text = dom::normalized_text(&body);
        assert!(!text.to_lowercase().contains("included with your feedback"));
        assert!(text.contains("must not disappear"));
    }
}
