//! Structural cleanup: text normalization, wrapper fix-up, empty pruning.
//!
//! The fixpoint passes stop as soon as a sweep changes nothing;
//! `Tunables::structural_pass_limit` only guards against pathological
//! nesting.

use std::sync::LazyLock;

use anyhow::Result;
use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;
use regex::Regex;

use crate::sanitize::context::SanitizeContext;
use crate::sanitize::dom;
use crate::sanitize::text::normalize_text;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s+").expect("whitespace run: hardcoded regex is valid")
});

static ORPHAN_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[.,;:!?…·•–—]+$").expect("orphan punctuation: hardcoded regex is valid")
});

const INLINE_WRAPPER_SELECTOR: &str =
    "span > div, strong > div, b > div, em > div, a > div, mark > div";

/// Collapses whitespace in text nodes; code and math keep their layout,
/// only NBSP is replaced there.
pub fn normalize_text_nodes(container: &NodeRef) {
    let nodes: Vec<_> = container.inclusive_descendants().text_nodes().collect();
    for text_node in nodes {
        let node = text_node.as_node();
        let preserve = dom::is_inside_tag(node, &["pre", "code", "math"]);
        let mut value = text_node.borrow_mut();
        let replaced = value.replace('\u{a0}', " ");
        *value = if preserve {
            replaced
        } else {
            WHITESPACE_RUN.replace_all(&replaced, " ").into_owned()
        };
    }
}

/// NBSP replacement only; newlines and spacing stay, for user-typed text.
pub fn normalize_nbsp_text_nodes(container: &NodeRef) {
    let nodes: Vec<_> = container.inclusive_descendants().text_nodes().collect();
    for text_node in nodes {
        let mut value = text_node.borrow_mut();
        if value.contains('\u{a0}') {
            *value = value.replace('\u{a0}', " ");
        }
    }
}

/// Rewrites block divs nested inside inline elements into spans,
/// carrying the attributes over for the later whitelist pass.
pub fn normalize_inline_wrappers(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for _ in 0..ctx.tunables.structural_pass_limit {
        let mut changed = false;

        for el in dom::collect_matches(container, INLINE_WRAPPER_SELECTOR)? {
            let node = el.as_node();
            if node.parent().is_none() {
                continue;
            }
            if dom::select_first(node, "pre, code, ul, ol, table, hr")?.is_some() {
                continue;
            }

            let span = dom::create_element("<span></span>")?;
            for name in dom::attr_names(node) {
                if let Some(value) = dom::get_attr(node, &name) {
                    dom::set_attr(&span, &name, &value);
                }
            }
            dom::move_children(node, &span);
            dom::replace_node(node, &span);
            changed = true;
        }

        if !changed {
            break;
        }
    }
    Ok(())
}

/// Drops all HTML comments (the code side channel is read before this).
pub fn remove_comment_nodes(container: &NodeRef) {
    let comments: Vec<_> = container
        .inclusive_descendants()
        .comments()
        .map(|c| c.as_node().clone())
        .collect();
    for comment in comments {
        comment.detach();
    }
}

/// Removes tiny punctuation-only text nodes stranded between blocks.
pub fn remove_orphaned_punctuation(ctx: &SanitizeContext<'_>, container: &NodeRef) {
    let max_len = ctx.tunables.orphan_text_max_len;
    let nodes: Vec<_> = container.inclusive_descendants().text_nodes().collect();

    for text_node in nodes {
        let node = text_node.as_node().clone();
        if dom::is_inside_tag(&node, &["pre", "code", "math"]) {
            continue;
        }

        let text = text_node.borrow().trim().to_string();
        if text.is_empty() || text.chars().count() > max_len {
            continue;
        }
        if !ORPHAN_PUNCTUATION.is_match(&text) {
            continue;
        }

        let Some(parent) = node.parent() else { continue };
        let orphaned = matches!(dom::local_name(&parent).as_deref(), Some("div" | "section"))
            && dom::child_element_count(&parent) >= 1;
        if orphaned {
            node.detach();
        }
    }
}

/// Prunes empty wrappers left behind by the other passes.
pub fn remove_empty_elements(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for _ in 0..ctx.tunables.structural_pass_limit {
        let mut changed = false;

        for el in dom::collect_matches(container, "span, div, p, a")? {
            let node = el.as_node();
            if dom::has_attr(node, "data-formula") || dom::has_attr(node, "data-caveat") {
                continue;
            }
            if dom::local_name(node).as_deref() == Some("a") && dom::has_attr(node, "href") {
                continue;
            }
            if dom::select_first(node, "pre, code, ul, ol, table, hr, img, math")?.is_some() {
                continue;
            }

            let text = normalize_text(&node.text_contents());
            if text.is_empty() && dom::child_element_count(node) == 0 {
                node.detach();
                changed = true;
            }
        }

        if !changed {
            break;
        }
    }
    Ok(())
}

/// Removes childless elements whose whole text is a known UI phrase.
pub fn remove_leaf_ui_text_nodes(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for el in dom::collect_matches(container, "div, span, p")? {
        let node = el.as_node();
        if dom::child_element_count(node) > 0 {
            continue;
        }
        if dom::is_inside_tag(node, &["pre", "code", "math"]) {
            continue;
        }

        let text = dom::normalized_text(node).to_lowercase();
        if !text.is_empty() && ctx.profile.is_ui_text(&text) {
            node.detach();
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
    fn text_nodes_collapse_outside_code() {
        let body = parse_body_fragment("<p>a\u{a0} b\n\n c</p><pre>x\n  y</pre>").unwrap();

        normalize_text_nodes(&body);
        let p = dom::select_first(&body, "p").unwrap().unwrap();
        assert_eq!(p.as_node().text_contents(), "a b c");
        let pre = dom::select_first(&body, "pre").unwrap().unwrap();
        assert_eq!(pre.as_node().text_contents(), "x\n  y");
    }

    #[test]
    fn nbsp_pass_keeps_newlines() {
        let body = parse_body_fragment("<div>line\u{a0}one\nline two</div>").unwrap();

        normalize_nbsp_text_nodes(&body);
        let div = dom::select_first(&body, "div").unwrap().unwrap();
        assert_eq!(div.as_node().text_contents(), "line one\nline two");
    }

    #[test]
    fn div_inside_span_becomes_span_with_attrs() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            r#"<span><div data-caveat="block">note</div></span>"#,
        );

        normalize_inline_wrappers(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, "span > div").unwrap().is_none());
        let inner = dom::select_first(&body, "span > span").unwrap().unwrap();
        assert_eq!(dom::get_attr(inner.as_node(), "data-caveat").as_deref(), Some("block"));
        assert_eq!(dom::normalized_text(inner.as_node()), "note");
    }

    #[test]
    fn wrapper_with_list_content_is_kept() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            "<span><div><ul><li>x</li></ul></div></span>",
        );

        normalize_inline_wrappers(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, "span > div").unwrap().is_some());
    }

    #[test]
    fn comments_are_removed() {
        let body = parse_body_fragment("<div><!-- note --><p>kept</p></div>").unwrap();

        remove_comment_nodes(&body);
        let html = dom::inner_html(&body).unwrap();
        assert!(!html.contains("note"));
        assert!(html.contains("kept"));
    }

    #[test]
    fn orphaned_dots_between_blocks_are_dropped() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            "<div><p>first</p> · <p>second</p></div>",
        );

        remove_orphaned_punctuation(&ctx, &body);
        let div = dom::select_first(&body, "div").unwrap().unwrap();
        assert!(!div.as_node().text_contents().contains('·'));
    }

    #[test]
    fn sentence_punctuation_inside_paragraph_stays() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, "<p>Wait…</p>");

        remove_orphaned_punctuation(&ctx, &body);
        assert!(dom::normalized_text(&body).contains("Wait…"));
    }

    #[test]
    fn nested_empty_wrappers_prune_to_fixpoint() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            "<div><span><span></span></span><p>text</p></div>",
        );

        remove_empty_elements(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, "span").unwrap().is_none());
        assert!(dom::select_first(&body, "p").unwrap().is_some());
    }

    #[test]
    fn anchors_with_href_survive_empty_pruning() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            r#"<div><a href="https://example.com"></a><a></a></div>"#,
        );

        remove_empty_elements(&ctx, &body).unwrap();
        assert_eq!(dom::collect_matches(&body, "a").unwrap().len(), 1);
    }

    #[test]
    fn leaf_ui_phrases_are_dropped() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            "<div><span>Копировать</span><p>Настоящий текст ответа.</p></div>",
        );

        remove_leaf_ui_text_nodes(&ctx, &body).unwrap();
        let text = dom::normalized_text(&body);
        assert!(!text.contains("Копировать"));
        assert!(text.contains("Настоящий текст"));
    }
}
