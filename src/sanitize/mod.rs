//! The sanitization pipeline.
//!
//! Every entry point works on a private clone of the input subtree; the
//! parsed snapshot itself is never mutated. Pass order matters: source
//! panels are mined before UI removal destroys them, markers are written
//! before the attribute whitelist runs, and empty pruning goes last.

pub mod attrs;
pub mod code;
pub mod context;
pub mod dom;
pub mod math;
pub mod media;
pub mod places;
pub mod semantics;
pub mod sources;
pub mod structure;
pub mod tables;
pub mod text;
pub mod ui;

use anyhow::Result;
use kuchiki::NodeRef;

use crate::config::{SelectorProfile, Tunables};
pub use context::{BlobRasterizer, NoopRasterizer, SanitizeContext};

/// Service tags that never carry answer content.
const SERVICE_TAG_SELECTOR: &str = concat!(
    "button, svg, script, style, input, textarea, ",
    "[role=\"navigation\"], [role=\"dialog\"], [role=\"status\"], ",
    "nav, header, footer, link[href*=\"gstatic.com/external_hosted\"]",
);

/// Blocks the pipeline itself renders; a rerun over cleaned output must
/// leave them untouched instead of mining them again.
const RENDERED_BLOCK_SELECTOR: &str = "[data-ai-gallery], [data-ai-sources]";

/// True when the node sits inside a gallery or sources block rendered by
/// an earlier run.
#[must_use]
pub(crate) fn in_rendered_block(node: &NodeRef) -> bool {
    dom::closest(node, RENDERED_BLOCK_SELECTOR).is_some()
}

/// Pipeline entry point, bundling the configuration for a run.
pub struct Sanitizer<'a> {
    profile: &'a SelectorProfile,
    tunables: &'a Tunables,
    rasterizer: &'a dyn BlobRasterizer,
}

impl<'a> Sanitizer<'a> {
    pub fn new(
        profile: &'a SelectorProfile,
        tunables: &'a Tunables,
        rasterizer: &'a dyn BlobRasterizer,
    ) -> Self {
        Self {
            profile,
            tunables,
            rasterizer,
        }
    }

    /// Per-document context for the passes that need whole-page lookups.
    #[must_use]
    pub fn context(&self, document: NodeRef) -> SanitizeContext<'a> {
        SanitizeContext::new(self.profile, self.tunables, self.rasterizer, document)
    }

    /// Sanitizes a standalone HTML fragment to clean markup.
    ///
    /// After cleanup, a chain of attribute-less `div` wrappers around the
    /// whole result is dropped, so a container element sanitizes to its
    /// inner content. Only bare `div`s unwrap; the pass is a no-op on its
    /// own output, keeping `sanitize` idempotent as a string transform.
    pub fn sanitize(&self, html: &str) -> Result<String> {
        let body = dom::parse_body_fragment(html)?;
        let ctx = self.context(body.clone());
        let cleaned = self.extract_clean_html(&ctx, &body, None)?;

        let tree = dom::parse_body_fragment(&cleaned)?;
        let mut root = tree;
        while let Some(inner) = lone_root_element(&root) {
            let bare_div = dom::local_name(&inner).as_deref() == Some("div")
                && dom::attr_names(&inner).is_empty();
            if !bare_div {
                break;
            }
            root = inner;
        }
        Ok(dom::inner_html(&root)?.trim().to_string())
    }

    /// Runs the full pipeline over a clone of `container` and returns its
    /// inner markup. A pre-built sources block (mined from a wider scope)
    /// can be passed in; otherwise one is built from the clone itself.
    pub fn extract_clean_html(
        &self,
        ctx: &SanitizeContext<'_>,
        container: &NodeRef,
        external_sources_block: Option<NodeRef>,
    ) -> Result<String> {
        let clone = clone_subtree(container)?;

        let sources_block = match external_sources_block {
            Some(block) => Some(block),
            None => sources::build_source_panel_block(ctx, &clone)?,
        };

        ui::remove_ui_elements(ctx, &clone)?;
        ui::remove_ai_disclaimer_blocks(ctx, &clone)?;
        ui::remove_feedback_ui_blocks(ctx, &clone)?;
        remove_service_tags(&clone)?;

        semantics::mark_caveat_blocks(ctx, &clone)?;
        semantics::convert_role_headings(&clone)?;
        places::process_place_cards(ctx.profile, &clone)?;

        math::process_latex_formulas(&clone)?;
        code::process_code_blocks(ctx.profile, &clone)?;

        media::normalize_image_sources(ctx, &clone)?;
        media::embed_blob_images(ctx, &clone)?;
        media::compact_answer_media(ctx, &clone)?;

        if let Some(block) = sources_block {
            sources::append_source_panel_block(ctx, &clone, &block)?;
        }

        tables::wrap_tables_for_scroll(&clone)?;

        structure::normalize_inline_wrappers(ctx, &clone)?;
        structure::normalize_text_nodes(&clone);
        structure::remove_leaf_ui_text_nodes(ctx, &clone)?;
        structure::remove_orphaned_punctuation(ctx, &clone);

        structure::remove_comment_nodes(&clone);
        attrs::strip_vendor_attributes(&clone)?;
        structure::remove_empty_elements(ctx, &clone)?;

        Ok(dom::inner_html(&clone)?.trim().to_string())
    }
}

/// Strips buttons, scripts and other chrome-only tags.
pub fn remove_service_tags(container: &NodeRef) -> Result<()> {
    for el in dom::collect_matches(container, SERVICE_TAG_SELECTOR)? {
        el.as_node().detach();
    }
    Ok(())
}

/// Deep clone through serialize + reparse; the clone lives in its own
/// arena, detached from the source document.
pub fn clone_subtree(node: &NodeRef) -> Result<NodeRef> {
    dom::parse_body_fragment(&dom::inner_html(node)?)
}

/// The only element child of `body`, when nothing but whitespace sits
/// beside it.
fn lone_root_element(body: &NodeRef) -> Option<NodeRef> {
    let mut element = None;
    for child in body.children() {
        if child.as_element().is_some() {
            if element.is_some() {
                return None;
            }
            element = Some(child);
        } else if let Some(text) = child.as_text() {
            if !text.borrow().trim().is_empty() {
                return None;
            }
        }
    }
    element
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sanitizer<'a>(
        profile: &'a SelectorProfile,
        tunables: &'a Tunables,
        rasterizer: &'a NoopRasterizer,
    ) -> Sanitizer<'a> {
        Sanitizer::new(profile, tunables, rasterizer)
    }

    #[test]
    fn fragment_cleanup_resolves_images_and_prunes_empties() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let s = sanitizer(&profile, &tunables, &rasterizer);

        let html = concat!(
            "<div><span>  </span><p>Hello</p>",
            r#"<img src="about:blank" data-src="https://x/y.png"></div>"#,
        );
        let out = s.sanitize(html).unwrap();
        assert_eq!(out, r#"<p>Hello</p><img src="https://x/y.png">"#);
    }

    #[test]
    fn input_subtree_is_not_mutated() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let s = sanitizer(&profile, &tunables, &rasterizer);

        let body = dom::parse_body_fragment(r#"<div class="xy"><button>b</button><p>t</p></div>"#)
            .unwrap();
        let before = dom::inner_html(&body).unwrap();
        let ctx = s.context(body.clone());
        let _ = s.extract_clean_html(&ctx, &body, None).unwrap();
        assert_eq!(dom::inner_html(&body).unwrap(), before);
    }

    #[test]
    fn pipeline_is_idempotent_on_its_output() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let s = sanitizer(&profile, &tunables, &rasterizer);

        let html = concat!(
            "<div><div role=\"heading\" aria-level=\"2\">Title</div>",
            "<p>Some answer text with <strong>bold</strong> parts.</p>",
            "<table><tr><td>a</td><td>b</td></tr></table></div>",
        );
        let once = s.sanitize(html).unwrap();
        let twice = s.sanitize(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn service_tags_are_dropped() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let s = sanitizer(&profile, &tunables, &rasterizer);

        let out = s
            .sanitize("<div><button>copy</button><nav>x</nav><p>kept</p></div>")
            .unwrap();
        assert!(!out.contains("button"));
        assert!(!out.contains("nav"));
        assert!(out.contains("<p>kept</p>"));
    }
}
