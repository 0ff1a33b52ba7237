//! Attribute whitelist applied at the end of the pipeline.
//!
//! Everything the vendor page ships (classes, js hooks, aria plumbing)
//! goes away; only our own markers and a few semantic attributes stay.

use anyhow::Result;
use kuchiki::NodeRef;

use crate::sanitize::dom;

/// Markers this pipeline writes itself; always kept outside math.
const MARKER_ATTRS: &[&str] = &[
    "data-caveat",
    "data-formula",
    "data-lang",
    "data-table-shell",
    "data-table-scroll",
    "data-ai-gallery",
    "data-ai-gallery-content",
    "data-ai-gallery-item",
    "data-ai-gallery-thumb",
    "data-ai-gallery-meta",
    "data-ai-gallery-title",
    "data-ai-gallery-site",
    "data-ai-sources",
    "data-ai-sources-list",
    "data-ai-source-item",
    "data-ai-source-has-thumb",
    "data-ai-source-icon",
    "data-ai-source-thumb",
    "data-ai-place",
    "data-ai-place-image",
    "data-ai-place-details",
    "data-ai-place-title",
    "data-ai-place-rating",
    "data-ai-place-meta",
];

/// Strips every attribute outside the whitelist for its element kind.
pub fn strip_vendor_attributes(container: &NodeRef) -> Result<()> {
    for el in dom::collect_matches(container, "*")? {
        let node = el.as_node();
        let tag = dom::local_name(node).unwrap_or_default();
        let inside_math = tag == "math" || dom::closest(node, "math").is_some();

        for name in dom::attr_names(node) {
            let keep = if inside_math {
                keep_in_math(&name)
            } else {
                keep_outside_math(node, &tag, &name)
            };
            if !keep {
                dom::remove_attr(node, &name);
            }
        }
    }
    Ok(())
}

/// Math markup keeps its presentation attributes (mathvariant, width and
/// the rest); only vendor plumbing goes.
fn keep_in_math(name: &str) -> bool {
    if name == "data-formula" {
        return true;
    }
    !(matches!(name, "class" | "style" | "id" | "tabindex" | "role")
        || name.starts_with("aria-")
        || name.starts_with("js")
        || name.starts_with("data-"))
}

fn keep_outside_math(node: &NodeRef, tag: &str, name: &str) -> bool {
    if MARKER_ATTRS.contains(&name) {
        return true;
    }

    match (tag, name) {
        ("a", "href" | "target" | "rel") => true,
        ("img", "src" | "alt") => true,
        ("td" | "th", "colspan" | "rowspan") => {
            let value = dom::get_attr(node, name)
                .unwrap_or_default()
                .trim()
                .to_lowercase();
            !value.is_empty() && value != "undefined"
        }
        _ => false,
    }
}
