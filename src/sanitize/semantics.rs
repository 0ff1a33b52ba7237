//! Semantic upgrades: real heading tags and caveat markers.

use anyhow::Result;
use kuchiki::NodeRef;

use crate::sanitize::context::SanitizeContext;
use crate::sanitize::dom;

/// Converts `[role="heading"]` divs into the matching `h1`..`h6` tag.
pub fn convert_role_headings(container: &NodeRef) -> Result<()> {
    for el in dom::collect_matches(container, "[role=\"heading\"]")? {
        let node = el.as_node();

        // Nested structure means this is layout, not a title.
        if dom::select_first(node, "ul, ol, table, pre, img")?.is_some() {
            continue;
        }

        let level = dom::get_attr(node, "aria-level")
            .and_then(|v| v.trim().parse::<u8>().ok())
            .filter(|l| (1..=6).contains(l))
            .unwrap_or(3);

        let heading = dom::create_element(&format!("<h{level}></h{level}>"))?;
        dom::move_children(node, &heading);
        dom::replace_node(node, &heading);
    }
    Ok(())
}

/// Tags warning labels ("Важно:", "Note:") and their enclosing block.
pub fn mark_caveat_blocks(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for el in dom::collect_matches(container, "strong, b")? {
        let node = el.as_node();
        let text = dom::normalized_text(node).to_lowercase();

        let hit = ctx.profile.caveat_patterns.iter().any(|pattern| {
            text.starts_with(pattern.as_str()) || text == pattern.trim_end_matches(':')
        });
        if !hit {
            continue;
        }

        dom::set_attr(node, "data-caveat", "label");

        let mut parent = node.parent();
        for _ in 0..3 {
            let Some(current) = parent else { break };
            match dom::local_name(&current).as_deref() {
                Some("div" | "p") => {
                    dom::set_attr(&current, "data-caveat", "block");
                    break;
                }
                _ => parent = current.parent(),
            }
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

    #[test]
    fn role_headings_become_h_tags() {
        let body = parse_body_fragment(
            r#"<div role="heading" aria-level="2">Setup</div><div role="heading">Notes</div>"#,
        )
        .unwrap();

        convert_role_headings(&body).unwrap();
        let h2 = dom::select_first(&body, "h2").unwrap().unwrap();
        assert_eq!(dom::normalized_text(h2.as_node()), "Setup");
        // Missing aria-level falls back to h3.
        assert!(dom::select_first(&body, "h3").unwrap().is_some());
        assert!(dom::select_first(&body, "[role=\"heading\"]").unwrap().is_none());
    }

    #[test]
    fn structured_headings_are_left_alone() {
        let body = parse_body_fragment(
            r#"<div role="heading"><ul><li>item</li></ul></div>"#,
        )
        .unwrap();

        convert_role_headings(&body).unwrap();
        assert!(dom::select_first(&body, "[role=\"heading\"]").unwrap().is_some());
    }

    #[test]
    fn caveat_labels_mark_label_and_block() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let body = parse_body_fragment(
            "<p><strong>Важно:</strong> сначала сделайте резервную копию.</p>",
        )
        .unwrap();
        let ctx = SanitizeContext::new(&profile, &tunables, &rasterizer, body.clone());

        mark_caveat_blocks(&ctx, &body).unwrap();
        let strong = dom::select_first(&body, "strong").unwrap().unwrap();
        assert_eq!(dom::get_attr(strong.as_node(), "data-caveat").as_deref(), Some("label"));
        let p = dom::select_first(&body, "p").unwrap().unwrap();
        assert_eq!(dom::get_attr(p.as_node(), "data-caveat").as_deref(), Some("block"));
    }

    #[test]
    fn ordinary_bold_text_is_untouched() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let body = parse_body_fragment("<p><b>faster</b> than the baseline</p>").unwrap();
        let ctx = SanitizeContext::new(&profile, &tunables, &rasterizer, body.clone());

        mark_caveat_blocks(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, "[data-caveat]").unwrap().is_none());
    }
}
