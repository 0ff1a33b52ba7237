//! Table wrapping for horizontal scroll in the exported page.

use anyhow::Result;
use kuchiki::NodeRef;

use crate::sanitize::dom;

/// Wraps each bare table in a shell + scroll container pair.
pub fn wrap_tables_for_scroll(container: &NodeRef) -> Result<()> {
    for table in dom::collect_matches(container, "table")? {
        let node = table.as_node();

        let already_wrapped = node.parent().is_some_and(|parent| {
            dom::get_attr(&parent, "data-table-scroll").as_deref() == Some("true")
                || dom::get_attr(&parent, "class")
                    .is_some_and(|c| c.split_whitespace().any(|name| name == "table-scroll"))
        });
        if already_wrapped {
            continue;
        }

        let shell =
            dom::create_element(r#"<div class="table-shell" data-table-shell="true"></div>"#)?;
        let scroll =
            dom::create_element(r#"<div class="table-scroll" data-table-scroll="true"></div>"#)?;

        node.insert_before(shell.clone());
        node.detach();
        scroll.append(node.clone());
        shell.append(scroll);
    }
    Ok(())
}
