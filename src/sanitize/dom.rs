//! Low-level DOM helpers over kuchiki.
//!
//! All passes work on a parsed fragment rooted at a `<body>` node. New
//! elements are built by parsing small HTML snippets, which keeps this
//! module independent of html5ever name internals.

use anyhow::Result;
use kuchiki::traits::TendrilSink;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use std::rc::Rc;

/// Coarse element classification used by the structural passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Text,
    Inline,
    Block,
    Media,
    Math,
    Table,
    Code,
    Other,
}

const INLINE_TAGS: &[&str] = &[
    "a", "span", "strong", "b", "em", "i", "u", "s", "mark", "sub", "sup", "small", "abbr",
    "cite", "q", "time", "var", "kbd", "samp",
];

const BLOCK_TAGS: &[&str] = &[
    "div", "p", "section", "article", "aside", "header", "footer", "main", "nav", "ul", "ol",
    "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "figure", "figcaption", "details",
    "summary", "hr", "form",
];

/// Classifies a node for structural decisions.
#[must_use]
pub fn classify(node: &NodeRef) -> NodeKind {
    if node.as_text().is_some() {
        return NodeKind::Text;
    }
    let Some(name) = local_name(node) else {
        return NodeKind::Other;
    };
    match name.as_str() {
        "img" | "picture" | "video" | "audio" | "canvas" | "svg" => NodeKind::Media,
        "math" => NodeKind::Math,
        "table" | "thead" | "tbody" | "tfoot" | "tr" | "td" | "th" | "caption" => NodeKind::Table,
        "pre" | "code" => NodeKind::Code,
        n if INLINE_TAGS.contains(&n) => NodeKind::Inline,
        n if BLOCK_TAGS.contains(&n) => NodeKind::Block,
        _ => NodeKind::Other,
    }
}

/// Stable identity key for a node within one document.
#[must_use]
pub fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

/// Lowercase tag name, `None` for non-elements.
#[must_use]
pub fn local_name(node: &NodeRef) -> Option<String> {
    node.as_element().map(|el| el.name.local.to_string())
}

/// Parses an HTML fragment and returns its `<body>` as the working root.
///
/// Comments before the first element get hoisted out of `<body>` during
/// parsing; they are pulled back in so code payload comments keep their
/// document position across a serialize + reparse round trip.
pub fn parse_body_fragment(html: &str) -> Result<NodeRef> {
    let document = kuchiki::parse_html().one(html.to_string());
    let body = document
        .select_first("body")
        .map_err(|()| anyhow::anyhow!("Invalid body selector"))?
        .as_node()
        .clone();

    let hoisted: Vec<NodeRef> = document
        .inclusive_descendants()
        .filter(|node| node.as_comment().is_some() && !contains(&body, node))
        .collect();
    for comment in hoisted.into_iter().rev() {
        comment.detach();
        body.prepend(comment);
    }

    Ok(body)
}

/// Builds a single element from an HTML snippet like `<span class="x"></span>`.
pub fn create_element(html: &str) -> Result<NodeRef> {
    let body = parse_body_fragment(html)?;
    body.children()
        .find(|child| child.as_element().is_some())
        .ok_or_else(|| anyhow::anyhow!("Fragment produced no element: {html}"))
}

/// Appends each top-level node of an HTML fragment to `container`.
pub fn append_html_fragment(container: &NodeRef, html: &str) -> Result<()> {
    let body = parse_body_fragment(html)?;
    // Collect first: append() detaches the child and would skip siblings.
    let children: Vec<NodeRef> = body.children().collect();
    for child in children {
        container.append(child);
    }
    Ok(())
}

/// Selector matches collected into a Vec so passes can detach freely.
pub fn collect_matches(scope: &NodeRef, selector: &str) -> Result<Vec<NodeDataRef<ElementData>>> {
    Ok(scope
        .select(selector)
        .map_err(|()| anyhow::anyhow!("Invalid selector: {selector}"))?
        .collect())
}

/// First selector match within `scope`.
pub fn select_first(scope: &NodeRef, selector: &str) -> Result<Option<NodeDataRef<ElementData>>> {
    Ok(scope
        .select(selector)
        .map_err(|()| anyhow::anyhow!("Invalid selector: {selector}"))?
        .next())
}

/// True when the node is an element matching `selector`.
#[must_use]
pub fn matches_selector(node: &NodeRef, selector: &str) -> bool {
    let Ok(selectors) = kuchiki::Selectors::compile(selector) else {
        return false;
    };
    node.clone()
        .into_element_ref()
        .is_some_and(|el| selectors.matches(&el))
}

/// Nearest inclusive ancestor matching `selector`.
#[must_use]
pub fn closest(node: &NodeRef, selector: &str) -> Option<NodeRef> {
    let selectors = kuchiki::Selectors::compile(selector).ok()?;
    node.inclusive_ancestors().find(|ancestor| {
        ancestor
            .clone()
            .into_element_ref()
            .is_some_and(|el| selectors.matches(&el))
    })
}

/// True when any proper ancestor carries one of the given tag names.
#[must_use]
pub fn is_inside_tag(node: &NodeRef, tags: &[&str]) -> bool {
    node.ancestors().any(|ancestor| {
        local_name(&ancestor).is_some_and(|name| tags.contains(&name.as_str()))
    })
}

/// Attribute value of an element node.
#[must_use]
pub fn get_attr(node: &NodeRef, name: &str) -> Option<String> {
    let el = node.as_element()?;
    let attrs = el.attributes.borrow();
    attrs.get(name).map(std::string::ToString::to_string)
}

pub fn set_attr(node: &NodeRef, name: &str, value: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().insert(name, value.to_string());
    }
}

pub fn remove_attr(node: &NodeRef, name: &str) {
    if let Some(el) = node.as_element() {
        el.attributes.borrow_mut().remove(name);
    }
}

#[must_use]
pub fn has_attr(node: &NodeRef, name: &str) -> bool {
    node.as_element()
        .is_some_and(|el| el.attributes.borrow().contains(name))
}

/// All attribute names on an element, in serialization order.
#[must_use]
pub fn attr_names(node: &NodeRef) -> Vec<String> {
    match node.as_element() {
        Some(el) => el
            .attributes
            .borrow()
            .map
            .keys()
            .map(|name| name.local.to_string())
            .collect(),
        None => Vec::new(),
    }
}

/// Number of element children.
#[must_use]
pub fn child_element_count(node: &NodeRef) -> usize {
    node.children().filter(|c| c.as_element().is_some()).count()
}

/// True when `inner` is `outer` or sits anywhere below it.
#[must_use]
pub fn contains(outer: &NodeRef, inner: &NodeRef) -> bool {
    let outer_key = node_key(outer);
    inner
        .inclusive_ancestors()
        .any(|ancestor| node_key(&ancestor) == outer_key)
}

/// The direct child of `container` on the path to `node`.
#[must_use]
pub fn direct_child_in(node: &NodeRef, container: &NodeRef) -> Option<NodeRef> {
    let container_key = node_key(container);
    let mut current = node.clone();
    loop {
        let parent = current.parent()?;
        if node_key(&parent) == container_key {
            return Some(current);
        }
        current = parent;
    }
}

/// Serialized HTML of the node itself.
pub fn outer_html(node: &NodeRef) -> Result<String> {
    let mut out = Vec::new();
    node.serialize(&mut out)?;
    Ok(String::from_utf8(out)?)
}

/// Serialized HTML of the node's children.
pub fn inner_html(node: &NodeRef) -> Result<String> {
    let mut out = Vec::new();
    for child in node.children() {
        child.serialize(&mut out)?;
    }
    Ok(String::from_utf8(out)?)
}

/// Moves every child of `from` to the end of `to`.
pub fn move_children(from: &NodeRef, to: &NodeRef) {
    let children: Vec<NodeRef> = from.children().collect();
    for child in children {
        to.append(child);
    }
}

/// Swaps `old` for `new_node` in place, leaving children where they are.
pub fn replace_node(old: &NodeRef, new_node: &NodeRef) {
    old.insert_before(new_node.clone());
    old.detach();
}

/// Replaces the node's children with a single text node.
pub fn set_text(node: &NodeRef, text: &str) {
    let children: Vec<NodeRef> = node.children().collect();
    for child in children {
        child.detach();
    }
    node.append(NodeRef::new_text(text));
}

/// Plain text content with whitespace collapsed.
#[must_use]
pub fn normalized_text(node: &NodeRef) -> String {
    super::text::normalize_text(&node.text_contents())
}

/// Approximates rendered-text lines from a static subtree.
///
/// `<br>` and transitions out of block elements become line breaks, which
/// is close enough to `innerText` for card layouts.
#[must_use]
pub fn block_text_lines(node: &NodeRef) -> Vec<String> {
    let mut buf = String::new();
    accumulate_text(node, &mut buf);
    buf.split('\n')
        .map(super::text::normalize_text)
        .filter(|line| !line.is_empty())
        .collect()
}

fn accumulate_text(node: &NodeRef, buf: &mut String) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            buf.push_str(&text.borrow());
            continue;
        }
        let Some(name) = local_name(&child) else {
            continue;
        };
        if name == "br" {
            buf.push('\n');
            continue;
        }
        let is_block = !matches!(classify(&child), NodeKind::Inline | NodeKind::Text);
        if is_block {
            buf.push('\n');
        }
        accumulate_text(&child, buf);
        if is_block {
            buf.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_reserialize_fragment() {
        let body = parse_body_fragment("<p>hello <b>world</b></p>").unwrap();
        assert_eq!(inner_html(&body).unwrap(), "<p>hello <b>world</b></p>");
    }

    #[test]
    fn create_element_from_snippet() {
        let el = create_element("<span data-lang=\"rust\">x</span>").unwrap();
        assert_eq!(local_name(&el).as_deref(), Some("span"));
        assert_eq!(get_attr(&el, "data-lang").as_deref(), Some("rust"));
    }

    #[test]
    fn leading_comment_stays_in_fragment() {
        let body = parse_body_fragment("<!--marker--><p>x</p>").unwrap();
        let first = body.first_child().unwrap();
        assert!(first.as_comment().is_some());
        assert_eq!(inner_html(&body).unwrap(), "<!--marker--><p>x</p>");
    }

    #[test]
    fn inside_tag_walks_ancestors() {
        let body = parse_body_fragment("<pre><code><span id=\"t\">x</span></code></pre>").unwrap();
        let span = select_first(&body, "#t").unwrap().unwrap();
        assert!(is_inside_tag(span.as_node(), &["pre"]));
        assert!(!is_inside_tag(span.as_node(), &["table"]));
    }

    #[test]
    fn block_lines_split_on_divs_and_br() {
        let body =
            parse_body_fragment("<div><div>Title line</div>one<br>two<span> glued</span></div>")
                .unwrap();
        let lines = block_text_lines(&body);
        assert_eq!(lines, vec!["Title line", "one", "two glued"]);
    }

    #[test]
    fn direct_child_resolution() {
        let body = parse_body_fragment("<div id=\"outer\"><p><em id=\"deep\">x</em></p></div>").unwrap();
        let outer = select_first(&body, "#outer").unwrap().unwrap();
        let deep = select_first(&body, "#deep").unwrap().unwrap();
        let child = direct_child_in(deep.as_node(), outer.as_node()).unwrap();
        assert_eq!(local_name(&child).as_deref(), Some("p"));
    }

    #[test]
    fn classify_covers_main_groups() {
        let body = parse_body_fragment("<p>x</p>").unwrap();
        let p = body.first_child().unwrap();
        assert_eq!(classify(&p), NodeKind::Block);
        assert_eq!(classify(&p.first_child().unwrap()), NodeKind::Text);
    }
}
