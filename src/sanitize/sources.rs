//! Source panels: discovery, card synthesis, dedup and removal.
//!
//! The page shows citations in a right-hand panel and as inline card list
//! items. Before those subtrees are removed from the answer, each candidate
//! is mined into a normalized `SourceCard`; the best-scoring card per target
//! URL survives and is rendered into a collapsible block.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use anyhow::Result;
use kuchiki::NodeRef;
use regex::Regex;

use crate::model::SourceCard;
use crate::sanitize::context::SanitizeContext;
use crate::sanitize::dom;
use crate::sanitize::media::{
    self, hostname_label, image_source, is_skippable_href, normalize_source_href,
};
use crate::sanitize::text::normalize_text;

static CARD_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}\s+[а-яёa-z]{3,}\.?\s+\d{4}\s*г?\.?")
        .expect("card date: hardcoded regex is valid")
});

static CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)url\(\s*(?:'([^']*)'|"([^"]*)"|([^'")][^)]*))\s*\)"#)
        .expect("css url: hardcoded regex is valid")
});

/// Raw facts about one `<li>` card candidate; the predicates below stay
/// pure over this record.
#[derive(Debug, Clone, Copy, Default)]
struct ListItemSignals {
    link_count: usize,
    has_overlay_link: bool,
    has_image: bool,
    has_date: bool,
    has_source_words: bool,
    text_len: usize,
}

#[derive(Debug, Clone)]
struct SourceImageItem {
    src: String,
    src_lower: String,
    width: u64,
    height: u64,
    is_favicon: bool,
}

impl SourceImageItem {
    fn area(&self) -> u64 {
        if self.width > 0 && self.height > 0 {
            self.width * self.height
        } else {
            0
        }
    }
}

#[derive(Debug, Clone)]
struct ThumbPick {
    src: String,
}

/// First URL inside a CSS `url(...)` expression.
#[must_use]
pub fn extract_css_url(value: &str) -> String {
    let text = value.trim();
    if text.is_empty() || text == "none" {
        return String::new();
    }
    let Some(caps) = CSS_URL.captures(text) else {
        return String::new();
    };
    caps.get(1)
        .or_else(|| caps.get(2))
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default()
}

/// True for favicon-service URLs.
#[must_use]
pub fn is_favicon_source(src_lower: &str) -> bool {
    let value = src_lower.trim();
    !value.is_empty()
        && (value.contains("favicon") || value.contains("s2/favicons") || value.contains("faviconv2"))
}

/// Stable favicon proxy URL for a source hostname.
#[must_use]
pub fn google_favicon_url(href: &str) -> String {
    let hostname = hostname_label(href);
    if hostname.is_empty() {
        return String::new();
    }
    format!(
        "https://www.google.com/s2/favicons?domain={}&sz=64",
        urlencoding::encode(&hostname)
    )
}

fn attr_dimension(node: &NodeRef, name: &str) -> u64 {
    dom::get_attr(node, name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0)
}

fn collect_source_image_candidates(
    ctx: &SanitizeContext<'_>,
    candidate: &NodeRef,
) -> Vec<SourceImageItem> {
    let Ok(images) = dom::collect_matches(candidate, "img") else {
        return Vec::new();
    };

    images
        .into_iter()
        .filter_map(|img| {
            let node = img.as_node();
            let src = image_source(ctx, node);
            let src_lower = src.trim().to_lowercase();
            if src_lower.is_empty() || src_lower.starts_with("data:image/gif") {
                return None;
            }
            Some(SourceImageItem {
                is_favicon: is_favicon_source(&src_lower),
                width: attr_dimension(node, "width"),
                height: attr_dimension(node, "height"),
                src,
                src_lower,
            })
        })
        .collect()
}

fn pick_source_icon(items: &[SourceImageItem], icon_max_edge: u64) -> Option<SourceImageItem> {
    let small = |item: &SourceImageItem| {
        item.width > 0 && item.height > 0 && item.width <= icon_max_edge && item.height <= icon_max_edge
    };

    let favicon_pool: Vec<&SourceImageItem> = items
        .iter()
        .filter(|item| item.is_favicon || small(item))
        .collect();
    let pool: Vec<&SourceImageItem> = if favicon_pool.is_empty() {
        items.iter().filter(|item| small(item)).collect()
    } else {
        favicon_pool
    };

    pool.into_iter()
        .min_by_key(|item| {
            let area = if item.area() > 0 { item.area() as i64 } else { 999_999 };
            if item.is_favicon { area - 5000 } else { area }
        })
        .cloned()
}

fn pick_source_thumb(
    candidate: &NodeRef,
    items: &[SourceImageItem],
    excluded_lower: &str,
) -> Option<ThumbPick> {
    let pool: Vec<&SourceImageItem> = items
        .iter()
        .filter(|item| !item.is_favicon)
        .filter(|item| excluded_lower.is_empty() || item.src_lower != excluded_lower)
        .collect();

    if let Some(best) = pool.into_iter().max_by_key(|item| {
        let area = item.area() as i64;
        let len = item.src.len() as i64;
        if area > 0 {
            area * 10 + len
        } else if len > 60 && !item.src_lower.starts_with("data:") {
            // No dimensions on lazy images; long URLs are content, not icons.
            5000 + len
        } else {
            len
        }
    }) {
        return Some(ThumbPick { src: best.src.clone() });
    }

    // Previews are sometimes set as a background-image on a div.
    let backgrounds = dom::collect_matches(candidate, "[style*=\"background\"]").ok()?;
    for node in backgrounds {
        let style = dom::get_attr(node.as_node(), "style").unwrap_or_default();
        if !style.contains("url(") {
            continue;
        }
        let url = extract_css_url(&style);
        let url_lower = url.trim().to_lowercase();
        if url_lower.is_empty() || url_lower == excluded_lower || is_favicon_source(&url_lower) {
            continue;
        }
        return Some(ThumbPick { src: url });
    }

    None
}

fn gather_list_item_signals(li: &NodeRef) -> ListItemSignals {
    let mut signals = ListItemSignals::default();

    let Ok(links) = dom::collect_matches(li, "a[href]") else {
        return signals;
    };
    signals.link_count = links.len();
    signals.has_overlay_link = links
        .iter()
        .any(|a| dom::normalized_text(a.as_node()).is_empty());

    let text = dom::normalized_text(li);
    signals.text_len = text.chars().count();
    signals.has_image = dom::select_first(li, "img").ok().flatten().is_some();
    signals.has_date = CARD_DATE.is_match(&text);

    let lower = text.to_lowercase();
    signals.has_source_words =
        lower.contains("сайтов") || lower.contains("источник") || lower.contains("source");

    signals
}

fn signals_look_like_source_item(signals: ListItemSignals) -> bool {
    if signals.link_count == 0 || signals.text_len < 20 || signals.text_len > 700 {
        return false;
    }
    if signals.has_overlay_link && (signals.has_image || signals.has_date) {
        return true;
    }
    if signals.has_image && signals.has_date {
        return true;
    }
    signals.has_source_words && signals.has_image
}

/// True when a list item is a citation card rather than answer content.
#[must_use]
pub fn is_likely_source_list_item(li: &NodeRef) -> bool {
    if dom::is_inside_tag(li, &["pre", "code", "math"]) {
        return false;
    }
    if dom::select_first(li, "pre, code, table").ok().flatten().is_some() {
        return false;
    }
    signals_look_like_source_item(gather_list_item_signals(li))
}

/// Removes source panels, favicon images and citation list items.
pub fn remove_source_panels(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for selector in &ctx.profile.source_panel_selectors {
        for el in dom::collect_matches(container, selector)? {
            el.as_node().detach();
        }
    }

    // Icons inside rendered gallery/sources blocks are the pipeline's own
    // output and stay put.
    for img in dom::collect_matches(container, "img")? {
        let node = img.as_node();
        if crate::sanitize::in_rendered_block(node) {
            continue;
        }
        let src = image_source(ctx, node).to_lowercase();
        if !src.is_empty() && src.contains("favicon") {
            node.detach();
        }
    }

    for li in dom::collect_matches(container, "li")? {
        let node = li.as_node();
        if is_likely_source_list_item(node) {
            node.detach();
        }
    }

    // Overlay link + preview sibling is the last card shape left standing.
    for anchor in dom::collect_matches(container, "a[href]")? {
        let node = anchor.as_node();
        if dom::is_inside_tag(node, &["pre", "code", "math"]) {
            continue;
        }
        if crate::sanitize::in_rendered_block(node) {
            continue;
        }
        if !dom::normalized_text(node).is_empty() {
            continue;
        }

        let Some(sibling) = node.following_siblings().find(|s| s.as_element().is_some()) else {
            continue;
        };
        let sibling_text = dom::normalized_text(&sibling);
        if sibling_text.chars().count() < 20 {
            continue;
        }

        let has_preview = dom::select_first(&sibling, "img")?.is_some();
        let has_date = CARD_DATE.is_match(&sibling_text);
        if !has_preview && !has_date {
            continue;
        }

        let card = dom::closest(node, "li").or_else(|| node.parent());
        if let Some(card) = card {
            if card.as_element().is_some() {
                card.detach();
            }
        }
    }

    Ok(())
}

/// Collects source cards from the container, best card per URL,
/// in first-seen order.
pub fn collect_source_cards(
    ctx: &SanitizeContext<'_>,
    container: &NodeRef,
) -> Result<Vec<SourceCard>> {
    let candidates = collect_source_panel_candidates(ctx, container)?;

    let mut order: Vec<String> = Vec::new();
    let mut best: HashMap<String, (SourceCard, i64)> = HashMap::new();

    for candidate in candidates {
        let Some(card) = build_source_card(ctx, &candidate) else {
            continue;
        };
        let key = card.dedup_key();
        if key.is_empty() {
            continue;
        }
        let score = score_source_card(ctx, &card);
        match best.get(&key) {
            None => {
                order.push(key.clone());
                best.insert(key, (card, score));
            }
            Some((_, existing)) if score > *existing => {
                best.insert(key, (card, score));
            }
            Some(_) => {}
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|key| best.remove(&key).map(|(card, _)| card))
        .collect())
}

/// Renders the collapsible sources block, `None` when no cards were found.
pub fn build_source_panel_block(
    ctx: &SanitizeContext<'_>,
    container: &NodeRef,
) -> Result<Option<NodeRef>> {
    let cards = collect_source_cards(ctx, container)?;
    if cards.is_empty() {
        return Ok(None);
    }

    let list = dom::create_element("<div data-ai-sources-list=\"true\"></div>")?;
    for card in &cards {
        list.append(render_source_card(card)?);
    }

    let details = dom::create_element("<details data-ai-sources=\"true\"></details>")?;
    let summary = dom::create_element("<summary></summary>")?;
    summary.append(NodeRef::new_text(format!("Sources ({})", cards.len())));
    details.append(summary);
    details.append(list);
    Ok(Some(details))
}

/// Appends the block to the container, embedding blob previews first.
pub fn append_source_panel_block(
    ctx: &SanitizeContext<'_>,
    container: &NodeRef,
    block: &NodeRef,
) -> Result<()> {
    media::embed_blob_images(ctx, block)?;
    container.append(block.clone());
    Ok(())
}

fn render_source_card(card: &SourceCard) -> Result<NodeRef> {
    let article = dom::create_element("<article data-ai-source-item=\"true\"></article>")?;

    if let Some(icon) = &card.icon_url {
        let img = dom::create_element("<img data-ai-source-icon=\"true\">")?;
        dom::set_attr(&img, "src", icon);
        let alt = if card.site.is_empty() { "Source" } else { card.site.as_str() };
        dom::set_attr(&img, "alt", alt);
        article.append(img);
    }

    if let Some(thumb) = &card.thumb_url {
        dom::set_attr(&article, "data-ai-source-has-thumb", "true");
        let img = dom::create_element("<img data-ai-source-thumb=\"true\" alt=\"Source preview\">")?;
        dom::set_attr(&img, "src", thumb);
        article.append(img);
    }

    let link = dom::create_element("<a></a>")?;
    dom::set_attr(&link, "href", &card.href);
    link.append(NodeRef::new_text(card.title.clone()));
    article.append(link);

    if !card.snippet.is_empty() {
        let p = dom::create_element("<p></p>")?;
        p.append(NodeRef::new_text(card.snippet.clone()));
        article.append(p);
    }

    Ok(article)
}

fn score_source_card(ctx: &SanitizeContext<'_>, card: &SourceCard) -> i64 {
    let t = ctx.tunables;
    let mut score = 0;

    if let Some(thumb) = &card.thumb_url {
        score += t.score_thumb;
        let lower = thumb.trim().to_lowercase();
        if lower.starts_with("data:image/") {
            score += t.score_data_thumb;
        }
        score += (lower.len() as i64 / 120).min(t.score_icon);
    }
    if card.icon_url.is_some() {
        score += t.score_icon;
    }

    let snippet_len = card.snippet.chars().count() as i64;
    if snippet_len > 0 {
        score += (snippet_len / 2).min(t.score_snippet_cap);
    }

    score
}

fn collect_source_panel_candidates(
    ctx: &SanitizeContext<'_>,
    container: &NodeRef,
) -> Result<Vec<NodeRef>> {
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();

    for li in dom::collect_matches(container, "li")? {
        let node = li.as_node();
        if is_likely_source_list_item(node) {
            add_source_candidate(&mut candidates, &mut seen, node, container);
        }
    }

    for selector in &ctx.profile.source_panel_selectors {
        for el in dom::collect_matches(container, selector)? {
            add_source_candidate(&mut candidates, &mut seen, el.as_node(), container);
        }
    }

    Ok(candidates)
}

fn add_source_candidate(
    candidates: &mut Vec<NodeRef>,
    seen: &mut HashSet<usize>,
    node: &NodeRef,
    root: &NodeRef,
) {
    let Some(candidate) = find_source_candidate_root(node, root) else {
        return;
    };
    if !seen.insert(dom::node_key(&candidate)) {
        return;
    }
    if is_valid_source_candidate(&candidate, root) {
        candidates.push(candidate);
    }
}

fn find_source_candidate_root(node: &NodeRef, root: &NodeRef) -> Option<NodeRef> {
    if let Some(list_item) = dom::closest(node, "li") {
        if dom::contains(root, &list_item) {
            return Some(list_item);
        }
    }

    let root_key = dom::node_key(root);
    let mut current = node.clone();
    let mut candidate = None;

    for _ in 0..6 {
        if dom::node_key(&current) == root_key || current.as_element().is_none() {
            break;
        }

        let links = dom::collect_matches(&current, "a[href]").unwrap_or_default();
        if !links.is_empty() {
            let text_len = dom::normalized_text(&current).chars().count();
            let has_image = dom::select_first(&current, "img").ok().flatten().is_some();
            if (has_image || text_len >= 30) && text_len <= 1200 {
                candidate = Some(current.clone());
            }
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => break,
        }
    }

    candidate
}

fn is_valid_source_candidate(candidate: &NodeRef, root: &NodeRef) -> bool {
    if dom::node_key(candidate) == dom::node_key(root) {
        return false;
    }
    if dom::is_inside_tag(candidate, &["pre", "code", "math"]) {
        return false;
    }
    if crate::sanitize::in_rendered_block(candidate) {
        return false;
    }
    if dom::select_first(candidate, "pre, code, table").ok().flatten().is_some() {
        return false;
    }
    if dom::collect_matches(candidate, "a[href]").map_or(true, |l| l.is_empty()) {
        return false;
    }
    let text_len = dom::normalized_text(candidate).chars().count();
    (12..=1400).contains(&text_len)
}

fn build_source_card(ctx: &SanitizeContext<'_>, candidate: &NodeRef) -> Option<SourceCard> {
    let link = primary_source_link(candidate)?;

    let raw_href = dom::get_attr(&link, "href").unwrap_or_default().trim().to_string();
    let href = normalize_source_href(&raw_href);
    if href.is_empty() || is_skippable_href(&href) || !href.to_lowercase().starts_with("http") {
        return None;
    }

    let title = build_source_title(ctx, candidate, &link, &href);
    let normalized_title = normalize_text(&title).to_lowercase();
    if normalized_title.is_empty()
        || normalized_title == "подробнее"
        || normalized_title == "learn more"
        || looks_like_ui_text(ctx, &normalized_title)
    {
        return None;
    }

    let all_links: Vec<NodeRef> = dom::collect_matches(candidate, "a[href]")
        .ok()?
        .into_iter()
        .map(|a| a.as_node().clone())
        .filter(|a| {
            let raw = dom::get_attr(a, "href").unwrap_or_default();
            !raw.trim().is_empty() && !is_skippable_href(&raw)
        })
        .collect();
    let has_overlay_link = all_links.iter().any(|a| dom::normalized_text(a).is_empty());

    let candidate_text = dom::normalized_text(candidate);
    let has_date = CARD_DATE.is_match(&candidate_text);

    let image_items = collect_source_image_candidates(ctx, candidate);
    let icon = pick_source_icon(&image_items, u64::from(ctx.tunables.icon_max_edge));
    let icon_lower = icon.as_ref().map(|i| i.src_lower.clone()).unwrap_or_default();
    let thumb = pick_source_thumb(candidate, &image_items, &icon_lower);
    let has_visual = icon.is_some() || thumb.is_some();

    let is_list_card = dom::local_name(candidate).as_deref() == Some("li")
        && is_likely_source_list_item(candidate);
    if !has_visual && !has_overlay_link && !has_date && !is_list_card {
        return None;
    }

    let has_controls = dom::select_first(
        candidate,
        "button, [role=\"button\"], [role=\"dialog\"], input, textarea",
    )
    .ok()
    .flatten()
    .is_some();
    if has_controls && !has_visual {
        return None;
    }

    let icon_url = icon
        .map(|i| i.src)
        .or_else(|| {
            let fallback = google_favicon_url(&href);
            (!fallback.is_empty()).then_some(fallback)
        });

    let site = hostname_label(&href);
    let snippet = build_source_snippet(ctx, candidate, &title);

    Some(SourceCard {
        href,
        title,
        site,
        snippet,
        icon_url,
        thumb_url: thumb.map(|t| t.src),
    })
}

fn looks_like_ui_text(ctx: &SanitizeContext<'_>, lower: &str) -> bool {
    ctx.profile.ui_texts.iter().any(|ui| {
        lower == ui
            || (lower.starts_with(ui.as_str())
                && lower.chars().count() < ui.chars().count() + ctx.tunables.ui_text_slack)
    })
}

fn primary_source_link(candidate: &NodeRef) -> Option<NodeRef> {
    let links: Vec<NodeRef> = dom::collect_matches(candidate, "a[href]")
        .ok()?
        .into_iter()
        .map(|a| a.as_node().clone())
        .filter(|a| !dom::is_inside_tag(a, &["pre", "code", "math"]))
        .filter(|a| {
            let href = dom::get_attr(a, "href").unwrap_or_default();
            !href.trim().is_empty() && !is_skippable_href(&href)
        })
        .collect();

    if links.is_empty() {
        return None;
    }

    links
        .iter()
        .find(|a| dom::normalized_text(a).chars().count() > 2)
        .or(links.first())
        .cloned()
}

fn build_source_title(
    ctx: &SanitizeContext<'_>,
    candidate: &NodeRef,
    link: &NodeRef,
    href: &str,
) -> String {
    let max_len = ctx.tunables.title_max_len;
    let link_text = dom::normalized_text(link);
    let link_len = link_text.chars().count();
    if !link_text.is_empty() && link_len <= max_len {
        return link_text;
    }

    if let Some(structured) = structured_source_title(ctx, candidate, max_len) {
        return structured;
    }

    let candidate_text = dom::normalized_text(candidate);
    if !candidate_text.is_empty() {
        let short: String = candidate_text.chars().take(120).collect();
        let short = short.trim().to_string();
        if !short.is_empty() {
            return short;
        }
    }

    let host = hostname_label(href);
    if host.is_empty() {
        href.to_string()
    } else {
        host
    }
}

fn structured_source_title(
    ctx: &SanitizeContext<'_>,
    candidate: &NodeRef,
    max_len: usize,
) -> Option<String> {
    for selector in &ctx.profile.source_title_selectors {
        let Some(el) = dom::select_first(candidate, selector).ok().flatten() else {
            continue;
        };
        let value = dom::normalized_text(el.as_node());
        if value.chars().count() < 4 {
            continue;
        }
        return Some(truncate_with_ellipsis(&value, max_len, max_len.saturating_sub(3)));
    }
    None
}

fn build_source_snippet(ctx: &SanitizeContext<'_>, candidate: &NodeRef, title: &str) -> String {
    let max_len = ctx.tunables.snippet_max_len;
    if let Some(structured) = structured_source_snippet(ctx, candidate, title, max_len) {
        return structured;
    }

    let full_text = dom::normalized_text(candidate);
    if full_text.is_empty() {
        return String::new();
    }

    let normalized_title = normalize_text(title);
    let mut snippet = full_text.clone();
    if !normalized_title.is_empty() {
        let full_lower = full_text.to_lowercase();
        let title_lower = normalized_title.to_lowercase();
        if full_lower.starts_with(&title_lower) {
            snippet = full_text
                .chars()
                .skip(normalized_title.chars().count())
                .collect::<String>()
                .trim()
                .to_string();
        }
    }

    snippet = normalize_text(&snippet);
    if snippet.is_empty() || snippet.to_lowercase() == normalized_title.to_lowercase() {
        return String::new();
    }

    truncate_with_ellipsis(&snippet, max_len, max_len.saturating_sub(3))
}

fn structured_source_snippet(
    ctx: &SanitizeContext<'_>,
    candidate: &NodeRef,
    title: &str,
    max_len: usize,
) -> Option<String> {
    let normalized_title = normalize_text(title).to_lowercase();

    for selector in &ctx.profile.source_snippet_selectors {
        let Some(el) = dom::select_first(candidate, selector).ok().flatten() else {
            continue;
        };
        let value = dom::normalized_text(el.as_node());
        if value.chars().count() < 8 {
            continue;
        }
        if !normalized_title.is_empty() && value.to_lowercase() == normalized_title {
            continue;
        }
        return Some(truncate_with_ellipsis(&value, max_len, max_len.saturating_sub(3)));
    }
    None
}

fn truncate_with_ellipsis(value: &str, max_len: usize, cut: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let short: String = value.chars().take(cut).collect();
    format!("{}...", short.trim())
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

    const CARD_HTML: &str = concat!(
        r#"<div class="ofHStc"><div>"#,
        r#"<a href="https://example.com/article">A detailed article about rust performance</a>"#,
        r#"<img src="https://example.com/thumb.jpg" width="120" height="90">"#,
        r#"<p>Benchmarks and analysis of allocator behavior in production services.</p>"#,
        r#"</div></div>"#,
    );

    #[test]
    fn css_url_extraction_handles_quote_styles() {
        assert_eq!(extract_css_url("url('https://a/b.png')"), "https://a/b.png");
        assert_eq!(extract_css_url(r#"url("https://a/b.png")"#), "https://a/b.png");
        assert_eq!(extract_css_url("url(https://a/b.png)"), "https://a/b.png");
        assert_eq!(extract_css_url("none"), "");
    }

    #[test]
    fn favicon_urls_are_detected() {
        assert!(is_favicon_source("https://x.com/favicon.ico"));
        assert!(is_favicon_source("https://t0.gstatic.com/faviconV2?url=x".to_lowercase().as_str()));
        assert!(!is_favicon_source("https://x.com/photo.jpg"));
    }

    #[test]
    fn cards_collect_from_panel_selectors() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, CARD_HTML);

        let cards = collect_source_cards(&ctx, &body).unwrap();
        assert_eq!(cards.len(), 1);
        let card = &cards[0];
        assert_eq!(card.href, "https://example.com/article");
        assert_eq!(card.title, "A detailed article about rust performance");
        assert_eq!(card.site, "example.com");
        assert_eq!(card.thumb_url.as_deref(), Some("https://example.com/thumb.jpg"));
        assert!(card.icon_url.as_deref().unwrap().contains("s2/favicons"));
        assert!(card.snippet.contains("Benchmarks"));
    }

    #[test]
    fn duplicate_hrefs_keep_best_scoring_card() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = format!(
            concat!(
                r#"<div class="ofHStc"><div>"#,
                r#"<a href="https://example.com/article">A detailed article about rust performance</a>"#,
                r#"<img src="https://www.google.com/s2/favicons?domain=example.com" width="16" height="16">"#,
                r#"</div></div>"#,
                "{}",
            ),
            CARD_HTML
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, &html);

        let cards = collect_source_cards(&ctx, &body).unwrap();
        assert_eq!(cards.len(), 1);
        // The richer card with the thumbnail wins.
        assert!(cards[0].thumb_url.is_some());
    }

    #[test]
    fn source_block_renders_summary_and_items() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, CARD_HTML);

        let block = build_source_panel_block(&ctx, &body).unwrap().unwrap();
        let summary = dom::select_first(&block, "summary").unwrap().unwrap();
        assert_eq!(dom::normalized_text(summary.as_node()), "Sources (1)");
        assert_eq!(
            dom::collect_matches(&block, "article[data-ai-source-item]").unwrap().len(),
            1
        );
    }

    #[test]
    fn panel_removal_strips_cards_and_favicons() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            r#"<div><p id="keep">Real answer text</p>"#,
            r#"<div class="ofHStc">panel</div>"#,
            r#"<img src="https://x.com/favicon.ico">"#,
            r#"</div>"#,
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_source_panels(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, ".ofHStc").unwrap().is_none());
        assert!(dom::select_first(&body, "img").unwrap().is_none());
        assert!(dom::select_first(&body, "#keep").unwrap().is_some());
    }

    #[test]
    fn rendered_source_icons_survive_removal_pass() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            r#"<div><details data-ai-sources="true"><summary>Sources (1)</summary>"#,
            r#"<div data-ai-sources-list="true"><article data-ai-source-item="true">"#,
            r#"<img data-ai-source-icon="true" src="https://www.google.com/s2/favicons?domain=example.com" alt="example.com">"#,
            r#"<a href="https://example.com/a">A detailed article about rust performance</a>"#,
            r#"</article></div></details>"#,
            r#"<img id="stray" src="https://x.com/favicon.ico">"#,
            r#"</div>"#,
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);

        remove_source_panels(&ctx, &body).unwrap();
        assert!(dom::select_first(&body, "[data-ai-source-icon]").unwrap().is_some());
        assert!(dom::select_first(&body, "#stray").unwrap().is_none());
    }

    #[test]
    fn rendered_source_items_are_not_mined_again() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            r#"<details data-ai-sources="true"><summary>Sources (1)</summary>"#,
            r#"<div data-ai-sources-list="true"><article data-ai-source-item="true">"#,
            r#"<img data-ai-source-thumb="true" src="https://example.com/thumb.jpg" alt="Source preview">"#,
            r#"<a href="https://example.com/article">A detailed article about rust performance</a>"#,
            r#"<p>Benchmarks and analysis of allocator behavior in production services.</p>"#,
            r#"</article></div></details>"#,
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);
        assert!(collect_source_cards(&ctx, &body).unwrap().is_empty());
    }

    #[test]
    fn ui_text_titles_are_rejected() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let html = concat!(
            r#"<div class="ofHStc"><div>"#,
            r#"<a href="https://example.com/more">Learn more</a>"#,
            r#"<img src="https://example.com/t.jpg" width="120" height="90">"#,
            r#"<p>Some text that makes the candidate long enough to pass.</p>"#,
            r#"</div></div>"#,
        );
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, html);
        assert!(collect_source_cards(&ctx, &body).unwrap().is_empty());
    }
}
