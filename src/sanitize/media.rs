//! Image handling: source resolution, attachment detection, blob embedding
//! and the collapsible answer-image gallery.
//!
//! Lazy-loaded images hide their real URL behind `srcset`, `data-*`
//! attributes or a deferred inline-script assignment; `image_source` walks
//! those candidates in order of trustworthiness and skips placeholders.

use anyhow::Result;
use kuchiki::iter::NodeIterator;
use kuchiki::NodeRef;
use url::Url;

use crate::sanitize::context::SanitizeContext;
use crate::sanitize::dom;
use crate::sanitize::text::{
    self, collapse_repeated_suffix, host_token_label, insert_space_before_trailing_label,
    is_domain_like, normalize_text, shorten_card_title, strip_trailing_label,
};

/// Base used to absolutize relative hrefs in a static snapshot.
pub const SNAPSHOT_BASE_URL: &str = "https://www.google.com/";

const DATA_SOURCE_ATTRS: &[&str] = &[
    "data-src",
    "data-original",
    "data-iurl",
    "data-image-url",
    "data-thumbnail-url",
];

/// Link target of an image card: where the image came from.
#[derive(Debug, Clone)]
pub struct ImageCard {
    pub href: String,
    pub title: String,
    pub site: String,
}

/// Resolves the best available URL for an image element.
///
/// Placeholder values (1x1 GIFs, bare integers, tiny data URIs) are skipped;
/// if every candidate is a placeholder the first non-empty one still wins so
/// the image is not silently lost.
#[must_use]
pub fn image_source(ctx: &SanitizeContext<'_>, img: &NodeRef) -> String {
    let deferred = dom::get_attr(img, "id")
        .and_then(|id| ctx.deferred_source(&id))
        .unwrap_or_default();

    let srcset = dom::get_attr(img, "srcset").unwrap_or_default();
    let mut candidates = vec![source_from_srcset(&srcset)];
    for attr in DATA_SOURCE_ATTRS {
        candidates.push(dom::get_attr(img, attr).unwrap_or_default());
    }
    candidates.push(deferred);
    candidates.push(dom::get_attr(img, "src").unwrap_or_default());

    let mut fallback = String::new();
    for candidate in candidates {
        let normalized = candidate.trim().to_string();
        if normalized.is_empty() {
            continue;
        }
        if fallback.is_empty() {
            fallback = normalized.clone();
        }
        if is_placeholder_source(ctx, &normalized) {
            continue;
        }
        return normalized;
    }

    fallback
}

/// Highest-quality URL from a `srcset` list (entries are ordered ascending).
#[must_use]
pub fn source_from_srcset(srcset: &str) -> String {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| part.split_whitespace().next())
        .filter(|url| !url.is_empty())
        .next_back()
        .unwrap_or_default()
        .to_string()
}

/// True for lazy-loading placeholder sources.
#[must_use]
pub fn is_placeholder_source(ctx: &SanitizeContext<'_>, source: &str) -> bool {
    let value = source.trim().to_lowercase();
    if value.is_empty() || value == "about:blank" {
        return true;
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    if matches!(value.as_str(), "true" | "false" | "undefined" | "null") {
        return true;
    }
    // 1x1 tracking pixels.
    if value.starts_with("data:image/gif;base64,r0lgod") {
        return true;
    }
    if value.starts_with("data:image/png;base64,ivborw0kggoaaaansuheugaaaaeaaaab") {
        return true;
    }
    if value.starts_with("data:image/") && value.len() < ctx.tunables.data_image_min_len {
        return true;
    }
    false
}

/// Rewrites every `img` to a plain `src`, dropping `srcset`.
pub fn normalize_image_sources(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for img in dom::collect_matches(container, "img")? {
        let node = img.as_node();
        let source = image_source(ctx, node);
        if source.is_empty() {
            continue;
        }
        dom::set_attr(node, "src", &source);
        dom::remove_attr(node, "srcset");
    }
    Ok(())
}

/// Replaces `blob:` image sources with durable URLs.
///
/// The rasterizer seam is asked first; failing that, another image in the
/// document with the same source may carry a durable candidate we can copy.
pub fn embed_blob_images(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    for img in dom::collect_matches(container, "img")? {
        let node = img.as_node();
        let source = image_source(ctx, node);
        if !source.starts_with("blob:") {
            continue;
        }

        let durable = ctx
            .rasterizer
            .rasterize(&source)
            .or_else(|| find_durable_counterpart(ctx, &source));

        if let Some(url) = durable {
            dom::set_attr(node, "src", &url);
            dom::remove_attr(node, "srcset");
        } else {
            log::debug!("no durable replacement for blob image: {source}");
        }
    }
    Ok(())
}

/// Looks document-wide for an image showing the same blob whose candidate
/// attributes include a durable (http or data) URL.
fn find_durable_counterpart(ctx: &SanitizeContext<'_>, source: &str) -> Option<String> {
    let images = dom::collect_matches(ctx.document(), "img").ok()?;
    for img in images {
        let node = img.as_node();
        let src = dom::get_attr(node, "src").unwrap_or_default();
        if src.trim() != source {
            continue;
        }

        let srcset = dom::get_attr(node, "srcset").unwrap_or_default();
        let mut candidates = vec![source_from_srcset(&srcset)];
        for attr in DATA_SOURCE_ATTRS {
            candidates.push(dom::get_attr(node, attr).unwrap_or_default());
        }
        for candidate in candidates {
            let value = candidate.trim();
            if value.is_empty() || is_placeholder_source(ctx, value) {
                continue;
            }
            let lower = value.to_lowercase();
            if lower.starts_with("http") || lower.starts_with("data:image/") {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// True when the image belongs to the user's question attachment, not to
/// the answer body.
#[must_use]
pub fn is_user_attachment_image(ctx: &SanitizeContext<'_>, img: &NodeRef) -> bool {
    if dom::closest(img, "a[href]").is_some() {
        return false;
    }

    let profile = ctx.profile;
    if profile
        .attachment_shell_selectors
        .iter()
        .any(|selector| dom::closest(img, selector).is_some())
    {
        return true;
    }

    let has_strong_class = profile
        .attachment_image_selectors
        .iter()
        .any(|selector| dom::matches_selector(img, selector));
    let in_question_scope = profile
        .attachment_region_selectors
        .iter()
        .any(|selector| dom::closest(img, selector).is_some());

    let alt = dom::get_attr(img, "alt").unwrap_or_default();
    let has_alt_hint = !alt.trim().is_empty() && ctx.profile.is_attachment_alt(&alt);

    if has_strong_class && (in_question_scope || has_alt_hint) {
        return true;
    }
    has_alt_hint && in_question_scope
}

/// Images matched directly by the attachment selectors, deduplicated.
pub fn collect_direct_attachment_images(
    ctx: &SanitizeContext<'_>,
    container: &NodeRef,
) -> Result<Vec<NodeRef>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for selector in &ctx.profile.user_attachment_selectors {
        for img in dom::collect_matches(container, selector)? {
            let node = img.as_node().clone();
            if seen.insert(dom::node_key(&node)) {
                out.push(node);
            }
        }
    }
    Ok(out)
}

/// Attachment images living in the turn but outside the answer subtree.
pub fn collect_images_outside_answer_scope(
    ctx: &SanitizeContext<'_>,
    container: &NodeRef,
    answer_scope: &NodeRef,
) -> Result<Vec<NodeRef>> {
    let mut images = Vec::new();

    if let Some(answer_branch) = dom::direct_child_in(answer_scope, container) {
        let branch_key = dom::node_key(&answer_branch);
        for child in container.children() {
            if dom::node_key(&child) == branch_key {
                continue;
            }
            for img in dom::collect_matches(&child, "img")? {
                images.push(img.as_node().clone());
            }
        }
    }

    if !images.is_empty() {
        images.retain(|img| is_user_attachment_image(ctx, img));
        return Ok(images);
    }

    let mut out = Vec::new();
    for img in dom::collect_matches(container, "img")? {
        let node = img.as_node().clone();
        if dom::contains(answer_scope, &node) {
            continue;
        }
        if is_user_attachment_image(ctx, &node) {
            out.push(node);
        }
    }
    Ok(out)
}

/// Moves the answer's content images into a collapsible gallery at the end
/// of the container.
pub fn compact_answer_media(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<()> {
    let answer_images = collect_answer_images(ctx, container)?;
    if answer_images.is_empty() {
        return Ok(());
    }

    let details = dom::create_element("<details data-ai-gallery=\"true\"></details>")?;
    let summary = dom::create_element("<summary></summary>")?;
    summary.append(NodeRef::new_text(format!(
        "Answer images ({})",
        answer_images.len()
    )));
    let gallery = dom::create_element("<div data-ai-gallery-content=\"true\"></div>")?;

    for image in &answer_images {
        let source = image_source(ctx, image);
        if !source.is_empty() {
            append_image_to_gallery(ctx, &gallery, image, &source)?;
        }
        remove_image_with_card(image);
    }

    remove_image_source_links(container)?;

    if dom::select_first(&gallery, "img")?.is_none() {
        return Ok(());
    }

    details.append(summary);
    details.append(gallery);
    container.append(details);
    Ok(())
}

fn append_image_to_gallery(
    ctx: &SanitizeContext<'_>,
    gallery: &NodeRef,
    image: &NodeRef,
    source: &str,
) -> Result<()> {
    let item = dom::create_element("<div data-ai-gallery-item=\"true\"></div>")?;
    let alt = normalize_text(&dom::get_attr(image, "alt").unwrap_or_default());

    if let Some(card) = extract_image_card_data(ctx, image) {
        let link = dom::create_element(
            "<a target=\"_blank\" rel=\"noopener noreferrer\"></a>",
        )?;
        dom::set_attr(&link, "href", &card.href);

        let thumb = dom::create_element("<div data-ai-gallery-thumb=\"true\"></div>")?;
        let img = dom::create_element("<img>")?;
        dom::set_attr(&img, "src", source);
        let img_alt = if alt.is_empty() { card.title.clone() } else { alt.clone() };
        dom::set_attr(&img, "alt", if img_alt.is_empty() { "Image" } else { img_alt.as_str() });
        thumb.append(img);

        let meta = dom::create_element("<div data-ai-gallery-meta=\"true\"></div>")?;
        let title = dom::create_element("<div data-ai-gallery-title=\"true\"></div>")?;
        let title_text = if card.title.is_empty() {
            let host = hostname_label(&card.href);
            if host.is_empty() { "Source".to_string() } else { host }
        } else {
            card.title.clone()
        };
        title.append(NodeRef::new_text(title_text));
        meta.append(title);

        let site_text = if card.site.is_empty() {
            hostname_label(&card.href)
        } else {
            card.site.clone()
        };
        if !site_text.is_empty() {
            let site = dom::create_element("<div data-ai-gallery-site=\"true\"></div>")?;
            site.append(NodeRef::new_text(site_text));
            meta.append(site);
        }

        link.append(thumb);
        link.append(meta);
        item.append(link);
    } else {
        let thumb = dom::create_element("<div data-ai-gallery-thumb=\"true\"></div>")?;
        let img = dom::create_element("<img>")?;
        dom::set_attr(&img, "src", source);
        dom::set_attr(&img, "alt", if alt.is_empty() { "Answer image" } else { alt.as_str() });
        thumb.append(img);
        item.append(thumb);
    }

    gallery.append(item);
    Ok(())
}

/// Content images of the answer: card-linked, not formulas, not favicons,
/// not icons, each source taken once. Images without a source card or
/// wrapping link stay inline; previously rendered galleries are skipped.
fn collect_answer_images(ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<Vec<NodeRef>> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for img in dom::collect_matches(container, "img")? {
        let node = img.as_node().clone();
        if dom::has_attr(&node, "data-xpm-latex") {
            continue;
        }
        if crate::sanitize::in_rendered_block(&node) {
            continue;
        }
        if find_image_card_container(&node).is_none() {
            continue;
        }

        let source = image_source(ctx, &node).to_lowercase();
        if source.is_empty() || source.contains("favicon") {
            continue;
        }
        if !seen.insert(source) {
            continue;
        }

        let width = attr_dimension(&node, "width");
        let height = attr_dimension(&node, "height");
        if let (Some(w), Some(h)) = (width, height) {
            if w < u64::from(ctx.tunables.icon_max_edge) || h < u64::from(ctx.tunables.icon_max_edge)
            {
                continue;
            }
        }

        out.push(node);
    }
    Ok(out)
}

fn attr_dimension(node: &NodeRef, name: &str) -> Option<u64> {
    dom::get_attr(node, name)?.trim().parse::<u64>().ok().filter(|v| *v > 0)
}

/// Removes an image together with its card wrapper when one exists.
pub fn remove_image_with_card(image: &NodeRef) {
    if let Some(card) = find_image_card_container(image) {
        card.detach();
        return;
    }
    image.detach();
}

/// Climbs a few levels looking for the card wrapper: the nearest ancestor
/// holding both the image and a source link.
#[must_use]
pub fn find_image_card_container(image: &NodeRef) -> Option<NodeRef> {
    let mut current = image.clone();
    for _ in 0..6 {
        let Some(parent) = current.parent() else { break };
        if parent.as_element().is_none() {
            break;
        }
        let has_image = dom::select_first(&parent, "img").ok().flatten().is_some();
        let has_link = dom::select_first(&parent, "a[href]").ok().flatten().is_some();
        if has_image && has_link {
            return Some(parent);
        }
        current = parent;
    }

    let list_item = dom::closest(image, "li")?;
    if dom::select_first(&list_item, "a[href]").ok().flatten().is_some() {
        return Some(list_item);
    }
    None
}

/// Drops links that wrap or flank images; their targets live on in cards.
/// Rendered gallery and sources blocks keep their links.
pub fn remove_image_source_links(container: &NodeRef) -> Result<()> {
    for anchor in dom::collect_matches(container, "a[href]")? {
        let node = anchor.as_node();
        if dom::is_inside_tag(node, &["pre", "code", "math"]) {
            continue;
        }
        if crate::sanitize::in_rendered_block(node) {
            continue;
        }

        if dom::select_first(node, "img")?.is_some() {
            node.detach();
            continue;
        }

        let near_image = [node.preceding_siblings().elements().next(),
            node.following_siblings().elements().next()]
        .into_iter()
        .flatten()
        .any(|sibling| {
            dom::select_first(sibling.as_node(), "img")
                .ok()
                .flatten()
                .is_some()
        });

        if near_image {
            node.detach();
        }
    }
    Ok(())
}

/// Extracts the source link and labels for an image card.
#[must_use]
pub fn extract_image_card_data(ctx: &SanitizeContext<'_>, image: &NodeRef) -> Option<ImageCard> {
    let card = find_image_card_container(image)?;
    let link = select_best_card_link(&card, image)?;

    let raw_href = dom::get_attr(&link, "href").unwrap_or_default().trim().to_string();
    if raw_href.is_empty() {
        return None;
    }
    let href = normalize_source_href(&raw_href);
    if !href.to_lowercase().starts_with("http") {
        return None;
    }

    let host = hostname_label(&href);
    let host_token = host_token_label(&host);
    let site = build_card_site(&card, &link, &href, &host, &host_token);
    let title = build_card_title(ctx, &card, &link, image, &href, &host, &host_token, &site);

    Some(ImageCard { href, title, site })
}

fn select_best_card_link(card: &NodeRef, image: &NodeRef) -> Option<NodeRef> {
    let links: Vec<NodeRef> = dom::collect_matches(card, "a[href]")
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

    let direct_link = dom::closest(image, "a[href]");
    let mut best: Option<NodeRef> = None;
    let mut best_score = i64::MIN;

    for a in &links {
        let raw_href = dom::get_attr(a, "href").unwrap_or_default().trim().to_string();
        let href = normalize_source_href(&raw_href);
        if !href.to_lowercase().starts_with("http") {
            continue;
        }

        let mut score = 0i64;
        let text_len = dom::normalized_text(a).chars().count();
        if text_len > 2 {
            score += 15;
        }
        if text_len > 10 {
            score += 10;
        }
        if dom::select_first(a, "img").ok().flatten().is_some() {
            score += 6;
        }
        if dom::contains(a, image) {
            score += 25;
        }
        if direct_link
            .as_ref()
            .is_some_and(|d| dom::node_key(d) == dom::node_key(a))
        {
            score += 40;
        }

        let host = hostname_label(&href).to_lowercase();
        if !host.is_empty() && !is_google_host(&host) {
            score += 120;
        } else {
            score -= 30;
        }

        if score > best_score {
            best_score = score;
            best = Some(a.clone());
        }
    }

    best.or_else(|| links.first().cloned())
}

#[allow(clippy::too_many_arguments)]
fn build_card_title(
    ctx: &SanitizeContext<'_>,
    card: &NodeRef,
    link: &NodeRef,
    image: &NodeRef,
    href: &str,
    host: &str,
    host_token: &str,
    site: &str,
) -> String {
    let site_token = host_token_label(site);
    let labels: Vec<&str> = [host, host_token, site, site_token.as_str()]
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect();

    for attr in ["aria-label", "title"] {
        let value = normalize_text(&dom::get_attr(link, attr).unwrap_or_default());
        if value.chars().count() >= 4 {
            let cleaned = sanitize_card_text(&value, &labels);
            if !cleaned.is_empty() {
                return shorten_card_title(&cleaned);
            }
        }
    }

    for selector in &ctx.profile.source_title_selectors {
        let Some(el) = dom::select_first(card, selector).ok().flatten() else {
            continue;
        };
        let value = dom::normalized_text(el.as_node());
        if value.chars().count() >= 4 {
            let cleaned = sanitize_card_text(&value, &labels);
            if !cleaned.is_empty() {
                return shorten_card_title(&cleaned);
            }
        }
    }

    let mut lines = dom::block_text_lines(link);
    if lines.is_empty() {
        lines = dom::block_text_lines(card);
    }
    if let Some(first) = pick_first_title_line(&lines, &labels) {
        return shorten_card_title(&first);
    }

    let link_text = dom::normalized_text(link);
    let link_len = link_text.chars().count();
    if link_len >= 4 && link_len <= 220 {
        let cleaned = sanitize_card_text(&link_text, &labels);
        if !cleaned.is_empty() {
            return shorten_card_title(&cleaned);
        }
    }

    let alt = normalize_text(&dom::get_attr(image, "alt").unwrap_or_default());
    if alt.chars().count() >= 4 {
        let cleaned = sanitize_card_text(&alt, &labels);
        if !cleaned.is_empty() {
            return shorten_card_title(&cleaned);
        }
    }

    if host.is_empty() {
        href.to_string()
    } else {
        host.to_string()
    }
}

fn build_card_site(card: &NodeRef, link: &NodeRef, href: &str, host: &str, host_token: &str) -> String {
    let hostname = if host.is_empty() {
        hostname_label(href)
    } else {
        host.to_string()
    };
    let token = if host_token.is_empty() {
        host_token_label(&hostname)
    } else {
        host_token.to_string()
    };
    let labels: Vec<&str> = [hostname.as_str(), token.as_str()]
        .into_iter()
        .filter(|l| !l.is_empty())
        .collect();

    let mut lines = dom::block_text_lines(link);
    if lines.is_empty() {
        lines = dom::block_text_lines(card);
    }
    if let Some(picked) = pick_source_line(&lines, &labels) {
        return picked;
    }

    hostname
}

fn pick_first_title_line(lines: &[String], labels: &[&str]) -> Option<String> {
    for line in lines {
        if line.chars().count() < 4 || is_domain_like(line) {
            continue;
        }
        let cleaned = sanitize_card_text(line, labels);
        if cleaned.chars().count() >= 4 {
            return Some(cleaned);
        }
    }
    None
}

fn pick_source_line(lines: &[String], _labels: &[&str]) -> Option<String> {
    // A domain-looking line is the strongest site signal.
    for line in lines.iter().rev() {
        let value = normalize_text(line);
        if is_domain_like(&value) {
            let trimmed = value
                .strip_prefix("www.")
                .map_or(value.clone(), std::string::ToString::to_string);
            return Some(trimmed);
        }
    }

    // Otherwise a short trailing label (brand or author).
    for line in lines.iter().rev() {
        let value = normalize_text(line);
        if value.is_empty() {
            continue;
        }
        let len = value.chars().count();
        if len < 2 || len > 40 {
            continue;
        }
        let words = value.split(' ').filter(|w| !w.is_empty()).count();
        if value.contains(' ') && words > 3 {
            continue;
        }

        let mut cleaned = collapse_repeated_suffix(&value);
        cleaned = normalize_text(&cleaned);
        cleaned = cleaned.trim_end_matches(['.', ',', ';']).trim().to_string();
        if !cleaned.is_empty() {
            return Some(cleaned);
        }
    }

    None
}

/// Strips site labels and duplicated suffixes from a card text snippet.
#[must_use]
pub fn sanitize_card_text(value: &str, labels: &[&str]) -> String {
    let mut result = normalize_text(value);
    if result.is_empty() {
        return result;
    }

    result = collapse_repeated_suffix(&result);

    for label in labels {
        let label = normalize_text(label);
        if label.is_empty() {
            continue;
        }
        result = insert_space_before_trailing_label(&result, &label);
        result = strip_trailing_label(&result, &label);
    }

    result = normalize_text(&result);
    if result.is_empty() {
        return result;
    }

    for label in labels {
        if text::is_same_text(&result, label) {
            return String::new();
        }
    }

    result
}

/// Unwraps redirect hrefs (`/url?q=`, `/imgres?imgrefurl=`) to their target.
#[must_use]
pub fn normalize_source_href(href: &str) -> String {
    let raw = href.trim();
    if raw.is_empty() {
        return String::new();
    }

    let Ok(base) = Url::parse(SNAPSHOT_BASE_URL) else {
        return raw.to_string();
    };
    let Ok(url) = base.join(raw) else {
        return raw.to_string();
    };

    if url.path() == "/url" {
        for key in ["q", "url", "u"] {
            if let Some(target) = query_param(&url, key) {
                if let Ok(candidate) = Url::parse(&target) {
                    if matches!(candidate.scheme(), "http" | "https") {
                        return candidate.to_string();
                    }
                }
            }
        }
    }

    if url.path() == "/imgres" {
        for key in ["imgrefurl", "imgref"] {
            if let Some(target) = query_param(&url, key) {
                if let Ok(candidate) = Url::parse(&target) {
                    if matches!(candidate.scheme(), "http" | "https") {
                        return candidate.to_string();
                    }
                }
            }
        }
    }

    url.to_string()
}

fn query_param(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

/// Hostname without the `www.` prefix, empty when unparsable.
#[must_use]
pub fn hostname_label(href: &str) -> String {
    let Ok(base) = Url::parse(SNAPSHOT_BASE_URL) else {
        return String::new();
    };
    let Ok(url) = base.join(href.trim()) else {
        return String::new();
    };
    let host = url.host_str().unwrap_or_default();
    normalize_text(host)
        .strip_prefix("www.")
        .map_or_else(|| normalize_text(host), std::string::ToString::to_string)
}

/// Hosts owned by the page vendor itself; their links are chrome, not sources.
#[must_use]
pub fn is_google_host(host: &str) -> bool {
    let value = host.trim().to_lowercase();
    if value.is_empty() {
        return false;
    }
    value == "google.com"
        || value == "google.ru"
        || value.ends_with(".google.com")
        || value.ends_with(".google.ru")
        || value.ends_with(".gstatic.com")
}

/// Hrefs that can never be a source link.
#[must_use]
pub fn is_skippable_href(href: &str) -> bool {
    let value = href.trim().to_lowercase();
    value.is_empty()
        || value == "#"
        || value.starts_with("javascript:")
        || value.starts_with("data:")
        || value.starts_with("mailto:")
        || value.starts_with("tel:")
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
    fn srcset_prefers_last_entry() {
        assert_eq!(
            source_from_srcset("small.png 1x, medium.png 1.5x, large.png 2x"),
            "large.png"
        );
        assert_eq!(source_from_srcset(""), "");
    }

    #[test]
    fn placeholder_sources_are_skipped() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            r#"<img id="i" src="data:image/gif;base64,R0lGODlhAQABAAAAACw=" data-src="https://example.com/real.jpg">"#,
        );
        let img = dom::select_first(&body, "img").unwrap().unwrap();
        assert_eq!(image_source(&ctx, img.as_node()), "https://example.com/real.jpg");
    }

    #[test]
    fn all_placeholder_candidates_fall_back_to_first() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(&profile, &tunables, &rasterizer, r#"<img src="123">"#);
        let img = dom::select_first(&body, "img").unwrap().unwrap();
        assert_eq!(image_source(&ctx, img.as_node()), "123");
    }

    #[test]
    fn redirect_hrefs_unwrap() {
        assert_eq!(
            normalize_source_href("/url?q=https%3A%2F%2Fexample.com%2Fpage"),
            "https://example.com/page"
        );
        assert_eq!(
            normalize_source_href("/imgres?imgurl=x&imgrefurl=https%3A%2F%2Fexample.com%2Fref"),
            "https://example.com/ref"
        );
        assert_eq!(
            normalize_source_href("https://example.com/direct"),
            "https://example.com/direct"
        );
    }

    #[test]
    fn google_hosts_are_recognized() {
        assert!(is_google_host("www.google.com"));
        assert!(is_google_host("encrypted-tbn0.gstatic.com"));
        assert!(!is_google_host("example.com"));
    }

    #[test]
    fn gallery_collects_large_images_once() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            concat!(
                r#"<div id="c">"#,
                r#"<a href="https://example.com/page"><img src="https://example.com/a.jpg"></a>"#,
                r#"<a href="https://example.com/page"><img src="https://example.com/a.jpg"></a>"#,
                r#"<a href="https://example.com/page"><img src="https://example.com/favicon.ico"></a>"#,
                r#"<a href="https://example.com/page"><img src="https://example.com/icon.png" width="16" height="16"></a>"#,
                r#"</div>"#,
            ),
        );
        let container = dom::select_first(&body, "#c").unwrap().unwrap().as_node().clone();
        compact_answer_media(&ctx, &container).unwrap();

        let gallery_imgs = dom::collect_matches(&container, "[data-ai-gallery-content] img").unwrap();
        assert_eq!(gallery_imgs.len(), 1);
        let summary = dom::select_first(&container, "summary").unwrap().unwrap();
        assert_eq!(dom::normalized_text(summary.as_node()), "Answer images (1)");
    }

    #[test]
    fn image_without_card_stays_inline() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            r#"<div id="c"><p>Hello</p><img src="https://x/y.png"></div>"#,
        );
        let container = dom::select_first(&body, "#c").unwrap().unwrap().as_node().clone();
        compact_answer_media(&ctx, &container).unwrap();

        assert!(dom::select_first(&container, "details").unwrap().is_none());
        let img = dom::select_first(&container, "img").unwrap().unwrap();
        assert_eq!(dom::get_attr(img.as_node(), "src").as_deref(), Some("https://x/y.png"));
    }

    #[test]
    fn rendered_gallery_is_not_collected_again() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            concat!(
                r#"<div id="c">"#,
                r#"<a href="https://example.com/page"><img src="https://example.com/a.jpg"></a>"#,
                r#"</div>"#,
            ),
        );
        let container = dom::select_first(&body, "#c").unwrap().unwrap().as_node().clone();
        compact_answer_media(&ctx, &container).unwrap();
        compact_answer_media(&ctx, &container).unwrap();

        let galleries = dom::collect_matches(&container, "details[data-ai-gallery]").unwrap();
        assert_eq!(galleries.len(), 1);
        let links = dom::collect_matches(&container, "[data-ai-gallery] a[href]").unwrap();
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn attachment_shells_come_from_the_profile() {
        let mut profile = SelectorProfile::default();
        profile.attachment_shell_selectors = vec!["div.upload-box".to_string()];
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            concat!(
                r#"<div class="upload-box"><img id="a" src="x.png"></div>"#,
                r#"<div class="irXdnc UpF4j"><img id="b" src="y.png"></div>"#,
            ),
        );
        let a = dom::select_first(&body, "#a").unwrap().unwrap();
        let b = dom::select_first(&body, "#b").unwrap().unwrap();
        assert!(is_user_attachment_image(&ctx, a.as_node()));
        assert!(!is_user_attachment_image(&ctx, b.as_node()));
    }

    #[test]
    fn attachment_detection_needs_scope_or_hint() {
        let profile = SelectorProfile::default();
        let tunables = Tunables::default();
        let rasterizer = NoopRasterizer;
        let (ctx, body) = fixture(
            &profile,
            &tunables,
            &rasterizer,
            concat!(
                r#"<div class="irXdnc UpF4j"><img id="a" src="x.png"></div>"#,
                r#"<img id="b" class="taqkMe" src="y.png">"#,
                r#"<a href="https://example.com"><img id="cc" class="taqkMe" src="z.png"></a>"#,
            ),
        );
        let a = dom::select_first(&body, "#a").unwrap().unwrap();
        let b = dom::select_first(&body, "#b").unwrap().unwrap();
        let c = dom::select_first(&body, "#cc").unwrap().unwrap();
        assert!(is_user_attachment_image(&ctx, a.as_node()));
        assert!(!is_user_attachment_image(&ctx, b.as_node()));
        assert!(!is_user_attachment_image(&ctx, c.as_node()));
    }
}
