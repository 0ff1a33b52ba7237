//! Maps place cards: mined from vendor anchors, re-rendered as plain markup.

use std::sync::LazyLock;

use anyhow::Result;
use kuchiki::NodeRef;
use regex::Regex;

use crate::config::SelectorProfile;
use crate::model::PlaceCard;
use crate::sanitize::dom;
use crate::sanitize::text::normalize_text;

static RATING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\d.,]+").expect("rating number: hardcoded regex is valid")
});

static PLAIN_RATING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\d.,]+$").expect("plain rating: hardcoded regex is valid")
});

static REVIEW_COUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\(([\d\s,kK+]+)\)").expect("review count: hardcoded regex is valid")
});

static KIND_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z][a-z\s]+$").expect("kind line: hardcoded regex is valid")
});

fn is_place_href(href: &str) -> bool {
    href.contains("/maps/place")
        || href.contains("/viewer/place")
        || (href.contains("/search?") && href.contains("place_id"))
        || href.contains("google.com/maps")
}

/// Replaces maps place-card anchors with normalized card markup.
pub fn process_place_cards(profile: &SelectorProfile, container: &NodeRef) -> Result<()> {
    let mut links = Vec::new();
    for anchor in dom::collect_matches(container, "a[href]")? {
        let node = anchor.as_node();
        if !is_place_href(&dom::get_attr(node, "href").unwrap_or_default()) {
            continue;
        }
        let has_image = dom::select_first(node, "img")?.is_some();
        if has_image || dom::normalized_text(node).chars().count() > 10 {
            links.push(node.clone());
        }
    }

    for link in links {
        if dom::has_attr(&link, "data-ai-place-processed") {
            continue;
        }
        let Some(card) = extract_place_data(profile, &link) else {
            continue;
        };

        unprotect_ancestors(&link);
        dom::set_attr(&link, "data-ai-place-processed", "true");
        let rendered = render_place_card(&card)?;
        dom::replace_node(&link, &rendered);
    }
    Ok(())
}

/// Drops role/js* attributes on ancestors so structural cleanup does not
/// take the surrounding list out together with the card.
fn unprotect_ancestors(link: &NodeRef) {
    for ancestor in link.ancestors().take(6) {
        if ancestor.as_element().is_none() {
            break;
        }
        if matches!(
            dom::get_attr(&ancestor, "role").as_deref(),
            Some("navigation" | "list" | "listitem")
        ) {
            dom::remove_attr(&ancestor, "role");
        }
        dom::remove_attr(&ancestor, "jscontroller");
        dom::remove_attr(&ancestor, "jsaction");
    }
}

fn extract_place_data(profile: &SelectorProfile, link: &NodeRef) -> Option<PlaceCard> {
    let mut card = PlaceCard {
        url: dom::get_attr(link, "href").unwrap_or_default(),
        ..PlaceCard::default()
    };

    card.image_src = pick_place_image(link);
    card.title = pick_place_title(profile, link);
    if card.title.is_empty() {
        return None;
    }

    card.rating = pick_place_rating(link);

    let all_text = link.text_contents();
    if let Some(m) = REVIEW_COUNT.find(&all_text) {
        card.reviews = m.as_str().to_string();
    }

    for line in dom::block_text_lines(link) {
        let line = normalize_text(&line);
        if line.is_empty() || line == card.title || line == "·" {
            continue;
        }
        if !card.rating.is_empty() && line.contains(&card.rating) {
            continue;
        }
        if !card.reviews.is_empty() && line.contains(&card.reviews) {
            continue;
        }
        // Opening hours change between captures, not worth keeping.
        if line == "Open" || line == "Closed" || line.contains("Opens") || line.contains("Closes") {
            continue;
        }

        if card.kind.is_empty() && line.chars().count() < 30 && KIND_LINE.is_match(&line) {
            card.kind = line;
        } else if !card.meta.contains(&line) {
            card.meta.push(line);
        }
    }

    Some(card)
}

fn pick_place_image(link: &NodeRef) -> String {
    let Ok(images) = dom::collect_matches(link, "img") else {
        return String::new();
    };

    let mut first = String::new();
    for img in &images {
        let node = img.as_node();
        let src = dom::get_attr(node, "src")
            .filter(|v| !v.trim().is_empty())
            .or_else(|| dom::get_attr(node, "data-src"))
            .unwrap_or_default();
        if first.is_empty() {
            first = src.clone();
        }
        if !src.contains("data:image/gif;base64") && src.len() > 50 {
            return src;
        }
    }
    first
}

fn pick_place_title(profile: &SelectorProfile, link: &NodeRef) -> String {
    for selector in &profile.place_title_selectors {
        if let Ok(Some(el)) = dom::select_first(link, selector) {
            let title = normalize_text(&el.as_node().text_contents());
            if !title.is_empty() {
                return title;
            }
        }
    }

    dom::block_text_lines(link)
        .into_iter()
        .map(|line| normalize_text(&line))
        .find(|line| !line.is_empty())
        .unwrap_or_default()
}

fn pick_place_rating(link: &NodeRef) -> String {
    let aria = dom::select_first(
        link,
        "[aria-label*=\"Rated\"], [aria-label*=\"Rating\"], [aria-label*=\"stars\"]",
    )
    .ok()
    .flatten();
    if let Some(el) = aria {
        let label = dom::get_attr(el.as_node(), "aria-label").unwrap_or_default();
        if let Some(m) = RATING_NUMBER.find(&label) {
            return m.as_str().to_string();
        }
    }

    if let Ok(Some(el)) = dom::select_first(link, ".YDIN4c, .tZJLob span, span[aria-hidden=\"true\"]")
    {
        let value = el.as_node().text_contents().trim().to_string();
        if PLAIN_RATING.is_match(&value) {
            return value;
        }
    }

    String::new()
}

fn star_string(rating: &str) -> String {
    let score = rating.replace(',', ".").parse::<f64>().unwrap_or(0.0);
    (1..=5)
        .map(|i| if score >= f64::from(i) { '★' } else { '☆' })
        .collect()
}

fn render_place_card(card: &PlaceCard) -> Result<NodeRef> {
    let shell = dom::create_element("<div data-ai-place=\"true\"></div>")?;

    let link = dom::create_element(r#"<a target="_blank" rel="noopener noreferrer"></a>"#)?;
    let href = if card.url.is_empty() { "#" } else { card.url.as_str() };
    dom::set_attr(&link, "href", href);

    if !card.image_src.is_empty() {
        let img = dom::create_element("<img data-ai-place-image=\"true\">")?;
        dom::set_attr(&img, "src", &card.image_src);
        dom::set_attr(&img, "alt", &card.title);
        link.append(img);
    }

    let details = dom::create_element("<div data-ai-place-details=\"true\"></div>")?;

    let title = dom::create_element("<div data-ai-place-title=\"true\"></div>")?;
    title.append(NodeRef::new_text(card.title.clone()));
    details.append(title);

    if !card.rating.is_empty() {
        let row = dom::create_element("<div data-ai-place-rating=\"true\"></div>")?;
        let score = dom::create_element("<span></span>")?;
        score.append(NodeRef::new_text(card.rating.clone()));
        row.append(score);

        let stars = dom::create_element("<span></span>")?;
        stars.append(NodeRef::new_text(star_string(&card.rating)));
        row.append(stars);

        if !card.reviews.is_empty() {
            let reviews = dom::create_element("<span></span>")?;
            reviews.append(NodeRef::new_text(card.reviews.clone()));
            row.append(reviews);
        }
        if !card.kind.is_empty() {
            let kind = dom::create_element("<span></span>")?;
            kind.append(NodeRef::new_text(format!(" · {}", card.kind)));
            row.append(kind);
        }
        details.append(row);
    } else if !card.kind.is_empty() {
        let kind = dom::create_element("<div data-ai-place-meta=\"true\"></div>")?;
        kind.append(NodeRef::new_text(card.kind.clone()));
        details.append(kind);
    }

    let meta: Vec<&String> = card.meta.iter().filter(|m| *m != &card.kind).collect();
    if !meta.is_empty() {
        let meta_div = dom::create_element("<div data-ai-place-meta=\"true\"></div>")?;
        let joined = meta
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" · ");
        meta_div.append(NodeRef::new_text(joined));
        details.append(meta_div);
    }

    link.append(details);
    shell.append(link);
    Ok(shell)
}
