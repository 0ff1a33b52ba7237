//! Turn location and question/quote/answer extraction.
//!
//! A snapshot page holds one turn container per exchange; each container
//! is mined for the user's question (text + rich markup), any quoted or
//! attached content, and the answer subtree, which then goes through the
//! sanitization pipeline.

use std::collections::HashSet;

use anyhow::Result;
use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use url::Url;

use crate::config::{SelectorProfile, Tunables};
use crate::error::{ExportError, ExportResult};
use crate::model::Turn;
use crate::sanitize::context::SanitizeContext;
use crate::sanitize::{dom, media, sources, structure, text, ui, BlobRasterizer, Sanitizer};

/// Question/quote scopes are dismantled before the answer pipeline runs;
/// these chrome tags go with them.
const QUESTION_SERVICE_SELECTOR: &str = concat!(
    "button, svg, script, style, input, textarea, ",
    "[role=\"button\"], [role=\"dialog\"], [role=\"status\"]",
);

const FALLBACK_QUESTION: &str = "(question not found)";

struct QuestionPayload {
    text: String,
    html: String,
}

/// Locates chat turns in a parsed snapshot and extracts them.
pub struct Extractor<'a> {
    profile: &'a SelectorProfile,
    tunables: &'a Tunables,
    sanitizer: Sanitizer<'a>,
}

impl<'a> Extractor<'a> {
    pub fn new(
        profile: &'a SelectorProfile,
        tunables: &'a Tunables,
        rasterizer: &'a dyn BlobRasterizer,
    ) -> Self {
        Self {
            profile,
            tunables,
            sanitizer: Sanitizer::new(profile, tunables, rasterizer),
        }
    }

    /// Parses a full snapshot document into turns. `page_url` is the
    /// address the snapshot was taken from, used as a question fallback.
    pub fn parse_chat(&self, html: &str, page_url: Option<&str>) -> ExportResult<Vec<Turn>> {
        let document = kuchiki::parse_html().one(html.to_string());
        let ctx = self.sanitizer.context(document.clone());

        let containers = self.find_turn_containers(&ctx, &document)?;
        log::debug!("found {} turn containers", containers.len());

        let mut turns = Vec::new();
        for container in &containers {
            if let Some(turn) = self.extract_turn(&ctx, &document, container, page_url)? {
                turns.push(turn);
            }
        }

        if turns.is_empty() {
            turns = self.parse_single_turn(&ctx, &document, page_url)?;
        }
        if turns.is_empty() {
            return Err(ExportError::NoTurns);
        }
        Ok(turns)
    }

    /// Turn containers in document order, deduplicated across selectors,
    /// keeping only those with a question or a real answer scope.
    fn find_turn_containers(
        &self,
        ctx: &SanitizeContext<'_>,
        document: &NodeRef,
    ) -> Result<Vec<NodeRef>> {
        let mut seen = HashSet::new();
        let mut containers = Vec::new();

        for selector in &self.profile.turn_container_selectors {
            for el in dom::collect_matches(document, selector)? {
                let node = el.as_node().clone();
                if seen.insert(dom::node_key(&node)) {
                    containers.push(node);
                }
            }
        }

        let mut kept = Vec::new();
        for container in containers {
            if self.extract_question_payload(ctx, &container)?.is_some() {
                kept.push(container);
                continue;
            }
            let has_answer = self
                .find_answer_scope(ctx, &container)?
                .is_some();
            if has_answer {
                kept.push(container);
            }
        }
        Ok(kept)
    }

    fn extract_turn(
        &self,
        ctx: &SanitizeContext<'_>,
        document: &NodeRef,
        container: &NodeRef,
        page_url: Option<&str>,
    ) -> Result<Option<Turn>> {
        let payload = self.extract_question_payload(ctx, container)?;
        let (question, question_html) = match payload {
            Some(p) => (p.text, p.html),
            None => (
                self.find_user_question(ctx, document, page_url)
                    .unwrap_or_else(|| FALLBACK_QUESTION.to_string()),
                String::new(),
            ),
        };

        let quote_html = self.extract_quoted_question_html(ctx, container, &question)?;
        let answer_html = self.extract_answer_html(ctx, container)?;

        let turn = Turn {
            question,
            question_html,
            quote_html,
            answer_html,
        };
        Ok(turn.is_valid().then_some(turn))
    }

    /// The user's question as text plus its cleaned rich markup.
    fn extract_question_payload(
        &self,
        ctx: &SanitizeContext<'_>,
        container: &NodeRef,
    ) -> Result<Option<QuestionPayload>> {
        let scope = self
            .find_question_scope(container)?
            .unwrap_or_else(|| container.clone());

        for selector in &self.profile.question_selectors {
            let matches = dom::collect_matches(&scope, selector)?;
            // Later duplicates carry the rendered question, earlier ones
            // the editable input shell.
            for el in matches.iter().rev() {
                let node = el.as_node();
                let raw = dom::block_text_lines(node).join("\n");
                let question = text::normalize_user_text(&raw);
                let len = question.chars().count();
                if !(2..=4000).contains(&len) {
                    continue;
                }
                if ui::is_ui_text(ctx, &question) {
                    continue;
                }

                let html = self.extract_question_html(ctx, node)?;
                return Ok(Some(QuestionPayload {
                    text: question,
                    html,
                }));
            }
        }
        Ok(None)
    }

    /// Question markup keeps line structure (`br`, paragraphs) but loses
    /// chrome and vendor attributes.
    fn extract_question_html(&self, ctx: &SanitizeContext<'_>, el: &NodeRef) -> Result<String> {
        let clone = dom::parse_body_fragment(&dom::outer_html(el)?)?;
        for chrome in dom::collect_matches(&clone, QUESTION_SERVICE_SELECTOR)? {
            chrome.as_node().detach();
        }

        structure::normalize_nbsp_text_nodes(&clone);
        structure::remove_comment_nodes(&clone);
        crate::sanitize::attrs::strip_vendor_attributes(&clone)?;
        structure::remove_empty_elements(ctx, &clone)?;

        Ok(dom::inner_html(&clone)?.trim().to_string())
    }

    fn find_question_scope(&self, container: &NodeRef) -> Result<Option<NodeRef>> {
        let selectors = &self.profile.question_scope_selectors;
        let Some((compact, rest)) = selectors.split_last() else {
            return Ok(None);
        };

        for selector in rest {
            if let Some(found) = dom::select_first(container, selector)? {
                return Ok(Some(found.as_node().clone()));
            }
        }

        let Some(found) = dom::select_first(container, compact)? else {
            return Ok(None);
        };
        let node = found.as_node().clone();
        // The compact block is only the text; its parent holds attachments.
        match node.parent() {
            Some(parent)
                if parent.as_element().is_some()
                    && dom::node_key(&parent) != dom::node_key(container) =>
            {
                Ok(Some(parent))
            }
            _ => Ok(Some(node)),
        }
    }

    fn find_quote_scope(&self, container: &NodeRef) -> Result<Option<NodeRef>> {
        let selectors = &self.profile.question_scope_selectors;
        if selectors.len() < 3 {
            return Ok(None);
        }

        if let Some(found) = dom::select_first(container, &selectors[1])? {
            return Ok(Some(found.as_node().clone()));
        }

        let Some(found) = dom::select_first(container, &selectors[2])? else {
            return Ok(None);
        };
        let node = found.as_node().clone();
        match node.parent() {
            Some(parent)
                if parent.as_element().is_some()
                    && dom::node_key(&parent) != dom::node_key(container) =>
            {
                Ok(Some(parent))
            }
            _ => Ok(Some(node)),
        }
    }

    /// Quoted/attached content of the question: selected-text quotes and
    /// uploaded images, with the question text itself removed.
    fn extract_quoted_question_html(
        &self,
        ctx: &SanitizeContext<'_>,
        container: &NodeRef,
        question: &str,
    ) -> Result<String> {
        let scope = match self.find_quote_scope(container)? {
            Some(scope) => scope,
            None => match self.find_question_scope(container)? {
                Some(scope) => scope,
                None => return self.extract_question_media_only_html(ctx, container, &HashSet::new()),
            },
        };

        let clone_body = dom::parse_body_fragment(&dom::outer_html(&scope)?)?;
        let quote_root = first_element_child(&clone_body).unwrap_or_else(|| clone_body.clone());

        remove_question_text_nodes(self.profile, &clone_body, &quote_root, question)?;
        ui::remove_ui_elements(ctx, &clone_body)?;
        for chrome in dom::collect_matches(&clone_body, QUESTION_SERVICE_SELECTOR)? {
            chrome.as_node().detach();
        }

        media::normalize_image_sources(ctx, &clone_body)?;
        media::embed_blob_images(ctx, &clone_body)?;
        structure::normalize_inline_wrappers(ctx, &clone_body)?;
        structure::normalize_text_nodes(&clone_body);
        structure::remove_leaf_ui_text_nodes(ctx, &clone_body)?;
        structure::remove_comment_nodes(&clone_body);
        crate::sanitize::attrs::strip_vendor_attributes(&clone_body)?;
        structure::remove_empty_elements(ctx, &clone_body)?;

        let mut existing = HashSet::new();
        for img in dom::collect_matches(&quote_root, "img")? {
            let src = media::image_source(ctx, img.as_node()).to_lowercase();
            if !src.is_empty() {
                existing.insert(src);
            }
        }

        let additional = self.extract_question_media_only_html(ctx, container, &existing)?;
        if !additional.is_empty() {
            dom::append_html_fragment(&quote_root, &additional)?;
        }

        let has_media = dom::select_first(&quote_root, "img")?.is_some();
        let quote_text = text::normalize_text(&quote_root.text_contents());
        if quote_text.is_empty() && !has_media {
            return Ok(String::new());
        }
        if !has_media && text::is_same_text(&quote_text, question) {
            return Ok(String::new());
        }

        Ok(dom::inner_html(&quote_root)?.trim().to_string())
    }

    /// Only the user's attached images, rendered as bare `img` tags.
    fn extract_question_media_only_html(
        &self,
        ctx: &SanitizeContext<'_>,
        container: &NodeRef,
        excluded: &HashSet<String>,
    ) -> Result<String> {
        let answer_scope = self.find_answer_scope(ctx, container)?;

        let mut scopes = Vec::new();
        let mut seen_scopes = HashSet::new();
        let mut push_scope = |node: Option<NodeRef>, scopes: &mut Vec<NodeRef>| {
            if let Some(node) = node {
                if seen_scopes.insert(dom::node_key(&node)) {
                    scopes.push(node);
                }
            }
        };
        let quote_scope = self.find_quote_scope(container)?;
        let question_scope = self.find_question_scope(container)?;
        push_scope(quote_scope.clone(), &mut scopes);
        push_scope(question_scope.clone(), &mut scopes);
        if answer_scope.is_some() {
            push_scope(quote_scope.and_then(|s| s.parent()), &mut scopes);
            push_scope(question_scope.and_then(|s| s.parent()), &mut scopes);
        }

        let mut candidates = media::collect_direct_attachment_images(ctx, container)?;
        for scope in &scopes {
            for img in dom::collect_matches(scope, "img")? {
                let node = img.as_node().clone();
                if media::is_user_attachment_image(ctx, &node) {
                    candidates.push(node);
                }
            }
        }
        for img in dom::collect_matches(container, "img")? {
            let node = img.as_node().clone();
            if media::is_user_attachment_image(ctx, &node) {
                candidates.push(node);
            }
        }
        if candidates.is_empty() {
            if let Some(scope) = &answer_scope {
                candidates = media::collect_images_outside_answer_scope(ctx, container, scope)?;
            }
        }
        if candidates.is_empty() {
            return Ok(String::new());
        }

        let media_root = dom::create_element("<div></div>")?;
        let mut seen_sources = HashSet::new();

        for img in candidates {
            if dom::has_attr(&img, "data-xpm-latex") {
                continue;
            }
            if !media::is_user_attachment_image(ctx, &img) {
                continue;
            }
            if answer_scope
                .as_ref()
                .is_some_and(|scope| dom::contains(scope, &img))
            {
                continue;
            }

            let source = media::image_source(ctx, &img);
            let source_lower = source.to_lowercase();
            if source_lower.is_empty() || source_lower.contains("favicon") {
                continue;
            }
            if excluded.contains(&source_lower) || seen_sources.contains(&source_lower) {
                continue;
            }

            let width = image_dimension(&img, "width");
            let height = image_dimension(&img, "height");
            if width > 0 && height > 0 && (width < 24 || height < 24) {
                continue;
            }
            seen_sources.insert(source_lower);

            let copy = dom::create_element("<img>")?;
            dom::set_attr(&copy, "src", &source);
            let alt = text::normalize_text(&dom::get_attr(&img, "alt").unwrap_or_default());
            if !alt.is_empty() {
                dom::set_attr(&copy, "alt", &alt);
            }
            media_root.append(copy);
        }

        if dom::select_first(&media_root, "img")?.is_none() {
            return Ok(String::new());
        }

        media::embed_blob_images(ctx, &media_root)?;
        crate::sanitize::attrs::strip_vendor_attributes(&media_root)?;
        structure::remove_empty_elements(ctx, &media_root)?;

        Ok(dom::inner_html(&media_root)?.trim().to_string())
    }

    /// Cleans the answer subtree. Source cards are mined from a clone of
    /// the whole turn first, since the panel often sits outside the
    /// answer scope.
    fn extract_answer_html(&self, ctx: &SanitizeContext<'_>, container: &NodeRef) -> Result<String> {
        let panel_host = crate::sanitize::clone_subtree(container)?;
        let sources_block = sources::build_source_panel_block(ctx, &panel_host)?;

        if let Some(scope) = self.find_answer_scope(ctx, container)? {
            return self
                .sanitizer
                .extract_clean_html(ctx, &scope, sources_block);
        }

        let work = crate::sanitize::clone_subtree(container)?;
        self.remove_question_and_quote_blocks(&work)?;
        self.sanitizer.extract_clean_html(ctx, &work, sources_block)
    }

    fn remove_question_and_quote_blocks(&self, container: &NodeRef) -> Result<()> {
        let question_block = self.find_question_scope(container)?;
        let quote_block = self.find_quote_scope(container)?;

        if let Some(question) = &question_block {
            question.detach();
        }
        let Some(quote) = quote_block else {
            return Ok(());
        };
        if let Some(question) = &question_block {
            if dom::node_key(question) == dom::node_key(&quote)
                || dom::contains(question, &quote)
                || dom::contains(&quote, question)
            {
                return Ok(());
            }
        }
        quote.detach();
        Ok(())
    }

    fn find_answer_scope(
        &self,
        ctx: &SanitizeContext<'_>,
        container: &NodeRef,
    ) -> Result<Option<NodeRef>> {
        for selector in &self.profile.answer_scope_selectors {
            let Some(found) = dom::select_first(container, selector)? else {
                continue;
            };
            let node = found.as_node().clone();
            if self.has_real_content(ctx, &node) {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    fn has_real_content(&self, ctx: &SanitizeContext<'_>, el: &NodeRef) -> bool {
        let text = dom::normalized_text(el);
        text.chars().count() >= 20 && !ui::is_ui_text(ctx, &text)
    }

    /// Fallback for snapshots without recognizable turn containers.
    fn parse_single_turn(
        &self,
        ctx: &SanitizeContext<'_>,
        document: &NodeRef,
        page_url: Option<&str>,
    ) -> ExportResult<Vec<Turn>> {
        let Some(ai_container) = self.find_ai_answer_container(ctx, document)? else {
            return Ok(Vec::new());
        };

        let question = self.find_user_question(ctx, document, page_url);
        let fallback_container =
            self.find_fallback_turn_container(ctx, document, &ai_container)?;

        let (quote_html, answer_html) = match &fallback_container {
            Some(turn_container) => (
                self.extract_quoted_question_html(
                    ctx,
                    turn_container,
                    question.as_deref().unwrap_or(""),
                )?,
                self.extract_answer_html(ctx, turn_container)?,
            ),
            None => (
                String::new(),
                self.sanitizer.extract_clean_html(ctx, &ai_container, None)?,
            ),
        };

        let turn = Turn {
            question: question.unwrap_or_else(|| FALLBACK_QUESTION.to_string()),
            question_html: String::new(),
            quote_html,
            answer_html,
        };
        Ok(if turn.is_valid() { vec![turn] } else { Vec::new() })
    }

    fn find_fallback_turn_container(
        &self,
        ctx: &SanitizeContext<'_>,
        document: &NodeRef,
        ai_container: &NodeRef,
    ) -> Result<Option<NodeRef>> {
        let selector = self.profile.turn_container_selectors.join(", ");
        if selector.is_empty() {
            return Ok(None);
        }
        let candidates: Vec<NodeRef> = dom::collect_matches(document, &selector)?
            .into_iter()
            .map(|el| el.as_node().clone())
            .collect();

        for candidate in &candidates {
            let mut has_attachment = false;
            for img in dom::collect_matches(candidate, "img")? {
                if media::is_user_attachment_image(ctx, img.as_node()) {
                    has_attachment = true;
                    break;
                }
            }
            if has_attachment {
                return Ok(Some(candidate.clone()));
            }
        }

        if let Some(parent_turn) = dom::closest(ai_container, &selector) {
            return Ok(Some(parent_turn));
        }
        Ok(candidates.into_iter().next())
    }

    fn find_ai_answer_container(
        &self,
        ctx: &SanitizeContext<'_>,
        document: &NodeRef,
    ) -> Result<Option<NodeRef>> {
        let scope_selector = self.profile.answer_scope_selectors.join(", ");
        if let Some(found) = dom::select_first(document, &scope_selector)? {
            let node = found.as_node().clone();
            if self.has_real_content(ctx, &node) {
                return Ok(Some(node));
            }
        }

        let mut best: Option<NodeRef> = None;
        let mut best_score = 0i64;
        for div in dom::collect_matches(document, "div")? {
            let node = div.as_node();
            let score = self.score_as_answer(ctx, node)?;
            if score > best_score {
                best_score = score;
                best = Some(node.clone());
            }
        }
        Ok(best)
    }

    fn score_as_answer(&self, ctx: &SanitizeContext<'_>, div: &NodeRef) -> Result<i64> {
        let text = dom::normalized_text(div);
        if ui::is_ui_text(ctx, &text) {
            return Ok(-1000);
        }

        let mut score = 0i64;
        let len = text.chars().count();
        if len > 100 {
            score += 30;
        }
        if len > 300 {
            score += 20;
        }
        if len > 500 {
            score += 10;
        }

        if dom::select_first(div, "strong, b")?.is_some() {
            score += 15;
        }
        if dom::select_first(div, "ul, ol")?.is_some() {
            score += 15;
        }
        if dom::select_first(div, "code, pre")?.is_some() {
            score += 15;
        }

        if dom::collect_matches(div, "button")?.len() > 3 {
            score -= 30;
        }
        if dom::select_first(div, "input, textarea")?.is_some() {
            score -= 50;
        }
        if div.children().count() > 20 && len < 200 {
            score -= 20;
        }
        Ok(score)
    }

    /// Question fallback: snapshot URL query, then the search box, then
    /// heading-like elements.
    fn find_user_question(
        &self,
        ctx: &SanitizeContext<'_>,
        document: &NodeRef,
        page_url: Option<&str>,
    ) -> Option<String> {
        if let Some(raw) = page_url {
            if let Ok(url) = Url::parse(raw) {
                let q = url
                    .query_pairs()
                    .find(|(key, _)| key == "q")
                    .map(|(_, value)| value.trim().to_string());
                if let Some(q) = q.filter(|v| !v.is_empty()) {
                    return Some(q);
                }
            }
        }

        if let Ok(Some(input)) = dom::select_first(document, "input[type=\"text\"], textarea") {
            let value = dom::get_attr(input.as_node(), "value")
                .unwrap_or_default()
                .trim()
                .to_string();
            if !value.is_empty() {
                return Some(value);
            }
        }

        for selector in &self.profile.fallback_heading_selectors {
            let Ok(Some(el)) = dom::select_first(document, selector) else {
                continue;
            };
            let text = dom::normalized_text(el.as_node());
            let len = text.chars().count();
            if len > 0 && len < 500 && !ui::is_ui_text(ctx, &text) {
                return Some(text);
            }
        }
        None
    }
}

/// Removes elements duplicating the question text inside a quote clone.
/// The quote root itself is never removed, only duplicates inside it.
fn remove_question_text_nodes(
    profile: &SelectorProfile,
    container: &NodeRef,
    quote_root: &NodeRef,
    question: &str,
) -> Result<()> {
    let normalized_question = text::normalize_text(question);
    if normalized_question.is_empty() {
        return Ok(());
    }
    let root_key = dom::node_key(quote_root);

    for el in dom::collect_matches(container, &profile.question_text_selectors.join(", "))? {
        let node = el.as_node();
        if dom::node_key(node) == root_key {
            continue;
        }
        if dom::select_first(node, "img")?.is_some() {
            continue;
        }
        let value = dom::normalized_text(node);
        if text::is_same_text(&value, &normalized_question) {
            node.detach();
        }
    }

    for el in dom::collect_matches(container, "div, span, p")? {
        let node = el.as_node();
        if dom::node_key(node) == root_key {
            continue;
        }
        if dom::child_element_count(node) > 0 {
            continue;
        }
        let value = text::normalize_text(&node.text_contents());
        if text::is_same_text(&value, &normalized_question) {
            node.detach();
        }
    }
    Ok(())
}

fn first_element_child(node: &NodeRef) -> Option<NodeRef> {
    node.children().find(|c| c.as_element().is_some())
}

fn image_dimension(img: &NodeRef, name: &str) -> u32 {
    dom::get_attr(img, name)
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(0)
}
