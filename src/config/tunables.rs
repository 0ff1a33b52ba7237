//! Numeric bounds and thresholds shared across the pipeline passes.
//!
//! Every limit that used to be a bare literal lives here under a name so a
//! reader can see what the number controls.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Tunables {
    /// Upper bound for fixpoint passes (empty-node pruning, table rewrap).
    pub structural_pass_limit: usize,
    /// Minimum body length (decoded) for a data: image to count as real.
    pub data_image_min_len: usize,
    /// Square icons at or below this edge are favicon material, not thumbs.
    pub icon_max_edge: u32,
    /// UI phrase match allows this much trailing slack on a text leaf.
    pub ui_text_slack: usize,
    /// UI phrase match slack when scanning whole elements.
    pub ui_element_slack: usize,
    /// Elements with this many children or more are never dropped as chrome.
    pub ui_max_children: usize,
    /// Disclaimer paragraphs longer than this are real content.
    pub disclaimer_max_len: usize,
    /// How many ancestors to climb when classifying a feedback leaf.
    pub feedback_ancestor_radius: usize,
    /// Unique feedback token hits required for a cluster match.
    pub feedback_cluster_min_hits: usize,
    /// Feedback blocks tolerate at most this much non-token text.
    pub feedback_other_text_max: usize,
    /// Source-card snippets are cut at this length.
    pub snippet_max_len: usize,
    /// Source-card titles are cut at this length.
    pub title_max_len: usize,
    /// Card score weight: has a preview thumbnail.
    pub score_thumb: i64,
    /// Card score weight: has a favicon-like icon.
    pub score_icon: i64,
    /// Card score weight: thumbnail is an inline data: URI.
    pub score_data_thumb: i64,
    /// Card score cap for snippet length contribution.
    pub score_snippet_cap: i64,
    /// Text nodes at or below this length can be orphaned punctuation.
    pub orphan_text_max_len: usize,
}

impl Default for Tunables {
    fn default() -> Self {
        Self {
            structural_pass_limit: 6,
            data_image_min_len: 180,
            icon_max_edge: 48,
            ui_text_slack: 20,
            ui_element_slack: 30,
            ui_max_children: 3,
            disclaimer_max_len: 220,
            feedback_ancestor_radius: 12,
            feedback_cluster_min_hits: 7,
            feedback_other_text_max: 12,
            snippet_max_len: 280,
            title_max_len: 180,
            score_thumb: 1000,
            score_icon: 120,
            score_data_thumb: 40,
            score_snippet_cap: 240,
            orphan_text_max_len: 3,
        }
    }
}
