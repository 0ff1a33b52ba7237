//! End-to-end sanitization of standalone fragments through the public API.
//!
//! Covers the full pipeline contract: chrome and vendor attributes are
//! gone from the output, real content survives byte-for-byte, and running
//! the pipeline over its own output changes nothing.

use aichat_export::clean_fragment;
use proptest::prelude::*;

#[test]
fn strips_chrome_and_vendor_attributes() {
    let html = concat!(
        r#"<div class="xYz12" jscontroller="AbC" data-ved="2ahUKE">"#,
        "<button aria-label=\"Copy\">Copy</button>",
        "<!-- marker -->",
        r#"<p style="color:red" jsaction="click:h5M12e">Hello</p>"#,
        r#"<img src="https://x/y.png" class="thumb" data-iml="123">"#,
        "</div>",
    );
    let cleaned = clean_fragment(html).unwrap();
    assert_eq!(cleaned, r#"<p>Hello</p><img src="https://x/y.png">"#);
}

#[test]
fn keeps_structured_answer_content() {
    let html = concat!(
        "<div>",
        "<p>Sorting a vector is <strong>in place</strong>.</p>",
        "<ul><li>stable sort</li><li>unstable sort</li></ul>",
        "<pre><code>v.sort();</code></pre>",
        "</div>",
    );
    let cleaned = clean_fragment(html).unwrap();
    assert!(cleaned.contains("<strong>in place</strong>"));
    assert!(cleaned.contains("<li>stable sort</li>"));
    assert!(cleaned.contains("v.sort();"));
}

#[test]
fn wraps_tables_in_scroll_shells() {
    let html = "<div><p>Comparison of the two:</p>\
                <table><tr><td>a</td><td>b</td></tr></table></div>";
    let cleaned = clean_fragment(html).unwrap();
    assert!(cleaned.contains(r#"<div data-table-shell="true">"#));
    assert!(cleaned.contains(r#"<div data-table-scroll="true">"#));
    assert!(cleaned.contains("<table>"));
}

#[test]
fn drops_disclaimer_footer() {
    let html = "<div><p>Real answer text about the topic at hand.</p>\
                <div>AI responses may include mistakes.</div></div>";
    let cleaned = clean_fragment(html).unwrap();
    assert!(cleaned.contains("Real answer text"));
    assert!(!cleaned.contains("may include mistakes"));
}

#[test]
fn drops_feedback_form_remnants() {
    let html = concat!(
        "<div>",
        "<p>The actual answer explains the borrow checker in detail here.</p>",
        "<div><span>Helpful</span><span>Comprehensive</span><span>Clear</span>",
        "<span>Other</span><span>Positive feedback</span><span>Negative feedback</span>",
        "<span>Saved time</span><span>Unhelpful</span></div>",
        "</div>",
    );
    let cleaned = clean_fragment(html).unwrap();
    assert!(cleaned.contains("borrow checker"));
    assert!(!cleaned.contains("Positive feedback"));
    assert!(!cleaned.contains("Unhelpful"));
}

#[test]
fn role_headings_become_real_headings() {
    let html = r#"<div><div role="heading" aria-level="2">Overview</div><p>Body text follows the heading.</p></div>"#;
    let cleaned = clean_fragment(html).unwrap();
    assert!(cleaned.contains("<h2>Overview</h2>"));
}

#[test]
fn inline_image_resolves_in_place() {
    let html = concat!(
        "<div><span>  </span><p>Hello</p>",
        r#"<img src="about:blank" data-src="https://x/y.png"></div>"#,
    );
    let cleaned = clean_fragment(html).unwrap();
    assert_eq!(cleaned, r#"<p>Hello</p><img src="https://x/y.png">"#);
}

#[test]
fn cleaning_is_idempotent() {
    let html = concat!(
        "<div>",
        r#"<p class="n1 n2" jsname="xx">First paragraph of the answer.</p>"#,
        "<ul><li>one</li><li>two</li></ul>",
        "<table><tr><td>a</td></tr></table>",
        "</div>",
    );
    let once = clean_fragment(html).unwrap();
    let twice = clean_fragment(&once).unwrap();
    assert_eq!(once, twice);
}

// Outputs carrying a rendered gallery and sources block are the hardest
// rerun case: their images and links look like fresh material.
#[test]
fn cleaning_is_idempotent_with_gallery_and_sources() {
    let html = concat!(
        "<div>",
        "<p>Answer text that references a picture and a citation below.</p>",
        r#"<a href="https://pics.example.com/full"><img src="https://pics.example.com/full.jpg" alt="Chart"></a>"#,
        r#"<div class="ofHStc"><div>"#,
        r#"<a href="https://example.com/article">A detailed article about rust performance</a>"#,
        r#"<img src="https://example.com/thumb.jpg" width="120" height="90">"#,
        r#"<p>Benchmarks and analysis of allocator behavior in production services.</p>"#,
        r#"</div></div>"#,
        "</div>",
    );
    let once = clean_fragment(html).unwrap();
    let twice = clean_fragment(&once).unwrap();
    assert_eq!(once, twice);

    assert_eq!(once.matches("data-ai-gallery=").count(), 1);
    assert_eq!(once.matches("data-ai-sources=").count(), 1);
    // The pipeline's own favicon proxy survives the second run.
    assert!(twice.contains("s2/favicons"));
}

proptest! {
    // Plain multi-block text content must survive cleaning unchanged and
    // re-cleaning must be a no-op.
    #[test]
    fn plain_paragraphs_are_stable(a in "[a-z]{5,20}", b in "[a-z]{5,20}") {
        let html = format!("<div><p>first {a} block</p><p>second {b} block</p></div>");
        let once = clean_fragment(&html).unwrap();
        prop_assert!(once.contains(&a));
        prop_assert!(once.contains(&b));
        let twice = clean_fragment(&once).unwrap();
        prop_assert_eq!(once, twice);
    }
}
