//! Sanitizer core for archiving AI-chat pages as clean HTML turns.
//!
//! Feed a saved browser snapshot of an AI-chat page to [`parse_chat`] and
//! get back the conversation as a list of [`Turn`]s: question text, the
//! question's rich markup, any quoted/attached content, and the answer as
//! deterministic, self-contained HTML with interface chrome, feedback
//! widgets, and vendor attributes stripped.
//!
//! ```no_run
//! use aichat_export::parse_chat;
//!
//! let html = std::fs::read_to_string("snapshot.html")?;
//! for turn in parse_chat(&html, None)? {
//!     println!("Q: {}", turn.question);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod sanitize;

pub use config::{SelectorProfile, Tunables};
pub use error::{ExportError, ExportResult};
pub use extract::Extractor;
pub use model::{CodePayload, PlaceCard, SourceCard, Turn};
pub use sanitize::{BlobRasterizer, NoopRasterizer, Sanitizer};

/// Parses a snapshot with the default selector profile and tunables.
///
/// `page_url` is the address the snapshot was captured from; when the
/// page itself carries no recognizable question, the `q` query parameter
/// is used as a fallback.
pub fn parse_chat(html: &str, page_url: Option<&str>) -> ExportResult<Vec<Turn>> {
    let profile = SelectorProfile::default();
    let tunables = Tunables::default();
    let rasterizer = NoopRasterizer;
    Extractor::new(&profile, &tunables, &rasterizer).parse_chat(html, page_url)
}

/// Sanitizes a standalone HTML fragment without turn extraction.
pub fn clean_fragment(html: &str) -> ExportResult<String> {
    let profile = SelectorProfile::default();
    let tunables = Tunables::default();
    let rasterizer = NoopRasterizer;
    let sanitizer = Sanitizer::new(&profile, &tunables, &rasterizer);
    Ok(sanitizer.sanitize(html)?)
}
