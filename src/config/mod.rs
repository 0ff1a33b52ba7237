//! Configuration for the export pipeline.
//!
//! `SelectorProfile` carries every page-specific selector and phrase list so
//! the sanitizer core stays free of hardcoded page knowledge. `Tunables`
//! collects the numeric bounds and thresholds the passes share.

pub mod profile;
pub mod tunables;

pub use profile::SelectorProfile;
pub use tunables::Tunables;
