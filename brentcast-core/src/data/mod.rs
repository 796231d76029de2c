//! Data extraction, refinement, splitting and artifact storage

pub mod extract;
pub mod provider;
pub mod split;
pub mod store;
pub mod table;
pub mod transform;

pub use extract::{extract, extract_from_html, TableLayout};
pub use provider::{HtmlFileSource, HttpSource, SeriesSource};
pub use split::split;
pub use store::{ArtifactStatus, ArtifactStore, RunManifest};
pub use transform::transform;
