//! Catalog-side logic: presence indexing, gap analysis, and the
//! fetch-diff-write update cycle.

pub mod analyzer;
pub mod differ;
pub mod presence;

pub use analyzer::{analyze, AnalyzerDeps, ARTIST_META_TTL};
pub use differ::{catalog_update, CatalogUpdateReport};
pub use presence::PresenceIndex;
