//! Catalog update: fetch a fresh snapshot, diff it against the previous
//! containers index, and atomically replace the cache.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::cache::CacheStore;
use crate::contracts::CatalogFetcher;
use crate::error::Result;
use crate::model::RecentItem;

/// Outcome of one catalog update.
#[derive(Debug, Clone)]
pub struct CatalogUpdateReport {
    /// The previous containers index was missing or corrupt, so there was
    /// nothing to diff against.
    pub first_update: bool,
    /// Shows present in the fresh snapshot but not in the previous index.
    /// Empty on a first update.
    pub new_shows: Vec<RecentItem>,
    pub total_shows: usize,
    pub total_artists: usize,
    pub update_duration: Duration,
}

/// Fetches, diffs, and writes the catalog cache.
///
/// A missing or corrupt previous index downgrades the run to a first
/// update rather than failing it.
pub async fn catalog_update(
    ctx: &CancellationToken,
    store: &CacheStore,
    fetcher: &dyn CatalogFetcher,
) -> Result<CatalogUpdateReport> {
    let started = Instant::now();
    let fresh = fetcher.fetch(ctx).await?;

    let previous = match store.read_containers_index() {
        Ok(index) => Some(index),
        Err(err) if err.is_first_update_kind() => None,
        Err(err) => return Err(err),
    };
    let new_shows = match &previous {
        Some(previous) => {
            let known: BTreeSet<i64> = previous.containers.keys().copied().collect();
            fresh
                .response
                .recent_items
                .iter()
                .filter(|item| !known.contains(&item.container_id))
                .cloned()
                .collect()
        }
        None => Vec::new(),
    };

    let update_duration = started.elapsed();
    let meta = store.write_catalog(&fresh, update_duration)?;
    info!(
        first_update = previous.is_none(),
        new_shows = new_shows.len(),
        total_shows = meta.total_shows,
        "catalog updated"
    );

    Ok(CatalogUpdateReport {
        first_update: previous.is_none(),
        new_shows,
        total_shows: meta.total_shows,
        total_artists: meta.total_artists,
        update_duration,
    })
}

impl CatalogUpdateReport {
    /// Structured output with stable keys; `newShowsList` is always an
    /// array, never omitted.
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "firstUpdate": self.first_update,
            "newShows": self.new_shows.len(),
            "totalShows": self.total_shows,
            "totalArtists": self.total_artists,
            "newShowsList": self.new_shows,
        })
    }

    /// Human-readable summary listing only the new shows.
    pub fn render_text(&self) -> String {
        if self.first_update {
            return format!(
                "First catalog update: cached {} show(s) across {} artist(s)\n",
                self.total_shows, self.total_artists
            );
        }
        if self.new_shows.is_empty() {
            return "No new shows since last update\n".to_string();
        }
        let mut out = format!("{} new show(s) since last update\n", self.new_shows.len());
        for item in &self.new_shows {
            out.push_str(&format!(
                "  {}  {}  {}\n",
                item.date_short, item.artist_name, item.title
            ));
        }
        out
    }
}
