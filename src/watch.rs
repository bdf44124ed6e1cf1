//! Watch orchestrator: update the catalog, run gap-fill for every watched
//! artist in order, and summarize the cycle through the notifier.

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::catalog::differ::{catalog_update, CatalogUpdateReport};
use crate::config::Config;
use crate::contracts::{
    ArtistMetaFetcher, CatalogFetcher, Downloader, Notifier, ProgressSink, ShowMediaClassifier,
};
use crate::error::{NugsError, Result};
use crate::gapfill::{fill, GapFillDeps};
use crate::model::{GapFillResult, MediaType, StreamParams};
use crate::remote::StorageProvider;

/// Notification title for routine watch traffic.
pub const WATCH_TITLE: &str = "Nugs Watch";
/// Notification title for cycles that only produced failures.
pub const WATCH_ERROR_TITLE: &str = "Nugs Watch Error";
/// Priority for routine notifications.
pub const PRIORITY_INFO: i64 = 5;
/// Priority for failure notifications.
pub const PRIORITY_ERROR: i64 = 7;

/// Collaborators consumed by one watch cycle.
pub struct WatchDeps<'a> {
    pub store: &'a CacheStore,
    pub catalog: &'a dyn CatalogFetcher,
    pub meta: &'a dyn ArtistMetaFetcher,
    pub storage: &'a dyn StorageProvider,
    pub classifier: &'a dyn ShowMediaClassifier,
    pub downloader: &'a dyn Downloader,
    pub notifier: &'a dyn Notifier,
    pub progress: &'a dyn ProgressSink,
}

/// What one watch cycle did, for reporting.
#[derive(Debug, Default)]
pub struct WatchOutcome {
    pub update: Option<CatalogUpdateReport>,
    pub results: Vec<GapFillResult>,
    pub artist_errors: Vec<String>,
    pub downloaded: usize,
    pub failed: usize,
}

/// Runs one watch cycle over the configured artist list.
///
/// Catalog-update and per-artist failures are non-fatal; only cancellation
/// aborts the cycle.
pub async fn check(
    ctx: &CancellationToken,
    cfg: &Config,
    params: &StreamParams,
    filter: MediaType,
    json_mode: bool,
    deps: &WatchDeps<'_>,
) -> Result<WatchOutcome> {
    let mut outcome = WatchOutcome::default();
    let watch_list = cfg.watched_artists.clone();
    if watch_list.is_empty() {
        debug!("watch list empty, nothing to do");
        return Ok(outcome);
    }
    if ctx.is_cancelled() {
        return Err(NugsError::Cancelled);
    }

    match catalog_update(ctx, deps.store, deps.catalog).await {
        Ok(report) => outcome.update = Some(report),
        Err(err) => warn!(%err, "catalog update failed; continuing with cached catalog"),
    }

    let gap_deps = GapFillDeps {
        meta: deps.meta,
        storage: deps.storage,
        classifier: deps.classifier,
        downloader: deps.downloader,
        progress: deps.progress,
    };
    for raw_id in &watch_list {
        if ctx.is_cancelled() {
            return Err(NugsError::Cancelled);
        }
        let artist_id: i64 = match raw_id.trim().parse() {
            Ok(id) => id,
            Err(_) => {
                outcome
                    .artist_errors
                    .push(format!("{raw_id}: invalid artist id"));
                continue;
            }
        };
        let result = match fill(ctx, artist_id, cfg, params, filter, json_mode, &gap_deps).await
        {
            Ok(result) => result,
            Err(err) => {
                outcome.artist_errors.push(format!("{raw_id}: {err}"));
                continue;
            }
        };
        outcome.downloaded += result.downloaded;
        outcome.failed += result.failed;

        // A single-artist run is covered by the final summary alone.
        if watch_list.len() > 1 && result.downloaded > 0 {
            let name = if result.artist_name.is_empty() {
                raw_id.clone()
            } else {
                result.artist_name.clone()
            };
            let body = format!("{} new show(s) downloaded for {}", result.downloaded, name);
            if let Err(err) = deps
                .notifier
                .send(ctx, WATCH_TITLE, &body, PRIORITY_INFO)
                .await
            {
                warn!(%err, "per-artist notification failed");
            }
        }

        let interrupted = result.interrupted;
        outcome.results.push(result);
        if interrupted {
            // The user cancelled mid-download; stop iterating.
            break;
        }
    }

    if let Some((title, body, priority)) =
        summarize(outcome.downloaded, outcome.failed, &outcome.artist_errors)
    {
        if let Err(err) = deps.notifier.send(ctx, &title, &body, priority).await {
            warn!(%err, "summary notification failed");
        }
    }
    Ok(outcome)
}

/// Summary notification for one cycle, or `None` for a silent cycle.
///
/// Silent iff nothing was downloaded, nothing failed, and no artist
/// errored.
pub fn summarize(
    downloaded: usize,
    failed: usize,
    artist_errors: &[String],
) -> Option<(String, String, i64)> {
    if downloaded == 0 && failed == 0 && artist_errors.is_empty() {
        return None;
    }
    if downloaded > 0 {
        let mut body = format!("{downloaded} new show(s) downloaded");
        if failed > 0 {
            body.push_str(&format!(", {failed} failed"));
        }
        if !artist_errors.is_empty() {
            body.push_str(&format!(", {} artist error(s)", artist_errors.len()));
        }
        return Some((WATCH_TITLE.to_string(), body, PRIORITY_INFO));
    }
    let body = if failed > 0 && artist_errors.is_empty() {
        format!("{failed} download failure(s)")
    } else if failed == 0 {
        artist_errors.join("\n")
    } else {
        format!("{failed} download failure(s)\n{}", artist_errors.join("\n"))
    };
    Some((WATCH_ERROR_TITLE.to_string(), body, PRIORITY_ERROR))
}

/// Daemon driver: run cycles until cancelled, sleeping `watch_interval`
/// between them and re-reading the config at the start of each cycle.
pub async fn run_loop(
    ctx: &CancellationToken,
    cfg: &Config,
    params: &StreamParams,
    filter: MediaType,
    json_mode: bool,
    deps: &WatchDeps<'_>,
) -> Result<()> {
    loop {
        let current = match cfg.reload() {
            Ok(current) => current,
            Err(err) => {
                warn!(%err, "config reload failed; using previous settings");
                cfg.clone()
            }
        };
        match check(ctx, &current, params, filter, json_mode, deps).await {
            Ok(outcome) => debug!(
                downloaded = outcome.downloaded,
                failed = outcome.failed,
                artist_errors = outcome.artist_errors.len(),
                "watch cycle complete"
            ),
            Err(NugsError::Cancelled) => return Err(NugsError::Cancelled),
            Err(err) => warn!(%err, "watch cycle failed"),
        }
        tokio::select! {
            _ = ctx.cancelled() => return Err(NugsError::Cancelled),
            _ = tokio::time::sleep(current.watch_interval()) => {}
        }
    }
}
