//! Gap-fill executor: drive sequential downloads for an artist's missing
//! shows with interrupt-aware cancellation and per-show failure capture.
//!
//! Downloads are strictly sequential; the downloader owns the shared
//! progress register and the batch state for the duration of one item.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::catalog::analyzer::{analyze, AnalyzerDeps};
use crate::concurrency::InterruptGuard;
use crate::config::Config;
use crate::contracts::{
    ArtistMetaFetcher, Downloader, ProgressSink, ShowMediaClassifier,
};
use crate::diagnostics::{build_diagnostics, reason_hint};
use crate::error::{NugsError, Result};
use crate::model::{BatchProgress, FailedShow, GapFillResult, MediaType, StreamParams};
use crate::remote::StorageProvider;

/// Collaborators consumed by one gap-fill run.
pub struct GapFillDeps<'a> {
    pub meta: &'a dyn ArtistMetaFetcher,
    pub storage: &'a dyn StorageProvider,
    pub classifier: &'a dyn ShowMediaClassifier,
    pub downloader: &'a dyn Downloader,
    pub progress: &'a dyn ProgressSink,
}

/// Analyzes the artist and downloads every missing show.
///
/// The call succeeds unless the analyzer itself fails; per-show failures
/// are surfaced in the result. Re-running against the same storage state
/// resumes from `remaining`: the classifier skips shows that now exist.
pub async fn fill(
    ctx: &CancellationToken,
    artist_id: i64,
    cfg: &Config,
    params: &StreamParams,
    filter: MediaType,
    json_mode: bool,
    deps: &GapFillDeps<'_>,
) -> Result<GapFillResult> {
    let analyzer_deps = AnalyzerDeps {
        meta: deps.meta,
        storage: deps.storage,
        classifier: deps.classifier,
    };
    let analysis = analyze(ctx, artist_id, cfg, filter, json_mode, &analyzer_deps).await?;

    let mut result = GapFillResult {
        artist_id,
        artist_name: analysis.artist_name.clone(),
        total_missing: analysis.missing_shows.len(),
        ..GapFillResult::default()
    };
    if analysis.missing_shows.is_empty() {
        return Ok(result);
    }
    info!(
        artist = %result.artist_name,
        missing = result.total_missing,
        "filling catalog gap"
    );

    let guard = InterruptGuard::install(ctx);
    let mut batch = BatchProgress {
        total_albums: result.total_missing,
        ..BatchProgress::default()
    };
    deps.progress.set_batch(Some(batch));

    for show in &analysis.missing_shows {
        if guard.token().is_cancelled() {
            result.interrupted = true;
            break;
        }
        batch.current_album += 1;

        match deps
            .downloader
            .album(guard.token(), show.container_id, cfg, params, batch)
            .await
        {
            Ok(()) => {
                result.downloaded += 1;
                batch.complete += 1;
            }
            Err(NugsError::Cancelled) => {
                result.interrupted = true;
                break;
            }
            Err(err) => {
                warn!(
                    container = show.container_id,
                    %err,
                    "show download failed"
                );
                let diagnostic =
                    build_diagnostics(guard.token(), show, cfg, deps.storage).await;
                let reason = reason_hint(&diagnostic, &err);
                result.failed_shows.push(FailedShow {
                    container_id: show.container_id,
                    container_info: show.container_info.clone(),
                    performance_date: show.performance_date.clone(),
                    error: err.to_string(),
                    reason: reason.to_string(),
                    diagnostic,
                });
                result.failed += 1;
                batch.failed += 1;
            }
        }
    }

    if guard.interrupted() {
        result.interrupted = true;
    }
    result.attempted = result.downloaded + result.failed;
    result.remaining = result.total_missing - result.attempted;
    deps.progress.set_batch(None);
    Ok(result)
}
