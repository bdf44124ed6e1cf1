//! Gap analysis: join per-artist catalog truth with storage presence under
//! a media filter and classify every show as downloaded or missing.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::concurrency::{bounded_map, warn_remote_check_error, CLASSIFY_POOL_WIDTH};
use crate::config::Config;
use crate::contracts::{ArtistMetaFetcher, ShowMediaClassifier};
use crate::error::{NugsError, Result};
use crate::model::{ArtistCatalogAnalysis, ArtistPage, MediaType, Show, ShowStatus};
use crate::names::album_folder_name;
use crate::remote::StorageProvider;

use super::presence::PresenceIndex;

/// Freshness window for cached per-artist metadata.
pub const ARTIST_META_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Collaborators consumed by one analysis.
pub struct AnalyzerDeps<'a> {
    pub meta: &'a dyn ArtistMetaFetcher,
    pub storage: &'a dyn StorageProvider,
    pub classifier: &'a dyn ShowMediaClassifier,
}

/// Analyzes one artist's catalog against local and remote presence.
pub async fn analyze(
    ctx: &CancellationToken,
    artist_id: i64,
    cfg: &Config,
    filter: MediaType,
    json_mode: bool,
    deps: &AnalyzerDeps<'_>,
) -> Result<ArtistCatalogAnalysis> {
    let meta = deps.meta.get(ctx, artist_id, ARTIST_META_TTL).await?;

    let mut all_shows: Vec<Show> = Vec::new();
    for page in &meta.pages {
        let page: ArtistPage = serde_json::from_value(page.clone())?;
        all_shows.extend(page.response.containers);
    }
    if all_shows.is_empty() {
        return Err(NugsError::InvalidArgument(format!(
            "no shows for artist {artist_id}"
        )));
    }
    let artist_name = all_shows
        .iter()
        .map(|show| show.artist_name.trim())
        .find(|name| !name.is_empty())
        .unwrap_or_default()
        .to_string();

    // Newest first.
    all_shows.sort_by(|a, b| b.performance_date.cmp(&a.performance_date));

    let filter = resolve_filter(filter, cfg);

    let presence = PresenceIndex::build(ctx, &artist_name, cfg, filter, deps.storage).await?;
    if let Some(err) = &presence.remote_list_err {
        if !json_mode {
            warn!(%err, "remote listing failed; falling back to per-show existence checks");
        }
    }

    // Pre-filter: only downloadable shows the filter admits are classified.
    let candidates: Vec<(Show, MediaType)> = all_shows
        .into_iter()
        .filter(|show| show.is_downloadable())
        .filter_map(|show| {
            let media = deps.classifier.classify(&show);
            filter.admits(media).then_some((show, media))
        })
        .collect();

    let presence = &presence;
    let artist_name_ref = artist_name.as_str();
    let shows: Vec<ShowStatus> = bounded_map(
        candidates,
        CLASSIFY_POOL_WIDTH,
        move |_, (show, media_type)| async move {
            let downloaded = classify_presence(
                ctx,
                &show,
                artist_name_ref,
                cfg,
                filter,
                presence,
                deps.storage,
            )
            .await;
            ShowStatus {
                show,
                downloaded,
                media_type,
            }
        },
    )
    .await;

    let total_shows = shows.len();
    let downloaded = shows.iter().filter(|status| status.downloaded).count();
    let missing_shows: Vec<Show> = shows
        .iter()
        .filter(|status| !status.downloaded)
        .map(|status| status.show.clone())
        .collect();
    let missing = missing_shows.len();
    let pct = |part: usize| {
        if total_shows > 0 {
            100.0 * part as f64 / total_shows as f64
        } else {
            0.0
        }
    };

    Ok(ArtistCatalogAnalysis {
        artist_id,
        artist_name,
        total_shows,
        downloaded,
        missing,
        download_pct: pct(downloaded),
        missing_pct: pct(missing),
        shows,
        missing_shows,
        cache_used: meta.cache_used,
        cache_stale_use: meta.cache_stale_use,
        media_filter: filter,
    })
}

/// An Unknown filter takes the configured default; a still-unknown default
/// means both tiers.
fn resolve_filter(filter: MediaType, cfg: &Config) -> MediaType {
    match filter {
        MediaType::Unknown => match cfg.default_media() {
            MediaType::Unknown => MediaType::Both,
            configured => configured,
        },
        explicit => explicit,
    }
}

/// Presence decision for one show.
///
/// Fast paths consult the prebuilt index; when the bulk remote listing
/// failed the index is not authoritative and each show falls back to
/// targeted existence checks, audio before video. Check failures count as
/// "not found" and are warned through the process-wide limiter.
async fn classify_presence(
    ctx: &CancellationToken,
    show: &Show,
    artist_name: &str,
    cfg: &Config,
    filter: MediaType,
    presence: &PresenceIndex,
    storage: &dyn StorageProvider,
) -> bool {
    let album_folder = album_folder_name(artist_name, &show.container_info);
    if presence.local_folders.contains(&album_folder) {
        return true;
    }
    if !cfg.rclone_enabled {
        return false;
    }
    if presence.remote_list_err.is_none() {
        return presence.remote_folders.contains(&album_folder);
    }

    let relative = format!("{}/{}", presence.artist_folder, album_folder);
    let mut tiers: Vec<bool> = Vec::new();
    if filter.wants_audio() {
        tiers.push(false);
    }
    if filter.wants_video() {
        tiers.push(true);
    }
    for is_video in tiers {
        match storage.path_exists(ctx, cfg, &relative, is_video).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(err) => warn_remote_check_error(&relative, &err),
        }
    }
    false
}
