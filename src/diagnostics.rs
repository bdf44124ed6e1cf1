//! Failure triage for one show: probe the expected local and remote
//! locations and synthesize a structured reason hint.

use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::NugsError;
use crate::model::{DiagnosticContext, RemoteProbe, Show};
use crate::names::{album_folder_name, sanitize};
use crate::remote::StorageProvider;

/// Probes the paths a download for `show` would have produced.
pub async fn build_diagnostics(
    ctx: &CancellationToken,
    show: &Show,
    cfg: &Config,
    storage: &dyn StorageProvider,
) -> DiagnosticContext {
    let artist_folder = sanitize(&show.artist_name);
    let album_folder = album_folder_name(&show.artist_name, &show.container_info);
    let local_audio = cfg.out_path.join(&artist_folder).join(&album_folder);
    let local_video = cfg.video_base().join(&artist_folder).join(&album_folder);
    let remote_relative = format!("{artist_folder}/{album_folder}");

    let mut diag = DiagnosticContext {
        availability_type: show.availability_type.clone(),
        active_state: show.active_state.clone(),
        tracks: show.tracks.len(),
        products: show.products.len(),
        product_formats: show.product_formats.len(),
        local_audio_path: local_audio.display().to_string(),
        local_audio_exists: exists(&local_audio),
        local_video_path: local_video.display().to_string(),
        local_video_exists: exists(&local_video),
        remote_relative_path: remote_relative.clone(),
        ..DiagnosticContext::default()
    };

    if cfg.rclone_enabled {
        diag.remote_audio = probe_remote(ctx, cfg, storage, &remote_relative, false).await;
        diag.remote_video = probe_remote(ctx, cfg, storage, &remote_relative, true).await;
    }
    diag
}

/// Most-specific explanation for a failed download, in priority order.
pub fn reason_hint(diag: &DiagnosticContext, downloader_err: &NugsError) -> &'static str {
    let placeholder = !diag.availability_type.is_empty()
        && !diag.availability_type.eq_ignore_ascii_case("AVAILABLE")
        && diag.tracks == 0
        && diag.products == 0
        && diag.product_formats == 0;
    if placeholder {
        return "Preorder/placeholder container (not released yet)";
    }
    if diag.local_audio_exists || diag.local_video_exists {
        return "Already exists locally (naming/path mismatch likely)";
    }
    if diag.remote_audio.exists || diag.remote_video.exists {
        return "Already exists on remote (naming/path mismatch likely)";
    }
    if diag.remote_audio.error.is_some() || diag.remote_video.error.is_some() {
        return "Remote existence check failed";
    }
    if downloader_err.is_no_content() {
        return "Metadata has no downloadable tracks/videos yet";
    }
    "No content found at expected local/remote paths"
}

async fn probe_remote(
    ctx: &CancellationToken,
    cfg: &Config,
    storage: &dyn StorageProvider,
    relative: &str,
    is_video: bool,
) -> RemoteProbe {
    match storage.path_exists(ctx, cfg, relative, is_video).await {
        Ok(exists) => RemoteProbe {
            path: relative.to_string(),
            exists,
            error: None,
        },
        Err(err) => RemoteProbe {
            path: relative.to_string(),
            exists: false,
            error: Some(err.to_string()),
        },
    }
}

fn exists(path: &Path) -> bool {
    fs::metadata(path).is_ok()
}
