//! Pre-computed {local, remote} folder sets for one artist.
//!
//! An index is scoped to the media filter it was built under; callers must
//! not reuse it to answer queries under another filter.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::Config;
use crate::error::Result;
use crate::model::MediaType;
use crate::names::sanitize;
use crate::remote::StorageProvider;

/// Folder presence for one artist across the selected media tiers.
#[derive(Debug, Clone, Default)]
pub struct PresenceIndex {
    /// Sanitized artist folder name used on every tier.
    pub artist_folder: String,
    pub local_folders: BTreeSet<String>,
    pub remote_folders: BTreeSet<String>,
    /// First remote listing failure; when set, `remote_folders` is
    /// incomplete and not authoritative.
    pub remote_list_err: Option<String>,
}

impl PresenceIndex {
    /// Builds the index for `artist_name` under `filter`.
    pub async fn build(
        ctx: &CancellationToken,
        artist_name: &str,
        cfg: &Config,
        filter: MediaType,
        storage: &dyn StorageProvider,
    ) -> Result<PresenceIndex> {
        let artist_folder = sanitize(artist_name);
        let mut index = PresenceIndex {
            artist_folder,
            ..PresenceIndex::default()
        };

        let mut bases: Vec<&Path> = Vec::new();
        if filter.wants_audio() {
            bases.push(&cfg.out_path);
        }
        if filter.wants_video() {
            let video = cfg.video_base();
            if !bases.contains(&video) {
                bases.push(video);
            }
        }
        for base in bases {
            collect_subdirs(&base.join(&index.artist_folder), &mut index.local_folders)?;
        }

        if cfg.rclone_enabled {
            let mut tiers: Vec<bool> = Vec::new();
            if filter.wants_audio() {
                tiers.push(false);
            }
            if filter.wants_video() {
                tiers.push(true);
            }
            for is_video in tiers {
                match storage
                    .list_artist_folders(ctx, cfg, &index.artist_folder, is_video)
                    .await
                {
                    Ok(folders) => index.remote_folders.extend(folders),
                    Err(err) => {
                        // First failure wins; no further remote listings.
                        index.remote_list_err = Some(err.to_string());
                        break;
                    }
                }
            }
        }

        debug!(
            artist = %index.artist_folder,
            local = index.local_folders.len(),
            remote = index.remote_folders.len(),
            remote_err = index.remote_list_err.is_some(),
            "presence index built"
        );
        Ok(index)
    }
}

fn collect_subdirs(dir: &Path, into: &mut BTreeSet<String>) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err.into()),
    };
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            into.insert(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(())
}
