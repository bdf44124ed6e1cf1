//! Remote storage behind a provider interface.
//!
//! The reference backend shells out to rclone (`rclone.rs`); alternate
//! backends implement [`StorageProvider`] against the same contract. The
//! progress-line parser lives in `progress.rs`.

pub mod progress;
pub mod rclone;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{NugsError, Result};
use crate::model::UploadProgress;

pub use rclone::RcloneStorage;

/// One upload job: a local album tree destined for an artist folder on the
/// selected media tier.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub local_path: PathBuf,
    pub artist_folder: String,
    pub is_video: bool,
}

/// Observer callbacks for one upload. All optional.
#[derive(Default)]
pub struct UploadHooks {
    /// Called once with the local tree's total byte size, when non-zero.
    pub on_pre_upload: Option<Box<dyn Fn(u64) + Send + Sync>>,
    /// Called for every parsed progress line.
    pub on_progress: Option<Box<dyn Fn(UploadProgress) + Send + Sync>>,
    /// Called after the uploader exits cleanly.
    pub on_complete: Option<Box<dyn Fn() + Send + Sync>>,
    /// Called after a successful verify, immediately before local removal.
    pub on_delete_after_upload: Option<Box<dyn Fn(&Path) + Send + Sync>>,
}

/// Remote storage contract: upload, targeted existence, bulk listing.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Mirrors a local tree to the remote. When `delete_after_upload` is
    /// configured the order is strict: verify, notify, then delete; a
    /// failed verify never deletes.
    async fn upload(
        &self,
        ctx: &CancellationToken,
        cfg: &Config,
        req: &UploadRequest,
        hooks: &UploadHooks,
    ) -> Result<()>;

    /// Whether a remote path exists under the tier's base. Backend
    /// "not found" is `Ok(false)`, not an error.
    async fn path_exists(
        &self,
        ctx: &CancellationToken,
        cfg: &Config,
        remote_path: &str,
        is_video: bool,
    ) -> Result<bool>;

    /// Names of the folders directly under `<base>/<artist_folder>`.
    async fn list_artist_folders(
        &self,
        ctx: &CancellationToken,
        cfg: &Config,
        artist_folder: &str,
        is_video: bool,
    ) -> Result<BTreeSet<String>>;
}

/// Rejects path inputs that could escape or corrupt a command line:
/// embedded NUL, CR, LF, or any `..` segment.
pub fn validate_path_input(input: &str) -> Result<()> {
    if input.contains(['\0', '\r', '\n']) {
        return Err(NugsError::InvalidPath(input.to_string()));
    }
    let has_parent_segment = input
        .split(['/', '\\'])
        .any(|segment| segment == "..");
    if has_parent_segment {
        return Err(NugsError::InvalidPath(input.to_string()));
    }
    Ok(())
}
