use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, NugsError>;

/// Downloader message for containers whose metadata carries no media yet.
pub const NO_CONTENT: &str = "release has no content";

/// Error taxonomy for the mirror core.
///
/// Per-item failures (downloads, per-path remote checks) are captured in
/// result structures by the callers that observe them; only the kinds below
/// propagate as call failures.
#[derive(Debug, Error)]
pub enum NugsError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("no catalog cache at {path}; run `nugs update` first")]
    CacheMissing { path: PathBuf },
    #[error("corrupt cache file {path}: {reason}")]
    CacheCorrupt { path: PathBuf, reason: String },
    #[error("catalog fetch failed: {0}")]
    FetchFailed(String),
    #[error("remote listing failed: {0}")]
    StorageListFailed(String),
    #[error("remote existence check failed{}: {stderr}", exit_suffix(.code))]
    StorageCheckFailed { code: Option<i32>, stderr: String },
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error("post-upload verify failed, local files kept: {0}")]
    VerifyFailed(String),
    #[error("invalid path component in {0:?}")]
    InvalidPath(String),
    #[error("download failed: {0}")]
    DownloadFailed(String),
    #[error("operation cancelled")]
    Cancelled,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("config error: {0}")]
    Config(String),
}

fn exit_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (exit {code})"),
        None => String::new(),
    }
}

impl NugsError {
    /// The sentinel a downloader returns when a container has no
    /// downloadable tracks or videos yet.
    pub fn no_content() -> Self {
        NugsError::DownloadFailed(NO_CONTENT.to_string())
    }

    /// True for the no-content downloader sentinel.
    pub fn is_no_content(&self) -> bool {
        matches!(self, NugsError::DownloadFailed(msg) if msg == NO_CONTENT)
    }

    /// True for the kinds the catalog differ downgrades to a first update.
    pub fn is_first_update_kind(&self) -> bool {
        matches!(
            self,
            NugsError::CacheMissing { .. } | NugsError::CacheCorrupt { .. }
        )
    }
}
