//! Collaborator interfaces the core consumes. Implementations are
//! constructed once at boot and passed explicitly; there are no ambient
//! globals for behavior.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::model::{BatchProgress, CatalogSnapshot, MediaType, Show, StreamParams};

/// Fetches a whole catalog snapshot from the upstream service.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, ctx: &CancellationToken) -> Result<CatalogSnapshot>;
}

/// Per-artist metadata pages plus cache provenance.
#[derive(Debug, Clone, Default)]
pub struct ArtistMeta {
    pub pages: Vec<Value>,
    /// The pages came from the local cache rather than a fresh fetch.
    pub cache_used: bool,
    /// The cached pages were past their TTL and used only because a fresh
    /// fetch failed.
    pub cache_stale_use: bool,
}

/// TTL-governed read-through access to per-artist metadata.
#[async_trait]
pub trait ArtistMetaFetcher: Send + Sync {
    async fn get(
        &self,
        ctx: &CancellationToken,
        artist_id: i64,
        ttl: Duration,
    ) -> Result<ArtistMeta>;
}

/// Decides which media tier a show occupies.
pub trait ShowMediaClassifier: Send + Sync {
    fn classify(&self, show: &Show) -> MediaType;
}

/// Tier assignment from the show's own metadata: video chapters mark the
/// video tier, track listings mark audio, and a show with neither defaults
/// to audio. Product SKUs say nothing about the tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMediaClassifier;

impl ShowMediaClassifier for DefaultMediaClassifier {
    fn classify(&self, show: &Show) -> MediaType {
        let has_video = !show.video_chapters.is_empty();
        let has_audio = !show.tracks.is_empty() || !show.songs.is_empty();
        match (has_audio, has_video) {
            (true, true) => MediaType::Both,
            (false, true) => MediaType::Video,
            _ => MediaType::Audio,
        }
    }
}

/// Fetches one album/show into the local tier.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn album(
        &self,
        ctx: &CancellationToken,
        container_id: i64,
        cfg: &Config,
        params: &StreamParams,
        batch: BatchProgress,
    ) -> Result<()>;
}

/// Delivers user-facing notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(
        &self,
        ctx: &CancellationToken,
        title: &str,
        message: &str,
        priority: i64,
    ) -> Result<()>;
}

/// Notifier that writes to the log instead of a push service.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        _ctx: &CancellationToken,
        title: &str,
        message: &str,
        priority: i64,
    ) -> Result<()> {
        info!(%title, %message, priority, "notification");
        Ok(())
    }
}

/// Shared progress register: set at the start of a batch, cleared at the
/// end, through this single setter.
pub trait ProgressSink: Send + Sync {
    fn set_batch(&self, state: Option<BatchProgress>);
}

/// Progress sink that ignores updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn set_batch(&self, _state: Option<BatchProgress>) {}
}
