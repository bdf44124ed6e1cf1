//! Wire and cache data model for the catalog mirror.
//!
//! Field names follow the upstream JSON casing (`containerID`, not
//! `containerId`), because the same structs back both the HTTP payloads and
//! the on-disk cache files.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

/// One entry of the recently-added catalog listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentItem {
    #[serde(rename = "containerID")]
    pub container_id: i64,
    #[serde(rename = "artistID")]
    pub artist_id: i64,
    #[serde(rename = "artistName", default)]
    pub artist_name: String,
    #[serde(rename = "dateShort", default)]
    pub date_short: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub venue: String,
    #[serde(rename = "venueCity", default)]
    pub venue_city: String,
    #[serde(rename = "venueState", default)]
    pub venue_state: String,
}

/// Payload half of a catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    #[serde(rename = "recentItems", default)]
    pub recent_items: Vec<RecentItem>,
}

/// Authoritative, whole-fetch listing of recent shows.
///
/// `containerID` is unique within a snapshot; `artistID → artistName` is
/// functional within a snapshot but may change across snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    #[serde(rename = "methodName", default)]
    pub method_name: String,
    #[serde(rename = "Response", default)]
    pub response: CatalogResponse,
}

impl CatalogSnapshot {
    /// Number of distinct artists in the snapshot.
    pub fn artist_count(&self) -> usize {
        self.response
            .recent_items
            .iter()
            .map(|item| item.artist_id)
            .collect::<BTreeSet<_>>()
            .len()
    }
}

/// Sidecar written atomically alongside each snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    #[serde(rename = "lastUpdated", with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    #[serde(rename = "cacheVersion")]
    pub cache_version: String,
    #[serde(rename = "totalShows")]
    pub total_shows: usize,
    #[serde(rename = "totalArtists")]
    pub total_artists: usize,
    #[serde(rename = "apiMethod")]
    pub api_method: String,
    #[serde(rename = "updateDuration")]
    pub update_duration: String,
}

/// Normalized artist name → artist ID, derived from a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistsIndex {
    pub index: BTreeMap<String, i64>,
}

/// Per-container denormalization of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    #[serde(rename = "artistID")]
    pub artist_id: i64,
    #[serde(rename = "artistName", default)]
    pub artist_name: String,
    #[serde(rename = "containerInfo", default)]
    pub container_info: String,
    #[serde(rename = "performanceDate", default)]
    pub performance_date: String,
}

/// Container ID → show facts, derived from a snapshot. Injective by
/// construction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainersIndex {
    pub containers: BTreeMap<i64, ContainerEntry>,
}

/// Per-artist metadata pages as fetched from the catalog service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistMetaFile {
    #[serde(rename = "artistID")]
    pub artist_id: i64,
    #[serde(rename = "cachedAt", with = "time::serde::rfc3339")]
    pub cached_at: OffsetDateTime,
    #[serde(default)]
    pub pages: Vec<Value>,
}

/// Envelope of one artist metadata page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistPage {
    #[serde(rename = "Response", default)]
    pub response: ArtistPageResponse,
}

/// Payload half of an artist metadata page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArtistPageResponse {
    #[serde(default)]
    pub containers: Vec<Show>,
}

/// One show as described by per-artist metadata. Two shows with the same
/// `containerID` denote the same entity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Show {
    #[serde(rename = "containerID", default)]
    pub container_id: i64,
    #[serde(rename = "artistID", default)]
    pub artist_id: i64,
    #[serde(rename = "artistName", default)]
    pub artist_name: String,
    #[serde(rename = "containerInfo", default)]
    pub container_info: String,
    #[serde(rename = "performanceDate", default)]
    pub performance_date: String,
    #[serde(default)]
    pub venue: String,
    #[serde(rename = "availabilityType", default)]
    pub availability_type: String,
    #[serde(rename = "activeState", default)]
    pub active_state: String,
    #[serde(default)]
    pub tracks: Vec<Value>,
    #[serde(default)]
    pub songs: Vec<Value>,
    #[serde(default)]
    pub products: Vec<Value>,
    #[serde(rename = "productFormats", default)]
    pub product_formats: Vec<Value>,
    #[serde(rename = "videoChapters", default)]
    pub video_chapters: Vec<Value>,
}

impl Show {
    /// A show is downloadable when its availability does not mark it as a
    /// placeholder and at least one content collection is populated.
    pub fn is_downloadable(&self) -> bool {
        let available = self.availability_type.is_empty()
            || self.availability_type.eq_ignore_ascii_case("AVAILABLE");
        let has_content = !self.tracks.is_empty()
            || !self.songs.is_empty()
            || !self.products.is_empty()
            || !self.product_formats.is_empty();
        available && has_content
    }
}

/// Media tiers a show can occupy and a user can filter on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Unknown,
    Audio,
    Video,
    Both,
}

impl MediaType {
    /// Parses a user-supplied filter name; anything unrecognized is Unknown.
    pub fn parse(s: &str) -> MediaType {
        match s.trim().to_ascii_lowercase().as_str() {
            "audio" => MediaType::Audio,
            "video" => MediaType::Video,
            "both" => MediaType::Both,
            _ => MediaType::Unknown,
        }
    }

    /// Whether this filter admits a show of media type `show`.
    ///
    /// `Both` covers audio and video; `Unknown` on either side matches
    /// everything. A concrete filter admits only its own tier.
    pub fn admits(self, show: MediaType) -> bool {
        matches!(self, MediaType::Unknown | MediaType::Both)
            || show == MediaType::Unknown
            || self == show
    }

    /// Whether the filter involves the audio tier.
    pub fn wants_audio(self) -> bool {
        !matches!(self, MediaType::Video)
    }

    /// Whether the filter involves the video tier.
    pub fn wants_video(self) -> bool {
        !matches!(self, MediaType::Audio)
    }
}

/// One classified show within an analysis.
#[derive(Debug, Clone, Serialize)]
pub struct ShowStatus {
    #[serde(flatten)]
    pub show: Show,
    pub downloaded: bool,
    #[serde(rename = "mediaType")]
    pub media_type: MediaType,
}

/// Outcome of joining catalog truth with storage presence for one artist.
#[derive(Debug, Clone, Serialize)]
pub struct ArtistCatalogAnalysis {
    #[serde(rename = "artistID")]
    pub artist_id: i64,
    #[serde(rename = "artistName")]
    pub artist_name: String,
    #[serde(rename = "totalShows")]
    pub total_shows: usize,
    pub downloaded: usize,
    pub missing: usize,
    pub shows: Vec<ShowStatus>,
    #[serde(rename = "missingShows")]
    pub missing_shows: Vec<Show>,
    #[serde(rename = "downloadPct")]
    pub download_pct: f64,
    #[serde(rename = "missingPct")]
    pub missing_pct: f64,
    #[serde(rename = "cacheUsed")]
    pub cache_used: bool,
    #[serde(rename = "cacheStaleUse")]
    pub cache_stale_use: bool,
    #[serde(rename = "mediaFilter")]
    pub media_filter: MediaType,
}

/// Existence probe result for one remote path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoteProbe {
    pub path: String,
    pub exists: bool,
    pub error: Option<String>,
}

/// Structured context gathered when a show download fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiagnosticContext {
    #[serde(rename = "availabilityType")]
    pub availability_type: String,
    #[serde(rename = "activeState")]
    pub active_state: String,
    pub tracks: usize,
    pub products: usize,
    #[serde(rename = "productFormats")]
    pub product_formats: usize,
    #[serde(rename = "localAudioPath")]
    pub local_audio_path: String,
    #[serde(rename = "localAudioExists")]
    pub local_audio_exists: bool,
    #[serde(rename = "localVideoPath")]
    pub local_video_path: String,
    #[serde(rename = "localVideoExists")]
    pub local_video_exists: bool,
    #[serde(rename = "remoteRelativePath")]
    pub remote_relative_path: String,
    #[serde(rename = "remoteAudio")]
    pub remote_audio: RemoteProbe,
    #[serde(rename = "remoteVideo")]
    pub remote_video: RemoteProbe,
}

/// One failed download within a gap-fill run.
#[derive(Debug, Clone, Serialize)]
pub struct FailedShow {
    #[serde(rename = "containerID")]
    pub container_id: i64,
    #[serde(rename = "containerInfo")]
    pub container_info: String,
    #[serde(rename = "performanceDate")]
    pub performance_date: String,
    pub error: String,
    pub reason: String,
    pub diagnostic: DiagnosticContext,
}

/// Outcome of one gap-fill run for one artist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GapFillResult {
    #[serde(rename = "artistID")]
    pub artist_id: i64,
    #[serde(rename = "artistName")]
    pub artist_name: String,
    #[serde(rename = "totalMissing")]
    pub total_missing: usize,
    pub attempted: usize,
    pub downloaded: usize,
    pub failed: usize,
    pub remaining: usize,
    pub interrupted: bool,
    #[serde(rename = "failedShows")]
    pub failed_shows: Vec<FailedShow>,
}

/// Progress of one upload session as reported by the external uploader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    pub percent: u8,
    pub speed: String,
    pub uploaded: String,
    pub total: String,
}

/// Position within a batch of sequential album downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    #[serde(rename = "totalAlbums")]
    pub total_albums: usize,
    pub complete: usize,
    pub failed: usize,
    #[serde(rename = "currentAlbum")]
    pub current_album: usize,
}

/// Quality selection handed through to the downloader collaborator.
#[derive(Debug, Clone, Default)]
pub struct StreamParams {
    pub audio_format: Option<String>,
    pub video_format: Option<String>,
}
