//! Durable, crash-safe persistence of the catalog snapshot and its derived
//! indexes.
//!
//! Every mutation goes through the atomic multi-file protocol: take the
//! cross-process lock, write each file to a sibling temp file, fsync, and
//! rename into place. There is no multi-file atomic rename, so readers must
//! re-derive counts from the snapshot rather than trusting the meta sidecar
//! during a legal interleaving.

pub mod lock;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::{NugsError, Result};
use crate::model::{
    ArtistMetaFile, ArtistsIndex, CacheMeta, CatalogSnapshot, ContainerEntry, ContainersIndex,
};
use crate::names::artist_index_key;
use lock::CacheLock;

/// Bumped when the on-disk layout changes shape.
pub const CACHE_VERSION: &str = "2";

const CATALOG_FILE: &str = "catalog.json";
const META_FILE: &str = "catalog-meta.json";
const ARTISTS_INDEX_FILE: &str = "artists_index.json";
const CONTAINERS_INDEX_FILE: &str = "containers_index.json";
const LOCK_FILE: &str = ".lock";
const ARTISTS_DIR: &str = "artists";

/// Owner of the cache directory's contents. No other component writes
/// there.
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Opens the per-user cache at `<home>/.cache/nugs`, creating it with
    /// user-only permissions when absent.
    pub fn open_default() -> Result<CacheStore> {
        let home = dirs::home_dir()
            .ok_or_else(|| NugsError::Config("cannot resolve home directory".into()))?;
        CacheStore::at(home.join(".cache").join("nugs"))
    }

    /// Opens a cache rooted at an explicit directory.
    pub fn at(dir: PathBuf) -> Result<CacheStore> {
        fs::create_dir_all(&dir)?;
        restrict_dir(&dir)?;
        Ok(CacheStore { dir })
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the meta sidecar. Absence is not an error.
    pub fn read_meta(&self) -> Result<Option<CacheMeta>> {
        let path = self.dir.join(META_FILE);
        match read_json(&path) {
            Ok(meta) => Ok(Some(meta)),
            Err(NugsError::CacheMissing { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads the catalog snapshot. Distinguishes "no cache" from "corrupt
    /// cache" so callers can decide.
    pub fn read_catalog(&self) -> Result<CatalogSnapshot> {
        read_json(&self.dir.join(CATALOG_FILE))
    }

    /// Reads the containers index.
    pub fn read_containers_index(&self) -> Result<ContainersIndex> {
        read_json(&self.dir.join(CONTAINERS_INDEX_FILE))
    }

    /// Reads the artists index.
    pub fn read_artists_index(&self) -> Result<ArtistsIndex> {
        read_json(&self.dir.join(ARTISTS_INDEX_FILE))
    }

    /// Atomically replaces the snapshot, meta sidecar, and both derived
    /// indexes under the cross-process lock. Everything on disk after a
    /// successful call is derived from the same in-memory snapshot.
    pub fn write_catalog(
        &self,
        snapshot: &CatalogSnapshot,
        update_duration: Duration,
    ) -> Result<CacheMeta> {
        let _lock = CacheLock::acquire(&self.dir.join(LOCK_FILE))?;
        let meta = CacheMeta {
            last_updated: OffsetDateTime::now_utc(),
            cache_version: CACHE_VERSION.to_string(),
            total_shows: snapshot.response.recent_items.len(),
            total_artists: snapshot.artist_count(),
            api_method: snapshot.method_name.clone(),
            update_duration: format_duration(update_duration),
        };
        let artists = derive_artists_index(snapshot);
        let containers = derive_containers_index(snapshot);

        atomic_write_json(&self.dir, CATALOG_FILE, snapshot)?;
        atomic_write_json(&self.dir, META_FILE, &meta)?;
        atomic_write_json(&self.dir, ARTISTS_INDEX_FILE, &artists)?;
        atomic_write_json(&self.dir, CONTAINERS_INDEX_FILE, &containers)?;
        debug!(
            shows = meta.total_shows,
            artists = meta.total_artists,
            "catalog cache written"
        );
        Ok(meta)
    }

    /// Reads cached per-artist metadata. Absence is an error; the caller
    /// decides between cache-miss and fatal.
    pub fn read_artist_meta(&self, artist_id: i64) -> Result<ArtistMetaFile> {
        read_json(&self.artist_meta_path(artist_id))
    }

    /// Atomically replaces the cached metadata for one artist.
    pub fn write_artist_meta(&self, artist_id: i64, pages: &[Value]) -> Result<()> {
        let artists_dir = self.dir.join(ARTISTS_DIR);
        fs::create_dir_all(&artists_dir)?;
        restrict_dir(&artists_dir)?;
        let file = ArtistMetaFile {
            artist_id,
            cached_at: OffsetDateTime::now_utc(),
            pages: pages.to_vec(),
        };
        atomic_write_json(
            &artists_dir,
            &format!("artist_{artist_id}.json"),
            &file,
        )
    }

    fn artist_meta_path(&self, artist_id: i64) -> PathBuf {
        self.dir
            .join(ARTISTS_DIR)
            .join(format!("artist_{artist_id}.json"))
    }
}

/// Normalized artist name → ID. Later snapshot entries win on collision.
pub fn derive_artists_index(snapshot: &CatalogSnapshot) -> ArtistsIndex {
    let mut index = ArtistsIndex::default();
    for item in &snapshot.response.recent_items {
        let key = artist_index_key(&item.artist_name);
        if key.is_empty() {
            continue;
        }
        index.index.insert(key, item.artist_id);
    }
    index
}

/// Container ID → show facts.
pub fn derive_containers_index(snapshot: &CatalogSnapshot) -> ContainersIndex {
    let mut index = ContainersIndex::default();
    for item in &snapshot.response.recent_items {
        index.containers.insert(
            item.container_id,
            ContainerEntry {
                artist_id: item.artist_id,
                artist_name: item.artist_name.clone(),
                container_info: item.title.clone(),
                performance_date: item.date_short.clone(),
            },
        );
    }
    index
}

fn format_duration(duration: Duration) -> String {
    // Millisecond precision keeps the formatted value short and stable.
    humantime::format_duration(Duration::from_millis(duration.as_millis() as u64)).to_string()
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(NugsError::CacheMissing {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(err.into()),
    };
    serde_json::from_str(&contents).map_err(|err| NugsError::CacheCorrupt {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Write-to-temp, fsync, rename-over. Rename within one directory is
/// atomic; a failed write leaves the previous file intact and the temp file
/// is removed on drop.
fn atomic_write_json<T: Serialize>(dir: &Path, file_name: &str, value: &T) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, value)?;
    tmp.write_all(b"\n")?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    restrict_file(tmp.path())?;
    tmp.persist(dir.join(file_name))
        .map_err(|err| NugsError::Io(err.error))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(unix)]
fn restrict_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn restrict_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn restrict_file(_path: &Path) -> Result<()> {
    Ok(())
}
