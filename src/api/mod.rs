//! Thin HTTP client for the upstream catalog service, plus the TTL-governed
//! read-through cache for per-artist metadata.
//!
//! Token acquisition is out of scope; a pre-acquired bearer token comes
//! from the config and is attached as-is.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::Config;
use crate::contracts::{ArtistMeta, ArtistMetaFetcher, CatalogFetcher};
use crate::error::{NugsError, Result};
use crate::model::CatalogSnapshot;

const CATALOG_METHOD: &str = "catalog.recentlyAddedContainers";
const ARTIST_METHOD: &str = "catalog.containersAll";
const ARTIST_PAGE_LIMIT: usize = 100;

/// HTTP client for the catalog API.
#[derive(Debug, Clone)]
pub struct NugsClient {
    http: reqwest::Client,
    base: String,
    token: String,
}

impl NugsClient {
    /// Builds a client from the configured base URL and bearer token.
    pub fn from_config(cfg: &Config) -> Result<NugsClient> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("nugs/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|err| NugsError::FetchFailed(err.to_string()))?;
        Ok(NugsClient {
            http,
            base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.api_token.clone(),
        })
    }

    async fn get_json(&self, ctx: &CancellationToken, url: &str) -> Result<Value> {
        let mut request = self.http.get(url);
        if !self.token.is_empty() {
            request = request.bearer_auth(&self.token);
        }
        let response = tokio::select! {
            _ = ctx.cancelled() => return Err(NugsError::Cancelled),
            response = request.send() => {
                response.map_err(|err| NugsError::FetchFailed(err.to_string()))?
            }
        };
        let response = response
            .error_for_status()
            .map_err(|err| NugsError::FetchFailed(err.to_string()))?;
        tokio::select! {
            _ = ctx.cancelled() => Err(NugsError::Cancelled),
            body = response.json() => {
                body.map_err(|err| NugsError::FetchFailed(err.to_string()))
            }
        }
    }

    /// Fetches every metadata page for one artist.
    async fn fetch_artist_pages(
        &self,
        ctx: &CancellationToken,
        artist_id: i64,
    ) -> Result<Vec<Value>> {
        let mut pages = Vec::new();
        let mut offset = 1usize;
        loop {
            let url = format!(
                "{}/api.aspx?method={ARTIST_METHOD}&artistList={artist_id}\
                 &limit={ARTIST_PAGE_LIMIT}&startOffset={offset}",
                self.base
            );
            let page = self.get_json(ctx, &url).await?;
            let received = page
                .pointer("/Response/containers")
                .and_then(Value::as_array)
                .map(Vec::len)
                .unwrap_or(0);
            pages.push(page);
            if received < ARTIST_PAGE_LIMIT {
                break;
            }
            offset += received;
        }
        debug!(artist_id, pages = pages.len(), "artist metadata fetched");
        Ok(pages)
    }
}

#[async_trait]
impl CatalogFetcher for NugsClient {
    async fn fetch(&self, ctx: &CancellationToken) -> Result<CatalogSnapshot> {
        let url = format!("{}/api.aspx?method={CATALOG_METHOD}", self.base);
        let value = self.get_json(ctx, &url).await?;
        serde_json::from_value(value)
            .map_err(|err| NugsError::FetchFailed(format!("malformed catalog payload: {err}")))
    }
}

/// Read-through artist metadata with three-valued freshness: fresh cache,
/// fetched, or stale-fallback when a refresh fails.
pub struct ArtistMetaService {
    client: NugsClient,
    store: CacheStore,
}

impl ArtistMetaService {
    pub fn new(client: NugsClient, store: CacheStore) -> ArtistMetaService {
        ArtistMetaService { client, store }
    }
}

#[async_trait]
impl ArtistMetaFetcher for ArtistMetaService {
    async fn get(
        &self,
        ctx: &CancellationToken,
        artist_id: i64,
        ttl: Duration,
    ) -> Result<ArtistMeta> {
        let cached = self.store.read_artist_meta(artist_id).ok();
        if let Some(file) = &cached {
            let age = time::OffsetDateTime::now_utc() - file.cached_at;
            if age < ttl {
                return Ok(ArtistMeta {
                    pages: file.pages.clone(),
                    cache_used: true,
                    cache_stale_use: false,
                });
            }
        }
        match self.client.fetch_artist_pages(ctx, artist_id).await {
            Ok(pages) => {
                self.store.write_artist_meta(artist_id, &pages)?;
                Ok(ArtistMeta {
                    pages,
                    cache_used: false,
                    cache_stale_use: false,
                })
            }
            Err(NugsError::Cancelled) => Err(NugsError::Cancelled),
            Err(err) => match cached {
                // Stale pages beat no pages, but only when a refresh failed.
                Some(file) => {
                    warn!(artist_id, %err, "metadata refresh failed, using stale cache");
                    Ok(ArtistMeta {
                        pages: file.pages,
                        cache_used: true,
                        cache_stale_use: true,
                    })
                }
                None => Err(err),
            },
        }
    }
}
