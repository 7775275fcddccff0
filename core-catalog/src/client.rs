//! Remote catalog API client.
//!
//! The catalog backend is a black box reached over HTTP: search, fetch by
//! id, genre listings and radio stations. Audio and stream URLs in its
//! responses may be relative; every URL leaves this module absolute,
//! resolved against the configured base, so no other component ever deals
//! with relative references.

use crate::error::{CatalogError, Result};
use crate::models::{AudioSource, RadioStation, Track, TrackId};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "aria-player-core/0.1.0";

// ============================================================================
// Wire DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
struct TrackDto {
    id: String,
    title: String,
    artist: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponseDto {
    results: Vec<TrackDto>,
}

#[derive(Debug, Deserialize)]
struct StationDto {
    id: String,
    name: String,
    #[serde(default)]
    genre: Option<String>,
    url: String,
    #[serde(default)]
    image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StationsResponseDto {
    results: Vec<StationDto>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDto {
    #[serde(default)]
    detail: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for the remote catalog API.
#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    /// Base URL with any trailing slash removed.
    base: String,
}

impl CatalogClient {
    /// Create a client for the given API base URL.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidBaseUrl`] if the base does not parse as an
    /// absolute HTTP(S) URL.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| CatalogError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(CatalogError::InvalidBaseUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }

        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(CatalogError::Network)?;

        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Wrap an existing `reqwest::Client` (tests, shared pools).
    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        Url::parse(base_url)
            .map_err(|e| CatalogError::InvalidBaseUrl(format!("{base_url}: {e}")))?;
        Ok(Self {
            http,
            base: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Resolve a possibly-relative catalog URL against the API base.
    pub fn normalize_url(&self, raw: &str) -> String {
        if raw.starts_with('/') {
            format!("{}{raw}", self.base)
        } else {
            raw.to_string()
        }
    }

    fn track_from_dto(&self, dto: TrackDto) -> Track {
        let url = dto.url.map(|u| self.normalize_url(&u)).unwrap_or_default();
        Track {
            id: TrackId::new(dto.id),
            title: dto.title,
            artist: dto.artist,
            cover_url: dto.image.map(|u| self.normalize_url(&u)),
            duration_secs: dto.duration.unwrap_or(0.0).max(0.0) as u32,
            source: AudioSource::Remote { url },
        }
    }

    fn station_from_dto(&self, dto: StationDto) -> RadioStation {
        RadioStation {
            stream_url: self.normalize_url(&dto.url),
            id: dto.id,
            name: dto.name,
            genre: dto.genre.unwrap_or_default(),
            image_url: dto.image.map(|u| self.normalize_url(&u)),
        }
    }

    async fn unexpected_status(response: Response) -> CatalogError {
        let status = response.status().as_u16();
        let detail = response
            .json::<ApiErrorDto>()
            .await
            .ok()
            .and_then(|e| e.detail)
            .unwrap_or_else(|| "request failed".to_string());
        CatalogError::UnexpectedStatus { status, detail }
    }

    /// Search the catalog.
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        limit: u32,
        page: u32,
        by_artist: bool,
    ) -> Result<Vec<Track>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("limit", limit.to_string()),
            ("page", page.to_string()),
        ];
        if by_artist {
            params.push(("by_artist", "true".to_string()));
        }

        let response = self
            .http
            .get(format!("{}/api/search", self.base))
            .query(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        let body: SearchResponseDto = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;

        debug!(count = body.results.len(), "search results received");
        Ok(body
            .results
            .into_iter()
            .map(|dto| self.track_from_dto(dto))
            .collect())
    }

    /// Fetch a single track's metadata by id.
    #[instrument(skip(self))]
    pub async fn track(&self, id: &TrackId) -> Result<Track> {
        let response = self
            .http
            .get(format!("{}/api/track/{}", self.base, id))
            .send()
            .await?;

        if response.status().as_u16() == 404 {
            return Err(CatalogError::NotFound(id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        let dto: TrackDto = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(self.track_from_dto(dto))
    }

    /// List tracks of a genre.
    #[instrument(skip(self))]
    pub async fn genre_tracks(&self, genre_id: u32, limit: u32, page: u32) -> Result<Vec<Track>> {
        let response = self
            .http
            .get(format!("{}/api/genre/{genre_id}", self.base))
            .query(&[("limit", limit.to_string()), ("page", page.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        let body: SearchResponseDto = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(body
            .results
            .into_iter()
            .map(|dto| self.track_from_dto(dto))
            .collect())
    }

    /// List available radio stations.
    #[instrument(skip(self))]
    pub async fn radio_stations(&self) -> Result<Vec<RadioStation>> {
        let response = self
            .http
            .get(format!("{}/api/radio", self.base))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::unexpected_status(response).await);
        }

        let body: StationsResponseDto = response
            .json()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))?;
        Ok(body
            .results
            .into_iter()
            .map(|dto| self.station_from_dto(dto))
            .collect())
    }

    /// Probe the API health endpoint. Any failure reads as unhealthy.
    pub async fn health(&self) -> bool {
        match self.http.get(format!("{}/health", self.base)).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// The slice of the catalog the resolver needs: fetch-by-id.
///
/// A seam for tests and alternative backends; [`CatalogClient`] is the
/// production implementation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn fetch_track(&self, id: &TrackId) -> Result<Track>;
}

#[async_trait]
impl RemoteCatalog for CatalogClient {
    async fn fetch_track(&self, id: &TrackId) -> Result<Track> {
        self.track(id).await
    }
}
