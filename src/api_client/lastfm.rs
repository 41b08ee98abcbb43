//! Last.fm implementation of the metadata and image sources.
//!
//! Tags, similar artists and album data come from the JSON web service. Artist
//! pictures aren't exposed by the API, so they're read from the `og:image` meta
//! tag of the artist's page on the website.

use super::{ArtistMetadata, EnrichmentFetchError, ImageSource, MetadataSource, TrackAlbum};
use crate::configuration::ApiSettings;
use crate::foundation::store::MAX_SIMILAR_ARTISTS;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

/// Image hash Last.fm serves when an artist has no picture.
const PLACEHOLDER_IMAGE_ID: &str = "2a96cbd8b46e442fc41c2b86b821562f";

/// Index of the `large` entry in Last.fm image lists.
const LARGE_IMAGE_INDEX: usize = 2;

const USER_AGENT: &str = concat!("funnytunes/", env!("CARGO_PKG_VERSION"));

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("static regex"));
static OG_IMAGE_PROPERTY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)property\s*=\s*["']og:image["']"#).expect("static regex")
});
static CONTENT_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)content\s*=\s*["']([^"']*)["']"#).expect("static regex")
});

pub struct LastFmClient {
    client: Client,
    settings: ApiSettings,
}

impl LastFmClient {
    pub fn new(settings: &ApiSettings) -> Result<Self, EnrichmentFetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            settings: settings.clone(),
        })
    }

    async fn call(&self, method: &str, params: &[(&str, &str)]) -> Result<Value, EnrichmentFetchError> {
        let response = self
            .client
            .get(&self.settings.base_url)
            .query(&[
                ("method", method),
                ("api_key", self.settings.api_key.as_str()),
                ("autocorrect", "1"),
                ("format", "json"),
            ])
            .query(params)
            .send()
            .await?;

        // Last.fm reports most errors as a JSON body, sometimes with a 4xx status.
        let body: Value = response.json().await?;
        check_api_error(&body)?;
        Ok(body)
    }

    fn artist_page_url(&self, artist: &str) -> Result<Url, EnrichmentFetchError> {
        let mut url = Url::parse(&self.settings.page_base_url)
            .map_err(|e| EnrichmentFetchError::InvalidUrl(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| EnrichmentFetchError::InvalidUrl(self.settings.page_base_url.clone()))?
            .pop_if_empty()
            .push("music")
            .push(artist);
        Ok(url)
    }
}

#[async_trait]
impl MetadataSource for LastFmClient {
    async fn artist_metadata(&self, artist: &str) -> Result<ArtistMetadata, EnrichmentFetchError> {
        let body = self.call("artist.getinfo", &[("artist", artist)]).await?;
        parse_artist_info(&body)
    }

    async fn track_album(
        &self,
        track: &str,
        artist: &str,
    ) -> Result<TrackAlbum, EnrichmentFetchError> {
        let body = self
            .call("track.getInfo", &[("track", track), ("artist", artist)])
            .await?;
        parse_track_info(&body)
    }
}

#[async_trait]
impl ImageSource for LastFmClient {
    async fn resolve_artist_image_url(
        &self,
        artist: &str,
    ) -> Result<Option<String>, EnrichmentFetchError> {
        let url = self.artist_page_url(artist)?;
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(artist, "No artist page");
            return Ok(None);
        }

        let html = response.error_for_status()?.text().await?;
        Ok(extract_og_image(&html))
    }

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, EnrichmentFetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

fn check_api_error(body: &Value) -> Result<(), EnrichmentFetchError> {
    match body.get("error") {
        Some(code) => Err(EnrichmentFetchError::Api {
            code: code.as_i64().unwrap_or(0),
            message: body["message"]
                .as_str()
                .unwrap_or("Unknown error")
                .to_string(),
        }),
        None => Ok(()),
    }
}

/// Last.fm collapses one-element lists into a bare object.
fn as_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => Vec::new(),
    }
}

fn names(list: &Value) -> Vec<String> {
    as_list(list)
        .into_iter()
        .filter_map(|item| item["name"].as_str())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads tags and similar artists out of an `artist.getinfo` response.
pub fn parse_artist_info(body: &Value) -> Result<ArtistMetadata, EnrichmentFetchError> {
    let artist = body
        .get("artist")
        .ok_or(EnrichmentFetchError::MissingField("artist"))?;

    let tags = names(&artist["tags"]["tag"]);
    let mut similar_artists = names(&artist["similar"]["artist"]);
    similar_artists.truncate(MAX_SIMILAR_ARTISTS);

    Ok(ArtistMetadata {
        tags,
        similar_artists,
    })
}

/// Reads the album title and cover URL out of a `track.getInfo` response.
pub fn parse_track_info(body: &Value) -> Result<TrackAlbum, EnrichmentFetchError> {
    let track = body
        .get("track")
        .ok_or(EnrichmentFetchError::MissingField("track"))?;

    let Some(album) = track.get("album") else {
        return Ok(TrackAlbum::Single);
    };

    let title = album["title"]
        .as_str()
        .ok_or(EnrichmentFetchError::MissingField("album.title"))?
        .to_string();

    let images = as_list(&album["image"]);
    let cover_url = images
        .iter()
        .find(|image| image["size"] == "large")
        .or_else(|| images.get(LARGE_IMAGE_INDEX))
        .and_then(|image| image["#text"].as_str())
        .unwrap_or_default()
        .to_string();

    Ok(TrackAlbum::Album { title, cover_url })
}

/// Finds the `og:image` URL in an HTML page, ignoring Last.fm's placeholder.
pub fn extract_og_image(html: &str) -> Option<String> {
    META_TAG
        .find_iter(html)
        .map(|tag| tag.as_str())
        .filter(|tag| OG_IMAGE_PROPERTY.is_match(tag))
        .find_map(|tag| CONTENT_ATTRIBUTE.captures(tag))
        .map(|caps| caps[1].replace("&amp;", "&"))
        .filter(|url| !url.is_empty() && !url.contains(PLACEHOLDER_IMAGE_ID))
}
