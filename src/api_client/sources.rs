use super::EnrichmentFetchError;
use async_trait::async_trait;

/// Genre tags and related artists for one artist.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtistMetadata {
    pub tags: Vec<String>,
    pub similar_artists: Vec<String>,
}

/// Which release a track belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackAlbum {
    /// The track is on an album. `cover_url` may be empty when no art exists.
    Album { title: String, cover_url: String },
    /// Released as a single; there's no album to show.
    Single,
}

/// Remote source of artist and track metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn artist_metadata(&self, artist: &str) -> Result<ArtistMetadata, EnrichmentFetchError>;

    async fn track_album(
        &self,
        track: &str,
        artist: &str,
    ) -> Result<TrackAlbum, EnrichmentFetchError>;
}

/// Remote source of artist pictures and image bytes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// The URL of the artist's profile picture, or `None` when there isn't
    /// one (unknown artist, or an image withheld for copyright reasons).
    async fn resolve_artist_image_url(
        &self,
        artist: &str,
    ) -> Result<Option<String>, EnrichmentFetchError>;

    async fn fetch_image_bytes(&self, url: &str) -> Result<Vec<u8>, EnrichmentFetchError>;
}
