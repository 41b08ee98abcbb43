use std::fmt;

/// One unit of best-effort enrichment work. Two tasks are the same task when
/// they are structurally equal; the queue runs each at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EnrichmentTask {
    FetchArtistMetadata { artist: String },
    FetchArtistImage { artist: String },
    FetchTrackImage { track: String, artist: String },
}

impl EnrichmentTask {
    pub fn artist_metadata(artist: &str) -> Self {
        Self::FetchArtistMetadata {
            artist: artist.to_string(),
        }
    }

    pub fn artist_image(artist: &str) -> Self {
        Self::FetchArtistImage {
            artist: artist.to_string(),
        }
    }

    pub fn track_image(track: &str, artist: &str) -> Self {
        Self::FetchTrackImage {
            track: track.to_string(),
            artist: artist.to_string(),
        }
    }

    pub fn artist(&self) -> &str {
        match self {
            Self::FetchArtistMetadata { artist }
            | Self::FetchArtistImage { artist }
            | Self::FetchTrackImage { artist, .. } => artist,
        }
    }
}

impl fmt::Display for EnrichmentTask {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::FetchArtistMetadata { artist } => write!(f, "metadata for {artist}"),
            Self::FetchArtistImage { artist } => write!(f, "picture of {artist}"),
            Self::FetchTrackImage { track, artist } => write!(f, "cover of {artist} - {track}"),
        }
    }
}
