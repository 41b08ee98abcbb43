use super::OrderedMap;
use serde::{Deserialize, Serialize};

/// Most similar artists kept per artist.
pub const MAX_SIMILAR_ARTISTS: usize = 3;

/// A single row of a streaming-history export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayEvent {
    pub artist_name: String,
    pub track_name: String,
    pub ms_played: u64,
}

impl PlayEvent {
    pub fn new(artist_name: &str, track_name: &str, ms_played: u64) -> Self {
        Self {
            artist_name: artist_name.to_string(),
            track_name: track_name.to_string(),
            ms_played,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackStats {
    pub listens: u64,
    /// File name of the cover art inside the artist's image directory.
    #[serde(rename = "file", default, skip_serializing_if = "Option::is_none")]
    pub cover_file: Option<String>,
    #[serde(rename = "album", default, skip_serializing_if = "Option::is_none")]
    pub album_name: Option<String>,
}

impl TrackStats {
    pub fn first_listen() -> Self {
        Self {
            listens: 1,
            cover_file: None,
            album_name: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ArtistStats {
    #[serde(rename = "totalListening")]
    pub total_listening_ms: u64,
    pub tracks: OrderedMap<TrackStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(rename = "similar", default, skip_serializing_if = "Option::is_none")]
    pub similar_artists: Option<Vec<String>>,
}

/// Everything known about a user's listening, keyed by artist name.
///
/// Artists are kept in the order the aggregator ranked them; that order is what
/// ranking views fall back on when two entries tie.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatisticsDocument {
    pub artists: OrderedMap<ArtistStats>,
}

impl StatisticsDocument {
    pub fn artist(&self, name: &str) -> Option<&ArtistStats> {
        self.artists.get(name)
    }

    pub fn track(&self, artist: &str, track: &str) -> Option<&TrackStats> {
        self.artists.get(artist)?.tracks.get(track)
    }

    /// Sets tags and similar artists together, unless the artist already has
    /// tags. Returns whether anything changed.
    pub fn merge_artist_metadata(
        &mut self,
        artist: &str,
        tags: Vec<String>,
        similar_artists: Vec<String>,
    ) -> bool {
        let Some(stats) = self.artists.get_mut(artist) else {
            return false;
        };
        if stats.tags.is_some() {
            return false;
        }

        let mut unique_tags: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            if !unique_tags.contains(&tag) {
                unique_tags.push(tag);
            }
        }

        stats.tags = Some(unique_tags);
        if !similar_artists.is_empty() {
            stats.similar_artists = Some(
                similar_artists
                    .into_iter()
                    .take(MAX_SIMILAR_ARTISTS)
                    .collect(),
            );
        }
        true
    }

    /// Sets a track's album and cover file together, unless the album is
    /// already known. Returns whether anything changed.
    pub fn merge_track_album(
        &mut self,
        artist: &str,
        track: &str,
        album_name: String,
        cover_file: Option<String>,
    ) -> bool {
        let Some(stats) = self
            .artists
            .get_mut(artist)
            .and_then(|a| a.tracks.get_mut(track))
        else {
            return false;
        };
        if stats.album_name.is_some() {
            return false;
        }

        stats.album_name = Some(album_name);
        stats.cover_file = cover_file;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document_with(artist: &str, track: &str) -> StatisticsDocument {
        let mut doc = StatisticsDocument::default();
        let stats = doc
            .artists
            .get_or_insert_with(artist, ArtistStats::default);
        stats.total_listening_ms = 60_000;
        stats
            .tracks
            .insert(track.to_string(), TrackStats::first_listen());
        doc
    }

    #[test]
    fn test_merge_artist_metadata_is_applied_once() {
        let mut doc = document_with("A", "T");
        let tags = vec!["rock".to_string(), "pop".to_string(), "rock".to_string()];
        let similar = vec!["B", "C", "D", "E"]
            .into_iter()
            .map(String::from)
            .collect();

        assert!(doc.merge_artist_metadata("A", tags, similar));
        let artist = doc.artist("A").unwrap();
        assert_eq!(artist.tags.as_deref(), Some(&["rock".to_string(), "pop".to_string()][..]));
        assert_eq!(artist.similar_artists.as_ref().unwrap().len(), 3);

        assert!(!doc.merge_artist_metadata("A", vec!["jazz".to_string()], Vec::new()));
        assert_eq!(doc.artist("A").unwrap().tags.as_ref().unwrap()[0], "rock");
    }

    #[test]
    fn test_merge_artist_metadata_without_similar_artists() {
        let mut doc = document_with("A", "T");
        assert!(doc.merge_artist_metadata("A", vec!["folk".to_string()], Vec::new()));
        assert!(doc.artist("A").unwrap().similar_artists.is_none());
    }

    #[test]
    fn test_merge_ignores_unknown_targets() {
        let mut doc = document_with("A", "T");
        assert!(!doc.merge_artist_metadata("Z", Vec::new(), Vec::new()));
        assert!(!doc.merge_track_album("A", "missing", "Album".into(), None));
        assert!(!doc.merge_track_album("Z", "T", "Album".into(), None));
    }

    #[test]
    fn test_merge_track_album_is_applied_once() {
        let mut doc = document_with("A", "T");
        assert!(doc.merge_track_album("A", "T", "First".into(), Some("First.png".into())));
        assert!(!doc.merge_track_album("A", "T", "Second".into(), Some("Second.png".into())));

        let track = doc.track("A", "T").unwrap();
        assert_eq!(track.album_name.as_deref(), Some("First"));
        assert_eq!(track.cover_file.as_deref(), Some("First.png"));
    }

    #[test]
    fn test_json_layout_matches_listening_db() {
        let mut doc = document_with("A", "T");
        doc.merge_track_album("A", "T", "Album".into(), Some("Album.jpg".into()));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["A"]["totalListening"], 60_000);
        assert_eq!(json["A"]["tracks"]["T"]["listens"], 1);
        assert_eq!(json["A"]["tracks"]["T"]["file"], "Album.jpg");
        assert_eq!(json["A"]["tracks"]["T"]["album"], "Album");
        assert!(json["A"].get("tags").is_none());
    }
}
