//! Read-only "top N" projections over the statistics document.
//!
//! Nothing here is cached: the document keeps changing while enrichment runs,
//! so callers re-derive views whenever they are notified of a change. Sorting
//! is stable, so entries that tie keep the document's order.

use crate::foundation::store::StatisticsDocument;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistRank {
    pub name: String,
    pub total_listening_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRank {
    pub track: String,
    pub artist: String,
    pub listens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenreRank {
    pub name: String,
    pub count: usize,
}

/// Artists with the most listening time.
pub fn top_artists(doc: &StatisticsDocument, n: usize) -> Vec<ArtistRank> {
    let mut ranked: Vec<ArtistRank> = doc
        .artists
        .iter()
        .map(|(name, stats)| ArtistRank {
            name: name.to_string(),
            total_listening_ms: stats.total_listening_ms,
        })
        .collect();

    ranked.sort_by(|a, b| b.total_listening_ms.cmp(&a.total_listening_ms));
    ranked.truncate(n);
    ranked
}

/// Most played tracks across all artists.
pub fn top_tracks(doc: &StatisticsDocument, n: usize) -> Vec<TrackRank> {
    let mut ranked: Vec<TrackRank> = doc
        .artists
        .iter()
        .flat_map(|(artist, stats)| {
            stats.tracks.iter().map(move |(track, t)| TrackRank {
                track: track.to_string(),
                artist: artist.to_string(),
                listens: t.listens,
            })
        })
        .collect();

    ranked.sort_by(|a, b| b.listens.cmp(&a.listens));
    ranked.truncate(n);
    ranked
}

/// Most common tags over all artists that have been enriched so far.
pub fn top_genres(doc: &StatisticsDocument, n: usize) -> Vec<GenreRank> {
    let mut ranked: Vec<GenreRank> = Vec::new();
    let mut positions: HashMap<&str, usize> = HashMap::new();

    let tags = doc
        .artists
        .values()
        .filter_map(|stats| stats.tags.as_deref())
        .flatten();
    for tag in tags {
        match positions.get(tag.as_str()) {
            Some(&i) => ranked[i].count += 1,
            None => {
                positions.insert(tag, ranked.len());
                ranked.push(GenreRank {
                    name: tag.clone(),
                    count: 1,
                });
            }
        }
    }

    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(n);
    ranked
}

/// An artist's own most played tracks.
pub fn artist_top_tracks(doc: &StatisticsDocument, artist: &str, n: usize) -> Vec<TrackRank> {
    let Some(stats) = doc.artist(artist) else {
        return Vec::new();
    };

    let mut ranked: Vec<TrackRank> = stats
        .tracks
        .iter()
        .map(|(track, t)| TrackRank {
            track: track.to_string(),
            artist: artist.to_string(),
            listens: t.listens,
        })
        .collect();

    ranked.sort_by(|a, b| b.listens.cmp(&a.listens));
    ranked.truncate(n);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::store::{ArtistStats, PlayEvent, TrackStats};
    use crate::process::{aggregate, UNKNOWN_ARTIST};

    fn tagged(doc: &mut StatisticsDocument, artist: &str, tags: &[&str]) {
        let stats = doc.artists.get_or_insert_with(artist, ArtistStats::default);
        stats.tags = Some(tags.iter().map(|t| t.to_string()).collect());
    }

    fn names(ranks: &[ArtistRank]) -> Vec<&str> {
        ranks.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_top_artists_from_scenario() {
        let doc = aggregate(vec![
            PlayEvent::new("A", "T1", 40_000),
            PlayEvent::new("A", "T1", 40_000),
            PlayEvent::new("A", "T2", 5_000),
            PlayEvent::new("B", "T3", 35_000),
        ]);

        assert_eq!(names(&top_artists(&doc, 1)), vec!["A"]);
        assert_eq!(names(&top_artists(&doc, 10)), vec!["A", "B"]);
    }

    #[test]
    fn test_top_artists_ties_follow_document_order() {
        let mut doc = StatisticsDocument::default();
        for (name, ms) in [("First", 100), ("Second", 300), ("Third", 100)] {
            doc.artists
                .get_or_insert_with(name, ArtistStats::default)
                .total_listening_ms = ms;
        }

        assert_eq!(names(&top_artists(&doc, 3)), vec!["Second", "First", "Third"]);
    }

    #[test]
    fn test_top_artists_never_include_unknown_artist() {
        let mut events: Vec<PlayEvent> = (0..60)
            .map(|i| PlayEvent::new(&format!("Artist {i}"), "Song", 40_000))
            .collect();
        events.push(PlayEvent::new(UNKNOWN_ARTIST, "Song", 900_000_000));

        let doc = aggregate(events);
        let top = top_artists(&doc, 50);
        assert_eq!(top.len(), 50);
        assert!(top.iter().all(|r| r.name != UNKNOWN_ARTIST));
    }

    #[test]
    fn test_top_tracks_across_artists() {
        let mut doc = StatisticsDocument::default();
        let a = doc.artists.get_or_insert_with("A", ArtistStats::default);
        a.tracks.insert("a1".into(), TrackStats { listens: 3, ..TrackStats::first_listen() });
        a.tracks.insert("a2".into(), TrackStats { listens: 7, ..TrackStats::first_listen() });
        let b = doc.artists.get_or_insert_with("B", ArtistStats::default);
        b.tracks.insert("b1".into(), TrackStats { listens: 7, ..TrackStats::first_listen() });
        b.tracks.insert("b2".into(), TrackStats { listens: 1, ..TrackStats::first_listen() });

        let top: Vec<(String, String)> = top_tracks(&doc, 3)
            .into_iter()
            .map(|r| (r.track, r.artist))
            .collect();
        assert_eq!(
            top,
            vec![
                ("a2".to_string(), "A".to_string()),
                ("b1".to_string(), "B".to_string()),
                ("a1".to_string(), "A".to_string()),
            ]
        );
    }

    #[test]
    fn test_top_genres_count_duplicates() {
        let mut doc = StatisticsDocument::default();
        tagged(&mut doc, "A", &["indie", "rock"]);
        tagged(&mut doc, "B", &["electronic", "rock"]);
        tagged(&mut doc, "C", &["electronic", "rock", "indie"]);
        doc.artists
            .insert("Unenriched".to_string(), ArtistStats::default());

        let genres = top_genres(&doc, 8);
        let ranked: Vec<(&str, usize)> = genres.iter().map(|g| (g.name.as_str(), g.count)).collect();
        assert_eq!(ranked, vec![("rock", 3), ("indie", 2), ("electronic", 2)]);

        assert_eq!(top_genres(&doc, 1).len(), 1);
    }

    #[test]
    fn test_views_tolerate_unenriched_document() {
        let doc = aggregate(vec![PlayEvent::new("A", "T", 40_000)]);
        assert!(top_genres(&doc, 5).is_empty());
        assert_eq!(top_tracks(&doc, 5).len(), 1);
        assert!(top_artists(&StatisticsDocument::default(), 5).is_empty());
    }

    #[test]
    fn test_artist_top_tracks() {
        let doc = aggregate(vec![
            PlayEvent::new("A", "once", 40_000),
            PlayEvent::new("A", "thrice", 40_000),
            PlayEvent::new("A", "thrice", 40_000),
            PlayEvent::new("A", "thrice", 40_000),
            PlayEvent::new("A", "twice", 40_000),
            PlayEvent::new("A", "twice", 40_000),
        ]);

        let tracks: Vec<String> = artist_top_tracks(&doc, "A", 2)
            .into_iter()
            .map(|r| r.track)
            .collect();
        assert_eq!(tracks, vec!["thrice", "twice"]);
        assert!(artist_top_tracks(&doc, "Nobody", 3).is_empty());
    }
}
