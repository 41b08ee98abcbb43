//! Turns raw play events into the ranked statistics document.

use crate::foundation::store::{ArtistStats, OrderedMap, PlayEvent, StatisticsDocument, TrackStats};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Plays shorter than this don't count as a listen.
pub const MIN_LISTEN_MS: u64 = 30_000;

/// Name the streaming service uses when it can't identify the artist.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// How many artists survive aggregation.
pub const TOP_ARTIST_LIMIT: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("malformed play event at position {position}: {reason}")]
pub struct MalformedEventError {
    pub position: usize,
    pub reason: String,
}

impl MalformedEventError {
    fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }
}

impl PlayEvent {
    /// Decodes one record of a streaming-history file.
    ///
    /// `msPlayed` may be a JSON integer or a string holding one.
    pub fn from_record(record: &Value, position: usize) -> Result<Self, MalformedEventError> {
        let object = record
            .as_object()
            .ok_or_else(|| MalformedEventError::new(position, "record is not an object"))?;

        let text_field = |name: &str| {
            object
                .get(name)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    MalformedEventError::new(position, format!("missing string field `{name}`"))
                })
        };

        let artist_name = text_field("artistName")?;
        let track_name = text_field("trackName")?;
        let ms_played = match object.get("msPlayed") {
            Some(Value::Number(n)) => n.as_u64(),
            Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
            _ => None,
        }
        .ok_or_else(|| {
            MalformedEventError::new(position, "`msPlayed` is not a non-negative integer")
        })?;

        Ok(Self {
            artist_name,
            track_name,
            ms_played,
        })
    }
}

/// Whether a play counts towards the statistics at all.
pub fn is_listen(event: &PlayEvent) -> bool {
    event.ms_played >= MIN_LISTEN_MS && event.artist_name != UNKNOWN_ARTIST
}

/// Builds the statistics document from play events.
///
/// Short plays and the unknown-artist sentinel are dropped. The remaining plays
/// are grouped per artist and track, and the [`TOP_ARTIST_LIMIT`] artists with
/// the most listening time are kept. Artists with equal time keep the order in
/// which they first appeared.
///
/// # Examples
///
/// ```
/// use funnytunes::process::aggregate;
/// use funnytunes::PlayEvent;
///
/// let doc = aggregate(vec![
///     PlayEvent::new("A", "T1", 40_000),
///     PlayEvent::new("A", "T2", 5_000),
/// ]);
/// assert_eq!(doc.artist("A").unwrap().total_listening_ms, 40_000);
/// assert!(doc.track("A", "T2").is_none());
/// ```
pub fn aggregate<I>(events: I) -> StatisticsDocument
where
    I: IntoIterator<Item = PlayEvent>,
{
    let mut grouped: OrderedMap<ArtistStats> = OrderedMap::new();
    let mut skipped = 0usize;

    for event in events {
        if !is_listen(&event) {
            skipped += 1;
            continue;
        }

        let artist = grouped.get_or_insert_with(&event.artist_name, ArtistStats::default);
        artist.total_listening_ms += event.ms_played;
        match artist.tracks.get_mut(&event.track_name) {
            Some(track) => track.listens += 1,
            None => {
                artist
                    .tracks
                    .insert(event.track_name, TrackStats::first_listen());
            }
        }
    }

    let distinct = grouped.len();
    let mut ranked: Vec<(String, ArtistStats)> = grouped.into_iter().collect();
    // Stable, so equal totals keep first-seen order.
    ranked.sort_by(|(_, a), (_, b)| b.total_listening_ms.cmp(&a.total_listening_ms));
    ranked.truncate(TOP_ARTIST_LIMIT);

    debug!(
        skipped,
        distinct,
        kept = ranked.len(),
        "Aggregated play events"
    );

    StatisticsDocument {
        artists: ranked.into_iter().collect(),
    }
}

/// Decodes raw export records and aggregates them, failing on the first
/// malformed record.
pub fn aggregate_records(records: &[Value]) -> Result<StatisticsDocument, MalformedEventError> {
    let events = records
        .iter()
        .enumerate()
        .map(|(position, record)| PlayEvent::from_record(record, position))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(aggregate(events))
}
