use super::EnrichmentTask;
use crate::foundation::store::StatisticsDocument;
use crate::ranking::{top_artists, top_tracks};

/// The tasks to queue when a session starts: pictures and metadata for the
/// `artists` top artists, then covers for the `tracks` top tracks.
pub fn initial_tasks(doc: &StatisticsDocument, artists: usize, tracks: usize) -> Vec<EnrichmentTask> {
    let mut tasks = Vec::with_capacity(artists * 2 + tracks);

    for artist in top_artists(doc, artists) {
        tasks.push(EnrichmentTask::artist_image(&artist.name));
        tasks.push(EnrichmentTask::artist_metadata(&artist.name));
    }
    for track in top_tracks(doc, tracks) {
        tasks.push(EnrichmentTask::track_image(&track.track, &track.artist));
    }

    tasks
}

/// Tasks that fill in an artist card: picture plus tags and related artists.
pub fn artist_card_tasks(artist: &str) -> [EnrichmentTask; 2] {
    [
        EnrichmentTask::artist_metadata(artist),
        EnrichmentTask::artist_image(artist),
    ]
}
