//! Terminal rendering of the ranking views.

use crate::enrichment::ImageLibrary;
use crate::foundation::store::StatisticsDocument;
use crate::ranking::{top_artists, top_genres, top_tracks, ArtistCard};

pub const DASHBOARD_ARTISTS: usize = 4;
pub const DASHBOARD_TRACKS: usize = 3;
pub const DASHBOARD_GENRES: usize = 8;

/// Comma-separated top genres, or a hint while none are known yet.
pub fn genres_line(doc: &StatisticsDocument) -> String {
    let genres: Vec<String> = top_genres(doc, DASHBOARD_GENRES)
        .into_iter()
        .map(|g| g.name)
        .collect();

    if genres.is_empty() {
        "waiting for genres...".to_string()
    } else {
        genres.join(", ")
    }
}

pub fn render_dashboard(doc: &StatisticsDocument, library: &ImageLibrary) -> String {
    let mut out = String::new();

    out.push_str("\x1b[1m\x1b[34mTop artists\x1b[0m\n");
    for (i, artist) in top_artists(doc, DASHBOARD_ARTISTS).iter().enumerate() {
        let picture = if library.artist_image(&artist.name).is_some() {
            ""
        } else {
            " \x1b[2m(no picture yet)\x1b[0m"
        };
        out.push_str(&format!(
            "  {}. {} - {}hrs{}\n",
            i + 1,
            artist.name,
            artist.total_listening_ms / 3_600_000,
            picture
        ));
    }

    out.push_str("\x1b[1m\x1b[34mTop songs\x1b[0m\n");
    for (i, track) in top_tracks(doc, DASHBOARD_TRACKS).iter().enumerate() {
        let album = doc
            .track(&track.artist, &track.track)
            .and_then(|t| t.album_name.as_deref())
            .map(|album| format!(" [{album}]"))
            .unwrap_or_default();
        out.push_str(&format!(
            "  {}. {} by {}{} - {} listens\n",
            i + 1,
            track.track,
            track.artist,
            album,
            track.listens
        ));
    }

    out.push_str("\x1b[1m\x1b[34mTop genres\x1b[0m\n");
    out.push_str(&format!("  {}\n", genres_line(doc)));
    out
}

pub fn render_artist_page(cards: &[ArtistCard], page: usize, pages: usize) -> String {
    let mut out = format!("\x1b[1m\x1b[34mArtists (page {} of {})\x1b[0m\n", page + 1, pages.max(1));

    for card in cards {
        out.push_str(&format!("\x1b[1m{}. {}\x1b[0m\n", card.rank, card.name));
        out.push_str(&format!("  Total Listening: {}hrs\n", card.hours_listened));
        if !card.genres.is_empty() {
            out.push_str(&format!("  Genres: {}\n", card.genres.join(", ")));
        }
        out.push_str(&format!("  Most played songs: {}\n", card.most_played.join(", ")));
        if !card.related_artists.is_empty() {
            out.push_str(&format!("  Related artists: {}\n", card.related_artists.join(", ")));
        }
        if let Some(image) = &card.image {
            out.push_str(&format!("  Picture: {}\n", image.display()));
        }
    }
    out
}
