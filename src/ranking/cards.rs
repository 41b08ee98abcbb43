use super::views::{artist_top_tracks, top_artists};
use crate::enrichment::ImageLibrary;
use crate::foundation::store::StatisticsDocument;
use crate::foundation::utils::fit_to_budget;
use std::path::PathBuf;

/// Characters available for each list on an artist card.
pub const LINE_BUDGET: usize = 39;

/// Artists shown per page of the artist listing.
pub const ARTISTS_PER_PAGE: usize = 3;

const MS_PER_HOUR: u64 = 3_600_000;

/// Everything shown for one artist in the artist listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistCard {
    pub rank: usize,
    pub name: String,
    pub hours_listened: u64,
    pub genres: Vec<String>,
    pub most_played: Vec<String>,
    pub related_artists: Vec<String>,
    /// `None` until the picture has been downloaded.
    pub image: Option<PathBuf>,
}

/// Builds the cards for one page (zero-based) of the ranked artist list.
pub fn artist_page(
    doc: &StatisticsDocument,
    library: &ImageLibrary,
    page: usize,
    per_page: usize,
) -> Vec<ArtistCard> {
    top_artists(doc, usize::MAX)
        .into_iter()
        .enumerate()
        .skip(page.saturating_mul(per_page))
        .take(per_page)
        .filter_map(|(i, rank)| {
            let stats = doc.artist(&rank.name)?;
            let most_played: Vec<String> = artist_top_tracks(doc, &rank.name, 3)
                .into_iter()
                .map(|t| t.track)
                .collect();

            Some(ArtistCard {
                rank: i + 1,
                hours_listened: stats.total_listening_ms / MS_PER_HOUR,
                genres: fit_to_budget(stats.tags.as_deref().unwrap_or_default(), LINE_BUDGET),
                most_played: fit_to_budget(&most_played, LINE_BUDGET),
                related_artists: fit_to_budget(
                    stats.similar_artists.as_deref().unwrap_or_default(),
                    LINE_BUDGET,
                ),
                image: library.artist_image(&rank.name),
                name: rank.name,
            })
        })
        .collect()
}

/// Names of the artists on one page (zero-based) of the ranked listing.
pub fn page_artists(doc: &StatisticsDocument, page: usize, per_page: usize) -> Vec<String> {
    top_artists(doc, usize::MAX)
        .into_iter()
        .skip(page.saturating_mul(per_page))
        .take(per_page)
        .map(|rank| rank.name)
        .collect()
}

/// Number of pages needed to show every artist.
pub fn page_count(doc: &StatisticsDocument, per_page: usize) -> usize {
    doc.artists.len().div_ceil(per_page.max(1))
}
