mod fetch_error;
mod lastfm;
mod sources;

pub use fetch_error::EnrichmentFetchError;
pub use lastfm::{extract_og_image, parse_artist_info, parse_track_info, LastFmClient};
pub use sources::*;
