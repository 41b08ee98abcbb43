//! Runs enrichment tasks against the remote sources and merges the results
//! into the shared document.

use super::queue::TaskExecutor;
use super::{EnrichmentTask, ImageLibrary};
use crate::api_client::{EnrichmentFetchError, ImageSource, MetadataSource, TrackAlbum};
use crate::foundation::store::DocumentHandle;
use crate::foundation::utils::safe_file_name;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Enricher {
    doc: DocumentHandle,
    metadata: Arc<dyn MetadataSource>,
    images: Arc<dyn ImageSource>,
    library: ImageLibrary,
}

impl Enricher {
    pub fn new(
        doc: DocumentHandle,
        metadata: Arc<dyn MetadataSource>,
        images: Arc<dyn ImageSource>,
        library: ImageLibrary,
    ) -> Self {
        Self {
            doc,
            metadata,
            images,
            library,
        }
    }

    async fn fetch_artist_metadata(
        &self,
        artist: &str,
    ) -> Result<Vec<EnrichmentTask>, EnrichmentFetchError> {
        let needed = self
            .doc
            .read(|doc| doc.artist(artist).is_some_and(|a| a.tags.is_none()));
        if !needed {
            debug!(artist, "Artist metadata already known");
            return Ok(Vec::new());
        }

        let metadata = self.metadata.artist_metadata(artist).await?;
        let merged = self.doc.modify(|doc| {
            doc.merge_artist_metadata(artist, metadata.tags, metadata.similar_artists)
        });
        if merged {
            info!(artist, "Merged artist metadata");
        }
        Ok(Vec::new())
    }

    async fn fetch_artist_image(
        &self,
        artist: &str,
    ) -> Result<Vec<EnrichmentTask>, EnrichmentFetchError> {
        if self.library.artist_image(artist).is_some() {
            debug!(artist, "Artist picture already downloaded");
            return Ok(Vec::new());
        }

        let Some(url) = self.images.resolve_artist_image_url(artist).await? else {
            debug!(artist, "No artist picture available");
            return Ok(Vec::new());
        };

        let bytes = self.images.fetch_image_bytes(&url).await?;
        let file_name = self.library.store_artist_image(artist, &url, &bytes)?;
        info!(artist, file_name = %file_name, "Downloaded artist picture");
        Ok(Vec::new())
    }

    async fn fetch_track_image(
        &self,
        track: &str,
        artist: &str,
    ) -> Result<Vec<EnrichmentTask>, EnrichmentFetchError> {
        let needed = self.doc.read(|doc| {
            doc.track(artist, track)
                .is_some_and(|t| t.album_name.is_none())
        });
        if !needed {
            debug!(artist, track, "Track album already known");
            return Ok(Vec::new());
        }

        match self.metadata.track_album(track, artist).await? {
            TrackAlbum::Album { title, cover_url } => {
                let cover_file = if cover_url.is_empty() {
                    None
                } else {
                    let bytes = self.images.fetch_image_bytes(&cover_url).await?;
                    Some(self.library.store_cover(artist, &title, &cover_url, &bytes)?)
                };

                self.doc
                    .modify(|doc| doc.merge_track_album(artist, track, title, cover_file));
                info!(artist, track, "Merged track album");
                Ok(Vec::new())
            }
            TrackAlbum::Single => {
                // Singles are shown with the artist's picture. Before it is
                // downloaded the extension is unknown; lookups match on stem.
                let picture = self.library.artist_image(artist);
                let cover_file = picture
                    .as_deref()
                    .and_then(|path| path.file_name())
                    .and_then(|name| name.to_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}.jpg", safe_file_name(artist)));
                self.doc.modify(|doc| {
                    doc.merge_track_album(artist, track, track.to_string(), Some(cover_file))
                });

                if picture.is_none() {
                    Ok(vec![EnrichmentTask::artist_image(artist)])
                } else {
                    Ok(Vec::new())
                }
            }
        }
    }
}

#[async_trait]
impl TaskExecutor for Enricher {
    async fn execute(
        &self,
        task: &EnrichmentTask,
    ) -> Result<Vec<EnrichmentTask>, EnrichmentFetchError> {
        match task {
            EnrichmentTask::FetchArtistMetadata { artist } => {
                self.fetch_artist_metadata(artist).await
            }
            EnrichmentTask::FetchArtistImage { artist } => self.fetch_artist_image(artist).await,
            EnrichmentTask::FetchTrackImage { track, artist } => {
                self.fetch_track_image(track, artist).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{ArtistMetadata, MockImageSource, MockMetadataSource};
    use crate::foundation::store::{ArtistStats, StatisticsDocument, TrackStats};
    use mockall::predicate::eq;
    use std::fs;
    use tempfile::TempDir;

    fn document() -> DocumentHandle {
        let mut doc = StatisticsDocument::default();
        let artist = doc.artists.get_or_insert_with("Muse", ArtistStats::default);
        artist.total_listening_ms = 1_000_000;
        artist
            .tracks
            .insert("Hysteria".to_string(), TrackStats::first_listen());
        artist
            .tracks
            .insert("Unintended".to_string(), TrackStats::first_listen());
        DocumentHandle::new(doc)
    }

    fn enricher(
        doc: &DocumentHandle,
        metadata: MockMetadataSource,
        images: MockImageSource,
        dir: &TempDir,
    ) -> Enricher {
        Enricher::new(
            doc.clone(),
            Arc::new(metadata),
            Arc::new(images),
            ImageLibrary::new(dir.path()),
        )
    }

    #[tokio::test]
    async fn test_artist_metadata_is_merged() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_artist_metadata()
            .with(eq("Muse"))
            .times(1)
            .returning(|_| {
                Ok(ArtistMetadata {
                    tags: vec!["rock".to_string(), "alternative".to_string()],
                    similar_artists: vec!["Placebo".to_string()],
                })
            });

        let enricher = enricher(&doc, metadata, MockImageSource::new(), &temp_dir);
        let task = EnrichmentTask::artist_metadata("Muse");

        assert!(enricher.execute(&task).await.unwrap().is_empty());
        // Already populated: no second remote call.
        assert!(enricher.execute(&task).await.unwrap().is_empty());

        let snapshot = doc.snapshot();
        let artist = snapshot.artist("Muse").unwrap();
        assert_eq!(artist.tags.as_ref().unwrap(), &vec!["rock", "alternative"]);
        assert_eq!(artist.similar_artists.as_ref().unwrap(), &vec!["Placebo"]);
    }

    #[tokio::test]
    async fn test_metadata_failure_leaves_document_untouched() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_artist_metadata()
            .returning(|_| Err(EnrichmentFetchError::MissingField("artist")));

        let enricher = enricher(&doc, metadata, MockImageSource::new(), &temp_dir);
        let result = enricher
            .execute(&EnrichmentTask::artist_metadata("Muse"))
            .await;

        assert!(result.is_err());
        assert_eq!(doc.revision(), 0);
        assert!(doc.snapshot().artist("Muse").unwrap().tags.is_none());
    }

    #[tokio::test]
    async fn test_artist_image_is_downloaded() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut images = MockImageSource::new();
        images
            .expect_resolve_artist_image_url()
            .with(eq("Muse"))
            .times(1)
            .returning(|_| Ok(Some("https://img/ar0/muse.webp".to_string())));
        images
            .expect_fetch_image_bytes()
            .with(eq("https://img/ar0/muse.webp"))
            .times(1)
            .returning(|_| Ok(b"webp".to_vec()));

        let enricher = enricher(&doc, MockMetadataSource::new(), images, &temp_dir);
        let task = EnrichmentTask::artist_image("Muse");
        enricher.execute(&task).await.unwrap();
        // Picture exists now, so the sources aren't called again.
        enricher.execute(&task).await.unwrap();

        let path = temp_dir.path().join("Muse").join("Muse.webp");
        assert_eq!(fs::read(path).unwrap(), b"webp");
    }

    #[tokio::test]
    async fn test_missing_artist_image_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut images = MockImageSource::new();
        images
            .expect_resolve_artist_image_url()
            .returning(|_| Ok(None));
        images.expect_fetch_image_bytes().never();

        let enricher = enricher(&doc, MockMetadataSource::new(), images, &temp_dir);
        let result = enricher
            .execute(&EnrichmentTask::artist_image("Muse"))
            .await
            .unwrap();

        assert!(result.is_empty());
        assert!(!temp_dir.path().join("Muse").exists());
    }

    #[tokio::test]
    async fn test_track_on_album_gets_cover() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_track_album()
            .with(eq("Hysteria"), eq("Muse"))
            .times(1)
            .returning(|_, _| {
                Ok(TrackAlbum::Album {
                    title: "Absolution".to_string(),
                    cover_url: "https://img/174s/abs.png".to_string(),
                })
            });
        let mut images = MockImageSource::new();
        images
            .expect_fetch_image_bytes()
            .times(1)
            .returning(|_| Ok(b"cover".to_vec()));

        let enricher = enricher(&doc, metadata, images, &temp_dir);
        let follow_ups = enricher
            .execute(&EnrichmentTask::track_image("Hysteria", "Muse"))
            .await
            .unwrap();
        assert!(follow_ups.is_empty());

        let snapshot = doc.snapshot();
        let track = snapshot.track("Muse", "Hysteria").unwrap();
        assert_eq!(track.album_name.as_deref(), Some("Absolution"));
        assert_eq!(track.cover_file.as_deref(), Some("Absolution.png"));
        assert!(temp_dir.path().join("Muse").join("Absolution.png").is_file());
    }

    #[tokio::test]
    async fn test_failed_cover_download_merges_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata.expect_track_album().returning(|_, _| {
            Ok(TrackAlbum::Album {
                title: "Absolution".to_string(),
                cover_url: "https://img/174s/abs.png".to_string(),
            })
        });
        let mut images = MockImageSource::new();
        images
            .expect_fetch_image_bytes()
            .returning(|_| Err(EnrichmentFetchError::Other("timed out".to_string())));

        let enricher = enricher(&doc, metadata, images, &temp_dir);
        let result = enricher
            .execute(&EnrichmentTask::track_image("Hysteria", "Muse"))
            .await;

        assert!(result.is_err());
        let snapshot = doc.snapshot();
        let track = snapshot.track("Muse", "Hysteria").unwrap();
        assert!(track.album_name.is_none());
        assert!(track.cover_file.is_none());
    }

    #[tokio::test]
    async fn test_single_queues_artist_picture() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_track_album()
            .returning(|_, _| Ok(TrackAlbum::Single));

        let enricher = enricher(&doc, metadata, MockImageSource::new(), &temp_dir);
        let follow_ups = enricher
            .execute(&EnrichmentTask::track_image("Unintended", "Muse"))
            .await
            .unwrap();

        assert_eq!(follow_ups, vec![EnrichmentTask::artist_image("Muse")]);
        let snapshot = doc.snapshot();
        let track = snapshot.track("Muse", "Unintended").unwrap();
        assert_eq!(track.album_name.as_deref(), Some("Unintended"));
        assert_eq!(track.cover_file.as_deref(), Some("Muse.jpg"));
    }

    #[tokio::test]
    async fn test_single_uses_downloaded_picture_name() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();
        let library = ImageLibrary::new(temp_dir.path());
        library
            .store_artist_image("Muse", "https://img/ar0/muse.webp", b"webp")
            .unwrap();

        let mut metadata = MockMetadataSource::new();
        metadata
            .expect_track_album()
            .returning(|_, _| Ok(TrackAlbum::Single));

        let enricher = enricher(&doc, metadata, MockImageSource::new(), &temp_dir);
        let follow_ups = enricher
            .execute(&EnrichmentTask::track_image("Unintended", "Muse"))
            .await
            .unwrap();

        assert!(follow_ups.is_empty());
        let snapshot = doc.snapshot();
        let cover_file = snapshot
            .track("Muse", "Unintended")
            .and_then(|t| t.cover_file.clone())
            .unwrap();
        assert_eq!(cover_file, "Muse.webp");
        assert!(library.cover_image("Muse", &cover_file).is_some());
    }

    #[tokio::test]
    async fn test_self_titled_album_does_not_hide_artist_picture() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata.expect_track_album().returning(|_, _| {
            Ok(TrackAlbum::Album {
                title: "Muse".to_string(),
                cover_url: "https://img/174s/self.jpg".to_string(),
            })
        });
        let mut images = MockImageSource::new();
        images
            .expect_fetch_image_bytes()
            .with(eq("https://img/174s/self.jpg"))
            .returning(|_| Ok(b"cover".to_vec()));
        images
            .expect_resolve_artist_image_url()
            .times(1)
            .returning(|_| Ok(Some("https://img/ar0/muse.png".to_string())));
        images
            .expect_fetch_image_bytes()
            .with(eq("https://img/ar0/muse.png"))
            .returning(|_| Ok(b"profile".to_vec()));

        let enricher = enricher(&doc, metadata, images, &temp_dir);
        enricher
            .execute(&EnrichmentTask::track_image("Hysteria", "Muse"))
            .await
            .unwrap();
        enricher
            .execute(&EnrichmentTask::artist_image("Muse"))
            .await
            .unwrap();

        let snapshot = doc.snapshot();
        let track = snapshot.track("Muse", "Hysteria").unwrap();
        assert_eq!(track.cover_file.as_deref(), Some("Muse_cover.jpg"));
        let picture = ImageLibrary::new(temp_dir.path()).artist_image("Muse").unwrap();
        assert_eq!(fs::read(picture).unwrap(), b"profile");
    }

    #[tokio::test]
    async fn test_tasks_for_unknown_artists_do_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let doc = document();

        let mut metadata = MockMetadataSource::new();
        metadata.expect_artist_metadata().never();
        metadata.expect_track_album().never();

        let enricher = enricher(&doc, metadata, MockImageSource::new(), &temp_dir);
        enricher
            .execute(&EnrichmentTask::artist_metadata("Nobody"))
            .await
            .unwrap();
        enricher
            .execute(&EnrichmentTask::track_image("Song", "Nobody"))
            .await
            .unwrap();
        assert_eq!(doc.revision(), 0);
    }
}
