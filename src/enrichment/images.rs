//! On-disk layout of downloaded pictures.
//!
//! ```text
//! <root>/<artist>/<artist>.<ext>   profile picture
//! <root>/<artist>/<album>.<ext>    album covers
//! ```
//!
//! A self-titled album's cover is saved as `<album>_cover.<ext>` so it never
//! takes the profile picture's name.
//!
//! Every path component goes through [`safe_file_name`], so the same names
//! always map to the same files.

use crate::foundation::utils::{image_extension, safe_file_name};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ImageLibrary {
    root: PathBuf,
}

impl ImageLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artist_dir(&self, artist: &str) -> PathBuf {
        self.root.join(safe_file_name(artist))
    }

    /// File name (not path) for an image named `name` downloaded from `url`.
    pub fn file_name(name: &str, url: &str) -> String {
        format!("{}.{}", safe_file_name(name), image_extension(url))
    }

    /// The artist's profile picture, whatever its extension, if downloaded.
    pub fn artist_image(&self, artist: &str) -> Option<PathBuf> {
        find_by_stem(&self.artist_dir(artist), &safe_file_name(artist))
    }

    /// Path to a cover recorded on a track, if it has been downloaded. A file
    /// with the same stem but another extension also matches.
    pub fn cover_image(&self, artist: &str, cover_file: &str) -> Option<PathBuf> {
        let path = self.artist_dir(artist).join(cover_file);
        if path.is_file() {
            return Some(path);
        }
        let stem = Path::new(cover_file).file_stem()?.to_str()?;
        find_by_stem(&self.artist_dir(artist), stem)
    }

    /// Saves the artist's profile picture and returns the file name used.
    pub fn store_artist_image(&self, artist: &str, url: &str, bytes: &[u8]) -> io::Result<String> {
        self.write(artist, Self::file_name(artist, url), bytes)
    }

    /// Saves an album cover and returns the file name used.
    pub fn store_cover(
        &self,
        artist: &str,
        album: &str,
        url: &str,
        bytes: &[u8],
    ) -> io::Result<String> {
        let file_name = if safe_file_name(album) == safe_file_name(artist) {
            format!("{}_cover.{}", safe_file_name(album), image_extension(url))
        } else {
            Self::file_name(album, url)
        };
        self.write(artist, file_name, bytes)
    }

    fn write(&self, artist: &str, file_name: String, bytes: &[u8]) -> io::Result<String> {
        let dir = self.artist_dir(artist);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(&file_name), bytes)?;
        Ok(file_name)
    }
}

fn find_by_stem(dir: &Path, stem: &str) -> Option<PathBuf> {
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.is_file() && path.file_stem().and_then(|s| s.to_str()) == Some(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_store_and_find_artist_image() {
        let temp_dir = TempDir::new().unwrap();
        let library = ImageLibrary::new(temp_dir.path());
        assert!(library.artist_image("AC/DC").is_none());

        let file_name = library
            .store_artist_image("AC/DC", "https://img/ar0/abc.png", b"png")
            .unwrap();
        assert_eq!(file_name, "AC_DC.png");

        let found = library.artist_image("AC/DC").unwrap();
        assert_eq!(found, temp_dir.path().join("AC_DC").join("AC_DC.png"));
        assert_eq!(fs::read(found).unwrap(), b"png");
    }

    #[test]
    fn test_album_cover_is_not_the_artist_image() {
        let temp_dir = TempDir::new().unwrap();
        let library = ImageLibrary::new(temp_dir.path());

        let cover = library
            .store_cover("Muse", "Absolution", "https://img/174s/x.jpg", b"jpg")
            .unwrap();
        assert!(library.artist_image("Muse").is_none());
        assert!(library.cover_image("Muse", &cover).is_some());
        assert!(library.cover_image("Muse", "Other.jpg").is_none());
    }

    #[test]
    fn test_self_titled_cover_keeps_its_own_name() {
        let temp_dir = TempDir::new().unwrap();
        let library = ImageLibrary::new(temp_dir.path());

        let cover = library
            .store_cover("Muse", "Muse", "https://img/174s/self.jpg", b"cover")
            .unwrap();
        assert_eq!(cover, "Muse_cover.jpg");
        assert!(library.artist_image("Muse").is_none());

        library
            .store_artist_image("Muse", "https://img/ar0/muse.png", b"profile")
            .unwrap();
        let profile = library.artist_image("Muse").unwrap();
        assert_eq!(fs::read(profile).unwrap(), b"profile");
        assert_eq!(fs::read(library.cover_image("Muse", &cover).unwrap()).unwrap(), b"cover");
    }

    #[test]
    fn test_cover_lookup_ignores_extension() {
        let temp_dir = TempDir::new().unwrap();
        let library = ImageLibrary::new(temp_dir.path());
        library
            .store_artist_image("Muse", "https://img/ar0/muse.webp", b"webp")
            .unwrap();

        let found = library.cover_image("Muse", "Muse.jpg").unwrap();
        assert_eq!(found, temp_dir.path().join("Muse").join("Muse.webp"));
    }

    #[test]
    fn test_file_name_sanitizes_album_titles() {
        assert_eq!(
            ImageLibrary::file_name("OK Computer: OKNOTOK 1997 2017", "https://i/a.jpg?q=1"),
            "OK Computer_ OKNOTOK 1997 2017.jpg"
        );
    }
}
