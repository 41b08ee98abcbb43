use super::cipher::{self, Key, LEGACY_KDF_ITERATIONS};
use super::{StatisticsDocument, StoreError};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use openssl::rand::rand_bytes;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

const ENVELOPE_PREFIX: &str = "funnytunes-store:v2:";
const SALT_LEN: usize = 16;

/// Encrypts a statistics document under `key`.
///
/// The document is encoded as JSON and wrapped in a Fernet token, so the result
/// is both confidential and tamper-evident.
///
/// # Examples
///
/// ```
/// use funnytunes::{derive_key, load, save, StatisticsDocument};
///
/// let key = derive_key("correct horse").unwrap();
/// let doc = StatisticsDocument::default();
/// let ciphertext = save(&doc, &key).unwrap();
/// assert_eq!(load(&ciphertext, &key).unwrap(), doc);
/// ```
pub fn save(doc: &StatisticsDocument, key: &Key) -> Result<Vec<u8>, StoreError> {
    let plaintext = serde_json::to_vec(doc).map_err(StoreError::Encode)?;
    cipher::encrypt(key, &plaintext)
}

/// Decrypts and decodes a document produced by [`save`].
///
/// Returns [`StoreError::Authentication`] for a wrong key or a damaged
/// ciphertext, and [`StoreError::Corrupt`] when the plaintext authenticates but
/// doesn't decode.
pub fn load(ciphertext: &[u8], key: &Key) -> Result<StatisticsDocument, StoreError> {
    let token = cipher::decrypt(key, ciphertext)?;
    debug!(issued_at = token.issued_at, "Store token verified");
    serde_json::from_slice(&token.plaintext).map_err(StoreError::Corrupt)
}

/// How the key for a store file is derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyParams {
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl KeyParams {
    /// Parameters of stores written without a salt.
    pub fn legacy() -> Self {
        Self {
            salt: Vec::new(),
            iterations: LEGACY_KDF_ITERATIONS,
        }
    }

    /// Fresh random salt with the given iteration count.
    pub fn generate(iterations: u32) -> Result<Self, StoreError> {
        let mut salt = vec![0u8; SALT_LEN];
        rand_bytes(&mut salt)?;
        Ok(Self {
            salt,
            iterations: iterations.max(LEGACY_KDF_ITERATIONS),
        })
    }

    pub fn is_legacy(&self) -> bool {
        self.salt.is_empty()
    }

    pub fn derive(&self, passphrase: &str) -> Result<Key, StoreError> {
        Key::derive(passphrase, &self.salt, self.iterations)
    }
}

/// Splits a store file into its key parameters and Fernet token.
///
/// Files written by this crate carry a `funnytunes-store:v2:<iterations>:<salt>:`
/// header; a bare token is an unsalted store.
fn parse_envelope(contents: &[u8]) -> Result<(KeyParams, &[u8]), StoreError> {
    let Some(rest) = contents.strip_prefix(ENVELOPE_PREFIX.as_bytes()) else {
        return Ok((KeyParams::legacy(), contents));
    };

    let mut parts = rest.splitn(3, |&b| b == b':');
    let (Some(iterations), Some(salt), Some(token)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(StoreError::InvalidHeader("missing fields".to_string()));
    };

    let iterations = std::str::from_utf8(iterations)
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|&n| n >= LEGACY_KDF_ITERATIONS)
        .ok_or_else(|| StoreError::InvalidHeader("bad iteration count".to_string()))?;
    let salt = URL_SAFE
        .decode(salt)
        .map_err(|e| StoreError::InvalidHeader(format!("bad salt: {e}")))?;

    Ok((KeyParams { salt, iterations }, token))
}

fn build_envelope(params: &KeyParams, token: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "{ENVELOPE_PREFIX}{}:{}:",
        params.iterations,
        URL_SAFE.encode(&params.salt)
    )
    .into_bytes();
    out.extend_from_slice(token);
    out
}

/// The encrypted listening database on disk.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
}

impl StoreFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing store means this is the first run and the export has to be
    /// imported.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Encrypts `doc` under a freshly salted key and writes the store.
    pub fn create(
        &self,
        passphrase: &str,
        doc: &StatisticsDocument,
        iterations: u32,
    ) -> Result<UnlockedStore, StoreError> {
        let params = KeyParams::generate(iterations)?;
        let key = params.derive(passphrase)?;
        let unlocked = UnlockedStore {
            file: self.clone(),
            params,
            key,
        };
        unlocked.persist(doc)?;
        info!(path = %self.path.display(), "Created encrypted store");
        Ok(unlocked)
    }

    /// Reads and decrypts the store with `passphrase`.
    pub fn unlock(
        &self,
        passphrase: &str,
    ) -> Result<(UnlockedStore, StatisticsDocument), StoreError> {
        let contents = fs::read(&self.path)?;
        let (params, token) = parse_envelope(&contents)?;
        if params.is_legacy() {
            debug!("Store has no salt, using legacy key derivation");
        }

        let key = params.derive(passphrase)?;
        let doc = load(token, &key)?;
        info!(artists = doc.artists.len(), "Unlocked store");

        Ok((
            UnlockedStore {
                file: self.clone(),
                params,
                key,
            },
            doc,
        ))
    }
}

/// A store whose key is known for the rest of the session.
#[derive(Debug)]
pub struct UnlockedStore {
    file: StoreFile,
    params: KeyParams,
    key: Key,
}

impl UnlockedStore {
    pub fn key_params(&self) -> &KeyParams {
        &self.params
    }

    /// Re-keys a legacy store with a random salt so the next write is salted.
    pub fn upgrade(&mut self, passphrase: &str, iterations: u32) -> Result<bool, StoreError> {
        if !self.params.is_legacy() {
            return Ok(false);
        }
        self.params = KeyParams::generate(iterations)?;
        self.key = self.params.derive(passphrase)?;
        Ok(true)
    }

    /// Writes `doc` to disk atomically. The previous file is left untouched if
    /// anything fails before the final rename.
    pub fn persist(&self, doc: &StatisticsDocument) -> Result<(), StoreError> {
        let token = save(doc, &self.key)?;
        let contents = build_envelope(&self.params, &token);

        let dir = match self.file.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&contents)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.file.path).map_err(|e| e.error)?;

        debug!(path = %self.file.path.display(), bytes = contents.len(), "Store written");
        Ok(())
    }
}
