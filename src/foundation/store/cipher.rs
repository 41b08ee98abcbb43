//! Passphrase-derived keys and Fernet tokens.
//!
//! A token is `0x80 | issued_at (u64 BE) | iv (16) | AES-128-CBC ciphertext |
//! HMAC-SHA256 (32)`, URL-safe base64 encoded. The first half of the 32-byte key
//! signs, the second half encrypts.

use super::StoreError;
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use openssl::hash::MessageDigest;
use openssl::memcmp;
use openssl::pkcs5::pbkdf2_hmac;
use openssl::pkey::PKey;
use openssl::rand::rand_bytes;
use openssl::sign::Signer;
use openssl::symm::{self, Cipher};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Iterations used by stores written without a salt.
pub const LEGACY_KDF_ITERATIONS: u32 = 1000;

const TOKEN_VERSION: u8 = 0x80;
const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const MAC_LEN: usize = 32;
const HEADER_LEN: usize = 1 + 8 + IV_LEN;

#[derive(Clone, PartialEq, Eq)]
pub struct Key([u8; KEY_LEN]);

impl Key {
    /// Runs PBKDF2-HMAC-SHA256 over the passphrase.
    pub fn derive(passphrase: &str, salt: &[u8], iterations: u32) -> Result<Self, StoreError> {
        let mut bytes = [0u8; KEY_LEN];
        pbkdf2_hmac(
            passphrase.as_bytes(),
            salt,
            iterations.max(1) as usize,
            MessageDigest::sha256(),
            &mut bytes,
        )?;
        Ok(Self(bytes))
    }

    /// Parses a key in its URL-safe base64 text form.
    pub fn from_encoded(encoded: &str) -> Option<Self> {
        let bytes = URL_SAFE.decode(encoded.trim()).ok()?;
        let bytes: [u8; KEY_LEN] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// The URL-safe base64 text form of the key.
    pub fn encoded(&self) -> String {
        URL_SAFE.encode(self.0)
    }

    fn signing_key(&self) -> &[u8] {
        &self.0[..KEY_LEN / 2]
    }

    fn encryption_key(&self) -> &[u8] {
        &self.0[KEY_LEN / 2..]
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Key(..)")
    }
}

/// Derives the key used by unsalted stores: PBKDF2 with an empty salt and
/// [`LEGACY_KDF_ITERATIONS`] rounds. The same passphrase always yields the same
/// key.
pub fn derive_key(passphrase: &str) -> Result<Key, StoreError> {
    Key::derive(passphrase, b"", LEGACY_KDF_ITERATIONS)
}

/// A verified, decrypted token.
#[derive(Debug)]
pub struct Token {
    pub issued_at: u64,
    pub plaintext: Vec<u8>,
}

/// Encrypts and signs `plaintext`, returning the token text as bytes.
pub fn encrypt(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, StoreError> {
    let mut iv = [0u8; IV_LEN];
    rand_bytes(&mut iv)?;
    let issued_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    encrypt_with(key, plaintext, issued_at, &iv)
}

fn encrypt_with(
    key: &Key,
    plaintext: &[u8],
    issued_at: u64,
    iv: &[u8; IV_LEN],
) -> Result<Vec<u8>, StoreError> {
    let ciphertext = symm::encrypt(
        Cipher::aes_128_cbc(),
        key.encryption_key(),
        Some(iv),
        plaintext,
    )?;

    let mut token = Vec::with_capacity(HEADER_LEN + ciphertext.len() + MAC_LEN);
    token.push(TOKEN_VERSION);
    token.extend_from_slice(&issued_at.to_be_bytes());
    token.extend_from_slice(iv);
    token.extend_from_slice(&ciphertext);

    let mac = sign(key, &token)?;
    token.extend_from_slice(&mac);

    Ok(URL_SAFE.encode(token).into_bytes())
}

/// Verifies and decrypts a token. Anything that fails to authenticate is
/// reported as [`StoreError::Authentication`].
pub fn decrypt(key: &Key, token: &[u8]) -> Result<Token, StoreError> {
    let raw = URL_SAFE
        .decode(token.trim_ascii())
        .map_err(|_| StoreError::Authentication)?;

    if raw.len() < HEADER_LEN + MAC_LEN || raw[0] != TOKEN_VERSION {
        return Err(StoreError::Authentication);
    }

    let (signed, mac) = raw.split_at(raw.len() - MAC_LEN);
    let expected = sign(key, signed)?;
    if !memcmp::eq(&expected, mac) {
        return Err(StoreError::Authentication);
    }

    let mut issued_at = [0u8; 8];
    issued_at.copy_from_slice(&signed[1..9]);
    let iv = &signed[9..HEADER_LEN];
    let ciphertext = &signed[HEADER_LEN..];

    let plaintext = symm::decrypt(
        Cipher::aes_128_cbc(),
        key.encryption_key(),
        Some(iv),
        ciphertext,
    )
    .map_err(|_| StoreError::Authentication)?;

    Ok(Token {
        issued_at: u64::from_be_bytes(issued_at),
        plaintext,
    })
}

fn sign(key: &Key, data: &[u8]) -> Result<Vec<u8>, StoreError> {
    let pkey = PKey::hmac(key.signing_key())?;
    let mut signer = Signer::new(MessageDigest::sha256(), &pkey)?;
    signer.update(data)?;
    Ok(signer.sign_to_vec()?)
}
