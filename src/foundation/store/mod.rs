mod cipher;
mod handle;
mod models;
mod operations;
mod ordered_map;
mod store_error;

pub use cipher::{derive_key, Key, Token, LEGACY_KDF_ITERATIONS};
pub use handle::DocumentHandle;
pub use models::*;
pub use operations::{load, save, KeyParams, StoreFile, UnlockedStore};
pub use ordered_map::OrderedMap;
pub use store_error::StoreError;
