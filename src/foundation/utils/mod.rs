mod passphrase;
mod string_utils;

pub use passphrase::{read_passphrase, KeyOutcome, PassphraseInput};
pub use string_utils::*;
