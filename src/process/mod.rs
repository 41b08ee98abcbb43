mod aggregate;
mod import;

pub use aggregate::*;
pub use import::{import_export, read_export, ImportError, HISTORY_FILE_PREFIX};
