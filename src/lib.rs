pub mod api_client;
pub mod configuration;
pub mod enrichment;
pub mod foundation;
pub mod presentation;
pub mod process;
pub mod ranking;
pub mod startup;

pub use configuration::*;
pub use foundation::store::{
    derive_key, load, save, ArtistStats, DocumentHandle, PlayEvent, StatisticsDocument,
    StoreError, StoreFile, TrackStats,
};
pub use process::{aggregate, import_export};
