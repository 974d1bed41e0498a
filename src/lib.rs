pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Commands};

pub use adapters::{JsonFileTourStore, MemoryTourStore};
pub use config::TomlConfig;
pub use self::core::{
    assembler::TourAssembler,
    engine::{IngestEngine, IngestMode, IngestRequest},
};
pub use domain::model::{PhotoMeta, PhotoMetaMap, Scene, Tour};
pub use utils::error::{Result, TourError};
