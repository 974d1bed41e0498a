pub mod assembler;
pub mod engine;
pub mod locks;
pub mod metadata;
pub mod preview;
pub mod scene;
pub mod tiles;

pub use crate::domain::model::{PhotoMeta, PhotoMetaMap, Scene, Tour};
pub use crate::domain::ports::{ConfigProvider, TourStore};
pub use crate::utils::error::Result;
