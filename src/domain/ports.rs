use crate::domain::model::{ExecutionProfile, Tour};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Aggregate store for tours, keyed by tour name.
#[async_trait]
pub trait TourStore: Send + Sync {
    async fn find_one(&self, name: &str) -> Result<Option<Tour>>;
    /// Fails with `TourAlreadyExists` when the name is taken.
    async fn insert(&self, tour: Tour) -> Result<Tour>;
    async fn save(&self, tour: Tour) -> Result<Tour>;
    async fn delete(&self, tour: &Tour) -> Result<()>;
    async fn exists(&self, name: &str) -> Result<bool>;
    async fn find_all(&self) -> Result<Vec<Tour>>;
    async fn find_all_with_basic(&self) -> Result<Vec<Tour>>;
    async fn find_by_group_name_with_basic(&self, group_name: &str) -> Result<Vec<Tour>>;
}

pub trait ConfigProvider: Send + Sync {
    /// Public origin, e.g. `https://tours.example.com`.
    fn domain(&self) -> &str;
    /// Application path prefix appended to the domain, e.g. `/app`.
    fn app_path(&self) -> &str;
    fn tour_location(&self) -> &Path;
    fn equirectangular_location(&self) -> &Path;
    fn backup_location(&self) -> &Path;
    fn system_command(&self) -> &str;
    fn interpreter(&self) -> &str;
    fn generate_script(&self) -> &str;
    fn nona(&self) -> &str;
    fn tile_timeout(&self) -> Option<Duration>;
    fn preview_width(&self) -> u32;
    fn preview_height(&self) -> u32;
    fn execution_profile(&self) -> ExecutionProfile;
}
