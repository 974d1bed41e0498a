use crate::domain::model::Tour;
use crate::domain::ports::TourStore;
use crate::utils::error::{Result, TourError};
use crate::utils::validation::validate_segment_name;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const TOUR_FILE_EXTENSION: &str = "json";

/// 每個 tour 一個 `<name>.json` 檔案
#[derive(Debug)]
pub struct JsonFileTourStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileTourStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `<base>/<name>.json`; names that would leave the store directory are rejected.
    fn tour_file(&self, name: &str) -> Result<PathBuf> {
        validate_segment_name("tour", name)?;
        Ok(self
            .base_path
            .join(format!("{}.{}", name, TOUR_FILE_EXTENSION)))
    }

    async fn read_tour(&self, path: &Path) -> Result<Option<Tour>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes to a temp file first so readers never see a half-written tour.
    async fn write_tour(&self, tour: &Tour) -> Result<()> {
        tokio::fs::create_dir_all(&self.base_path).await?;

        let target = self.tour_file(&tour.name)?;
        let temp = self
            .base_path
            .join(format!(".{}.{}.tmp", tour.name, uuid::Uuid::new_v4()));
        let data = serde_json::to_vec_pretty(tour)?;

        tokio::fs::write(&temp, data).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<Tour>> {
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut tours = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_tour_file = path
                .extension()
                .is_some_and(|ext| ext == TOUR_FILE_EXTENSION)
                && !entry.file_name().to_string_lossy().starts_with('.');
            if !is_tour_file {
                continue;
            }

            match self.read_tour(&path).await {
                Ok(Some(tour)) => tours.push(tour),
                Ok(None) => {}
                Err(e) => tracing::warn!("Skipping unreadable tour file {}: {}", path.display(), e),
            }
        }

        tours.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tours)
    }
}

#[async_trait]
impl TourStore for JsonFileTourStore {
    async fn find_one(&self, name: &str) -> Result<Option<Tour>> {
        self.read_tour(&self.tour_file(name)?).await
    }

    async fn insert(&self, mut tour: Tour) -> Result<Tour> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(self.tour_file(&tour.name)?).await? {
            return Err(TourError::TourAlreadyExists(tour.name));
        }
        tour.touch();
        self.write_tour(&tour).await?;
        tracing::debug!("Inserted tour {} (version {})", tour.name, tour.version);
        Ok(tour)
    }

    async fn save(&self, mut tour: Tour) -> Result<Tour> {
        let _guard = self.write_lock.lock().await;
        tour.touch();
        self.write_tour(&tour).await?;
        tracing::debug!("Saved tour {} (version {})", tour.name, tour.version);
        Ok(tour)
    }

    async fn delete(&self, tour: &Tour) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.tour_file(&tour.name)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.tour_file(name)?).await?)
    }

    async fn find_all(&self) -> Result<Vec<Tour>> {
        self.load_all().await
    }

    async fn find_all_with_basic(&self) -> Result<Vec<Tour>> {
        Ok(self.load_all().await?.iter().map(Tour::basic).collect())
    }

    async fn find_by_group_name_with_basic(&self, group_name: &str) -> Result<Vec<Tour>> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .filter(|tour| tour.group_name.as_deref() == Some(group_name))
            .map(Tour::basic)
            .collect())
    }
}
