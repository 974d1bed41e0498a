use crate::core::locks::TourLocks;
use crate::core::metadata::{self, MetadataExtractor, PHOTO_META_LEDGER};
use crate::core::preview::PreviewGenerator;
use crate::core::scene::SceneBuilder;
use crate::core::tiles::TileGenerator;
use crate::domain::model::{PhotoMetaMap, Scene, Tour};
use crate::domain::ports::{ConfigProvider, TourStore};
use crate::utils::error::{Result, TourError};
use crate::utils::validation::validate_segment_name;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const MULTIRES: &str = "multires";
pub const DS_STORE: &str = ".DS_Store";
pub const EQUIRECTANGULAR_EXTENSION: &str = "jpg";
const EQUIRECTANGULAR_SCAN_DEPTH: usize = 2;

/// Builds and maintains tour aggregates from the directories the tiling tool produces.
pub struct TourAssembler<S: TourStore> {
    store: S,
    scenes: SceneBuilder,
    tiles: TileGenerator,
    previews: PreviewGenerator,
    metadata: MetadataExtractor,
    tour_location: PathBuf,
    equirectangular_location: PathBuf,
    locks: TourLocks,
}

impl<S: TourStore> TourAssembler<S> {
    pub fn new<C: ConfigProvider>(store: S, config: &C) -> Self {
        Self {
            store,
            scenes: SceneBuilder::from_config(config),
            tiles: TileGenerator::from_config(config),
            previews: PreviewGenerator::new(config.preview_width(), config.preview_height()),
            metadata: MetadataExtractor::new(),
            tour_location: config.tour_location().to_path_buf(),
            equirectangular_location: config.equirectangular_location().to_path_buf(),
            locks: TourLocks::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn multires_root(&self, tour_name: &str) -> PathBuf {
        self.tour_location.join(tour_name).join(MULTIRES)
    }

    pub fn equirectangular_root(&self, tour_name: &str) -> PathBuf {
        self.equirectangular_location.join(tour_name)
    }

    pub fn photo_meta_ledger(&self, tour_name: &str) -> PathBuf {
        self.tour_location.join(tour_name).join(PHOTO_META_LEDGER)
    }

    /// Creates a tour from every scene under its multires directory.
    pub async fn create_tour_from_multires(
        &self,
        tour_name: &str,
        meta: &PhotoMetaMap,
        map_path: Option<String>,
        north_offset: i32,
    ) -> Result<Tour> {
        validate_segment_name("tour", tour_name)?;
        let _guard = self.locks.lock(tour_name).await;

        let scenes = self.scan_scenes(tour_name, meta, north_offset)?;
        let tour = Tour::new(tour_name, scenes, map_path);

        if self.store.exists(tour_name).await? {
            return Err(TourError::TourAlreadyExists(tour_name.to_string()));
        }
        let tour = self.store.insert(tour).await?;

        tracing::info!(
            "✅ Created tour {} with {} scenes",
            tour.name,
            tour.scenes.len()
        );
        Ok(tour)
    }

    /// Merges the scenes under the multires directory into an existing tour.
    pub async fn add_to_tour_from_multires(
        &self,
        tour_name: &str,
        meta: &PhotoMetaMap,
        north_offset: i32,
    ) -> Result<Tour> {
        validate_segment_name("tour", tour_name)?;
        let _guard = self.locks.lock(tour_name).await;

        let scenes = self.scan_scenes(tour_name, meta, north_offset)?;
        let mut tour = self
            .store
            .find_one(tour_name)
            .await?
            .ok_or_else(|| TourError::TourNotFound(tour_name.to_string()))?;

        let added = scenes.len();
        tour.add_scenes(scenes);
        let tour = self.store.save(tour).await?;

        tracing::info!(
            "✅ Added {} scenes to tour {} ({} total)",
            added,
            tour.name,
            tour.scenes.len()
        );
        Ok(tour)
    }

    /// Removes a scene. Returns `None` without touching the store when the tour does not exist.
    pub async fn delete_scene(&self, tour_name: &str, scene_id: &str) -> Result<Option<Tour>> {
        validate_segment_name("tour", tour_name)?;
        let _guard = self.locks.lock(tour_name).await;

        let Some(mut tour) = self.store.find_one(tour_name).await? else {
            tracing::debug!("Tour {} not found, nothing to delete", tour_name);
            return Ok(None);
        };

        if tour.remove_scene(scene_id).is_none() {
            tracing::warn!("Scene {} is not part of tour {}", scene_id, tour_name);
        }
        let tour = self.store.save(tour).await?;
        Ok(Some(tour))
    }

    /// Tiles every equirectangular image of a tour, then removes the source tree.
    ///
    /// Tiling failures abort the conversion and leave the source tree in place;
    /// metadata and preview failures are logged and skipped.
    pub async fn convert_to_multires_from_equirectangular(
        &self,
        tour_name: &str,
    ) -> Result<PhotoMetaMap> {
        validate_segment_name("tour", tour_name)?;
        let _guard = self.locks.lock(tour_name).await;

        let source_root = self.equirectangular_root(tour_name);
        let images = scan_equirectangular_images(&source_root)?;
        tracing::info!(
            "🚀 Converting {} equirectangular images for tour {}",
            images.len(),
            tour_name
        );

        let multires_root = self.multires_root(tour_name);
        let mut meta = PhotoMetaMap::new();

        for image in &images {
            let Some(scene_id) = image
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
            else {
                continue;
            };

            if let Some(photo_meta) = self.metadata.extract_blocking(image).await {
                meta.insert(scene_id.clone(), photo_meta);
            }

            let output = multires_root.join(&scene_id);
            self.tiles.generate(image, &output).await?;
            self.previews.generate(image, &output).await;
        }

        if let Err(e) = metadata::merge_into_ledger(&self.photo_meta_ledger(tour_name), &meta) {
            tracing::warn!("Failed to record photo metadata for {}: {}", tour_name, e);
        }

        if let Err(e) = std::fs::remove_dir_all(&source_root) {
            tracing::warn!(
                "Failed to delete equirectangular directory {}: {}",
                source_root.display(),
                e
            );
        }

        Ok(meta)
    }

    /// Photo metadata recorded by earlier conversions of this tour.
    pub fn load_photo_meta(&self, tour_name: &str) -> Result<PhotoMetaMap> {
        validate_segment_name("tour", tour_name)?;
        metadata::read_ledger(&self.photo_meta_ledger(tour_name))
    }

    pub fn map_path(&self, tour_name: &str, map_file: Option<&Path>) -> Option<String> {
        map_file.map(|file| self.scenes.map_url(tour_name, file))
    }

    /// Copies an overview map into the tour directory as `map.<ext>` and returns its public URL.
    pub fn install_map(&self, tour_name: &str, map_file: &Path) -> Result<String> {
        validate_segment_name("tour", tour_name)?;
        let extension = map_file
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tour_dir = self.tour_location.join(tour_name);
        std::fs::create_dir_all(&tour_dir)?;
        std::fs::copy(map_file, tour_dir.join(format!("map.{}", extension)))?;

        Ok(self.scenes.map_url(tour_name, map_file))
    }

    pub async fn find_all_tours(&self) -> Result<Vec<Tour>> {
        self.store.find_all().await
    }

    pub async fn find_all_tours_with_basic(&self) -> Result<Vec<Tour>> {
        self.store.find_all_with_basic().await
    }

    pub async fn find_tours_by_group_with_basic(&self, group_name: &str) -> Result<Vec<Tour>> {
        self.store.find_by_group_name_with_basic(group_name).await
    }

    pub async fn find_all_tour_names(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .find_all_with_basic()
            .await?
            .into_iter()
            .map(|tour| tour.name)
            .collect())
    }

    pub async fn find_one(&self, tour_name: &str) -> Result<Option<Tour>> {
        validate_segment_name("tour", tour_name)?;
        self.store.find_one(tour_name).await
    }

    pub async fn save(&self, tour: Tour) -> Result<Tour> {
        validate_segment_name("tour", &tour.name)?;
        let _guard = self.locks.lock(&tour.name).await;
        self.store.save(tour).await
    }

    pub async fn delete(&self, tour: &Tour) -> Result<()> {
        validate_segment_name("tour", &tour.name)?;
        let _guard = self.locks.lock(&tour.name).await;
        self.store.delete(tour).await
    }

    pub async fn exists(&self, tour_name: &str) -> Result<bool> {
        validate_segment_name("tour", tour_name)?;
        self.store.exists(tour_name).await
    }

    fn scan_scenes(&self, tour_name: &str, meta: &PhotoMetaMap, north_offset: i32) -> Result<Vec<Scene>> {
        let root = self.multires_root(tour_name);
        let scene_dirs = scan_scene_dirs(&root)?;
        tracing::debug!("Found {} scene directories in {}", scene_dirs.len(), root.display());

        scene_dirs
            .iter()
            .map(|dir| self.scenes.build(dir, meta, north_offset))
            .collect()
    }
}

fn is_ignored_entry(name: &str) -> bool {
    name.eq_ignore_ascii_case(MULTIRES) || name.eq_ignore_ascii_case(DS_STORE)
}

/// Direct sub-directories of a multires root, minus the `multires` marker and `.DS_Store`.
pub fn scan_scene_dirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(TourError::UnsupportedFileTree {
            message: "Multi-resolution directory is not found.".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, root.display().to_string()),
        });
    }

    let mut scene_dirs = Vec::new();
    for entry in WalkDir::new(root).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| TourError::UnsupportedFileTree {
            message: "Multi-resolution directory is not readable.".to_string(),
            source: e.into(),
        })?;

        if is_ignored_entry(&entry.file_name().to_string_lossy()) {
            continue;
        }
        if !entry.file_type().is_dir() {
            tracing::debug!("Skipping non-directory entry {}", entry.path().display());
            continue;
        }
        scene_dirs.push(entry.into_path());
    }

    Ok(scene_dirs)
}

/// `*.jpg` files (any case) at most two levels below `root`.
pub fn scan_equirectangular_images(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(TourError::UnsupportedFileTree {
            message: "Failed to read equirectangular directory.".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, root.display().to_string()),
        });
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(root)
        .max_depth(EQUIRECTANGULAR_SCAN_DEPTH)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| TourError::UnsupportedFileTree {
            message: "Failed to read equirectangular directory.".to_string(),
            source: e.into(),
        })?;

        let is_image = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.to_string_lossy().eq_ignore_ascii_case(EQUIRECTANGULAR_EXTENSION));
        if is_image {
            images.push(entry.into_path());
        }
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scan_scene_dirs_skips_markers() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join(MULTIRES);
        for name in ["entry", "hall", "MultiRes", ".ds_store"] {
            std::fs::create_dir_all(root.join(name)).unwrap();
        }
        std::fs::write(root.join("notes.txt"), b"stray").unwrap();

        let names: Vec<String> = scan_scene_dirs(&root)
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["entry", "hall"]);
    }

    #[test]
    fn test_scan_scene_dirs_requires_root() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            scan_scene_dirs(&dir.path().join("missing")),
            Err(TourError::UnsupportedFileTree { .. })
        ));
    }

    #[test]
    fn test_scan_equirectangular_depth_and_extension() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("demo");
        std::fs::create_dir_all(root.join("floor1").join("deeper")).unwrap();
        std::fs::write(root.join("entry.jpg"), b"").unwrap();
        std::fs::write(root.join("floor1").join("hall.JPG"), b"").unwrap();
        std::fs::write(root.join("floor1").join("deeper").join("attic.jpg"), b"").unwrap();
        std::fs::write(root.join("notes.txt"), b"").unwrap();

        let images = scan_equirectangular_images(&root).unwrap();
        let stems: Vec<String> = images
            .iter()
            .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(stems, vec!["entry", "hall"]);
    }
}
