use crate::domain::model::{PhotoMetaMap, Scene, MULTIRES_TYPE};
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{Result, TourError};
use std::path::Path;

pub const SCENE_CONFIG_FILE: &str = "config.json";
/// Public URL segment that replaces the tour storage root.
pub const TOURS: &str = "tours";

/// Rewrites storage paths into public URLs and turns tiled scene directories into [`Scene`]s.
#[derive(Debug, Clone)]
pub struct SceneBuilder {
    public_prefix: String,
    tour_location: String,
}

impl SceneBuilder {
    pub fn new(domain: &str, app_path: &str, tour_location: &Path) -> Self {
        let tour_location = tour_location.to_string_lossy();
        let trimmed = tour_location.trim_end_matches(['/', '\\']);
        Self {
            public_prefix: format!("{}{}", domain, app_path),
            tour_location: if trimmed.is_empty() {
                tour_location.into_owned()
            } else {
                trimmed.to_string()
            },
        }
    }

    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self::new(config.domain(), config.app_path(), config.tour_location())
    }

    /// `<domain><appPath>/` + `path` with the storage root replaced by `tours`, forward slashes only.
    pub fn public_path(&self, path: &Path) -> String {
        let rewritten = path
            .to_string_lossy()
            .replace(&self.tour_location, TOURS)
            .replace('\\', "/");
        format!("{}/{}", self.public_prefix, rewritten.trim_start_matches('/'))
    }

    /// Public URL of a tour's overview map: `<domain><appPath>/tours/<tour>/map.<ext>`.
    pub fn map_url(&self, tour_name: &str, map_file: &Path) -> String {
        let extension = map_file
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!(
            "{}/{}/{}/map.{}",
            self.public_prefix, TOURS, tour_name, extension
        )
    }

    pub fn build(&self, scene_dir: &Path, meta: &PhotoMetaMap, north_offset: i32) -> Result<Scene> {
        let id = scene_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| TourError::UnsupportedFileTree {
                message: format!("Scene directory has no name: {}", scene_dir.display()),
                source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
            })?;

        let config_path = scene_dir.join(SCENE_CONFIG_FILE);
        let content =
            std::fs::read_to_string(&config_path).map_err(|source| TourError::UnsupportedFileTree {
                message: format!("Failed to read: {}", scene_dir.display()),
                source,
            })?;
        let mut scene: Scene =
            serde_json::from_str(&content).map_err(|source| TourError::SceneConfig {
                path: config_path.clone(),
                source,
            })?;

        scene.title = id.clone();
        scene.scene_type = MULTIRES_TYPE.to_string();
        scene.north_offset = north_offset;
        scene.photo_meta = meta.get(&id).cloned();

        let base_path = self.public_path(scene_dir);
        tracing::debug!("Base Path: {}", base_path);
        scene.multi_res.base_path = base_path;
        scene.hot_spots = Vec::new();
        scene.id = id;

        Ok(scene)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{Exif, PhotoMeta};
    use tempfile::TempDir;

    const CONFIG_JSON: &str = r#"{
        "hfov": 100.0,
        "type": "equirectangular",
        "hotSpots": [{"pitch": 1.0, "yaw": 2.0, "type": "scene", "sceneId": "other"}],
        "multiRes": {
            "basePath": ".",
            "path": "/%l/%s%y_%x",
            "fallbackPath": "/fallback/%s",
            "extension": "jpg",
            "tileResolution": 512,
            "maxLevel": 3,
            "cubeResolution": 1296
        }
    }"#;

    #[test]
    fn test_public_path_rewrites_storage_root() {
        let builder = SceneBuilder::new("https://x.test", "/app", Path::new("/data/tours"));
        assert_eq!(
            builder.public_path(Path::new("/data/tours/demo/multires/room1")),
            "https://x.test/app/tours/demo/multires/room1"
        );

        let trailing = SceneBuilder::new("https://x.test", "/app", Path::new("/data/tours/"));
        assert_eq!(
            trailing.public_path(Path::new("/data/tours/demo/multires/room1")),
            "https://x.test/app/tours/demo/multires/room1"
        );
    }

    #[test]
    fn test_public_path_normalizes_backslashes() {
        let builder = SceneBuilder::new("https://x.test", "", Path::new(r"D:\tours"));
        let url = builder.public_path(Path::new(r"D:\tours\demo\multires\room1"));
        assert_eq!(url, "https://x.test/tours/demo/multires/room1");
        assert!(!url.contains('\\'));
    }

    #[test]
    fn test_map_url() {
        let builder = SceneBuilder::new("https://x.test", "/app", Path::new("/data/tours"));
        assert_eq!(
            builder.map_url("demo", Path::new("/tmp/upload-123.png")),
            "https://x.test/app/tours/demo/map.png"
        );
    }

    #[test]
    fn test_build_scene_from_config() {
        let dir = TempDir::new().unwrap();
        let scene_dir = dir.path().join("demo").join("multires").join("hall");
        std::fs::create_dir_all(&scene_dir).unwrap();
        std::fs::write(scene_dir.join(SCENE_CONFIG_FILE), CONFIG_JSON).unwrap();

        let mut meta = PhotoMetaMap::new();
        meta.insert(
            "hall".to_string(),
            PhotoMeta {
                exif: Some(Exif {
                    longitude: 8.5,
                    latitude: 47.3,
                }),
                gpano: None,
            },
        );

        let builder = SceneBuilder::new("https://x.test", "/app", dir.path());
        let scene = builder.build(&scene_dir, &meta, 90).unwrap();

        assert_eq!(scene.id, "hall");
        assert_eq!(scene.title, "hall");
        assert_eq!(scene.scene_type, MULTIRES_TYPE);
        assert_eq!(scene.north_offset, 90);
        assert!(scene.hot_spots.is_empty());
        assert_eq!(scene.photo_meta.unwrap().exif.unwrap().latitude, 47.3);
        assert_eq!(
            scene.multi_res.base_path,
            "https://x.test/app/tours/demo/multires/hall"
        );
        assert_eq!(scene.multi_res.tile_resolution, 512);
        assert_eq!(scene.extra.get("hfov"), Some(&serde_json::json!(100.0)));
    }

    #[test]
    fn test_missing_meta_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let scene_dir = dir.path().join("entry");
        std::fs::create_dir_all(&scene_dir).unwrap();
        std::fs::write(scene_dir.join(SCENE_CONFIG_FILE), CONFIG_JSON).unwrap();

        let builder = SceneBuilder::new("https://x.test", "", dir.path());
        let scene = builder.build(&scene_dir, &PhotoMetaMap::new(), 0).unwrap();
        assert!(scene.photo_meta.is_none());
    }

    #[test]
    fn test_unreadable_config_is_structural() {
        let dir = TempDir::new().unwrap();
        let builder = SceneBuilder::new("https://x.test", "", dir.path());

        let empty = dir.path().join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        assert!(matches!(
            builder.build(&empty, &PhotoMetaMap::new(), 0),
            Err(TourError::UnsupportedFileTree { .. })
        ));

        let broken = dir.path().join("broken");
        std::fs::create_dir_all(&broken).unwrap();
        std::fs::write(broken.join(SCENE_CONFIG_FILE), "{\"multiRes\": 3}").unwrap();
        assert!(matches!(
            builder.build(&broken, &PhotoMetaMap::new(), 0),
            Err(TourError::SceneConfig { .. })
        ));
    }
}
