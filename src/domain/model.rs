use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scene type tag understood by the viewer's multi-resolution renderer.
pub const MULTIRES_TYPE: &str = "multires";

/// Photo metadata keyed by scene id (the source image's base name).
pub type PhotoMetaMap = HashMap<String, PhotoMeta>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub name: String,
    #[serde(default)]
    pub scenes: Vec<Scene>,
    #[serde(default, rename = "firstScene")]
    pub first_scene_id: Option<String>,
    #[serde(default)]
    pub map_path: Option<String>,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tour {
    pub fn new(name: impl Into<String>, scenes: Vec<Scene>, map_path: Option<String>) -> Self {
        let now = Utc::now();
        let mut tour = Self {
            name: name.into(),
            scenes: Vec::new(),
            first_scene_id: None,
            map_path,
            group_name: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        tour.add_scenes(scenes);
        tour
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.id == id)
    }

    pub fn scene_ids(&self) -> Vec<&str> {
        self.scenes.iter().map(|scene| scene.id.as_str()).collect()
    }

    /// Merges scenes by id. A re-ingested scene replaces the stored one.
    pub fn add_scenes(&mut self, scenes: Vec<Scene>) {
        for scene in scenes {
            match self.scenes.iter_mut().find(|existing| existing.id == scene.id) {
                Some(existing) => *existing = scene,
                None => self.scenes.push(scene),
            }
        }
        self.ensure_first_scene();
    }

    /// Removes a scene and re-points `first_scene_id` when it referenced the removed scene.
    pub fn remove_scene(&mut self, id: &str) -> Option<Scene> {
        let position = self.scenes.iter().position(|scene| scene.id == id)?;
        let removed = self.scenes.remove(position);
        if self.first_scene_id.as_deref() == Some(id) {
            self.first_scene_id = None;
        }
        self.ensure_first_scene();
        Some(removed)
    }

    fn ensure_first_scene(&mut self) {
        let valid = self
            .first_scene_id
            .as_deref()
            .is_some_and(|id| self.scenes.iter().any(|scene| scene.id == id));
        if !valid {
            self.first_scene_id = self.scenes.first().map(|scene| scene.id.clone());
        }
    }

    /// Bumps the aggregate version; called by stores on every write.
    pub fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// Listing projection without scene payloads.
    pub fn basic(&self) -> Self {
        Self {
            scenes: Vec::new(),
            ..self.clone()
        }
    }

    /// Tour document in the layout the panorama viewer loads.
    pub fn viewer_config(&self) -> serde_json::Value {
        let mut scenes = serde_json::Map::new();
        for scene in &self.scenes {
            let mut value = serde_json::to_value(scene).unwrap_or(serde_json::Value::Null);
            if let serde_json::Value::Object(fields) = &mut value {
                fields.remove("id");
                fields.remove("photoMeta");
            }
            scenes.insert(scene.id.clone(), value);
        }

        serde_json::json!({
            "default": { "firstScene": self.first_scene_id },
            "scenes": scenes,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub scene_type: String,
    #[serde(default)]
    pub north_offset: i32,
    pub multi_res: MultiRes,
    #[serde(default)]
    pub hot_spots: Vec<HotSpot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_meta: Option<PhotoMeta>,
    /// Viewer fields written by the tiling tool that the core does not interpret (hfov, haov, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiRes {
    #[serde(default)]
    pub base_path: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_path: Option<String>,
    pub extension: String,
    pub tile_resolution: u32,
    pub max_level: u32,
    pub cube_resolution: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotSpot {
    pub pitch: f64,
    pub yaw: f64,
    #[serde(rename = "type")]
    pub hot_spot_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_yaw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pitch: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoMeta {
    #[serde(default)]
    pub exif: Option<Exif>,
    #[serde(default)]
    pub gpano: Option<GPano>,
}

impl PhotoMeta {
    pub fn is_empty(&self) -> bool {
        self.exif.is_none() && self.gpano.is_none()
    }
}

/// GPS position in signed decimal degrees (east and north positive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Exif {
    pub longitude: f64,
    pub latitude: f64,
}

/// Photo Sphere (GPano) XMP properties, named as in the XMP schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GPano {
    pub use_panorama_viewer: Option<String>,
    pub capture_software: Option<String>,
    pub stitching_software: Option<String>,
    pub projection_type: Option<String>,
    pub pose_heading_degrees: Option<f64>,
    pub pose_pitch_degrees: Option<f64>,
    pub pose_roll_degrees: Option<f64>,
    pub initial_view_heading_degrees: Option<f64>,
    pub initial_view_pitch_degrees: Option<f64>,
    pub initial_view_roll_degrees: Option<f64>,
    #[serde(rename = "InitialHorizontalFOVDegrees")]
    pub initial_horizontal_fov_degrees: Option<f64>,
    pub initial_camera_dolly: Option<f64>,
    pub first_photo_date: Option<String>,
    pub last_photo_date: Option<String>,
    pub source_photos_count: Option<u32>,
    pub exposure_lock_used: Option<String>,
    pub cropped_area_image_width_pixels: Option<u32>,
    pub cropped_area_image_height_pixels: Option<u32>,
    pub full_pano_width_pixels: Option<u32>,
    pub full_pano_height_pixels: Option<u32>,
    pub cropped_area_left_pixels: Option<u32>,
    pub cropped_area_top_pixels: Option<u32>,
}

impl GPano {
    pub fn is_empty(&self) -> bool {
        *self == GPano::default()
    }
}

/// Controls how the tiling command line is quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProfile {
    Development,
    Production,
}

impl ExecutionProfile {
    /// `active` is a comma separated profile list; any `dev` entry selects development.
    pub fn from_active_profiles(active: &str) -> Self {
        let is_dev = active
            .split(',')
            .any(|profile| profile.trim().eq_ignore_ascii_case("dev"));
        if is_dev {
            ExecutionProfile::Development
        } else {
            ExecutionProfile::Production
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(id: &str) -> Scene {
        Scene {
            id: id.to_string(),
            title: id.to_string(),
            scene_type: MULTIRES_TYPE.to_string(),
            north_offset: 0,
            multi_res: MultiRes {
                base_path: format!("https://x.test/app/tours/demo/multires/{}", id),
                path: "/%l/%s%y_%x".to_string(),
                fallback_path: None,
                extension: "jpg".to_string(),
                tile_resolution: 512,
                max_level: 3,
                cube_resolution: 1296,
            },
            hot_spots: Vec::new(),
            photo_meta: None,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_empty_tour_has_no_first_scene() {
        let tour = Tour::new("demo", Vec::new(), None);
        assert!(tour.first_scene_id.is_none());
    }

    #[test]
    fn test_first_scene_is_a_member() {
        let tour = Tour::new("demo", vec![scene("entry"), scene("hall")], None);
        let first = tour.first_scene_id.clone().unwrap();
        assert!(tour.scene(&first).is_some());
    }

    #[test]
    fn test_remove_first_scene_reassigns() {
        let mut tour = Tour::new("demo", vec![scene("entry"), scene("hall")], None);
        let first = tour.first_scene_id.clone().unwrap();

        assert!(tour.remove_scene(&first).is_some());
        let next = tour.first_scene_id.clone().unwrap();
        assert_ne!(next, first);
        assert!(tour.scene(&next).is_some());

        tour.remove_scene(&next);
        assert!(tour.scenes.is_empty());
        assert!(tour.first_scene_id.is_none());
    }

    #[test]
    fn test_remove_other_scene_keeps_first() {
        let mut tour = Tour::new("demo", vec![scene("entry"), scene("hall")], None);
        tour.first_scene_id = Some("hall".to_string());
        tour.remove_scene("entry");
        assert_eq!(tour.first_scene_id.as_deref(), Some("hall"));
        assert!(tour.remove_scene("missing").is_none());
    }

    #[test]
    fn test_add_scenes_replaces_by_id() {
        let mut tour = Tour::new("demo", vec![scene("entry")], None);
        let mut updated = scene("entry");
        updated.north_offset = 45;
        tour.add_scenes(vec![updated, scene("hall")]);

        assert_eq!(tour.scenes.len(), 2);
        assert_eq!(tour.scene("entry").unwrap().north_offset, 45);
        assert_eq!(tour.first_scene_id.as_deref(), Some("entry"));
    }

    #[test]
    fn test_scene_json_uses_viewer_field_names() {
        let mut entry = scene("entry");
        entry.extra.insert("hfov".to_string(), serde_json::json!(100.0));
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["type"], "multires");
        assert_eq!(value["northOffset"], 0);
        assert_eq!(value["multiRes"]["tileResolution"], 512);
        assert_eq!(value["hfov"], 100.0);
        assert!(value.get("photoMeta").is_none());
    }

    #[test]
    fn test_viewer_config_layout() {
        let tour = Tour::new("demo", vec![scene("entry")], None);
        let config = tour.viewer_config();
        assert_eq!(config["default"]["firstScene"], "entry");
        assert_eq!(config["scenes"]["entry"]["title"], "entry");
        assert!(config["scenes"]["entry"].get("id").is_none());
    }

    #[test]
    fn test_execution_profile_from_active_profiles() {
        assert_eq!(
            ExecutionProfile::from_active_profiles("dev"),
            ExecutionProfile::Development
        );
        assert_eq!(
            ExecutionProfile::from_active_profiles("local, DEV"),
            ExecutionProfile::Development
        );
        assert_eq!(
            ExecutionProfile::from_active_profiles("prod"),
            ExecutionProfile::Production
        );
        assert_eq!(
            ExecutionProfile::from_active_profiles(""),
            ExecutionProfile::Production
        );
    }
}
