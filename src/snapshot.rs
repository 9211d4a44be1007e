//! Serialized shapes shared by exported bundles and persisted tour records.
//!
//! Text fields in these types are always escaped (see [`crate::escape`]);
//! the conversions here are the only place the escaping is applied or undone.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::escape::{escape_text, unescape_text};
use crate::scene::{Hotspot, ImageRef, Position, Scene};

pub const PANORAMA_TYPE: &str = "equirectangular";
pub const HOTSPOT_TYPE: &str = "scene";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotSnapshot {
    pub id: String,
    pub pitch: f64,
    pub yaw: f64,
    #[serde(rename = "type", default = "hotspot_type")]
    pub kind: String,
    #[serde(default)]
    pub text: String,
    pub scene_id: String,
    #[serde(default)]
    pub target_yaw: f64,
}

fn hotspot_type() -> String {
    HOTSPOT_TYPE.to_string()
}

fn panorama_type() -> String {
    PANORAMA_TYPE.to_string()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneSnapshot {
    #[serde(rename = "type", default = "panorama_type")]
    pub kind: String,
    /// Escaped display name.
    pub name: String,
    /// Image URL or data URI.
    pub panorama: String,
    #[serde(default)]
    pub hot_spots: Vec<HotspotSnapshot>,
}

impl HotspotSnapshot {
    pub fn capture(hotspot: &Hotspot) -> Self {
        HotspotSnapshot {
            id: hotspot.id.clone(),
            pitch: hotspot.position.pitch,
            yaw: hotspot.position.yaw,
            kind: HOTSPOT_TYPE.to_string(),
            text: escape_text(&hotspot.text),
            scene_id: hotspot.target.clone(),
            target_yaw: hotspot.target_yaw,
        }
    }

    pub fn restore(&self) -> Result<Hotspot> {
        Ok(Hotspot {
            id: self.id.clone(),
            position: Position::new(self.pitch, self.yaw),
            target: self.scene_id.clone(),
            target_yaw: self.target_yaw,
            text: unescape_text(&self.text)?,
        })
    }
}

impl SceneSnapshot {
    /// Capture a scene with `panorama` standing in for its image.
    pub fn capture(scene: &Scene, panorama: String) -> Self {
        SceneSnapshot {
            kind: PANORAMA_TYPE.to_string(),
            name: escape_text(&scene.name),
            panorama,
            hot_spots: scene.hotspots.iter().map(HotspotSnapshot::capture).collect(),
        }
    }

    pub fn restore(&self, id: &str, image: ImageRef) -> Result<Scene> {
        let mut scene = Scene::create(id, &unescape_text(&self.name)?, image);
        scene.hotspots = self
            .hot_spots
            .iter()
            .map(HotspotSnapshot::restore)
            .collect::<Result<_>>()?;
        Ok(scene)
    }
}

/// A published tour as stored in the record store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TourRecord {
    pub id: String,
    pub owner: String,
    pub project_name: String,
    pub folder_name: String,
    pub thumb_url: Option<String>,
    /// Standalone bundle of this revision.
    #[serde(default)]
    pub bundle_url: Option<String>,
    pub initial_scene: String,
    pub structure: IndexMap<String, SceneSnapshot>,
    #[serde(default)]
    pub paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scene_snapshot_escapes_once() {
        let mut scene = Scene::create("s1", "Sala \"Master\" & Suíte", ImageRef::remote("u"));
        scene.hotspots.push(Hotspot {
            id: "h".to_string(),
            position: Position::new(-3.5, 120.25),
            target: "s1".to_string(),
            target_yaw: 90.0,
            text: "Go to Sala \"Master\" & Suíte".to_string(),
        });

        let snapshot = SceneSnapshot::capture(&scene, "u".to_string());
        assert!(!snapshot.name.contains('"'));
        assert!(!snapshot.hot_spots[0].text.contains('&'));

        let restored = snapshot.restore("s1", ImageRef::remote("u")).unwrap();
        assert_eq!(restored, scene);
    }

    #[test]
    fn hotspot_snapshot_uses_viewer_field_names() {
        let json = serde_json::json!({
            "id": "h1", "pitch": 1.0, "yaw": 2.0, "type": "scene",
            "text": "Go%20to%20B", "sceneId": "b", "targetYaw": 45.0
        });
        let hotspot: HotspotSnapshot = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(hotspot.scene_id, "b");
        assert_eq!(serde_json::to_value(&hotspot).unwrap(), json);
    }

    #[test]
    fn missing_target_yaw_defaults_to_zero() {
        let json = serde_json::json!({ "id": "h1", "pitch": 1.0, "yaw": 2.0, "sceneId": "b" });
        let hotspot: HotspotSnapshot = serde_json::from_value(json).unwrap();
        assert_eq!(hotspot.target_yaw, 0.0);
        assert_eq!(hotspot.restore().unwrap().text, "");
    }
}
