use serde_json::{Map, Value, json};

use crate::error::{Result, TourError};
use crate::escape::unescape_text;
use crate::graph::TourGraph;
use crate::scene::{Hotspot, ImageRef, Scene};
use crate::snapshot::{HotspotSnapshot, PANORAMA_TYPE};
use crate::storage::RecordStore;

/// A published tour reconstructed from its record.
#[derive(Clone, Debug)]
pub struct LoadedTour {
    pub id: String,
    pub project_name: String,
    pub paid: bool,
    pub graph: TourGraph,
    /// One message per scene or hotspot skipped because it was malformed.
    pub warnings: Vec<String>,
}

/// Fetch and rebuild a published tour.
///
/// # Errors
/// * `NotFound` when no record has this id
/// * `Corrupt` when the record holds no usable scene structure
pub fn load(records: &dyn RecordStore, id: &str) -> Result<LoadedTour> {
    let value = records
        .fetch(id)?
        .ok_or_else(|| TourError::not_found(format!("tour '{}'", id)))?;
    parse_record(id, &value)
}

/// Validate a loosely typed record and rebuild its graph.
///
/// Malformed scenes and hotspots are logged and skipped; only a record with
/// no usable scene at all is rejected.
pub fn parse_record(id: &str, value: &Value) -> Result<LoadedTour> {
    let record = value
        .as_object()
        .ok_or_else(|| TourError::Corrupt(format!("tour '{}' is not an object", id)))?;
    let structure = record
        .get("structure")
        .and_then(Value::as_object)
        .ok_or_else(|| TourError::Corrupt(format!("tour '{}' has no scene structure", id)))?;

    let mut warnings = Vec::new();
    let mut scenes = Vec::new();
    for (scene_id, entry) in structure {
        match parse_scene(scene_id, entry, &mut warnings) {
            Ok(scene) => scenes.push(scene),
            Err(reason) => warnings.push(format!("scene '{}' skipped: {}", scene_id, reason)),
        }
    }

    let initial = record
        .get("initial_scene")
        .and_then(Value::as_str)
        .map(str::to_string);
    let (graph, dropped) = TourGraph::from_parts(scenes, initial);
    warnings.extend(dropped.into_iter().map(|m| format!("{} skipped", m)));

    for warning in &warnings {
        log::warn!("Tour {}: {}", id, warning);
    }
    if graph.is_empty() {
        return Err(TourError::Corrupt(format!("tour '{}' has no valid scenes", id)));
    }

    Ok(LoadedTour {
        id: id.to_string(),
        project_name: record
            .get("project_name")
            .and_then(Value::as_str)
            .unwrap_or(id)
            .to_string(),
        paid: record.get("paid").and_then(Value::as_bool).unwrap_or(false),
        graph,
        warnings,
    })
}

fn parse_scene(
    id: &str,
    entry: &Value,
    warnings: &mut Vec<String>,
) -> std::result::Result<Scene, String> {
    let entry = entry.as_object().ok_or("not an object")?;
    let panorama = entry
        .get("panorama")
        .and_then(Value::as_str)
        .filter(|url| !url.trim().is_empty())
        .ok_or("no image URL")?;
    let image = ImageRef::from_data_uri(panorama).unwrap_or_else(|| ImageRef::remote(panorama));

    let name = match entry.get("name").and_then(Value::as_str) {
        Some(escaped) => unescape_text(escaped).map_err(|e| e.to_string())?,
        None => id.to_string(),
    };

    let mut scene = Scene::create(id, &name, image);
    let hotspots = entry
        .get("hotSpots")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    for (index, raw) in hotspots.iter().enumerate() {
        match parse_hotspot(raw) {
            Ok(hotspot) => scene.hotspots.push(hotspot),
            Err(reason) => warnings.push(format!(
                "hotspot #{} in scene '{}' skipped: {}",
                index, id, reason
            )),
        }
    }
    Ok(scene)
}

fn parse_hotspot(raw: &Value) -> std::result::Result<Hotspot, String> {
    let snapshot: HotspotSnapshot =
        serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;
    snapshot.restore().map_err(|e| e.to_string())
}

/// Pannellum configuration for a read-only view of `graph`.
pub fn viewer_config(graph: &TourGraph) -> Value {
    let mut scenes = Map::new();
    for scene in graph.scenes() {
        let panorama = match &scene.image {
            ImageRef::Remote { url } => url.clone(),
            image => image.to_data_uri().unwrap_or_default(),
        };
        let hotspots: Vec<Value> = scene
            .hotspots
            .iter()
            .map(|h| {
                json!({
                    "id": h.id,
                    "pitch": h.position.pitch,
                    "yaw": h.position.yaw,
                    "type": "scene",
                    "sceneId": h.target,
                    "targetYaw": h.target_yaw,
                    "text": h.text,
                })
            })
            .collect();
        scenes.insert(
            scene.id.clone(),
            json!({
                "type": PANORAMA_TYPE,
                "title": scene.name,
                "panorama": panorama,
                "hotSpots": hotspots,
            }),
        );
    }

    json!({
        "default": {
            "firstScene": graph.initial_scene(),
            "autoLoad": true,
            "loadingNotice": "Loading...",
        },
        "scenes": scenes,
    })
}

/// `<origin>/viewer?tourId=<id>`
pub fn view_link(origin: &str, id: &str) -> String {
    format!(
        "{}/viewer?tourId={}",
        origin.trim_end_matches('/'),
        urlencoding::encode(id)
    )
}

/// Shareable link for a tour whose access flag is set.
pub fn share_link(origin: &str, tour: &LoadedTour) -> Result<String> {
    if !tour.paid {
        return Err(TourError::SharingLocked(tour.id.clone()));
    }
    Ok(view_link(origin, &tour.id))
}
