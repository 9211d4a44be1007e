use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TourError};
use crate::scene::{Hotspot, ImageRef, Position, Scene, hotspot_label};

/// The scenes of one tour and the hotspots linking them.
///
/// Every hotspot target names a scene present in the map; all mutations keep
/// that invariant before returning.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TourGraph {
    scenes: IndexMap<String, Scene>,
    initial: Option<String>,
    hotspot_seq: u64,
}

impl TourGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a graph from loose parts, dropping what would break invariants.
    ///
    /// Duplicate scenes keep their first occurrence, hotspots whose target is
    /// missing or whose id repeats are dropped. Returns a message per drop.
    pub fn from_parts(scenes: Vec<Scene>, initial: Option<String>) -> (Self, Vec<String>) {
        let mut graph = TourGraph::new();
        let mut dropped = Vec::new();

        for scene in scenes {
            if scene.id.trim().is_empty() {
                dropped.push("scene with empty id".to_string());
                continue;
            }
            if graph.scenes.contains_key(&scene.id) {
                dropped.push(format!("duplicate scene '{}'", scene.id));
                continue;
            }
            graph.scenes.insert(scene.id.clone(), scene);
        }

        let ids: Vec<String> = graph.scenes.keys().cloned().collect();
        let mut seen = std::collections::HashSet::new();
        for scene in graph.scenes.values_mut() {
            let owner = scene.id.clone();
            scene.hotspots.retain(|h| {
                if !ids.contains(&h.target) {
                    dropped.push(format!(
                        "hotspot '{}' in '{}' targets missing scene '{}'",
                        h.id, owner, h.target
                    ));
                    false
                } else if !seen.insert(h.id.clone()) {
                    dropped.push(format!("duplicate hotspot '{}' in '{}'", h.id, owner));
                    false
                } else {
                    true
                }
            });
        }

        graph.initial = initial.filter(|id| graph.scenes.contains_key(id));
        (graph, dropped)
    }

    /// Run an already deserialized graph through [`TourGraph::from_parts`].
    pub fn revalidate(self) -> (Self, Vec<String>) {
        let seq = self.hotspot_seq;
        let (mut graph, dropped) =
            Self::from_parts(self.scenes.into_values().collect(), self.initial);
        graph.hotspot_seq = seq;
        (graph, dropped)
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Scenes in creation order.
    pub fn scenes(&self) -> impl Iterator<Item = &Scene> {
        self.scenes.values()
    }

    pub fn scene_ids(&self) -> impl Iterator<Item = &str> {
        self.scenes.keys().map(String::as_str)
    }

    pub fn contains_scene(&self, id: &str) -> bool {
        self.scenes.contains_key(id)
    }

    pub fn scene(&self, id: &str) -> Result<&Scene> {
        self.scenes
            .get(id)
            .ok_or_else(|| TourError::not_found(format!("scene '{}'", id)))
    }

    pub fn add_scene(&mut self, id: &str, name: &str, image: ImageRef) -> Result<&Scene> {
        let id = id.trim();
        if id.is_empty() {
            return Err(TourError::InvalidId(id.to_string()));
        }
        if self.scenes.contains_key(id) {
            return Err(TourError::DuplicateId(id.to_string()));
        }

        self.scenes
            .insert(id.to_string(), Scene::create(id, name, image));
        log::debug!("Added scene '{}'", id);
        self.scene(id)
    }

    /// Remove a scene together with every hotspot, in any scene, leading to it.
    pub fn remove_scene(&mut self, id: &str) -> Result<Scene> {
        let removed = self
            .scenes
            .shift_remove(id)
            .ok_or_else(|| TourError::not_found(format!("scene '{}'", id)))?;

        let purged: usize = self
            .scenes
            .values_mut()
            .map(|scene| scene.remove_links_to(id))
            .sum();

        if self.initial.as_deref() == Some(id) {
            self.initial = None;
        }

        log::debug!("Removed scene '{}' and {} hotspot(s) leading to it", id, purged);
        Ok(removed)
    }

    pub fn set_initial_scene(&mut self, id: &str) -> Result<()> {
        if !self.scenes.contains_key(id) {
            return Err(TourError::not_found(format!("scene '{}'", id)));
        }
        self.initial = Some(id.to_string());
        Ok(())
    }

    /// The scene a viewer opens on: the explicit choice, else the first created.
    pub fn initial_scene(&self) -> Option<&str> {
        match &self.initial {
            Some(id) if self.scenes.contains_key(id) => Some(id),
            _ => self.scenes.keys().next().map(String::as_str),
        }
    }

    pub fn set_image(&mut self, id: &str, image: ImageRef) -> Result<()> {
        let scene = self
            .scenes
            .get_mut(id)
            .ok_or_else(|| TourError::not_found(format!("scene '{}'", id)))?;
        scene.image = image;
        Ok(())
    }

    pub fn hotspot_count(&self) -> usize {
        self.scenes.values().map(|s| s.hotspots.len()).sum()
    }

    /// Locate a hotspot by id, returning its owning scene id alongside it.
    pub fn find_hotspot(&self, hotspot_id: &str) -> Result<(&str, &Hotspot)> {
        self.scenes
            .values()
            .find_map(|scene| scene.hotspot(hotspot_id).map(|h| (scene.id.as_str(), h)))
            .ok_or_else(|| TourError::not_found(format!("hotspot '{}'", hotspot_id)))
    }

    pub fn add_hotspot(
        &mut self,
        owner: &str,
        position: Position,
        target: &str,
        target_yaw: f64,
    ) -> Result<&Hotspot> {
        if !self.scenes.contains_key(owner) {
            return Err(TourError::not_found(format!("scene '{}'", owner)));
        }
        let text = hotspot_label(&self.target_name(target)?);
        let id = self.next_hotspot_id();

        let scene = self
            .scenes
            .get_mut(owner)
            .ok_or_else(|| TourError::not_found(format!("scene '{}'", owner)))?;
        scene.hotspots.push(Hotspot {
            id: id.clone(),
            position,
            target: target.to_string(),
            target_yaw,
            text,
        });
        log::debug!("Added hotspot '{}' in '{}' -> '{}'", id, owner, target);

        scene
            .hotspot(&id)
            .ok_or_else(|| TourError::not_found(format!("hotspot '{}'", id)))
    }

    /// Retarget and/or reorient a hotspot in place.
    pub fn edit_hotspot(
        &mut self,
        hotspot_id: &str,
        target: Option<&str>,
        target_yaw: Option<f64>,
    ) -> Result<&Hotspot> {
        let owner = self.find_hotspot(hotspot_id)?.0.to_string();
        let text = match target {
            Some(target) => Some(hotspot_label(&self.target_name(target)?)),
            None => None,
        };

        let hotspot = self
            .scenes
            .get_mut(&owner)
            .and_then(|scene| scene.hotspot_mut(hotspot_id))
            .ok_or_else(|| TourError::not_found(format!("hotspot '{}'", hotspot_id)))?;

        if let (Some(target), Some(text)) = (target, text) {
            hotspot.target = target.to_string();
            hotspot.text = text;
        }
        if let Some(yaw) = target_yaw {
            hotspot.target_yaw = yaw;
        }
        Ok(&*hotspot)
    }

    pub fn remove_hotspot(&mut self, hotspot_id: &str) -> Result<Hotspot> {
        for scene in self.scenes.values_mut() {
            if let Some(index) = scene.hotspots.iter().position(|h| h.id == hotspot_id) {
                return Ok(scene.hotspots.remove(index));
            }
        }
        Err(TourError::not_found(format!("hotspot '{}'", hotspot_id)))
    }

    fn target_name(&self, target: &str) -> Result<String> {
        self.scenes
            .get(target)
            .map(|s| s.name.clone())
            .ok_or_else(|| TourError::InvalidTarget(target.to_string()))
    }

    fn next_hotspot_id(&mut self) -> String {
        loop {
            self.hotspot_seq += 1;
            let id = format!(
                "hspot_{}_{}",
                Utc::now().timestamp_millis(),
                self.hotspot_seq
            );
            if self.find_hotspot(&id).is_err() {
                return id;
            }
        }
    }
}
