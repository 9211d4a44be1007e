//! The editing session: one private graph plus the interaction state around it.
//!
//! User actions arrive as [`EditorCommand`]s; each handler validates first and
//! only then mutates, and answers with [`Effect`]s the front end acts on.
//! Nothing here talks to a UI directly: when the editor needs the user to pick
//! a hotspot target it emits [`Effect::RequestTarget`] and waits for a
//! [`EditorCommand::CompleteHotspot`] answer.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TourError};
use crate::graph::TourGraph;
use crate::publisher::Published;
use crate::scene::{ImageRef, Position, name_from_file};
use crate::viewer::LoadedTour;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Empty,
    HasScenes,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum EditorCommand {
    AddScene {
        id: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        file_name: Option<String>,
        #[serde(skip)]
        bytes: Vec<u8>,
    },
    RemoveScene {
        id: String,
    },
    SelectScene {
        id: String,
    },
    SetInitialScene {
        id: String,
    },
    /// The user clicked the current panorama while placing a hotspot.
    PlaceHotspot {
        position: Position,
    },
    /// Answer to [`Effect::RequestTarget`]. A missing yaw means 0.
    CompleteHotspot {
        target: String,
        #[serde(default)]
        target_yaw: Option<f64>,
    },
    CancelHotspot,
    EditHotspot {
        hotspot_id: String,
        #[serde(default)]
        target: Option<String>,
        #[serde(default)]
        target_yaw: Option<f64>,
    },
    RemoveHotspot {
        hotspot_id: String,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SceneChoice {
    pub id: String,
    pub name: String,
}

/// Everything the front end needs to ask the user for a hotspot target.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TargetRequest {
    pub owner: String,
    pub position: Position,
    pub candidates: Vec<SceneChoice>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "effect", rename_all = "snake_case")]
pub enum Effect {
    Notify { message: String },
    CurrentSceneChanged { id: Option<String> },
    RequestTarget(TargetRequest),
    GraphChanged,
}

impl Effect {
    fn notify(message: impl Into<String>) -> Self {
        Effect::Notify {
            message: message.into(),
        }
    }
}

#[derive(Clone, Debug)]
struct PendingHotspot {
    owner: String,
    position: Position,
}

#[derive(Debug, Default)]
pub struct Session {
    graph: TourGraph,
    current: Option<String>,
    pending: Option<PendingHotspot>,
    busy: bool,
    remote_id: Option<String>,
    project_name: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session on an existing graph (imported bundle, saved draft).
    pub fn from_graph(graph: TourGraph) -> Self {
        let current = graph.initial_scene().map(str::to_string);
        Session {
            graph,
            current,
            ..Self::default()
        }
    }

    /// Reopen a published tour for editing; later publishes update it.
    pub fn open_published(tour: LoadedTour) -> Self {
        let mut session = Self::from_graph(tour.graph);
        session.remote_id = Some(tour.id);
        session.project_name = Some(tour.project_name);
        session
    }

    pub fn graph(&self) -> &TourGraph {
        &self.graph
    }

    pub fn current_scene(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn project_name(&self) -> Option<&str> {
        self.project_name.as_deref()
    }

    pub fn is_placing_hotspot(&self) -> bool {
        self.pending.is_some()
    }

    pub fn state(&self) -> SessionState {
        if self.graph.is_empty() {
            SessionState::Empty
        } else {
            SessionState::HasScenes
        }
    }

    pub fn dispatch(&mut self, command: EditorCommand) -> Result<Vec<Effect>> {
        match command {
            EditorCommand::AddScene {
                id,
                name,
                file_name,
                bytes,
            } => self.add_scene(&id, name, file_name, bytes),
            EditorCommand::RemoveScene { id } => self.remove_scene(&id),
            EditorCommand::SelectScene { id } => {
                self.graph.scene(&id)?;
                self.current = Some(id.clone());
                Ok(vec![Effect::CurrentSceneChanged { id: Some(id) }])
            }
            EditorCommand::SetInitialScene { id } => {
                self.graph.set_initial_scene(&id)?;
                Ok(vec![
                    Effect::GraphChanged,
                    Effect::notify(format!("'{}' is now the initial scene", id)),
                ])
            }
            EditorCommand::PlaceHotspot { position } => self.place_hotspot(position),
            EditorCommand::CompleteHotspot { target, target_yaw } => {
                self.complete_hotspot(&target, target_yaw)
            }
            EditorCommand::CancelHotspot => {
                self.pending = None;
                Ok(Vec::new())
            }
            EditorCommand::EditHotspot {
                hotspot_id,
                target,
                target_yaw,
            } => {
                self.graph
                    .edit_hotspot(&hotspot_id, target.as_deref(), target_yaw)?;
                Ok(vec![Effect::GraphChanged, Effect::notify("Hotspot updated")])
            }
            EditorCommand::RemoveHotspot { hotspot_id } => {
                self.graph.remove_hotspot(&hotspot_id)?;
                Ok(vec![Effect::GraphChanged, Effect::notify("Hotspot removed")])
            }
        }
    }

    fn add_scene(
        &mut self,
        id: &str,
        name: Option<String>,
        file_name: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<Vec<Effect>> {
        if bytes.is_empty() {
            return Err(TourError::not_found("image data"));
        }
        let name = name
            .filter(|n| !n.trim().is_empty())
            .or_else(|| file_name.as_deref().map(name_from_file))
            .unwrap_or_default();

        let scene = self.graph.add_scene(id, &name, ImageRef::from_upload(bytes))?;
        let (id, name) = (scene.id.clone(), scene.name.clone());
        log::info!("Scene '{}' added as '{}'", name, id);

        let mut effects = vec![
            Effect::GraphChanged,
            Effect::notify(format!("Scene '{}' added as '{}'", name, id)),
        ];
        if self.current.is_none() {
            self.current = Some(id.clone());
            effects.push(Effect::CurrentSceneChanged { id: Some(id) });
        }
        Ok(effects)
    }

    fn remove_scene(&mut self, id: &str) -> Result<Vec<Effect>> {
        let removed = self.graph.remove_scene(id)?;
        log::info!("Scene '{}' removed", removed.id);

        if self.pending.as_ref().is_some_and(|p| p.owner == removed.id) {
            self.pending = None;
        }

        let mut effects = vec![
            Effect::GraphChanged,
            Effect::notify(format!("Scene '{}' removed", removed.name)),
        ];
        if self.current.as_deref() == Some(id) {
            self.current = self.graph.scene_ids().next().map(str::to_string);
            effects.push(Effect::CurrentSceneChanged {
                id: self.current.clone(),
            });
        }
        Ok(effects)
    }

    fn place_hotspot(&mut self, position: Position) -> Result<Vec<Effect>> {
        let owner = self
            .current
            .clone()
            .ok_or_else(|| TourError::not_found("active scene"))?;

        let candidates = self
            .graph
            .scenes()
            .map(|s| SceneChoice {
                id: s.id.clone(),
                name: s.name.clone(),
            })
            .collect();
        self.pending = Some(PendingHotspot {
            owner: owner.clone(),
            position,
        });

        Ok(vec![Effect::RequestTarget(TargetRequest {
            owner,
            position,
            candidates,
        })])
    }

    fn complete_hotspot(&mut self, target: &str, target_yaw: Option<f64>) -> Result<Vec<Effect>> {
        // The placement ends here whether or not the answer is usable.
        let pending = self
            .pending
            .take()
            .ok_or_else(|| TourError::not_found("pending hotspot"))?;

        let hotspot = self.graph.add_hotspot(
            &pending.owner,
            pending.position,
            target,
            target_yaw.unwrap_or(0.0),
        )?;
        let message = format!("Hotspot added: {}", hotspot.text);

        Ok(vec![Effect::GraphChanged, Effect::notify(message)])
    }

    /// Mark an export or publish as running and hand out the graph to work on.
    pub fn begin_operation(&mut self) -> Result<TourGraph> {
        if self.busy {
            return Err(TourError::Busy);
        }
        if self.graph.is_empty() {
            return Err(TourError::EmptyTour);
        }
        self.busy = true;
        Ok(self.graph.clone())
    }

    pub fn finish_operation(&mut self) {
        self.busy = false;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Point inline images at their published URLs and remember the record.
    ///
    /// A scene only takes its URL when it still holds the exact image that was
    /// uploaded; scenes removed, re-added or re-imaged meanwhile keep theirs.
    pub fn apply_published(&mut self, published: &Published) {
        for (scene_id, uploaded) in &published.uploaded_from {
            let Some(url) = published.image_urls.get(scene_id) else {
                continue;
            };
            let unchanged = self
                .graph
                .scene(scene_id)
                .is_ok_and(|scene| &scene.image == uploaded);
            if !unchanged {
                continue;
            }
            if let Err(e) = self.graph.set_image(scene_id, ImageRef::remote(url.as_str())) {
                log::warn!("Could not point scene '{}' at {}: {}", scene_id, url, e);
            }
        }
        self.remote_id = Some(published.record.id.clone());
        self.project_name = Some(published.record.project_name.clone());
    }

    /// Swap in a different graph (bundle import, draft load).
    pub fn replace_graph(&mut self, graph: TourGraph) {
        self.current = graph.initial_scene().map(str::to_string);
        self.graph = graph;
        self.pending = None;
        self.remote_id = None;
        self.project_name = None;
    }
}
