use handlebars::Handlebars;
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Result, TourError};
use crate::escape::script_safe_json;
use crate::graph::TourGraph;
use crate::scene::{ImageRef, Scene, data_uri};
use crate::snapshot::SceneSnapshot;

lazy_static! {
    static ref TOUR_DATA_REGEX: Regex =
        Regex::new(r#"(?s)<script type="application/json" id="tour-data">(.*?)</script>"#)
            .unwrap();
}

pub const BUNDLE_FILE_NAME: &str = "panorama_360.html";

const BUNDLE_TEMPLATE: &str = include_str!("./static/bundle.hbs");

/// Resolves a published image URL back to its bytes.
pub trait ImageSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Source for graphs that are expected to hold inline images only.
pub struct NoRemoteImages;

impl ImageSource for NoRemoteImages {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        Err(TourError::not_found(format!("image '{}'", url)))
    }
}

/// Data embedded in the bundle's `tour-data` script element.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BundleData {
    first_scene: String,
    scenes: IndexMap<String, SceneSnapshot>,
}

#[derive(Serialize)]
struct MenuEntry<'a> {
    id: &'a str,
    name: &'a str,
    selected: bool,
}

/// A self-contained HTML tour: every panorama is inlined as a data URI.
#[derive(Clone, Debug, PartialEq)]
pub struct Bundle {
    pub html: String,
    pub initial_scene: String,
    pub scene_count: usize,
}

impl Bundle {
    pub fn file_name(&self) -> &'static str {
        BUNDLE_FILE_NAME
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.html.as_bytes()
    }
}

/// Data URI for one scene's panorama, fetching it first when it is remote.
pub fn embed_image(scene: &Scene, source: &dyn ImageSource) -> Result<String> {
    match &scene.image {
        ImageRef::Inline { mime, data } => Ok(data_uri(mime, data)),
        ImageRef::Remote { url } => {
            let data = source.fetch(url)?;
            Ok(data_uri(scene.image.mime(), &data))
        }
    }
}

/// Export a graph as a bundle, resolving every image before rendering.
pub fn export(graph: &TourGraph, source: &dyn ImageSource) -> Result<Bundle> {
    if graph.is_empty() {
        return Err(TourError::EmptyTour);
    }

    let images = graph
        .scenes()
        .map(|scene| Ok((scene.id.clone(), embed_image(scene, source)?)))
        .collect::<Result<HashMap<_, _>>>()?;

    render_bundle(graph, &images)
}

/// Render a bundle from already embedded images, keyed by scene id.
pub fn render_bundle(graph: &TourGraph, images: &HashMap<String, String>) -> Result<Bundle> {
    let first_scene = graph.initial_scene().ok_or(TourError::EmptyTour)?;

    let mut scenes = IndexMap::new();
    for scene in graph.scenes() {
        let panorama = images
            .get(&scene.id)
            .cloned()
            .ok_or_else(|| TourError::not_found(format!("image for scene '{}'", scene.id)))?;
        scenes.insert(scene.id.clone(), SceneSnapshot::capture(scene, panorama));
    }

    let data = BundleData {
        first_scene: first_scene.to_string(),
        scenes,
    };
    let data_json = script_safe_json(&serde_json::to_string(&data)?);

    let menu: Vec<MenuEntry> = graph
        .scenes()
        .map(|scene| MenuEntry {
            id: &scene.id,
            name: &scene.name,
            selected: scene.id == first_scene,
        })
        .collect();

    let html = Handlebars::new()
        .render_template(
            BUNDLE_TEMPLATE,
            &serde_json::json!({ "menu": menu, "data": data_json }),
        )
        .map_err(|e| TourError::Serialization(e.to_string()))?;

    Ok(Bundle {
        html,
        initial_scene: first_scene.to_string(),
        scene_count: graph.len(),
    })
}

/// Read an exported bundle back into a graph with inline images.
pub fn import(html: &str) -> Result<TourGraph> {
    let caps = TOUR_DATA_REGEX
        .captures(html)
        .ok_or_else(|| TourError::Corrupt("bundle has no tour data".to_string()))?;
    let data: BundleData = serde_json::from_str(&caps[1])
        .map_err(|e| TourError::Corrupt(format!("bundle tour data: {}", e)))?;

    let mut scenes = Vec::with_capacity(data.scenes.len());
    for (id, snapshot) in &data.scenes {
        let Some(image) = ImageRef::from_data_uri(&snapshot.panorama) else {
            log::warn!("Bundle import skipped scene '{}': no embedded image", id);
            continue;
        };
        match snapshot.restore(id, image) {
            Ok(scene) => scenes.push(scene),
            Err(e) => log::warn!("Bundle import skipped scene '{}': {}", id, e),
        }
    }

    let (graph, dropped) = TourGraph::from_parts(scenes, Some(data.first_scene));
    for message in &dropped {
        log::warn!("Bundle import skipped {}", message);
    }
    if graph.is_empty() {
        return Err(TourError::Corrupt("bundle contains no scenes".to_string()));
    }
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Position;

    fn jpeg(tag: &str) -> ImageRef {
        ImageRef::Inline {
            mime: "image/jpeg".to_string(),
            data: tag.as_bytes().to_vec(),
        }
    }

    fn embedded(html: &str) -> serde_json::Value {
        let caps = TOUR_DATA_REGEX.captures(html).unwrap();
        serde_json::from_str(&caps[1]).unwrap()
    }

    struct MapSource(HashMap<String, Vec<u8>>);

    impl ImageSource for MapSource {
        fn fetch(&self, url: &str) -> Result<Vec<u8>> {
            self.0
                .get(url)
                .cloned()
                .ok_or_else(|| TourError::not_found(url))
        }
    }

    #[test]
    fn single_scene_bundle() {
        let mut graph = TourGraph::new();
        graph.add_scene("lobby", "Lobby", jpeg("lobby")).unwrap();

        let bundle = export(&graph, &NoRemoteImages).unwrap();
        assert_eq!(bundle.scene_count, 1);
        assert_eq!(bundle.initial_scene, "lobby");

        let data = embedded(&bundle.html);
        assert_eq!(data["firstScene"], "lobby");
        let scenes = data["scenes"].as_object().unwrap();
        assert_eq!(scenes.len(), 1);
        assert!(
            scenes["lobby"]["panorama"]
                .as_str()
                .unwrap()
                .starts_with("data:image/jpeg;base64,")
        );
        assert!(bundle.html.contains(r#"<option value="lobby" selected>Lobby</option>"#));
    }

    #[test]
    fn empty_graph_cannot_be_exported() {
        assert!(matches!(
            export(&TourGraph::new(), &NoRemoteImages),
            Err(TourError::EmptyTour)
        ));
    }

    #[test]
    fn export_import_export_is_stable() {
        let mut graph = TourGraph::new();
        graph
            .add_scene("sala", "Sala de estar \"principal\"", jpeg("a"))
            .unwrap();
        graph
            .add_scene("</script>", "<b>Cozinha</b> & Copa", jpeg("b"))
            .unwrap();
        graph.add_scene("jp", "東京 🌸 Tower", jpeg("c")).unwrap();
        graph
            .add_hotspot("sala", Position::new(-12.5, 170.125), "</script>", 90.0)
            .unwrap();
        graph
            .add_hotspot("</script>", Position::new(3.0, -45.0), "jp", -30.5)
            .unwrap();
        graph
            .add_hotspot("jp", Position::new(0.1, 0.2), "sala", 0.0)
            .unwrap();
        graph.set_initial_scene("jp").unwrap();

        let first = export(&graph, &NoRemoteImages).unwrap();
        assert_eq!(first.html.matches("</script>").count(), 3);

        let imported = import(&first.html).unwrap();
        assert_eq!(imported.initial_scene(), Some("jp"));
        assert_eq!(
            imported.scene("</script>").unwrap().name,
            "<b>Cozinha</b> & Copa"
        );
        assert_eq!(
            imported.find_hotspot(&graph.scene("sala").unwrap().hotspots[0].id)
                .unwrap()
                .1
                .text,
            "Go to <b>Cozinha</b> & Copa"
        );

        let second = export(&imported, &NoRemoteImages).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn remote_images_are_fetched_and_inlined() {
        let mut graph = TourGraph::new();
        graph
            .add_scene("a", "A", ImageRef::remote("http://cdn/x/a.png"))
            .unwrap();
        let source = MapSource(HashMap::from([(
            "http://cdn/x/a.png".to_string(),
            vec![1u8, 2, 3],
        )]));

        let bundle = export(&graph, &source).unwrap();
        let data = embedded(&bundle.html);
        assert_eq!(data["scenes"]["a"]["panorama"], "data:image/png;base64,AQID");
        assert!(!bundle.html.contains("http://cdn/x/a.png"));

        assert!(matches!(
            export(&graph, &NoRemoteImages),
            Err(TourError::NotFound(_))
        ));
    }

    #[test]
    fn import_skips_scenes_without_an_embedded_image() {
        let mut graph = TourGraph::new();
        graph.add_scene("a", "A", jpeg("a")).unwrap();
        graph.add_scene("b", "B", jpeg("b")).unwrap();
        graph.add_hotspot("a", Position::new(0.0, 0.0), "b", 0.0).unwrap();
        let html = export(&graph, &NoRemoteImages).unwrap().html;

        let mut data = embedded(&html);
        data["scenes"]["b"]["panorama"] = serde_json::Value::String("http://lost/b.jpg".into());
        let tampered = format!(
            r#"<script type="application/json" id="tour-data">{}</script>"#,
            data
        );

        let imported = import(&tampered).unwrap();
        assert_eq!(imported.scene_ids().collect::<Vec<_>>(), vec!["a"]);
        assert!(imported.scene("a").unwrap().hotspots.is_empty());

        data["scenes"]["a"]["panorama"] = serde_json::Value::String(String::new());
        let nothing_left = format!(
            r#"<script type="application/json" id="tour-data">{}</script>"#,
            data
        );
        assert!(matches!(import(&nothing_left), Err(TourError::Corrupt(_))));
    }

    #[test]
    fn import_rejects_documents_without_tour_data() {
        assert!(matches!(
            import("<html><body>hello</body></html>"),
            Err(TourError::Corrupt(_))
        ));
        let broken =
            r#"<script type="application/json" id="tour-data">{"firstScene":1}</script>"#;
        assert!(matches!(import(broken), Err(TourError::Corrupt(_))));
    }
}
