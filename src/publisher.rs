use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::bundle::{self, ImageSource};
use crate::error::{Result, TourError};
use crate::graph::TourGraph;
use crate::scene::ImageRef;
use crate::snapshot::{SceneSnapshot, TourRecord};
use crate::storage::{ObjectStore, RecordStore, sanitize_segment};

/// Outcome of a successful publish: the stored record and the URL each
/// scene's image now resolves to.
#[derive(Clone, Debug)]
pub struct Published {
    pub record: TourRecord,
    pub image_urls: IndexMap<String, String>,
    /// The inline image each newly uploaded URL stands for, keyed by scene id.
    pub uploaded_from: IndexMap<String, ImageRef>,
}

struct Uploads {
    urls: IndexMap<String, String>,
    uploaded_from: IndexMap<String, ImageRef>,
    bundle_url: String,
    keys: Vec<String>,
}

struct StoreImages<'a>(&'a dyn ObjectStore);

impl ImageSource for StoreImages<'_> {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.0.fetch(url)
    }
}

/// Uploads a tour's images and bundle, then writes its record.
///
/// Nothing reaches the record store unless every upload succeeded; objects
/// uploaded by a failed attempt are removed again on a best-effort basis.
pub struct Publisher<'a> {
    objects: &'a dyn ObjectStore,
    records: &'a dyn RecordStore,
    owner: String,
}

impl<'a> Publisher<'a> {
    pub fn new(objects: &'a dyn ObjectStore, records: &'a dyn RecordStore, owner: &str) -> Self {
        Publisher {
            objects,
            records,
            owner: sanitize_segment(owner),
        }
    }

    /// Publish a new tour, returning the created record.
    pub fn persist(&self, graph: &TourGraph, project_name: &str) -> Result<Published> {
        if graph.is_empty() {
            return Err(TourError::EmptyTour);
        }

        let id = Uuid::new_v4().simple().to_string();
        let folder = format!("{}_{}", sanitize_segment(project_name), &id[..8]);
        log::info!("Publishing '{}' as {} ({} scenes)", project_name, id, graph.len());

        let uploads = self.upload(graph, &folder)?;
        let now = Utc::now();
        let written = self
            .build_record(id, project_name, folder, graph, &uploads, (now, now), false)
            .and_then(|record| self.records.insert(&record).map(|_| record));
        let record = self.commit_or_discard(written, &uploads)?;

        log::info!("Published tour {}", record.id);
        Ok(Published {
            record,
            image_urls: uploads.urls,
            uploaded_from: uploads.uploaded_from,
        })
    }

    /// Replace the content of an already published tour.
    pub fn update(&self, remote_id: &str, graph: &TourGraph) -> Result<Published> {
        if graph.is_empty() {
            return Err(TourError::EmptyTour);
        }

        let existing = self
            .records
            .fetch(remote_id)?
            .ok_or_else(|| TourError::not_found(format!("tour '{}'", remote_id)))?;
        let existing: TourRecord = serde_json::from_value(existing)
            .map_err(|e| TourError::Corrupt(format!("tour '{}': {}", remote_id, e)))?;
        log::info!("Updating tour {} ({} scenes)", remote_id, graph.len());

        let uploads = self.upload(graph, &existing.folder_name)?;
        let written = self.build_record(
            existing.id,
            &existing.project_name,
            existing.folder_name,
            graph,
            &uploads,
            (existing.created_at, Utc::now()),
            existing.paid,
        )
        .and_then(|record| self.records.update(&record).map(|_| record));
        let record = self.commit_or_discard(written, &uploads)?;

        Ok(Published {
            record,
            image_urls: uploads.urls,
            uploaded_from: uploads.uploaded_from,
        })
    }

    /// Upload inline images and the bundle under keys unique to this revision.
    ///
    /// Objects of earlier revisions are never overwritten, so a live record
    /// keeps pointing at a consistent set until its replacement is written.
    fn upload(&self, graph: &TourGraph, folder: &str) -> Result<Uploads> {
        let revision = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..6]
        );
        let mut uploads = Uploads {
            urls: IndexMap::new(),
            uploaded_from: IndexMap::new(),
            bundle_url: String::new(),
            keys: Vec::new(),
        };

        for (index, scene) in graph.scenes().enumerate() {
            let url = match &scene.image {
                ImageRef::Remote { url } => url.clone(),
                ImageRef::Inline { mime, data } => {
                    let key = format!(
                        "{}/{}/{}_{:03}_{}.{}",
                        self.owner,
                        folder,
                        revision,
                        index,
                        sanitize_segment(&scene.id),
                        scene.image.extension()
                    );
                    match self.put(&key, data, mime) {
                        Ok(url) => {
                            uploads.keys.push(key);
                            uploads
                                .uploaded_from
                                .insert(scene.id.clone(), scene.image.clone());
                            url
                        }
                        Err(e) => {
                            log::warn!("Upload of scene '{}' failed: {}", scene.id, e);
                            self.discard(&uploads.keys);
                            return Err(e);
                        }
                    }
                }
            };
            uploads.urls.insert(scene.id.clone(), url);
        }

        let key = format!("{}/{}/{}_index.html", self.owner, folder, revision);
        let uploaded = bundle::export(graph, &StoreImages(self.objects))
            .and_then(|bundle| self.put(&key, bundle.as_bytes(), "text/html; charset=utf-8"));
        match uploaded {
            Ok(url) => {
                uploads.keys.push(key);
                uploads.bundle_url = url;
            }
            Err(e) => {
                log::warn!("Upload of the tour bundle failed: {}", e);
                self.discard(&uploads.keys);
                return Err(e);
            }
        }

        Ok(uploads)
    }

    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        self.objects
            .put(key, bytes, content_type)
            .map_err(|e| match e {
                TourError::UploadFailure { .. } => e,
                other => TourError::upload(key, other),
            })
    }

    fn commit_or_discard(
        &self,
        written: Result<TourRecord>,
        uploads: &Uploads,
    ) -> Result<TourRecord> {
        if written.is_err() {
            log::warn!(
                "Tour record was not written, removing {} uploaded object(s)",
                uploads.keys.len()
            );
            self.discard(&uploads.keys);
        }
        written
    }

    fn discard(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.objects.remove(key) {
                log::warn!("Could not remove orphaned object {}: {}", key, e);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_record(
        &self,
        id: String,
        project_name: &str,
        folder_name: String,
        graph: &TourGraph,
        uploads: &Uploads,
        (created_at, updated_at): (DateTime<Utc>, DateTime<Utc>),
        paid: bool,
    ) -> Result<TourRecord> {
        let initial_scene = graph.initial_scene().ok_or(TourError::EmptyTour)?.to_string();

        let urls = &uploads.urls;
        let mut structure = IndexMap::new();
        for scene in graph.scenes() {
            let url = urls
                .get(&scene.id)
                .cloned()
                .ok_or_else(|| TourError::not_found(format!("image URL for '{}'", scene.id)))?;
            structure.insert(scene.id.clone(), SceneSnapshot::capture(scene, url));
        }

        Ok(TourRecord {
            id,
            owner: self.owner.clone(),
            project_name: project_name.to_string(),
            folder_name,
            thumb_url: urls.get(&initial_scene).cloned(),
            bundle_url: Some(uploads.bundle_url.clone()),
            initial_scene,
            structure,
            paid,
            created_at,
            updated_at,
        })
    }
}
