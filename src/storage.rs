//! Storage boundaries used by the publisher and the viewer loader.
//!
//! The traits cover only what publishing and loading need: put/remove blobs,
//! insert/update/fetch records. The shipped implementations keep everything
//! under a data directory, one file per object and one JSON document per record.

use lazy_static::lazy_static;
use regex::Regex;
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};

use crate::bundle::ImageSource;
use crate::error::{Result, TourError};
use crate::snapshot::TourRecord;

lazy_static! {
    static ref UNSAFE_SEGMENT_CHARS: Regex = Regex::new(r"[^A-Za-z0-9._-]").unwrap();
    static ref RECORD_ID_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").unwrap();
}

/// Blob storage that hands back a resolvable URL for every stored object.
pub trait ObjectStore: ImageSource + Send + Sync {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Keyed storage for published tour records.
///
/// `fetch` returns the raw JSON so readers validate the shape themselves.
pub trait RecordStore: Send + Sync {
    fn insert(&self, record: &TourRecord) -> Result<()>;
    fn update(&self, record: &TourRecord) -> Result<()>;
    fn fetch(&self, id: &str) -> Result<Option<serde_json::Value>>;
}

/// Turn arbitrary text into a single safe path segment.
pub fn sanitize_segment(text: &str) -> String {
    let cleaned = UNSAFE_SEGMENT_CHARS.replace_all(text.trim(), "_");
    let cleaned = cleaned.trim_matches('.');
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned.to_string()
    }
}

fn key_to_path(root: &Path, key: &str) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(TourError::not_found(format!("object '{}'", key)));
        }
        path.push(segment);
    }
    Ok(path)
}

/// Write through a temporary sibling so readers never see half a file.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Objects stored as files below `root`, served at `base_url`.
pub struct FsObjectStore {
    root: PathBuf,
    base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        FsObjectStore {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn key_for_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.base_url)?.strip_prefix('/')
    }
}

impl ImageSource for FsObjectStore {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let key = self
            .key_for_url(url)
            .ok_or_else(|| TourError::not_found(format!("image '{}'", url)))?;
        let path = key_to_path(&self.root, key)?;
        fs::read(&path).map_err(|_| TourError::not_found(format!("image '{}'", url)))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> Result<String> {
        let path = key_to_path(&self.root, key).map_err(|e| TourError::upload(key, e))?;
        write_atomic(&path, bytes).map_err(|e| TourError::upload(key, e))?;
        log::debug!("Stored {} ({} bytes, {})", key, bytes.len(), content_type);
        Ok(self.url_for(key))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = key_to_path(&self.root, key)?;
        fs::remove_file(path)?;
        Ok(())
    }
}

/// Records stored as `<dir>/<id>.json`.
pub struct FsRecordStore {
    dir: PathBuf,
}

impl FsRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsRecordStore { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> Result<PathBuf> {
        if !RECORD_ID_REGEX.is_match(id) {
            return Err(TourError::not_found(format!("tour '{}'", id)));
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }

    fn write(&self, record: &TourRecord) -> Result<()> {
        let path = self.path_for(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;
        write_atomic(&path, json.as_bytes())?;
        Ok(())
    }

    /// Flip the access flag that gates link sharing.
    pub fn set_paid(&self, id: &str, paid: bool) -> Result<()> {
        let path = self.path_for(id)?;
        let data =
            fs::read_to_string(&path).map_err(|_| TourError::not_found(format!("tour '{}'", id)))?;
        let mut record: serde_json::Value = serde_json::from_str(&data)
            .map_err(|e| TourError::Corrupt(format!("tour '{}': {}", id, e)))?;
        let object = record
            .as_object_mut()
            .ok_or_else(|| TourError::Corrupt(format!("tour '{}' is not an object", id)))?;
        object.insert("paid".to_string(), serde_json::Value::Bool(paid));
        write_atomic(&path, serde_json::to_string_pretty(&record)?.as_bytes())?;
        Ok(())
    }
}

impl RecordStore for FsRecordStore {
    fn insert(&self, record: &TourRecord) -> Result<()> {
        if self.path_for(&record.id)?.exists() {
            return Err(TourError::DuplicateId(record.id.clone()));
        }
        self.write(record)
    }

    fn update(&self, record: &TourRecord) -> Result<()> {
        if !self.path_for(&record.id)?.exists() {
            return Err(TourError::not_found(format!("tour '{}'", record.id)));
        }
        self.write(record)
    }

    fn fetch(&self, id: &str) -> Result<Option<serde_json::Value>> {
        let path = match self.path_for(id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path)?;
        let value = serde_json::from_str(&data)
            .map_err(|e| TourError::Corrupt(format!("tour '{}': {}", id, e)))?;
        Ok(Some(value))
    }
}
