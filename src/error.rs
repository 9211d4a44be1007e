use std::io;

/// Errors surfaced by the tour editor, exporter, publisher and loader.
///
/// Every variant carries enough context to be shown to the user verbatim.
#[derive(Debug, thiserror::Error)]
pub enum TourError {
    /// A scene with this identifier already exists in the graph.
    #[error("scene id '{0}' already exists")]
    DuplicateId(String),

    /// Scene identifiers must be non-empty.
    #[error("invalid scene id '{0}'")]
    InvalidId(String),

    /// A scene, hotspot, image or record lookup failed.
    #[error("{0} not found")]
    NotFound(String),

    /// A hotspot points at a scene that is not part of the graph.
    #[error("invalid hotspot target '{0}'")]
    InvalidTarget(String),

    /// An image or bundle could not be transferred to object storage.
    #[error("upload failed for {what}: {reason}")]
    UploadFailure { what: String, reason: String },

    /// Persisted or imported data does not have the scene/hotspot shape.
    #[error("corrupt tour data: {0}")]
    Corrupt(String),

    /// Export or publish was requested for a graph with no scenes.
    #[error("the tour has no scenes")]
    EmptyTour,

    /// Another export or publish is still running for this session.
    #[error("an export or publish is already in progress")]
    Busy,

    /// The tour exists but its access flag does not allow link sharing.
    #[error("sharing is locked for tour '{0}'")]
    SharingLocked(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TourError {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        TourError::NotFound(what.to_string())
    }

    pub fn upload(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        TourError::UploadFailure {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for TourError {
    fn from(e: serde_json::Error) -> Self {
        TourError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TourError>;
