/*!
# Panotour

A builder for 360° virtual tours: equirectangular panoramas linked by clickable
hotspots, edited in the browser and shipped either as one self-contained HTML
file or as a published tour served from storage.

## Architecture

### Editing
- **Scene graph** (`graph`): ordered scenes, each with a panorama and hotspots
  pointing at other scenes. Removing a scene removes every hotspot aimed at it.
- **Editor session** (`editor`): user actions arrive as commands, answers go out
  as effects. Hotspot placement is two-phase: a click on the panorama asks the
  front end for a target, the answer completes the hotspot.

### Output
- **Bundle** (`bundle`): one HTML file with the Pannellum viewer, every image
  embedded as a data URI and a scene menu. The same file imports back into an
  editable graph.
- **Publishing** (`publisher`): images go to object storage first; the tour
  record is written only when every upload succeeded.
- **Viewer** (`viewer`): rebuilds a published tour from its loosely typed record,
  skipping malformed entries.

### Data Persistence
- Drafts saved with Gzip compression and bincode serialization (`saving`)
- Object and record stores on the local filesystem (`storage`)

## Text encoding

Scene names and hotspot labels are plain text everywhere in memory. They are
percent-encoded exactly once when written into a bundle or record and decoded
exactly once when read back (`escape`).

## Modules

- **error**: `TourError`, shared by every operation
- **escape**: text encoding at serialization boundaries
- **scene**: scenes, hotspots and image references
- **graph**: the scene graph store
- **snapshot**: serialized shapes of scenes, hotspots and tour records
- **bundle**: standalone HTML export and import
- **storage**: object store and record store
- **publisher**: remote publishing
- **viewer**: loading published tours
- **saving**: compressed drafts
- **editor**: the editing session
- **config**: `PANOTOUR_*` settings
- **app**: HTTP routes (feature `web`)
*/

pub mod bundle;
pub mod config;
pub mod editor;
pub mod error;
pub mod escape;
pub mod graph;
pub mod publisher;
pub mod saving;
pub mod scene;
pub mod snapshot;
pub mod storage;
pub mod viewer;

#[cfg(feature = "web")]
pub mod app;

pub use bundle::{Bundle, ImageSource, NoRemoteImages};
pub use config::Config;
pub use editor::{EditorCommand, Effect, Session, SessionState};
pub use error::{Result, TourError};
pub use graph::TourGraph;
pub use publisher::{Published, Publisher};
pub use scene::{Hotspot, ImageRef, Position, Scene};
pub use snapshot::TourRecord;
pub use storage::{FsObjectStore, FsRecordStore, ObjectStore, RecordStore};
pub use viewer::LoadedTour;
