use base64::{Engine, engine::general_purpose::STANDARD};
use image::ImageFormat;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::io::Cursor;

lazy_static! {
    static ref EXTENSION_REGEX: Regex = Regex::new(r"\.[^/.]+$").unwrap();
    static ref DATA_URI_REGEX: Regex =
        Regex::new(r"^data:([A-Za-z0-9.+-]+/[A-Za-z0-9.+-]+);base64,(.*)$").unwrap();
}

const OCTET_STREAM: &str = "application/octet-stream";

/// Where the marker sits on the source panorama, in degrees.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub pitch: f64,
    pub yaw: f64,
}

impl Position {
    pub fn new(pitch: f64, yaw: f64) -> Self {
        Position { pitch, yaw }
    }
}

/// Panorama image: raw bytes during editing, a URL once published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ImageRef {
    Inline { mime: String, data: Vec<u8> },
    Remote { url: String },
}

impl ImageRef {
    /// Wrap uploaded bytes, sniffing the MIME type from their content.
    ///
    /// Unknown formats are kept as `application/octet-stream`; panoramas that
    /// are not 2:1 are accepted but logged.
    pub fn from_upload(data: Vec<u8>) -> Self {
        let reader = match image::io::Reader::new(Cursor::new(&data)).with_guessed_format() {
            Ok(reader) => reader,
            Err(_) => {
                return ImageRef::Inline {
                    mime: OCTET_STREAM.to_string(),
                    data,
                };
            }
        };

        let mime = match reader.format() {
            Some(format) => mime_for_format(format),
            None => {
                log::warn!("Could not detect image format, storing as {}", OCTET_STREAM);
                OCTET_STREAM
            }
        };

        if let Ok((width, height)) = reader.into_dimensions() {
            if width != height * 2 {
                log::warn!(
                    "Image is {}x{}, equirectangular panoramas are expected to be 2:1",
                    width,
                    height
                );
            }
        }

        ImageRef::Inline {
            mime: mime.to_string(),
            data,
        }
    }

    pub fn remote(url: impl Into<String>) -> Self {
        ImageRef::Remote { url: url.into() }
    }

    /// Parse a `data:<mime>;base64,<payload>` URI.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let caps = DATA_URI_REGEX.captures(uri)?;
        let data = STANDARD.decode(&caps[2]).ok()?;
        Some(ImageRef::Inline {
            mime: caps[1].to_string(),
            data,
        })
    }

    /// Data URI for inline images, `None` for remote ones.
    pub fn to_data_uri(&self) -> Option<String> {
        match self {
            ImageRef::Inline { mime, data } => Some(data_uri(mime, data)),
            ImageRef::Remote { .. } => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match self {
            ImageRef::Remote { url } => Some(url),
            ImageRef::Inline { .. } => None,
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, ImageRef::Inline { .. })
    }

    /// File extension used when the image is uploaded to object storage.
    pub fn extension(&self) -> &'static str {
        match self {
            ImageRef::Inline { mime, .. } => extension_for_mime(mime),
            ImageRef::Remote { url } => {
                let ext = url.rsplit('.').next().unwrap_or("").to_lowercase();
                match ext.as_str() {
                    "png" => "png",
                    "webp" => "webp",
                    "gif" => "gif",
                    "bmp" => "bmp",
                    "tif" | "tiff" => "tiff",
                    _ => "jpg",
                }
            }
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            ImageRef::Inline { mime, .. } => mime,
            ImageRef::Remote { .. } => mime_for_extension(self.extension()),
        }
    }
}

pub fn data_uri(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(data))
}

fn mime_for_format(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        ImageFormat::Jpeg => "image/jpeg",
        ImageFormat::WebP => "image/webp",
        ImageFormat::Gif => "image/gif",
        ImageFormat::Bmp => "image/bmp",
        ImageFormat::Tiff => "image/tiff",
        _ => OCTET_STREAM,
    }
}

fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/bmp" => "bmp",
        "image/tiff" => "tiff",
        "image/jpeg" => "jpg",
        _ => "bin",
    }
}

fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        _ => "image/jpeg",
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub id: String,
    pub position: Position,
    pub target: String,
    pub target_yaw: f64,
    /// Plain label shown on the marker; escaped only when serialized.
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub image: ImageRef,
    pub hotspots: Vec<Hotspot>,
}

impl Scene {
    pub fn create(id: &str, name: &str, image: ImageRef) -> Self {
        let name = if name.trim().is_empty() { id } else { name };
        Scene {
            id: id.to_string(),
            name: name.to_string(),
            image,
            hotspots: Vec::new(),
        }
    }

    pub fn hotspot(&self, hotspot_id: &str) -> Option<&Hotspot> {
        self.hotspots.iter().find(|h| h.id == hotspot_id)
    }

    pub fn hotspot_mut(&mut self, hotspot_id: &str) -> Option<&mut Hotspot> {
        self.hotspots.iter_mut().find(|h| h.id == hotspot_id)
    }

    pub fn contains_hotspot(&self, hotspot_id: &str) -> bool {
        self.hotspot(hotspot_id).is_some()
    }

    /// Drop every hotspot leading to `target`, returning how many went.
    pub fn remove_links_to(&mut self, target: &str) -> usize {
        let before = self.hotspots.len();
        self.hotspots.retain(|h| h.target != target);
        before - self.hotspots.len()
    }
}

/// Marker label for a hotspot leading to a scene called `target_name`.
pub fn hotspot_label(target_name: &str) -> String {
    format!("Go to {}", target_name)
}

/// Scene name derived from an uploaded file: the file name minus its extension.
pub fn name_from_file(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    EXTENSION_REGEX.replace(base, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn name_from_file_strips_only_last_extension() {
        assert_eq!(name_from_file("sala.jpg"), "sala");
        assert_eq!(name_from_file("pano.living.room.jpeg"), "pano.living.room");
        assert_eq!(name_from_file("C:\\fotos\\quarto.png"), "quarto");
        assert_eq!(name_from_file("no_extension"), "no_extension");
    }

    #[test]
    fn upload_sniffs_png() {
        let image = ImageRef::from_upload(png_bytes(8, 4));
        assert_eq!(image.mime(), "image/png");
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn upload_of_unknown_bytes_is_octet_stream() {
        let image = ImageRef::from_upload(b"definitely not an image".to_vec());
        assert_eq!(image.mime(), OCTET_STREAM);
        assert_eq!(image.extension(), "bin");
    }

    #[test]
    fn data_uri_round_trip() {
        let image = ImageRef::Inline {
            mime: "image/jpeg".to_string(),
            data: vec![0xff, 0xd8, 0xff, 0x00, 0x10],
        };
        let uri = image.to_data_uri().unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(ImageRef::from_data_uri(&uri), Some(image));
        assert_eq!(ImageRef::from_data_uri("https://example.com/a.jpg"), None);
    }

    #[test]
    fn remote_image_has_no_data_uri() {
        let image = ImageRef::remote("http://localhost/storage/a/b/sala.png");
        assert_eq!(image.to_data_uri(), None);
        assert_eq!(image.url(), Some("http://localhost/storage/a/b/sala.png"));
        assert_eq!(image.extension(), "png");
    }

    #[test]
    fn scene_name_falls_back_to_id() {
        let scene = Scene::create("kitchen", "  ", ImageRef::remote("u"));
        assert_eq!(scene.name, "kitchen");
    }

    #[test]
    fn remove_links_to_counts_removed() {
        let mut scene = Scene::create("a", "A", ImageRef::remote("u"));
        for (i, target) in ["b", "c", "b"].iter().enumerate() {
            scene.hotspots.push(Hotspot {
                id: format!("h{}", i),
                position: Position::new(0.0, 0.0),
                target: target.to_string(),
                target_yaw: 0.0,
                text: hotspot_label(target),
            });
        }
        assert_eq!(scene.remove_links_to("b"), 2);
        assert_eq!(scene.hotspots.len(), 1);
        assert!(scene.contains_hotspot("h1"));
    }
}
