//! Request and response types exchanged with the transformation backend.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Declarative transformation request sent alongside the image.
///
/// Serializes to the JSON the backend expects in the `transformations`
/// multipart field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationSpecs {
    pub color: ColorAdjustment,
    pub resize: Resize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grayscale: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop: Option<Crop>,
}

impl TransformationSpecs {
    /// Specs that only resize, leaving color untouched.
    pub fn resize_only(width: u32, height: u32) -> Self {
        Self {
            color: ColorAdjustment::default(),
            resize: Resize { width, height },
            grayscale: None,
            crop: None,
        }
    }

    /// The crop shape the backend will apply, if cropping is enabled.
    pub fn active_crop_shape(&self) -> Option<CropShape> {
        self.crop.as_ref().filter(|c| c.enabled).map(|c| c.shape)
    }
}

/// Hue rotation in degrees and saturation multiplier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorAdjustment {
    pub hue: f64,
    pub saturation: f64,
}

impl Default for ColorAdjustment {
    fn default() -> Self {
        Self {
            hue: 0.0,
            saturation: 1.0,
        }
    }
}

/// Target output dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resize {
    pub width: u32,
    pub height: u32,
}

/// Crop settings. When enabled the backend ignores `resize`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub enabled: bool,
    pub shape: CropShape,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropShape {
    Rectangle,
    Square,
    Circle,
    Ellipse,
}

impl CropShape {
    pub const ALL: [CropShape; 4] = [
        CropShape::Rectangle,
        CropShape::Square,
        CropShape::Circle,
        CropShape::Ellipse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CropShape::Rectangle => "rectangle",
            CropShape::Square => "square",
            CropShape::Circle => "circle",
            CropShape::Ellipse => "ellipse",
        }
    }

    /// Parse a shape name; `None` for anything outside the fixed set.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == name)
    }
}

impl std::fmt::Display for CropShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image file ready to upload.
#[derive(Debug, Clone)]
pub struct ImageFile {
    /// File name sent in the multipart part
    pub name: String,
    /// MIME type (e.g., "image/png")
    pub mime: String,
    /// Raw file bytes
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving its MIME type from the extension.
    pub async fn from_path(path: &Path) -> std::io::Result<Self> {
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        Ok(Self {
            name,
            mime: mime_for_extension(&extension),
            bytes,
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Map a file extension to a MIME type.
///
/// Unknown extensions map to `application/octet-stream`, which the validator
/// rejects.
pub fn mime_for_extension(extension: &str) -> String {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// The transformed image returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationResult {
    /// Base64-encoded image bytes
    pub image: String,
    /// Format tag, e.g. "png"
    pub format: String,
    /// Echo of the crop shape that was requested, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crop_shape: Option<CropShape>,
}

impl TransformationResult {
    /// Decode the base64 payload into raw image bytes.
    pub fn decode_image(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(self.image.as_bytes())
    }
}

/// Binary connectivity status plus a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub online: bool,
    pub message: String,
}

impl HealthStatus {
    pub fn online() -> Self {
        Self {
            online: true,
            message: "Backend is online".to_string(),
        }
    }

    pub fn offline(message: impl Into<String>) -> Self {
        Self {
            online: false,
            message: message.into(),
        }
    }
}
