//! Input validation before any network call.
//!
//! Checks run in a fixed order and stop at the first violation:
//! file type and size, then hue, saturation, grayscale, crop, resize.

use serde::Deserialize;
use serde_json::Value;

use crate::config::LimitsConfig;
use crate::error::ValidationError;
use crate::types::{ColorAdjustment, Crop, CropShape, ImageFile, Resize, TransformationSpecs};

/// Largest accepted width or height, in pixels.
pub const MAX_DIMENSION: i64 = 10_000;

/// MIME types the backend accepts.
pub const SUPPORTED_MIME_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/webp",
    "image/gif",
];

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Validates uploads and their transformation specs.
#[derive(Debug, Clone)]
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Validate the file, then the specs.
    pub fn validate(
        &self,
        file: &ImageFile,
        specs: &TransformationSpecs,
    ) -> Result<(), ValidationError> {
        self.validate_file(file)?;
        validate_specs(specs)
    }

    /// Check MIME type and size limit.
    pub fn validate_file(&self, file: &ImageFile) -> Result<(), ValidationError> {
        if !SUPPORTED_MIME_TYPES.contains(&file.mime.as_str()) {
            return Err(ValidationError::UnsupportedFormat {
                mime: file.mime.clone(),
            });
        }

        let max_bytes = self.limits.max_file_size_mb.saturating_mul(BYTES_PER_MB);
        if file.size() > max_bytes {
            return Err(ValidationError::FileTooLarge {
                size_mb: file.size() as f64 / BYTES_PER_MB as f64,
                max_mb: self.limits.max_file_size_mb,
            });
        }

        Ok(())
    }
}

/// Validate strongly-typed specs.
///
/// The grayscale type check cannot fail here; it only applies to
/// [`validate_value`].
pub fn validate_specs(specs: &TransformationSpecs) -> Result<(), ValidationError> {
    check_color(specs.color.hue, specs.color.saturation)?;
    if let Some(crop) = specs.crop.as_ref().filter(|c| c.enabled) {
        check_crop(crop.width.into(), crop.height.into())?;
    }
    check_resize(specs.resize.width.into(), specs.resize.height.into())
}

/// Loosely typed specs from callers that bypass the typed API.
#[derive(Deserialize)]
struct RawSpecs {
    color: RawColor,
    resize: RawDimensions,
    #[serde(default)]
    grayscale: Option<Value>,
    #[serde(default)]
    crop: Option<RawCrop>,
}

#[derive(Deserialize)]
struct RawColor {
    hue: f64,
    saturation: f64,
}

#[derive(Deserialize)]
struct RawDimensions {
    width: i64,
    height: i64,
}

/// Shape and size are only required once the crop is enabled.
#[derive(Deserialize)]
struct RawCrop {
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    shape: Option<String>,
    #[serde(default)]
    width: Option<i64>,
    #[serde(default)]
    height: Option<i64>,
}

fn required<T>(field: Option<T>, name: &str) -> Result<T, ValidationError> {
    field.ok_or_else(|| ValidationError::Malformed(format!("enabled crop is missing `{name}`")))
}

/// Validate untyped JSON specs (CLI files, scripts) and convert them.
///
/// Runs the same ordered checks as [`validate_specs`], plus the grayscale
/// type check and the crop shape membership check.
pub fn validate_value(value: &Value) -> Result<TransformationSpecs, ValidationError> {
    let raw: RawSpecs = serde_json::from_value(value.clone())
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;

    check_color(raw.color.hue, raw.color.saturation)?;

    let grayscale = match raw.grayscale {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(b),
        Some(other) => return Err(ValidationError::Grayscale(other.to_string())),
    };

    let crop = match raw.crop {
        Some(crop) if crop.enabled => {
            let name = required(crop.shape, "shape")?;
            let shape =
                CropShape::parse(&name).ok_or_else(|| ValidationError::CropShape(name.clone()))?;
            let width = required(crop.width, "width")?;
            let height = required(crop.height, "height")?;
            check_crop(width, height)?;
            Some(Crop {
                enabled: true,
                shape,
                width: width as u32,
                height: height as u32,
            })
        }
        // A disabled crop has no effect; keep it only if it converts cleanly.
        Some(crop) => crop.shape.as_deref().and_then(CropShape::parse).and_then(|shape| {
            Some(Crop {
                enabled: false,
                shape,
                width: u32::try_from(crop.width?).ok()?,
                height: u32::try_from(crop.height?).ok()?,
            })
        }),
        None => None,
    };

    check_resize(raw.resize.width, raw.resize.height)?;

    Ok(TransformationSpecs {
        color: ColorAdjustment {
            hue: raw.color.hue,
            saturation: raw.color.saturation,
        },
        resize: Resize {
            width: raw.resize.width as u32,
            height: raw.resize.height as u32,
        },
        grayscale,
        crop,
    })
}

fn check_color(hue: f64, saturation: f64) -> Result<(), ValidationError> {
    if !(-180.0..=180.0).contains(&hue) {
        return Err(ValidationError::Hue(hue));
    }
    if !(0.0..=3.0).contains(&saturation) {
        return Err(ValidationError::Saturation(saturation));
    }
    Ok(())
}

fn check_crop(width: i64, height: i64) -> Result<(), ValidationError> {
    if width <= 0 || height <= 0 {
        return Err(ValidationError::CropNotPositive { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ValidationError::CropTooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}

fn check_resize(width: i64, height: i64) -> Result<(), ValidationError> {
    if width <= 0 || height <= 0 {
        return Err(ValidationError::ResizeNotPositive { width, height });
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ValidationError::ResizeTooLarge {
            width,
            height,
            max: MAX_DIMENSION,
        });
    }
    Ok(())
}
