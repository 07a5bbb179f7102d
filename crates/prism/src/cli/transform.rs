//! The `prism transform` command.

use anyhow::Context;
use clap::Args;
use console::Style;
use prism_core::{
    validate_value, ColorAdjustment, Config, Crop, CropShape, HealthCheck, ImageFile, Prism,
    Resize, TransformationSpecs,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments for the `transform` command.
#[derive(Args, Debug)]
pub struct TransformArgs {
    /// Image file to transform
    pub input: PathBuf,

    /// JSON file holding the full transformation request
    #[arg(
        long,
        conflicts_with_all = ["hue", "saturation", "width", "height", "grayscale", "crop_shape"]
    )]
    pub specs: Option<PathBuf>,

    /// Hue rotation in degrees (-180 to 180)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub hue: f64,

    /// Saturation multiplier (0 to 3)
    #[arg(long, default_value_t = 1.0)]
    pub saturation: f64,

    /// Output width in pixels
    #[arg(long, required_unless_present = "specs")]
    pub width: Option<u32>,

    /// Output height in pixels
    #[arg(long, required_unless_present = "specs")]
    pub height: Option<u32>,

    /// Convert to grayscale
    #[arg(long)]
    pub grayscale: bool,

    /// Crop to a shape: rectangle, square, circle, ellipse
    #[arg(long, value_parser = parse_crop_shape, requires_all = ["crop_width", "crop_height"])]
    pub crop_shape: Option<CropShape>,

    /// Crop width in pixels
    #[arg(long, requires = "crop_shape")]
    pub crop_width: Option<u32>,

    /// Crop height in pixels
    #[arg(long, requires = "crop_shape")]
    pub crop_height: Option<u32>,

    /// Where to save the result (defaults to `<name>_transformed.<format>`)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

fn parse_crop_shape(value: &str) -> Result<CropShape, String> {
    CropShape::parse(value).ok_or_else(|| {
        format!("Invalid crop shape: {value}. Must be one of: rectangle, square, circle, ellipse")
    })
}

/// Execute the transform command.
pub async fn execute(args: TransformArgs, config: Config) -> anyhow::Result<()> {
    let specs = build_specs(&args)?;
    let file = ImageFile::from_path(&args.input)
        .await
        .with_context(|| format!("Failed to read image {}", args.input.display()))?;

    let prism = Prism::new(config);
    let backend = prism.registry().selected().await;
    tracing::debug!("Using {backend} backend at {}", prism.registry().active_url().await);

    let spinner = create_spinner(format!("Transforming {}...", file.name));
    let result = prism.transform(&file, &specs).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            // Tell the user whether the backend itself is reachable.
            let status = prism.health().check_health().await;
            eprintln!("  {}", super::format_health(&status));
            return Err(e.into());
        }
    };

    let bytes = result
        .decode_image()
        .context("Backend returned an image that is not valid base64")?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.input, &result.format));
    tokio::fs::write(&output, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let green = Style::new().green();
    println!(
        "{} Saved {} image ({} bytes) to {}",
        green.apply_to("✓"),
        result.format,
        bytes.len(),
        output.display()
    );
    if let Some(shape) = result.crop_shape {
        println!("  crop: {shape}");
    }
    Ok(())
}

/// Specs from `--specs`, or assembled from the individual flags.
fn build_specs(args: &TransformArgs) -> anyhow::Result<TransformationSpecs> {
    if let Some(path) = &args.specs {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read specs file {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&content)
            .with_context(|| format!("Specs file {} is not valid JSON", path.display()))?;
        return Ok(validate_value(&value)?);
    }

    let (Some(width), Some(height)) = (args.width, args.height) else {
        anyhow::bail!("--width and --height are required without --specs");
    };
    let crop = match (args.crop_shape, args.crop_width, args.crop_height) {
        (Some(shape), Some(width), Some(height)) => Some(Crop {
            enabled: true,
            shape,
            width,
            height,
        }),
        _ => None,
    };

    Ok(TransformationSpecs {
        color: ColorAdjustment {
            hue: args.hue,
            saturation: args.saturation,
        },
        resize: Resize { width, height },
        grayscale: args.grayscale.then_some(true),
        crop,
    })
}

/// `photo.jpg` + `png` -> `photo_transformed.png`, next to the input.
fn default_output_path(input: &Path, format: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    input.with_file_name(format!("{stem}_transformed.{format}"))
}

fn create_spinner(message: String) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
