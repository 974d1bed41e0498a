use crate::utils::error::Result;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};
use std::path::Path;

pub const PREVIEW_FILE: &str = "preview.png";

/// Stretches a source panorama to a fixed-size PNG thumbnail.
#[derive(Debug, Clone)]
pub struct PreviewGenerator {
    width: u32,
    height: u32,
}

impl PreviewGenerator {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Writes `preview.png` into `output_dir`. Failures are logged, never returned.
    pub async fn generate(&self, source: &Path, output_dir: &Path) -> bool {
        let target = output_dir.join(PREVIEW_FILE);
        let (width, height) = (self.width, self.height);
        let source_path = source.to_path_buf();
        let target_path = target.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            render_preview(&source_path, &target_path, width, height)
        })
        .await;

        match outcome {
            Ok(Ok(())) => {
                tracing::debug!("Preview written to {}", target.display());
                true
            }
            Ok(Err(e)) => {
                tracing::error!("Failed to create preview image for {}: {}", source.display(), e);
                false
            }
            Err(e) => {
                tracing::error!("Preview task for {} aborted: {}", source.display(), e);
                false
            }
        }
    }
}

fn render_preview(source: &Path, target: &Path, width: u32, height: u32) -> Result<()> {
    let original = image::open(source)?;
    let resized = with_png_pixel_format(original.resize_exact(width, height, FilterType::Triangle));
    resized.save_with_format(target, ImageFormat::Png)?;
    Ok(())
}

/// Keeps the source pixel format when PNG can store it, otherwise falls back to 8-bit RGBA.
pub fn with_png_pixel_format(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_)
        | DynamicImage::ImageLuma16(_)
        | DynamicImage::ImageLumaA16(_)
        | DynamicImage::ImageRgb16(_)
        | DynamicImage::ImageRgba16(_) => image,
        other => DynamicImage::ImageRgba8(other.to_rgba8()),
    }
}
