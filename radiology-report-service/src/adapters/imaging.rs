use anyhow::{Context as _, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Decodes an image file off the async runtime and re-encodes it as base64 PNG.
///
/// `grayscale` keeps only luminance, which is what the pathology classifier expects.
pub async fn load_png_base64(path: &Path, grayscale: bool) -> anyhow::Result<String> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
        let image = image::open(&path)
            .with_context(|| format!("Failed to decode image {}", path.display()))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(anyhow!("Image {} has no pixels", path.display()));
        }

        let image = if grayscale {
            DynamicImage::ImageLuma8(image.to_luma8())
        } else {
            DynamicImage::ImageRgb8(image.to_rgb8())
        };

        image_to_base64(&image)
    })
    .await?
}

/// Convert image to base64 PNG
pub fn image_to_base64(image: &DynamicImage) -> anyhow::Result<String> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    image
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| anyhow!("Failed to encode image: {}", e))?;

    Ok(STANDARD.encode(&buffer))
}
