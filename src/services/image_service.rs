//! Recipe image validation and storage.
//!
//! An upload is decoded in full before anything touches the media root. The
//! bytes are then written to a temporary file inside the upload directory and
//! renamed into place, so a failed upload never leaves a partial file behind.

use std::io::Write;
use std::path::{Path, PathBuf};

use image::ImageFormat;
use tracing::{info, warn};
use uuid::Uuid;

/// Upload directory relative to the media root.
pub const RECIPE_UPLOAD_DIR: &str = "uploads/recipe";

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("No image was submitted.")]
    Missing,
    #[error("The submitted image is empty.")]
    Empty,
    #[error("Upload a valid image. The file you uploaded was either not an image or a corrupted image.")]
    Invalid(#[source] image::ImageError),
    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image task failed: {0}")]
    Task(String),
}

/// Checks that `bytes` is a complete, decodable image and returns its format.
pub fn validate_image(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    let format = image::guess_format(bytes).map_err(ImageError::Invalid)?;
    image::load_from_memory_with_format(bytes, format).map_err(ImageError::Invalid)?;
    Ok(format)
}

/// Validates and stores an uploaded recipe image. Returns the stored path
/// relative to `media_root`, e.g. `uploads/recipe/<uuid>.png`.
pub async fn store_recipe_image(media_root: &Path, bytes: Vec<u8>) -> Result<String, ImageError> {
    let media_root = media_root.to_path_buf();
    tokio::task::spawn_blocking(move || store_blocking(&media_root, &bytes))
        .await
        .map_err(|e| ImageError::Task(e.to_string()))?
}

fn store_blocking(media_root: &Path, bytes: &[u8]) -> Result<String, ImageError> {
    let format = validate_image(bytes)?;

    let upload_dir = media_root.join(RECIPE_UPLOAD_DIR);
    std::fs::create_dir_all(&upload_dir)?;

    let extension = format.extensions_str().first().copied().unwrap_or("img");
    let file_name = format!("{}.{}", Uuid::new_v4(), extension);

    let mut staged = tempfile::NamedTempFile::new_in(&upload_dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged
        .persist(upload_dir.join(&file_name))
        .map_err(|e| ImageError::Io(e.error))?;

    let relative = format!("{RECIPE_UPLOAD_DIR}/{file_name}");
    info!(path = %relative, format = ?format, size = bytes.len(), "Stored recipe image.");
    Ok(relative)
}

/// Best-effort removal of a stored image. A file that is already gone is not
/// an error.
pub async fn remove_image(media_root: &Path, relative_path: &str) {
    let full_path: PathBuf = media_root.join(relative_path);
    match tokio::fs::remove_file(&full_path).await {
        Ok(()) => info!(path = %relative_path, "Removed recipe image."),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %relative_path, error = %e, "Failed to remove recipe image."),
    }
}

/// Public URL for a stored image path.
pub fn image_url(media_url: &str, relative_path: &str) -> String {
    format!("{}/{}", media_url.trim_end_matches('/'), relative_path)
}

#[cfg(test)]
pub(crate) fn sample_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(10, 10, image::Rgb([200, 40, 40]));
    let mut buffer = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png).unwrap();
    buffer.into_inner()
}
