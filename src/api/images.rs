use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    constants::{IMAGE_DIRECTORY, IMAGE_TYPES},
    error::{Error, HttpError},
};

#[derive(Debug, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: &'static str,
    pub bytes: Vec<u8>,
}

/// Decodes `data:image/<type>;base64,<data>`.
pub fn decode_data_uri(value: &str) -> Result<DecodedImage, Error> {
    let (header, data) = value
        .trim()
        .split_once(',')
        .ok_or_else(|| Error::field("image", "Expected a base64 data URI."))?;

    let mime = header
        .strip_prefix("data:")
        .and_then(|header| header.strip_suffix(";base64"))
        .ok_or_else(|| Error::field("image", "Expected a base64 data URI."))?;

    let extension = IMAGE_TYPES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(mime))
        .map(|(_, extension)| *extension)
        .ok_or_else(|| Error::field("image", "Unsupported image type."))?;

    let bytes = STANDARD
        .decode(data.trim())
        .map_err(|_| Error::field("image", "Invalid base64 image data."))?;

    if bytes.is_empty() {
        return Err(Error::field("image", "The submitted image is empty."));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Stores the image under a fresh name and returns its media-relative path.
pub async fn save_image(media_root: &Path, image: &DecodedImage) -> Result<String, Error> {
    let relative = format!(
        "{IMAGE_DIRECTORY}/{}.{}",
        uuid::Uuid::new_v4(),
        image.extension
    );
    let path = media_root.join(&relative);

    let write = async {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &image.bytes).await
    };

    write.await.map_err(|e| {
        log::error!("> Cannot write {}: {e}", path.display());
        HttpError::InternalServerError.default()
    })?;

    Ok(relative)
}

/// Failures are only logged; a stale file never fails the request.
pub async fn remove_image(media_root: &Path, relative: &str) {
    if relative.is_empty() {
        return;
    }

    if let Err(e) = tokio::fs::remove_file(media_root.join(relative)).await {
        log::warn!("> Could not remove image {relative}: {e}");
    }
}
