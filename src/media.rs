use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::{
    constants::IMAGE_EXTENSIONS,
    error::{ApiError, FieldErrors},
};

/// An image received as a `data:image/<ext>;base64,<payload>` URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub extension: String,
    pub bytes: Vec<u8>,
}

pub fn decode_data_uri(field: &str, value: &str) -> Result<DecodedImage, ApiError> {
    let invalid = |info: &str| ApiError::Validation(FieldErrors::single(field, info));

    let (header, payload) = value
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .ok_or_else(|| invalid("Upload a valid image as a base64 data URI."))?;

    let extension = match header.to_ascii_lowercase().as_str() {
        "jpeg" => String::from("jpg"),
        other => other.to_string(),
    };
    if !IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(invalid("Unsupported image format."));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid("Image payload is not valid base64."))?;
    if bytes.is_empty() {
        return Err(invalid("The submitted file is empty."));
    }

    Ok(DecodedImage { extension, bytes })
}

/// Writes the image under `media_root/dir` and returns its path relative to the media root.
pub async fn save_image(
    media_root: &Path,
    dir: &str,
    image: &DecodedImage,
) -> Result<String, ApiError> {
    let relative = format!("{}/{}.{}", dir, uuid::Uuid::new_v4(), image.extension);

    tokio::fs::create_dir_all(media_root.join(dir)).await?;
    tokio::fs::write(media_root.join(&relative), &image.bytes).await?;

    log::debug!("Saved image {relative}");
    Ok(relative)
}

/// Best-effort removal of a stored image.
pub async fn remove_image(media_root: &Path, relative: &str) {
    if relative.is_empty() || relative.contains("..") {
        return;
    }
    match tokio::fs::remove_file(media_root.join(relative)).await {
        Ok(_) => log::debug!("Removed image {relative}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove image {relative}: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 1x1 transparent png
    const PIXEL: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

    #[test]
    fn decodes_png_data_uri() {
        let image = decode_data_uri("image", &format!("data:image/png;base64,{PIXEL}")).unwrap();
        assert_eq!(image.extension, "png");
        assert_eq!(&image.bytes[1..4], b"PNG");
    }

    #[test]
    fn jpeg_is_stored_as_jpg() {
        let image = decode_data_uri("avatar", &format!("data:image/jpeg;base64,{PIXEL}")).unwrap();
        assert_eq!(image.extension, "jpg");
    }

    #[test]
    fn rejects_plain_strings_and_bad_payloads() {
        for value in [
            "",
            "https://example.com/a.png",
            "data:text/plain;base64,aGVsbG8=",
            "data:image/png;base64,@@@",
            "data:image/svg+xml;base64,aGVsbG8=",
            "data:image/png;base64,",
        ] {
            match decode_data_uri("image", value) {
                Err(ApiError::Validation(errors)) => assert!(errors.contains("image")),
                other => panic!("expected validation error for {value:?}, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn saved_images_land_under_media_root() {
        let root = tempfile::tempdir().unwrap();
        let image = decode_data_uri("image", &format!("data:image/png;base64,{PIXEL}")).unwrap();

        let relative = save_image(root.path(), "recipes", &image).await.unwrap();
        assert!(relative.starts_with("recipes/"));
        assert!(relative.ends_with(".png"));
        assert_eq!(std::fs::read(root.path().join(&relative)).unwrap(), image.bytes);

        remove_image(root.path(), &relative).await;
        assert!(!root.path().join(&relative).exists());
    }
}
