use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use image::ImageFormat;
use std::path::Path;
use tokio::fs;

use super::error::IdPhotoError;

/// Largest accepted upload (5 MiB)
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

/// MIME type assumed when a payload carries no data-URI header
pub const FALLBACK_MIME_TYPE: &str = "image/jpeg";

/// An encoded image kept as a self-describing data URI.
///
/// The payload is opaque to this crate: it is never decoded into pixels, only
/// moved between the file system, the session and the generation service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    data_uri: String,
}

impl ImagePayload {
    /// Wrap an existing data URI (or bare base64 string)
    pub fn from_data_uri(data_uri: impl Into<String>) -> Self {
        Self {
            data_uri: data_uri.into(),
        }
    }

    /// Encode raw file bytes with the given MIME type
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        Self {
            data_uri: format!("data:{};base64,{}", mime_type, BASE64.encode(bytes)),
        }
    }

    /// Re-wrap a bare base64 payload returned by the model as a PNG data URI
    pub fn png_from_base64(data: &str) -> Self {
        Self {
            data_uri: format!("data:image/png;base64,{}", data),
        }
    }

    pub fn as_data_uri(&self) -> &str {
        &self.data_uri
    }

    /// Base64 payload without any data-URI header
    pub fn base64_data(&self) -> &str {
        strip_data_uri_prefix(&self.data_uri)
    }

    /// MIME type declared in the data-URI header, if any
    pub fn mime_type(&self) -> Option<&str> {
        let rest = self.data_uri.strip_prefix("data:")?;
        let (header, _) = rest.split_once(',')?;
        let mime = header.strip_suffix(";base64")?;
        if mime.is_empty() {
            None
        } else {
            Some(mime)
        }
    }

    /// Decode the payload back to the encoded file bytes
    pub fn decode(&self) -> Result<Vec<u8>, IdPhotoError> {
        BASE64
            .decode(self.base64_data())
            .map_err(|e| IdPhotoError::InvalidImage(format!("payload is not valid base64: {}", e)))
    }

    /// Approximate encoded size in bytes, for logging
    pub fn encoded_len(&self) -> usize {
        self.base64_data().len() / 4 * 3
    }

    /// Load and validate an image file from disk
    pub async fn load(path: &Path) -> Result<Self, IdPhotoError> {
        let metadata = fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(IdPhotoError::InvalidImage(format!(
                "{} is not a file",
                path.display()
            )));
        }
        if metadata.len() > MAX_UPLOAD_BYTES {
            return Err(IdPhotoError::InvalidImage(
                "Image must not be larger than 5MB".to_string(),
            ));
        }

        let bytes = fs::read(path).await?;
        let mime_type = detect_mime_type(&bytes, path).ok_or_else(|| {
            IdPhotoError::InvalidImage("Please upload an image file (JPG, PNG)".to_string())
        })?;

        tracing::debug!("Loaded {} ({}, {} bytes)", path.display(), mime_type, bytes.len());
        Ok(Self::from_bytes(&bytes, mime_type))
    }
}

/// Remove a leading `data:<mime>;base64,` header, leaving bare payloads untouched
pub fn strip_data_uri_prefix(data: &str) -> &str {
    if let Some(rest) = data.strip_prefix("data:") {
        if let Some((header, payload)) = rest.split_once(',') {
            if header.ends_with(";base64") {
                return payload;
            }
        }
    }
    data
}

/// Sniff the image type from magic bytes, then fall back to the file extension
pub fn detect_mime_type(bytes: &[u8], path: &Path) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(bytes) {
        if let Some(mime) = format_mime_type(format) {
            return Some(mime);
        }
    }

    let ext = path.extension()?.to_str()?.to_lowercase();
    ImageFormat::from_extension(ext).and_then(format_mime_type)
}

fn format_mime_type(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        ImageFormat::Tiff => Some("image/tiff"),
        _ => None,
    }
}
