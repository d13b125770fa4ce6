use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;

use super::error::IdPhotoError;
use super::payload::ImagePayload;

/// Download name for a result, e.g. `id-photo-blue-1718000000000.png`
pub fn file_name(background_id: &str, timestamp: DateTime<Utc>) -> String {
    format!("id-photo-{}-{}.png", background_id, timestamp.timestamp_millis())
}

/// Write a generated photo into `output_dir`, returning its path
pub async fn save_result(
    image: &ImagePayload,
    background_id: &str,
    output_dir: &Path,
) -> Result<PathBuf, IdPhotoError> {
    fs::create_dir_all(output_dir).await?;

    let bytes = image.decode()?;
    let path = output_dir.join(file_name(background_id, Utc::now()));
    fs::write(&path, &bytes).await?;

    tracing::info!("Saved image to: {}", path.display());
    Ok(path)
}
