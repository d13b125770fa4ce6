use async_trait::async_trait;

use super::background::BackgroundDescriptor;
use super::error::IdPhotoError;
use super::payload::ImagePayload;

/// Something that can put a subject onto a new background
#[async_trait]
pub trait BackgroundGenerator: Send + Sync {
    /// Produce the composited photo. Implementations make at most one upstream call.
    async fn generate(
        &self,
        subject: &ImagePayload,
        background: &BackgroundDescriptor,
        custom_background: Option<&ImagePayload>,
    ) -> Result<ImagePayload, IdPhotoError>;
}
