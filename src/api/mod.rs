mod types;

use async_trait::async_trait;
use reqwest::StatusCode;

pub use types::*;

use crate::config::Config;
use crate::core::{build_prompt, BackgroundDescriptor, BackgroundGenerator, IdPhotoError, ImagePayload, PromptPlan};
use crate::http_client::HTTP_CLIENT;

/// Sends a generateContent request somewhere and returns the parsed response
#[async_trait]
pub trait Transport: Send + Sync {
    async fn generate_content(
        &self,
        url: &str,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, IdPhotoError>;
}

/// Transport over the shared HTTP client
pub struct HttpTransport;

#[async_trait]
impl Transport for HttpTransport {
    async fn generate_content(
        &self,
        url: &str,
        api_key: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, IdPhotoError> {
        tracing::debug!("Sending generate request to: {}", url);

        let response = HTTP_CLIENT
            .post(url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!("Response status: {}", status);

        parse_response(status, &body)
    }
}

/// Map a raw HTTP answer to the parsed response or an upstream error.
///
/// Error bodies are read as the Google error envelope; anything else is passed
/// through as the message, and an empty message becomes the generic fallback.
fn parse_response(status: StatusCode, body: &str) -> Result<GenerateResponse, IdPhotoError> {
    if !status.is_success() {
        let error: ApiErrorResponse = serde_json::from_str(body)
            .unwrap_or_else(|_| ApiErrorResponse {
                error: ApiError {
                    code: status.as_u16() as i32,
                    message: body.trim().to_string(),
                    status: status.to_string(),
                },
            });
        tracing::debug!("API error {} ({})", error.error.code, error.error.status);
        return Err(IdPhotoError::upstream(error.error.message));
    }

    serde_json::from_str(body)
        .map_err(|e| IdPhotoError::upstream(format!("Failed to parse Gemini API response: {}", e)))
}

/// Gemini API client
pub struct GeminiClient<T: Transport = HttpTransport> {
    api_key: Option<String>,
    base_url: String,
    model: String,
    transport: T,
}

impl GeminiClient<HttpTransport> {
    /// Create a new client from config. A missing key is reported on first use.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.api_key().map(str::to_string),
            config.api.base_url.clone(),
            config.api.model.clone(),
            HttpTransport,
        )
    }
}

impl<T: Transport> GeminiClient<T> {
    pub fn new(api_key: Option<String>, base_url: String, model: String, transport: T) -> Self {
        Self {
            api_key,
            base_url,
            model,
            transport,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    /// Build the API request body
    fn build_generate_request(&self, plan: PromptPlan) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: plan.parts.into_iter().map(ContentPart::from).collect(),
                role: None,
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["TEXT".to_string(), "IMAGE".to_string()]),
            }),
        }
    }

    /// Pull the generated photo out of a response
    fn extract_image(&self, response: &GenerateResponse) -> Result<ImagePayload, IdPhotoError> {
        if let Some(image) = response.first_inline_image() {
            return Ok(ImagePayload::png_from_base64(&image.data));
        }

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            tracing::warn!("Prompt blocked: {}", reason);
        }
        if let Some(candidate) = response.candidates.as_ref().and_then(|c| c.first()) {
            tracing::warn!(
                "No image in response (finish reason: {}, {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown"),
                candidate.finish_message.as_deref().unwrap_or("no message")
            );
        }
        Err(IdPhotoError::GenerationEmpty)
    }
}

#[async_trait]
impl<T: Transport> BackgroundGenerator for GeminiClient<T> {
    async fn generate(
        &self,
        subject: &ImagePayload,
        background: &BackgroundDescriptor,
        custom_background: Option<&ImagePayload>,
    ) -> Result<ImagePayload, IdPhotoError> {
        let api_key = self.api_key.as_deref().ok_or(IdPhotoError::MissingCredential)?;

        let plan = build_prompt(background, subject, custom_background)?;
        tracing::debug!(
            "Prompt for '{}': {} image part(s), subject ~{} bytes, {} chars of instructions",
            background.id,
            plan.image_count(),
            subject.encoded_len(),
            plan.text.len()
        );
        let request = self.build_generate_request(plan);

        let response = self
            .transport
            .generate_content(&self.endpoint(), api_key, &request)
            .await?;

        if let Some(usage) = &response.usage_metadata {
            tracing::debug!(
                "Token usage: prompt {:?}, candidates {:?}, total {:?}",
                usage.prompt_token_count,
                usage.candidates_token_count,
                usage.total_token_count
            );
        }

        self.extract_image(&response)
    }
}
