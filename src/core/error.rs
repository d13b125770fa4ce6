use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdPhotoError {
    #[error("API key not configured. Set GEMINI_API_KEY environment variable or run: idphoto config set api.key <your-key>")]
    MissingCredential,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{message}")]
    UpstreamFailure {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("Failed to generate an image, please retry")]
    GenerationEmpty,

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl IdPhotoError {
    /// Build an upstream failure, falling back to a generic message when the service gave none
    pub fn upstream(message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            "Background replacement failed".to_string()
        } else {
            message
        };
        IdPhotoError::UpstreamFailure {
            message,
            source: None,
        }
    }
}

impl From<reqwest::Error> for IdPhotoError {
    fn from(err: reqwest::Error) -> Self {
        IdPhotoError::UpstreamFailure {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_keeps_service_message() {
        let err = IdPhotoError::upstream("quota exceeded");
        assert_eq!(err.to_string(), "quota exceeded");
    }

    #[test]
    fn test_upstream_falls_back_on_blank_message() {
        let err = IdPhotoError::upstream("   ");
        assert_eq!(err.to_string(), "Background replacement failed");
    }

    #[test]
    fn test_generation_empty_asks_for_retry() {
        assert!(IdPhotoError::GenerationEmpty.to_string().contains("retry"));
    }
}
