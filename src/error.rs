use thiserror::Error;

/// Central error type for the webperfect library
#[derive(Error, Debug)]
pub enum WebPerfectError {
    // ============================================================================
    // Pipeline Errors
    // ============================================================================
    #[error("Validation failed for stage: {0}")]
    ValidationFailed(String),

    /// Failure reported by a stage's own logic; displays the bare message
    #[error("{0}")]
    StageFailed(String),

    #[error("Stage '{stage}' panicked: {message}")]
    StagePanicked { stage: String, message: String },

    #[error("Cleanup failed for stage {stage}: {message}")]
    CleanupFailed { stage: String, message: String },

    #[error("Pipeline cleanup aborted: {0}")]
    CleanupAborted(String),

    #[error("Required context field missing: {0}")]
    MissingContextField(&'static str),

    /// Builder pattern validation error
    #[error("Builder error: {0}")]
    BuilderError(String),

    // ============================================================================
    // Image Errors
    // ============================================================================
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid operation parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    // ============================================================================
    // Batch / Configuration Errors
    // ============================================================================
    #[error("Input directory not found: {0}")]
    InputDirectoryNotFound(String),

    #[error("Unknown optimization preset: {0}")]
    UnknownPreset(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // ============================================================================
    // Generic/System Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    GenericError(String),
}

impl From<tokio::task::JoinError> for WebPerfectError {
    fn from(err: tokio::task::JoinError) -> Self {
        WebPerfectError::Internal(format!("Blocking task failed: {}", err))
    }
}

// Automatic conversion from String (for ad-hoc stage errors)
impl From<String> for WebPerfectError {
    fn from(err: String) -> Self {
        WebPerfectError::GenericError(err)
    }
}

impl From<&str> for WebPerfectError {
    fn from(err: &str) -> Self {
        WebPerfectError::GenericError(err.to_string())
    }
}

// Helper type alias for Results
pub type WebPerfectResult<T> = Result<T, WebPerfectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = WebPerfectError::ValidationFailed("analysis:decode".to_string());
        assert_eq!(
            err.to_string(),
            "Validation failed for stage: analysis:decode"
        );
    }

    #[test]
    fn test_stage_failed_keeps_bare_message() {
        let err = WebPerfectError::StageFailed("boom".to_string());
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn test_builder_error_display() {
        let err = WebPerfectError::BuilderError("Pipeline must contain at least one stage".into());
        assert!(err.to_string().contains("at least one stage"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: WebPerfectError = io_err.into();
        assert!(matches!(err, WebPerfectError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        let err: WebPerfectError = "something odd".into();
        assert_eq!(err.to_string(), "something odd");
    }
}
