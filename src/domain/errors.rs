//! Domain error types
//!
//! All errors are domain-specific and never expose third-party types.
//! Provider failures are converted to [`OcrProviderError`] / [`PhiProviderError`]
//! at the adapter boundary; unmatched entities are deliberately NOT an error
//! kind (they are counted on the result instead).

use thiserror::Error;

/// Main Redactify error type
///
/// This is the primary error type used throughout the application.
/// It wraps specific error types and provides context for error handling.
#[derive(Debug, Error)]
pub enum RedactifyError {
    /// Caller requested abort between pipeline phases
    #[error("Processing cancelled by caller")]
    Cancelled,

    /// Document bytes unreadable or format unsupported; fatal for the request
    #[error("Document load error: {0}")]
    DocumentLoad(String),

    /// Document reassembly failed
    #[error("Document save error: {0}")]
    DocumentSave(String),

    /// OCR provider errors
    #[error("OCR provider error: {0}")]
    Ocr(#[from] OcrProviderError),

    /// PHI detection provider errors
    #[error("PHI provider error: {0}")]
    Phi(#[from] PhiProviderError),

    /// A word or page has negative or non-finite dimensions; fatal
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(String),
}

/// OCR provider-specific errors
///
/// Errors that occur while talking to an OCR backend. These never carry
/// the backend SDK/HTTP types, only their messages.
#[derive(Debug, Error)]
pub enum OcrProviderError {
    /// Failed to reach the OCR service
    #[error("Failed to connect to OCR service: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Response could not be interpreted
    #[error("Invalid response from OCR service: {0}")]
    InvalidResponse(String),

    /// The document format is not accepted by the provider
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// The analysis operation reported failure
    #[error("OCR analysis failed: {0}")]
    AnalysisFailed(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

/// PHI detection provider-specific errors
#[derive(Debug, Error)]
pub enum PhiProviderError {
    /// Failed to reach the detection service
    #[error("Failed to connect to PHI detection service: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Response could not be interpreted
    #[error("Invalid response from PHI detection service: {0}")]
    InvalidResponse(String),

    /// The detection operation reported failure
    #[error("PHI detection failed: {0}")]
    DetectionFailed(String),

    /// Server error (5xx)
    #[error("Server error: {status} - {message}")]
    ServerError { status: u16, message: String },

    /// Client error (4xx)
    #[error("Client error: {status} - {message}")]
    ClientError { status: u16, message: String },

    /// Timeout
    #[error("Request timeout: {0}")]
    Timeout(String),
}

// Conversion from std::io::Error
impl From<std::io::Error> for RedactifyError {
    fn from(err: std::io::Error) -> Self {
        RedactifyError::Io(err.to_string())
    }
}

// Conversion from serde_json::Error
impl From<serde_json::Error> for RedactifyError {
    fn from(err: serde_json::Error) -> Self {
        RedactifyError::Serialization(err.to_string())
    }
}

// Conversion from toml parse errors
impl From<toml::de::Error> for RedactifyError {
    fn from(err: toml::de::Error) -> Self {
        RedactifyError::Configuration(format!("TOML parse error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RedactifyError::DocumentLoad("truncated TIFF".to_string());
        assert_eq!(err.to_string(), "Document load error: truncated TIFF");
    }

    #[test]
    fn test_ocr_error_conversion() {
        let ocr_err = OcrProviderError::ConnectionFailed("network down".to_string());
        let err: RedactifyError = ocr_err.into();
        assert!(matches!(err, RedactifyError::Ocr(_)));
    }

    #[test]
    fn test_phi_error_conversion() {
        let phi_err = PhiProviderError::Timeout("30s elapsed".to_string());
        let err: RedactifyError = phi_err.into();
        assert!(matches!(err, RedactifyError::Phi(_)));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: RedactifyError = io_err.into();
        assert!(matches!(err, RedactifyError::Io(_)));
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = RedactifyError::Cancelled;
        let _: &dyn std::error::Error = &err;
    }
}
