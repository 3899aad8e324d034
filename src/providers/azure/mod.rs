//! Azure-backed provider implementations
//!
//! Both providers speak plain REST through `reqwest`; Azure SDK types never
//! cross the adapter boundary. Transient transport failures are retried with
//! exponential backoff before surfacing as domain errors.

pub mod ocr;
pub mod phi;

use crate::domain::{OcrProviderError, PhiProviderError};
use std::time::Duration;

/// Base delay for retry backoff; doubles per attempt
pub(crate) const INITIAL_RETRY_DELAY_MS: u64 = 500;

pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.saturating_pow(attempt))
}

pub(crate) fn ocr_transport_error(err: reqwest::Error) -> OcrProviderError {
    if err.is_timeout() {
        OcrProviderError::Timeout(err.to_string())
    } else if err.is_connect() {
        OcrProviderError::ConnectionFailed(err.to_string())
    } else {
        OcrProviderError::InvalidResponse(err.to_string())
    }
}

pub(crate) fn phi_transport_error(err: reqwest::Error) -> PhiProviderError {
    if err.is_timeout() {
        PhiProviderError::Timeout(err.to_string())
    } else if err.is_connect() {
        PhiProviderError::ConnectionFailed(err.to_string())
    } else {
        PhiProviderError::InvalidResponse(err.to_string())
    }
}
