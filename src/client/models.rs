use serde::{Deserialize, Serialize};

use crate::client::ApiError;

/// Response envelope shared by every backend endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Normalised outcome of [`crate::client::ApiClient::request`].
///
/// Transport failures, error statuses and undecodable bodies all end up
/// here with `success == false`, so callers branch on `success` (or call
/// [`ApiResponse::into_result`]) instead of handling several error paths.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub(crate) fn from_envelope(envelope: Envelope<T>) -> Self {
        if envelope.success {
            Self {
                success: true,
                message: envelope.message.unwrap_or_else(|| "OK".to_string()),
                data: envelope.data,
                error: None,
            }
        } else {
            let message = envelope
                .message
                .unwrap_or_else(|| "Request failed".to_string());
            Self {
                success: false,
                message: message.clone(),
                data: None,
                error: Some(ApiError::Rejected(message)),
            }
        }
    }

    pub(crate) fn from_error(error: ApiError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            data: None,
            error: Some(error),
        }
    }

    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        match self.error {
            Some(e) => Err(e),
            None if !self.success => Err(ApiError::Rejected(self.message)),
            None => Ok(self.data),
        }
    }

    /// Like [`ApiResponse::into_result`] but treats a missing `data` field as an error.
    pub fn into_data(self) -> Result<T, ApiError> {
        self.into_result()?
            .ok_or_else(|| ApiError::Decode("response envelope has no data".to_string()))
    }
}
