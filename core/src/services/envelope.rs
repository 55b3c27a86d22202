use courier_types::{ErrorKind, RequestError};
use serde::{Deserialize, Serialize};

/// `{code, data, message, success}` wrapper used by envelope-style backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub code: i64,
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
    pub success: bool,
}

impl<T> ApiEnvelope<T> {
    /// Unwrap `data`, turning `success: false` into a classified error.
    ///
    /// The envelope's `code` is treated as an HTTP-like status when it falls
    /// in the 4xx/5xx range; anything else is reported as a client error.
    pub fn into_result(self) -> Result<T, RequestError> {
        if !self.success {
            let kind = u16::try_from(self.code)
                .ok()
                .filter(|code| (400..600).contains(code))
                .map_or(ErrorKind::Client, ErrorKind::from_status);
            let message = if self.message.trim().is_empty() {
                format!("request failed with code {}", self.code)
            } else {
                self.message
            };
            return Err(RequestError::new(kind, message));
        }
        self.data
            .ok_or_else(|| RequestError::decode("envelope reported success without data"))
    }
}
