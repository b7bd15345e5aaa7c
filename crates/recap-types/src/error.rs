/// Failure of a chat platform call.
///
/// Every variant is terminal for the invocation that hit it; nothing retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The platform answered `ok: false` with a machine-readable code.
    #[error("{method} failed: {code}")]
    Api { method: String, code: String },

    #[error("{method} request failed: {reason}")]
    Transport { method: String, reason: String },

    #[error("{method} returned an unreadable body: {reason}")]
    Decode { method: String, reason: String },
}

impl PlatformError {
    pub fn api(method: &str, code: impl Into<String>) -> Self {
        Self::Api {
            method: method.to_string(),
            code: code.into(),
        }
    }

    /// Platform error code, when the platform supplied one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Failure to hand the final payload to the callback address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("callback address is empty")]
    MissingUrl,

    #[error("callback rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("callback request failed: {0}")]
    Transport(String),
}
