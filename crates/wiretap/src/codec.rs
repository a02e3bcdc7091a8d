use serde::Serialize;
use std::fmt;

/// The codec boundary between an RPC framework's message types and the
/// capture log.
///
/// Implementations name the payload's schema type and render it as canonical
/// JSON. Fields at their default value must still be emitted, so a viewer
/// sees the whole message and not only what differs from defaults.
pub trait CaptureMessage {
    /// Fully qualified type name, e.g. `demo.HelloRequest`.
    fn message_type() -> String
    where
        Self: Sized;

    fn encode_json(&self) -> Result<String, CodecError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecError {
    message_type: String,
    reason: String,
}

impl CodecError {
    pub fn new(message_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            reason: reason.into(),
        }
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to encode {}: {}", self.message_type, self.reason)
    }
}

impl std::error::Error for CodecError {}

/// Encodes any serde-serializable message as JSON, for `CaptureMessage`
/// impls whose types already derive `Serialize`.
pub fn encode_serde<M: CaptureMessage + Serialize>(message: &M) -> Result<String, CodecError> {
    serde_json::to_string(message).map_err(|e| CodecError::new(M::message_type(), e.to_string()))
}
