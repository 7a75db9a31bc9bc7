use thiserror::Error;

/// Errors raised while decoding or encoding realtime frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unsupported message type: {0}")]
    Unsupported(String),
}
