use crate::error::ProtocolError;

/// Result type alias for wire protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
