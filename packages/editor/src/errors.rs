//! Error types for the editor

use crate::gateway::GatewayError;
use blockspace_common::{BlockId, BlockType, Permission, SpaceId};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EditorError {
    #[error("Block not found: {0}")]
    NotFound(BlockId),

    #[error("Cannot delete the last block of space {0}")]
    LastBlock(SpaceId),

    #[error("Persistence error: {0}")]
    Persistence(#[from] GatewayError),

    #[error("Merging block {merged} into {target} only partially completed")]
    InconsistentMerge { target: BlockId, merged: BlockId },

    #[error("{0:?} is not a list type")]
    NotAList(BlockType),

    #[error("Permission denied: {0:?}")]
    PermissionDenied(Permission),

    #[error("No space is open")]
    NotOpen,

    #[error("Realtime channel error: {0}")]
    Channel(String),
}

pub type EditorResult<T> = Result<T, EditorError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
