//! # Realtime Protocol
//!
//! JSON frames exchanged over the per-space realtime channel. Every frame is
//! an object with a `type` discriminator.
//!
//! - [`ClientMessage`]: what a client sends after committing a local mutation
//!   (or to share presence). No acknowledgement is ever awaited.
//! - [`ServerMessage`]: what a client receives. Mutation notifications carry
//!   the acting user so receivers can drop echoes of their own edits.
//!
//! Older backends announce `block_updated` with the changed fields at the top
//! level (`"content": ...`) and `updated_by` instead of `actor_id`. Decoding
//! folds those flat fields into `changes`.

use crate::model::{ActiveUser, Block, BlockId, BlockPatch, SpaceId, UserId};
use crate::permissions::Role;
use crate::result::ProtocolResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Frames sent by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    BlockCreated {
        block: Block,
    },
    BlockUpdated {
        block_id: BlockId,
        changes: BlockPatch,
    },
    BlockDeleted {
        block_id: BlockId,
    },
    BlocksReordered {
        space_id: SpaceId,
        #[serde(default)]
        block_ids: Vec<BlockId>,
    },
    CursorPosition {
        block_id: BlockId,
        position: usize,
    },
    UserTyping {
        block_id: BlockId,
        is_typing: bool,
    },
    BlockSelection {
        block_id: BlockId,
    },
}

/// Frames received by a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    ConnectionEstablished {
        space_id: SpaceId,
        user_id: UserId,
        role: Role,
        #[serde(default)]
        active_users: Vec<ActiveUser>,
    },
    BlockCreated {
        block: Block,
        #[serde(alias = "created_by")]
        actor_id: UserId,
        #[serde(default)]
        actor_username: Option<String>,
    },
    BlockUpdated {
        block_id: BlockId,
        #[serde(default)]
        changes: BlockPatch,
        #[serde(alias = "updated_by")]
        actor_id: UserId,
        #[serde(default, alias = "updated_by_username")]
        actor_username: Option<String>,
    },
    BlockDeleted {
        block_id: BlockId,
        #[serde(alias = "deleted_by")]
        actor_id: UserId,
        #[serde(default)]
        actor_username: Option<String>,
    },
    BlocksReordered {
        space_id: SpaceId,
        /// Informational only; receivers re-fetch the full list instead
        #[serde(default)]
        block_ids: Vec<BlockId>,
        actor_id: UserId,
        #[serde(default)]
        actor_username: Option<String>,
    },
    UserJoined {
        user_id: UserId,
        username: String,
    },
    UserLeft {
        user_id: UserId,
        username: String,
    },
    CursorPosition {
        block_id: BlockId,
        position: usize,
        user_id: UserId,
        username: String,
    },
    UserTyping {
        block_id: BlockId,
        is_typing: bool,
        user_id: UserId,
        username: String,
    },
    BlockSelection {
        block_id: BlockId,
        user_id: UserId,
        username: String,
    },
    Error {
        message: String,
    },
}

impl ClientMessage {
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Attach the sender's identity, producing the frame peers receive
    pub fn stamp(self, user_id: UserId, username: &str) -> ServerMessage {
        let actor_username = Some(username.to_string());
        let username = username.to_string();

        match self {
            ClientMessage::BlockCreated { block } => ServerMessage::BlockCreated {
                block,
                actor_id: user_id,
                actor_username,
            },
            ClientMessage::BlockUpdated { block_id, changes } => ServerMessage::BlockUpdated {
                block_id,
                changes,
                actor_id: user_id,
                actor_username,
            },
            ClientMessage::BlockDeleted { block_id } => ServerMessage::BlockDeleted {
                block_id,
                actor_id: user_id,
                actor_username,
            },
            ClientMessage::BlocksReordered { space_id, block_ids } => ServerMessage::BlocksReordered {
                space_id,
                block_ids,
                actor_id: user_id,
                actor_username,
            },
            ClientMessage::CursorPosition { block_id, position } => ServerMessage::CursorPosition {
                block_id,
                position,
                user_id,
                username,
            },
            ClientMessage::UserTyping { block_id, is_typing } => ServerMessage::UserTyping {
                block_id,
                is_typing,
                user_id,
                username,
            },
            ClientMessage::BlockSelection { block_id } => ServerMessage::BlockSelection {
                block_id,
                user_id,
                username,
            },
        }
    }
}

impl ServerMessage {
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let mut frame: Value = serde_json::from_str(text)?;
        fold_flat_changes(&mut frame)?;
        Ok(serde_json::from_value(frame)?)
    }

    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Acting user of a block mutation notification
    pub fn actor(&self) -> Option<UserId> {
        match self {
            ServerMessage::BlockCreated { actor_id, .. }
            | ServerMessage::BlockUpdated { actor_id, .. }
            | ServerMessage::BlockDeleted { actor_id, .. }
            | ServerMessage::BlocksReordered { actor_id, .. } => Some(*actor_id),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::ConnectionEstablished { .. } => "connection_established",
            ServerMessage::BlockCreated { .. } => "block_created",
            ServerMessage::BlockUpdated { .. } => "block_updated",
            ServerMessage::BlockDeleted { .. } => "block_deleted",
            ServerMessage::BlocksReordered { .. } => "blocks_reordered",
            ServerMessage::UserJoined { .. } => "user_joined",
            ServerMessage::UserLeft { .. } => "user_left",
            ServerMessage::CursorPosition { .. } => "cursor_position",
            ServerMessage::UserTyping { .. } => "user_typing",
            ServerMessage::BlockSelection { .. } => "block_selection",
            ServerMessage::Error { .. } => "error",
        }
    }
}

/// Move top-level block fields of a `block_updated` frame into `changes`.
/// Fields already inside `changes` win.
fn fold_flat_changes(frame: &mut Value) -> ProtocolResult<()> {
    let Some(object) = frame.as_object_mut() else {
        return Ok(());
    };
    if object.get("type").and_then(Value::as_str) != Some("block_updated") {
        return Ok(());
    }

    // `type` is the frame discriminator here, never a block type
    let mut flat = serde_json::Map::new();
    for field in ["content", "order", "bold", "italic", "underline", "size"] {
        if let Some(value) = object.remove(field) {
            flat.insert(field.to_string(), value);
        }
    }
    if flat.is_empty() {
        return Ok(());
    }

    let mut changes: BlockPatch = serde_json::from_value(Value::Object(flat))?;
    if let Some(nested) = object.remove("changes") {
        changes.merge(serde_json::from_value(nested)?);
    }
    object.insert("changes".to_string(), serde_json::to_value(changes)?);
    Ok(())
}
