//! # Block Mutations
//!
//! Semantic, single-block operations and the transaction that applies one of
//! them optimistically.
//!
//! ## Mutation Semantics
//!
//! ### UpdateContent
//! - Atomic replacement of the whole content (not a character diff)
//! - Last write wins if concurrent edits
//!
//! ### ChangeType
//! - Rewrites list markers together with the type
//!
//! ### ToggleStyle
//! - Flips the current flag value
//!
//! ### ExitList
//! - Empties the block and turns it into TEXT
//!
//! ### ToggleList
//! - All-or-nothing per block: any line carrying the marker strips every
//!   marker and turns the block into TEXT, otherwise the block is retyped
//!   into the list kind
//!
//! ## Rollback
//!
//! A [`Transaction`] snapshots only the fields its patch touches. Rolling back
//! restores a field only while it still holds the value the transaction
//! wrote, so concurrent remote edits to other fields (or later edits to the
//! same field) survive a failed persistence call.

use crate::errors::{EditorError, EditorResult};
use crate::list_format::{convert_content, has_bullet, has_number, strip_list_prefixes};
use crate::store::BlockStore;
use blockspace_common::{BlockId, BlockPatch, BlockType, Permission, StyleFlag, TextSize};
use serde::{Deserialize, Serialize};

/// Semantic mutations on a single block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    UpdateContent { block_id: BlockId, content: String },

    ChangeType { block_id: BlockId, block_type: BlockType },

    ToggleStyle { block_id: BlockId, flag: StyleFlag },

    SetSize { block_id: BlockId, size: TextSize },

    ExitList { block_id: BlockId },

    ToggleList { block_id: BlockId, list: BlockType },
}

impl Mutation {
    pub fn block_id(&self) -> BlockId {
        match self {
            Mutation::UpdateContent { block_id, .. }
            | Mutation::ChangeType { block_id, .. }
            | Mutation::ToggleStyle { block_id, .. }
            | Mutation::SetSize { block_id, .. }
            | Mutation::ExitList { block_id }
            | Mutation::ToggleList { block_id, .. } => *block_id,
        }
    }

    pub fn permission(&self) -> Permission {
        Permission::EditBlocks
    }

    /// Resolve against the current store into the fields to write
    pub fn to_patch(&self, store: &BlockStore) -> EditorResult<BlockPatch> {
        let block_id = self.block_id();
        let block = store.get(block_id).ok_or(EditorError::NotFound(block_id))?;

        let patch = match self {
            Mutation::UpdateContent { content, .. } => BlockPatch::content(content.clone()),
            Mutation::ChangeType { block_type, .. } => store.retype_patch(block_id, *block_type)?,
            Mutation::ToggleStyle { flag, .. } => BlockPatch::style(*flag, !block.style_flag(*flag)),
            Mutation::SetSize { size, .. } => BlockPatch::size(*size),
            Mutation::ExitList { .. } => BlockPatch::block_type(BlockType::Text).with_content(""),
            Mutation::ToggleList { list, .. } => {
                let marked = match list {
                    BlockType::BulletList => has_bullet(&block.content),
                    BlockType::NumberedList => has_number(&block.content),
                    other => return Err(EditorError::NotAList(*other)),
                };
                if marked {
                    BlockPatch::block_type(BlockType::Text)
                        .with_content(strip_list_prefixes(&block.content))
                } else {
                    BlockPatch::block_type(*list)
                        .with_content(convert_content(&block.content, BlockType::Text, *list))
                }
            }
        };
        Ok(patch)
    }
}

pub type TransactionId = u64;

/// An applied, not yet confirmed change to one block
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: TransactionId,
    pub block_id: BlockId,
    /// Values of the touched fields before the change
    pub before: BlockPatch,
    /// Values written by the change
    pub after: BlockPatch,
}

impl Transaction {
    /// Snapshot the fields `patch` touches, then apply it
    pub fn begin(
        store: &mut BlockStore,
        id: TransactionId,
        block_id: BlockId,
        patch: BlockPatch,
    ) -> EditorResult<Self> {
        let block = store.get(block_id).ok_or(EditorError::NotFound(block_id))?;
        let before = patch.capture(block);

        store.update(block_id, &patch)?;

        Ok(Self {
            id,
            block_id,
            before,
            after: patch,
        })
    }

    /// Restore the snapshot for fields nobody has touched since.
    /// Returns the fields actually restored.
    pub fn rollback(&self, store: &mut BlockStore) -> EditorResult<BlockPatch> {
        store.revert(self.block_id, &self.before, &self.after)
    }
}
