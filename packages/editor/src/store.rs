//! # Block Store
//!
//! In-memory, ordered collection of the blocks of the open space. It is the
//! single source of truth for rendering and performs no I/O: the session
//! layers persistence and notifications on top of it.
//!
//! Blocks are kept sorted by `(order, id)`. `order` is expected to be dense
//! but nothing here relies on that.

use crate::errors::{EditorError, EditorResult};
use crate::list_format::convert_content;
use blockspace_common::{Block, BlockId, BlockPatch, BlockType, SpaceId};

/// Result of removing a block
#[derive(Debug, Clone, PartialEq)]
pub struct Removal {
    pub block: Block,
    /// Position the block occupied
    pub index: usize,
    /// Block that should receive focus next
    pub focus: BlockId,
}

/// `order` change produced by a reorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderChange {
    pub id: BlockId,
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone)]
pub struct BlockStore {
    space_id: SpaceId,
    blocks: Vec<Block>,
}

impl BlockStore {
    pub fn new(space_id: SpaceId) -> Self {
        Self {
            space_id,
            blocks: Vec::new(),
        }
    }

    pub fn from_blocks(space_id: SpaceId, blocks: Vec<Block>) -> Self {
        let mut store = Self::new(space_id);
        store.replace_all(blocks);
        store
    }

    pub fn space_id(&self) -> SpaceId {
        self.space_id
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn ids(&self) -> Vec<BlockId> {
        self.blocks.iter().map(|b| b.id).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn position(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn at(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn previous(&self, id: BlockId) -> Option<&Block> {
        let index = self.position(id)?;
        index.checked_sub(1).and_then(|i| self.blocks.get(i))
    }

    pub fn next(&self, id: BlockId) -> Option<&Block> {
        let index = self.position(id)?;
        self.blocks.get(index + 1)
    }

    /// Highest `order` in the space, if any
    pub fn max_order(&self) -> Option<i64> {
        self.blocks.iter().map(|b| b.order).max()
    }

    /// Replace the whole collection (space switch or resync)
    pub fn replace_all(&mut self, mut blocks: Vec<Block>) {
        blocks.retain(|b| b.space_id == self.space_id);
        blocks.sort_by_key(|b| (b.order, b.id));
        self.blocks = blocks;
    }

    /// Insert at the position its `order` implies. Returns false when a block
    /// with the same id is already present.
    pub fn insert(&mut self, block: Block) -> bool {
        if self.contains(block.id) {
            return false;
        }
        let index = self
            .blocks
            .iter()
            .position(|b| (b.order, b.id) > (block.order, block.id))
            .unwrap_or(self.blocks.len());
        self.blocks.insert(index, block);
        true
    }

    /// Put a previously removed block back at `index`
    pub fn restore(&mut self, block: Block, index: usize) {
        if self.contains(block.id) {
            return;
        }
        let index = index.min(self.blocks.len());
        self.blocks.insert(index, block);
    }

    pub fn update(&mut self, id: BlockId, patch: &BlockPatch) -> EditorResult<Block> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(EditorError::NotFound(id))?;

        patch.apply_to(block);
        let updated = block.clone();

        if patch.order.is_some() {
            self.sort();
        }
        Ok(updated)
    }

    /// Restore fields through [`BlockPatch::restore`], returning what changed
    pub fn revert(&mut self, id: BlockId, before: &BlockPatch, after: &BlockPatch) -> EditorResult<BlockPatch> {
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or(EditorError::NotFound(id))?;

        let restored = BlockPatch::restore(block, before, after);
        if restored.order.is_some() {
            self.sort();
        }
        Ok(restored)
    }

    /// Remove a block; the last block of a space cannot be removed
    pub fn remove(&mut self, id: BlockId) -> EditorResult<Removal> {
        let index = self.position(id).ok_or(EditorError::NotFound(id))?;
        if self.blocks.len() == 1 {
            return Err(EditorError::LastBlock(self.space_id));
        }

        let block = self.blocks.remove(index);
        let focus = if index > 0 {
            self.blocks[index - 1].id
        } else {
            self.blocks[0].id
        };

        Ok(Removal { block, index, focus })
    }

    /// Assign `order` = position in `ids`. Blocks missing from `ids` keep
    /// their relative order after the listed ones.
    pub fn reorder(&mut self, ids: &[BlockId]) -> EditorResult<Vec<OrderChange>> {
        if let Some(missing) = ids.iter().find(|id| !self.contains(**id)) {
            return Err(EditorError::NotFound(*missing));
        }

        let mut sequence: Vec<BlockId> = Vec::with_capacity(self.blocks.len());
        for id in ids {
            if !sequence.contains(id) {
                sequence.push(*id);
            }
        }
        for block in &self.blocks {
            if !sequence.contains(&block.id) {
                sequence.push(block.id);
            }
        }

        let mut changes = Vec::new();
        for (index, id) in sequence.iter().enumerate() {
            let to = index as i64;
            if let Some(block) = self.blocks.iter_mut().find(|b| b.id == *id) {
                if block.order != to {
                    changes.push(OrderChange {
                        id: *id,
                        from: block.order,
                        to,
                    });
                    block.order = to;
                }
            }
        }

        self.blocks.sort_by_key(|b| {
            sequence
                .iter()
                .position(|id| *id == b.id)
                .unwrap_or(usize::MAX)
        });
        Ok(changes)
    }

    /// Patch that converts a block to `to`, rewriting list markers
    pub fn retype_patch(&self, id: BlockId, to: BlockType) -> EditorResult<BlockPatch> {
        let block = self.get(id).ok_or(EditorError::NotFound(id))?;

        let mut patch = BlockPatch::block_type(to);
        let content = convert_content(&block.content, block.block_type, to);
        if content != block.content {
            patch.content = Some(content);
        }
        Ok(patch)
    }

    pub fn change_type(&mut self, id: BlockId, to: BlockType) -> EditorResult<Block> {
        let patch = self.retype_patch(id, to)?;
        self.update(id, &patch)
    }

    fn sort(&mut self) {
        self.blocks.sort_by_key(|b| (b.order, b.id));
    }
}
