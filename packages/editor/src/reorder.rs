//! Drag-and-drop reordering.
//!
//! Turns a drop gesture into the complete new id sequence. Assigning the
//! resulting `order` values and persisting them is left to the session.

use crate::errors::{EditorError, EditorResult};
use blockspace_common::BlockId;

/// Where the dragged block lands relative to the drop target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPosition {
    Above,
    Below,
}

impl DropPosition {
    /// Above when the pointer is over the upper half of the target
    pub fn from_pointer(pointer_y: f64, target_top: f64, target_height: f64) -> Self {
        let midpoint = target_top + target_height / 2.0;
        if pointer_y < midpoint {
            DropPosition::Above
        } else {
            DropPosition::Below
        }
    }
}

/// New sequence after moving `dragged` next to `target`
pub fn reorder_ids(
    ids: &[BlockId],
    dragged: BlockId,
    target: BlockId,
    position: DropPosition,
) -> EditorResult<Vec<BlockId>> {
    if !ids.contains(&dragged) {
        return Err(EditorError::NotFound(dragged));
    }
    if !ids.contains(&target) {
        return Err(EditorError::NotFound(target));
    }

    if dragged == target {
        return Ok(ids.to_vec());
    }

    let mut sequence: Vec<BlockId> = ids.iter().copied().filter(|id| *id != dragged).collect();
    let target_index = sequence
        .iter()
        .position(|id| *id == target)
        .ok_or(EditorError::NotFound(target))?;
    let index = match position {
        DropPosition::Above => target_index,
        DropPosition::Below => target_index + 1,
    };

    sequence.insert(index, dragged);
    Ok(sequence)
}
