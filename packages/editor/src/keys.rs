//! Enter/Backspace handling inside a block.
//!
//! Only lines of list-typed blocks are shaped here. Everything else is left
//! to the host surface ([`KeyOutcome::PassThrough`]).

use crate::caret::{current_line, line_index, remove_range, EditableSurface};
use crate::list_format::{numbered_lines_through, renumber_lines, Marker, BULLET};
use blockspace_common::BlockType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// The surface was rewritten and its text should be committed
    Edited,
    /// Default host behavior applies
    PassThrough,
    /// Caret at offset 0 of a block that has a predecessor
    MergeWithPrevious,
    /// Marker removal left the list block empty; it becomes TEXT
    ExitList,
}

pub fn handle_enter(block_type: BlockType, surface: &mut dyn EditableSurface) -> KeyOutcome {
    if !block_type.is_list() {
        return KeyOutcome::PassThrough;
    }

    let text = surface.get_text();
    let caret = surface.get_caret_offset();
    let line = current_line(&text, caret);

    match Marker::parse(line.text) {
        Some((Marker::Bullet, _)) => {
            surface.insert_at_caret(&format!("\n{}", BULLET));
            KeyOutcome::Edited
        }
        Some((Marker::Number(_), len)) if line.text.chars().count() == len => {
            surface.insert_at_caret("\n");
            KeyOutcome::Edited
        }
        Some((Marker::Number(_), _)) => {
            let next = numbered_lines_through(&text, line_index(&text, caret)) + 1;
            surface.insert_at_caret(&format!("\n{}. ", next));

            let caret = surface.get_caret_offset();
            surface.set_text(&renumber_lines(&surface.get_text()));
            surface.set_caret_offset(caret);
            KeyOutcome::Edited
        }
        None => KeyOutcome::PassThrough,
    }
}

pub fn handle_backspace(
    block_type: BlockType,
    surface: &mut dyn EditableSurface,
    is_first_block: bool,
) -> KeyOutcome {
    let caret = surface.get_caret_offset();
    if caret == 0 {
        return if is_first_block {
            KeyOutcome::PassThrough
        } else {
            KeyOutcome::MergeWithPrevious
        };
    }

    if !block_type.is_list() {
        return KeyOutcome::PassThrough;
    }

    let text = surface.get_text();
    let line = current_line(&text, caret);
    let (marker, len) = match Marker::parse(line.text) {
        Some(found) => found,
        None => return KeyOutcome::PassThrough,
    };
    if line.column(caret) != len {
        return KeyOutcome::PassThrough;
    }

    let mut stripped = remove_range(&text, line.start, line.start + len);
    if let Marker::Number(_) = marker {
        stripped = renumber_lines(&stripped);
    }

    surface.set_text(&stripped);
    surface.set_caret_offset(line.start);

    if stripped.is_empty() {
        KeyOutcome::ExitList
    } else {
        KeyOutcome::Edited
    }
}
