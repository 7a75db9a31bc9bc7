//! # List Formatting
//!
//! Pure transforms over block content. List membership of a line is a
//! literal prefix: `"• "` for bullets, `"<n>. "` for numbered items.
//! Toggle decisions (`has_bullet`/`has_number`) are per block: one marked
//! line is enough.

use blockspace_common::BlockType;

pub const BULLET: &str = "• ";

/// Marker found at the start of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Bullet,
    Number(u64),
}

impl Marker {
    /// Parse the marker at the start of `line`, returning it with its char length
    pub fn parse(line: &str) -> Option<(Marker, usize)> {
        if line.starts_with(BULLET) {
            return Some((Marker::Bullet, BULLET.chars().count()));
        }

        let digits = line.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 || !line[digits..].starts_with(". ") {
            return None;
        }
        let number = line[..digits].parse().ok()?;
        Some((Marker::Number(number), digits + 2))
    }
}

fn number_marker(line: &str) -> Option<usize> {
    match Marker::parse(line) {
        Some((Marker::Number(_), len)) => Some(len),
        _ => None,
    }
}

fn is_marked(line: &str) -> bool {
    Marker::parse(line).is_some()
}

/// Prepend `"• "` to every line that does not already carry it
pub fn add_bullet_prefix(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with(BULLET) {
                line.to_string()
            } else {
                format!("{}{}", BULLET, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn has_bullet(text: &str) -> bool {
    text.split('\n').any(|line| line.starts_with(BULLET))
}

pub fn has_number(text: &str) -> bool {
    text.split('\n').any(|line| number_marker(line).is_some())
}

/// Number every unnumbered line by its position (first line is `1. `)
pub fn number_lines(text: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(index, line)| {
            if number_marker(line).is_some() {
                line.to_string()
            } else {
                format!("{}. {}", index + 1, line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Re-derive `1.`, `2.`, ... for the lines that already carry a number.
/// Other lines pass through untouched.
pub fn renumber_lines(text: &str) -> String {
    let mut next = 1;

    text.split('\n')
        .map(|line| match number_marker(line) {
            Some(len) => {
                let rest = &line[len..];
                let renumbered = format!("{}. {}", next, rest);
                next += 1;
                renumbered
            }
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Drop blank lines sandwiched between two marked lines
pub fn normalize_list_lines(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut kept = Vec::with_capacity(lines.len());

    for (index, line) in lines.iter().enumerate() {
        let sandwiched = line.trim().is_empty()
            && index > 0
            && index + 1 < lines.len()
            && is_marked(lines[index - 1])
            && is_marked(lines[index + 1]);

        if !sandwiched {
            kept.push(*line);
        }
    }

    kept.join("\n")
}

/// Remove every leading marker of either kind from every line
pub fn strip_list_prefixes(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            let mut rest = line;
            while let Some((_, len)) = Marker::parse(rest) {
                rest = &rest[rest.char_indices().nth(len).map(|(i, _)| i).unwrap_or(rest.len())..];
            }
            rest
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rewrite content for a change of block type
pub fn convert_content(text: &str, from: BlockType, to: BlockType) -> String {
    if from == to {
        return text.to_string();
    }

    let base = if from.is_list() {
        strip_list_prefixes(text)
    } else {
        text.to_string()
    };

    match to {
        BlockType::BulletList => add_bullet_prefix(&strip_list_prefixes(&base)),
        BlockType::NumberedList => number_lines(&strip_list_prefixes(&base)),
        BlockType::Text | BlockType::Heading => base,
    }
}

/// Count of numbered lines among the first `upto_line + 1` lines
pub fn numbered_lines_through(text: &str, upto_line: usize) -> usize {
    text.split('\n')
        .take(upto_line + 1)
        .filter(|line| number_marker(line).is_some())
        .count()
}
