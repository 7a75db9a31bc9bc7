//! # Block Model
//!
//! A document ("space") is an ordered sequence of typed blocks. List markers
//! are stored as literal prefixes inside `content`, never as structured data.

use crate::permissions::Role;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type BlockId = i64;
pub type SpaceId = i64;
pub type UserId = i64;

/// Kind of content a block renders as
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    #[default]
    Text,
    Heading,
    BulletList,
    NumberedList,
}

impl BlockType {
    pub fn is_list(&self) -> bool {
        matches!(self, BlockType::BulletList | BlockType::NumberedList)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Text => "TEXT",
            BlockType::Heading => "HEADING",
            BlockType::BulletList => "BULLET_LIST",
            BlockType::NumberedList => "NUMBERED_LIST",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "TEXT" => Ok(BlockType::Text),
            "HEADING" => Ok(BlockType::Heading),
            "BULLET_LIST" | "BULLET" => Ok(BlockType::BulletList),
            "NUMBERED_LIST" | "NUMBERED" => Ok(BlockType::NumberedList),
            other => Err(format!("unknown block type: {}", other)),
        }
    }
}

/// Font size toggle; headings render at their own size and ignore it
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSize {
    Small,
    #[default]
    Normal,
    Large,
}

impl FromStr for TextSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "small" => Ok(TextSize::Small),
            "normal" => Ok(TextSize::Normal),
            "large" => Ok(TextSize::Large),
            other => Err(format!("unknown size: {}", other)),
        }
    }
}

/// Boolean style flags that can be toggled on a block
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleFlag {
    Bold,
    Italic,
    Underline,
}

impl FromStr for StyleFlag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bold" => Ok(StyleFlag::Bold),
            "italic" => Ok(StyleFlag::Italic),
            "underline" => Ok(StyleFlag::Underline),
            other => Err(format!("unknown style flag: {}", other)),
        }
    }
}

/// The unit of document content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub space_id: SpaceId,
    #[serde(rename = "type", default)]
    pub block_type: BlockType,
    pub content: String,
    #[serde(default)]
    pub order: i64,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub size: TextSize,
}

impl Block {
    pub fn new(id: BlockId, space_id: SpaceId, block_type: BlockType, content: impl Into<String>, order: i64) -> Self {
        Self {
            id,
            space_id,
            block_type,
            content: content.into(),
            order,
            bold: false,
            italic: false,
            underline: false,
            size: TextSize::Normal,
        }
    }

    /// Size the block renders at, `None` for headings
    pub fn display_size(&self) -> Option<TextSize> {
        match self.block_type {
            BlockType::Heading => None,
            _ => Some(self.size),
        }
    }

    pub fn style_flag(&self, flag: StyleFlag) -> bool {
        match flag {
            StyleFlag::Bold => self.bold,
            StyleFlag::Italic => self.italic,
            StyleFlag::Underline => self.underline,
        }
    }
}

/// Partial update of a block; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<BlockType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<TextSize>,
}

macro_rules! for_each_field {
    ($mac:ident) => {
        $mac!(content);
        $mac!(block_type);
        $mac!(order);
        $mac!(bold);
        $mac!(italic);
        $mac!(underline);
        $mac!(size);
    };
}

impl BlockPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn block_type(block_type: BlockType) -> Self {
        Self {
            block_type: Some(block_type),
            ..Self::default()
        }
    }

    pub fn order(order: i64) -> Self {
        Self {
            order: Some(order),
            ..Self::default()
        }
    }

    pub fn size(size: TextSize) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }

    pub fn style(flag: StyleFlag, value: bool) -> Self {
        let mut patch = Self::default();
        match flag {
            StyleFlag::Bold => patch.bold = Some(value),
            StyleFlag::Italic => patch.italic = Some(value),
            StyleFlag::Underline => patch.underline = Some(value),
        }
        patch
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Write every present field into `block`
    pub fn apply_to(&self, block: &mut Block) {
        macro_rules! apply {
            ($field:ident) => {
                if let Some(value) = &self.$field {
                    block.$field = value.clone();
                }
            };
        }
        for_each_field!(apply);
    }

    /// Values `block` currently holds for the fields this patch touches
    pub fn capture(&self, block: &Block) -> BlockPatch {
        let mut snapshot = BlockPatch::default();
        macro_rules! capture {
            ($field:ident) => {
                if self.$field.is_some() {
                    snapshot.$field = Some(block.$field.clone());
                }
            };
        }
        for_each_field!(capture);
        snapshot
    }

    /// Overlay `later` on top of this patch, later values win
    pub fn merge(&mut self, later: BlockPatch) {
        macro_rules! merge {
            ($field:ident) => {
                if later.$field.is_some() {
                    self.$field = later.$field;
                }
            };
        }
        for_each_field!(merge);
    }

    /// Revert fields of `block` from `after` back to `before`.
    ///
    /// A field is only restored while the block still holds the value `after`
    /// wrote; anything changed since then is left alone. Returns the fields
    /// that were actually restored.
    pub fn restore(block: &mut Block, before: &BlockPatch, after: &BlockPatch) -> BlockPatch {
        let mut restored = BlockPatch::default();
        macro_rules! restore {
            ($field:ident) => {
                if let (Some(old), Some(new)) = (&before.$field, &after.$field) {
                    if block.$field == *new {
                        block.$field = old.clone();
                        restored.$field = Some(old.clone());
                    }
                }
            };
        }
        for_each_field!(restore);
        restored
    }
}

/// Creation request sent to the persistence gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBlock {
    pub space_id: SpaceId,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Registered account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
}

/// Bearer credential returned by login/refresh
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
}

/// Named collection of blocks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: SpaceId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub owner_id: UserId,
}

/// One user's membership in a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub space_id: SpaceId,
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    #[serde(default)]
    pub is_creator: bool,
}

/// Collaborator currently connected to a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveUser {
    pub user_id: UserId,
    pub username: String,
}
