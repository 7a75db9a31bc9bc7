//! # Blockspace Editor
//!
//! Core engine of the block editor: a document is an ordered sequence of
//! typed blocks, edited in place, persisted remotely and shared live with
//! other collaborators.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ caret + list_format: text shaping           │
//! │  - line boundaries, caret placement         │
//! │  - bullet/number markers, renumbering       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ store: ordered blocks of the open space     │
//! │  - create/update/delete/reorder/retype      │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ session: optimistic pipeline + realtime     │
//! │  - debounced content, rollback on failure   │
//! │  - echo suppression, resync on reorder      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Local first**: every edit is visible before the gateway answers
//! 2. **Field-level rollback**: a failed write restores only what it touched
//! 3. **Last write wins**: no character-level merge of concurrent edits
//! 4. **Gateway authority**: order is re-fetched, never patched incrementally
//!
//! ## Usage
//!
//! ```rust,ignore
//! use blockspace_editor::{Credentials, EditSession, EditorConfig, TextSurface};
//!
//! let mut session = EditSession::open(space_id, credentials, gateway, connector, EditorConfig::default()).await?;
//!
//! // Enter at the end of a bulleted block continues the list
//! let mut surface = TextSurface::at_end("• two");
//! session.press_enter(block_id, &mut surface)?;
//!
//! // Let debounced writes and realtime traffic run to completion
//! session.settle().await;
//! ```

pub mod caret;
pub mod list_format;

mod config;
mod debounce;
mod errors;
mod gateway;
mod keys;
mod mutations;
mod pipeline;
mod presence;
mod realtime;
mod reorder;
mod session;
mod store;

pub use caret::{EditableSurface, TextSurface};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use debounce::{Debouncer, Ticket};
pub use errors::{ConfigError, EditorError, EditorResult};
pub use gateway::{AuthGateway, GatewayError, GatewayResult, PersistenceGateway, SpaceGateway};
pub use keys::{handle_backspace, handle_enter, KeyOutcome};
pub use mutations::{Mutation, Transaction, TransactionId};
pub use pipeline::{Pipeline, Settled};
pub use presence::{Collaborator, Presence};
pub use realtime::{
    ChannelConnector, ChannelState, FrameSink, RealtimeChannel, Reconciler, Reconciliation,
};
pub use reorder::{reorder_ids, DropPosition};
pub use session::{Credentials, EditSession, Focus, Notice};
pub use store::{BlockStore, OrderChange, Removal};

// Re-export the shared model for convenience
pub use blockspace_common::{
    Block, BlockId, BlockPatch, BlockType, ClientMessage, NewBlock, Role, ServerMessage, SpaceId,
    StyleFlag, TextSize, UserId,
};
