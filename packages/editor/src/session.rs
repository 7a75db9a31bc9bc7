//! # Edit Session
//!
//! One client's view of one open space. The session owns the block store and
//! wires it to the persistence gateway and the realtime channel:
//!
//! ```text
//! user intent ──► store (optimistic) ──► spawned gateway call ─┐
//!                   ▲                                          │ completion
//! realtime frame ──► reconciler                                ▼
//!                   └──────────── handle_envelope ◄── mpsc ────┘
//! ```
//!
//! Everything that touches the store runs through `&mut self`, so handlers
//! never interleave. Gateway calls run on spawned tasks and report back over
//! an mpsc channel; each report carries the epoch it was issued in and is
//! dropped if the session has since been closed or switched to another space.
//!
//! The local role is learned from `connection_established`. Until that
//! arrives the session assumes [`Role::Participant`].

use crate::caret::{char_len, slice, EditableSurface};
use crate::config::EditorConfig;
use crate::debounce::{Debouncer, Ticket};
use crate::errors::{EditorError, EditorResult};
use crate::gateway::{GatewayError, GatewayResult, PersistenceGateway};
use crate::keys::{handle_backspace, handle_enter, KeyOutcome};
use crate::list_format::{convert_content, normalize_list_lines, renumber_lines, Marker};
use crate::mutations::{Mutation, TransactionId};
use crate::pipeline::{Pipeline, Settled};
use crate::presence::Presence;
use crate::realtime::{ChannelConnector, RealtimeChannel, Reconciler, Reconciliation};
use crate::reorder::{reorder_ids, DropPosition};
use crate::store::{BlockStore, OrderChange, Removal};
use blockspace_common::{
    has_permission, Block, BlockId, BlockPatch, BlockType, ClientMessage, NewBlock, Permission,
    Role, ServerMessage, SpaceId, StyleFlag, TextSize, UserId,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identity the session acts as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: UserId,
    pub username: String,
    /// Bearer token for the realtime channel
    pub token: String,
}

/// Where the caret should go after a structural edit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Focus {
    pub block_id: BlockId,
    pub caret: usize,
}

/// A failure the user should be told about
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub block_id: Option<BlockId>,
    pub error: EditorError,
}

#[derive(Debug)]
enum MergeStep {
    Done(Block),
    UpdateFailed(GatewayError),
    DeleteFailed(Block, GatewayError),
}

#[derive(Debug)]
enum Completion {
    Flush {
        block_id: BlockId,
        ticket: Ticket,
    },
    Updated {
        transaction: TransactionId,
        result: GatewayResult<Block>,
    },
    Deleted {
        removal: Removal,
        result: GatewayResult<()>,
    },
    Merged {
        transaction: TransactionId,
        target: BlockId,
        removal: Removal,
        step: MergeStep,
    },
    Reordered {
        changes: Vec<OrderChange>,
        result: GatewayResult<Vec<Block>>,
    },
    Resynced {
        result: GatewayResult<Vec<Block>>,
    },
}

#[derive(Debug)]
struct Envelope {
    epoch: u64,
    completion: Completion,
}

pub struct EditSession {
    credentials: Credentials,
    config: EditorConfig,
    gateway: Arc<dyn PersistenceGateway>,
    connector: Arc<dyn ChannelConnector>,

    store: BlockStore,
    channel: Option<RealtimeChannel>,
    reconciler: Reconciler,
    presence: Presence,
    pipeline: Pipeline,

    /// Debounced content not yet committed, by block
    intents: HashMap<BlockId, String>,
    debouncer: Debouncer<BlockId>,

    epoch: u64,
    in_flight: usize,
    completions_tx: mpsc::UnboundedSender<Envelope>,
    completions: mpsc::UnboundedReceiver<Envelope>,

    notices: Vec<Notice>,
    focus: Option<Focus>,
    open: bool,
}

impl EditSession {
    /// Load a space's blocks and connect its realtime channel
    pub async fn open(
        space_id: SpaceId,
        credentials: Credentials,
        gateway: Arc<dyn PersistenceGateway>,
        connector: Arc<dyn ChannelConnector>,
        config: EditorConfig,
    ) -> EditorResult<Self> {
        let (completions_tx, completions) = mpsc::unbounded_channel();

        let mut session = Self {
            reconciler: Reconciler::new(credentials.user_id),
            presence: Presence::new(credentials.user_id),
            credentials,
            config,
            gateway,
            connector,
            store: BlockStore::new(space_id),
            channel: None,
            pipeline: Pipeline::new(),
            intents: HashMap::new(),
            debouncer: Debouncer::new(),
            epoch: 0,
            in_flight: 0,
            completions_tx,
            completions,
            notices: Vec::new(),
            focus: None,
            open: false,
        };

        session.load(space_id).await?;
        Ok(session)
    }

    async fn load(&mut self, space_id: SpaceId) -> EditorResult<()> {
        let blocks = self.gateway.list_blocks(space_id).await?;
        let channel = self
            .connector
            .connect(space_id, &self.credentials.token)
            .await
            .map_err(|e| EditorError::Channel(e.to_string()))?;

        self.store = BlockStore::from_blocks(space_id, blocks);
        self.channel = Some(channel);
        self.open = true;
        self.pump_inbound();

        tracing::info!(space_id, blocks = self.store.len(), "space opened");
        Ok(())
    }

    /// Close the current space and open another one
    pub async fn switch_space(&mut self, space_id: SpaceId) -> EditorResult<()> {
        self.close();
        self.load(space_id).await
    }

    /// Cancel pending edits, close the channel and discard the store.
    /// Results of calls still in flight are dropped when they arrive.
    pub fn close(&mut self) {
        if !self.open {
            return;
        }

        let space_id = self.store.space_id();
        self.epoch += 1;
        self.in_flight = 0;
        self.debouncer.cancel_all();
        self.intents.clear();
        self.pipeline.clear();
        if let Some(mut channel) = self.channel.take() {
            channel.close();
        }
        self.presence.clear();
        self.store = BlockStore::new(space_id);
        self.focus = None;
        self.open = false;

        tracing::info!(space_id, "space closed");
    }

    // ---- accessors ----

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn space_id(&self) -> SpaceId {
        self.store.space_id()
    }

    pub fn user_id(&self) -> UserId {
        self.credentials.user_id
    }

    pub fn blocks(&self) -> &[Block] {
        self.store.blocks()
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.store.get(id)
    }

    pub fn store(&self) -> &BlockStore {
        &self.store
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    pub fn role(&self) -> Role {
        self.presence.role().unwrap_or_default()
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn focus(&self) -> Option<Focus> {
        self.focus
    }

    /// Content typed into `id` that is still waiting for its quiet period
    pub fn pending_content(&self, id: BlockId) -> Option<&str> {
        self.intents.get(&id).map(String::as_str)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ---- user intents ----

    /// Record typed content; persisted once the block has been quiet for
    /// the configured debounce period
    pub fn edit_content(&mut self, block_id: BlockId, content: impl Into<String>) -> EditorResult<()> {
        self.authorize(Permission::EditBlocks)?;
        if !self.store.contains(block_id) {
            return Err(EditorError::NotFound(block_id));
        }

        self.intents.insert(block_id, content.into());

        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        self.debouncer.schedule(block_id, self.config.debounce(), move |ticket| {
            let _ = tx.send(Envelope {
                epoch,
                completion: Completion::Flush { block_id, ticket },
            });
        });
        Ok(())
    }

    /// Commit pending content for a block right away
    pub fn flush(&mut self, block_id: BlockId) -> EditorResult<()> {
        self.debouncer.cancel(block_id);
        match self.intents.remove(&block_id) {
            Some(content) => self.apply(Mutation::UpdateContent { block_id, content }),
            None => Ok(()),
        }
    }

    /// Optimistically apply a single-block mutation and persist it
    pub fn apply(&mut self, mutation: Mutation) -> EditorResult<()> {
        self.authorize(mutation.permission())?;

        let block_id = mutation.block_id();
        if !matches!(mutation, Mutation::UpdateContent { .. }) {
            self.flush(block_id)?;
        }

        let patch = mutation.to_patch(&self.store)?;
        let transaction = self.pipeline.begin(&mut self.store, block_id, patch)?;
        tracing::debug!(block_id, transaction = transaction.id, "applied locally");

        let gateway = self.gateway.clone();
        self.spawn(async move {
            let result = gateway.update_block(transaction.block_id, transaction.after).await;
            Completion::Updated {
                transaction: transaction.id,
                result,
            }
        });
        Ok(())
    }

    pub fn change_type(&mut self, block_id: BlockId, block_type: BlockType) -> EditorResult<()> {
        self.apply(Mutation::ChangeType { block_id, block_type })
    }

    pub fn toggle_style(&mut self, block_id: BlockId, flag: StyleFlag) -> EditorResult<()> {
        self.apply(Mutation::ToggleStyle { block_id, flag })
    }

    pub fn set_size(&mut self, block_id: BlockId, size: TextSize) -> EditorResult<()> {
        self.apply(Mutation::SetSize { block_id, size })
    }

    /// Toolbar list button: strip the block's `list` markers if it carries
    /// any, otherwise turn it into that kind of list
    pub fn toggle_list(&mut self, block_id: BlockId, list: BlockType) -> EditorResult<()> {
        self.apply(Mutation::ToggleList { block_id, list })
    }

    /// Remove a block. Returns the block that receives focus.
    pub fn delete_block(&mut self, block_id: BlockId) -> EditorResult<BlockId> {
        self.authorize(Permission::DeleteBlocks)?;

        let removal = self.store.remove(block_id)?;
        self.discard_intent(block_id);
        self.focus = Some(Focus {
            block_id: removal.focus,
            caret: 0,
        });

        let focus = removal.focus;
        let gateway = self.gateway.clone();
        self.spawn(async move {
            let result = gateway.delete_block(block_id).await;
            Completion::Deleted { removal, result }
        });
        Ok(focus)
    }

    /// Create a block; waits for the gateway to assign its id
    pub async fn create_block(
        &mut self,
        block_type: BlockType,
        content: impl Into<String>,
        order: Option<i64>,
    ) -> EditorResult<Block> {
        self.authorize(Permission::CreateBlocks)?;

        let request = NewBlock {
            space_id: self.store.space_id(),
            block_type,
            content: content.into(),
            order,
        };
        let block = self.gateway.create_block(request).await?;

        self.store.insert(block.clone());
        self.notify(ClientMessage::BlockCreated { block: block.clone() });
        tracing::debug!(block_id = block.id, "block created");
        Ok(block)
    }

    /// Empty TEXT block at the end of the space
    pub async fn append_block(&mut self) -> EditorResult<Block> {
        let block = self.create_block(BlockType::Text, "", None).await?;
        self.focus = Some(Focus {
            block_id: block.id,
            caret: 0,
        });
        Ok(block)
    }

    /// Move the text after the caret into a new block directly below
    pub async fn split_block(
        &mut self,
        block_id: BlockId,
        surface: &mut dyn EditableSurface,
    ) -> EditorResult<Block> {
        self.authorize(Permission::CreateBlocks)?;
        self.authorize(Permission::EditBlocks)?;

        let block = self
            .store
            .get(block_id)
            .cloned()
            .ok_or(EditorError::NotFound(block_id))?;

        let text = surface.get_text();
        let caret = surface.get_caret_offset();
        let head = slice(&text, 0, caret);
        let head = head.strip_suffix('\n').unwrap_or(head);
        let tail = slice(&text, caret, char_len(&text));

        let (new_type, new_content) = if block.block_type.is_list() {
            let converted = convert_content(tail, BlockType::Text, block.block_type);
            (block.block_type, normalize_list_lines(&converted))
        } else {
            (BlockType::Text, tail.to_string())
        };
        let head = match block.block_type {
            BlockType::NumberedList => renumber_lines(&normalize_list_lines(head)),
            BlockType::BulletList => normalize_list_lines(head),
            _ => head.to_string(),
        };

        let created = self
            .create_block(new_type, new_content.clone(), Some(block.order + 1))
            .await?;

        self.discard_intent(block_id);
        if head != block.content {
            self.apply(Mutation::UpdateContent {
                block_id,
                content: head.clone(),
            })?;
        }
        surface.set_text(&head);

        let mut ids: Vec<BlockId> = self.store.ids().into_iter().filter(|id| *id != created.id).collect();
        let at = ids.iter().position(|id| *id == block_id).map_or(ids.len(), |i| i + 1);
        ids.insert(at, created.id);
        self.persist_order(&ids)?;

        let caret = Marker::parse(&new_content).map_or(0, |(_, len)| len);
        self.focus = Some(Focus {
            block_id: created.id,
            caret,
        });

        Ok(self.store.get(created.id).cloned().unwrap_or(created))
    }

    /// Enter inside a block
    pub fn press_enter(
        &mut self,
        block_id: BlockId,
        surface: &mut dyn EditableSurface,
    ) -> EditorResult<KeyOutcome> {
        self.authorize(Permission::EditBlocks)?;
        let block_type = self.block_type(block_id)?;

        let outcome = handle_enter(block_type, surface);
        if outcome == KeyOutcome::Edited {
            self.edit_content(block_id, surface.get_text())?;
        }
        Ok(outcome)
    }

    /// Backspace inside a block
    pub fn press_backspace(
        &mut self,
        block_id: BlockId,
        surface: &mut dyn EditableSurface,
    ) -> EditorResult<KeyOutcome> {
        self.authorize(Permission::EditBlocks)?;
        let block_type = self.block_type(block_id)?;
        let is_first = self.store.position(block_id) == Some(0);

        if surface.get_caret_offset() == 0 && !is_first {
            self.authorize(Permission::DeleteBlocks)?;
        }

        let outcome = handle_backspace(block_type, surface, is_first);
        match outcome {
            KeyOutcome::Edited => self.edit_content(block_id, surface.get_text())?,
            KeyOutcome::ExitList => {
                self.discard_intent(block_id);
                self.apply(Mutation::ExitList { block_id })?;
            }
            KeyOutcome::MergeWithPrevious => {
                let focus = self.merge_with_previous(block_id, surface.get_text())?;
                self.focus = Some(focus);
            }
            KeyOutcome::PassThrough => {}
        }
        Ok(outcome)
    }

    /// Append `content` (this block's live text) to the previous block and
    /// delete this block. Persisted as update-then-delete.
    pub fn merge_with_previous(&mut self, block_id: BlockId, content: String) -> EditorResult<Focus> {
        self.authorize(Permission::EditBlocks)?;
        self.authorize(Permission::DeleteBlocks)?;

        let (previous, previous_type) = match self.store.previous(block_id) {
            Some(previous) => (previous.id, previous.block_type),
            None if self.store.contains(block_id) => return Ok(Focus { block_id, caret: 0 }),
            None => return Err(EditorError::NotFound(block_id)),
        };

        self.discard_intent(block_id);
        self.debouncer.cancel(previous);
        let previous_content = match self.intents.remove(&previous) {
            Some(pending) => pending,
            None => self
                .store
                .get(previous)
                .map(|b| b.content.clone())
                .unwrap_or_default(),
        };

        let mut merged = format!("{}{}", previous_content, content);
        if previous_type.is_list() {
            merged = normalize_list_lines(&merged);
        }
        let caret = char_len(&merged).saturating_sub(char_len(&content));

        let removal = self.store.remove(block_id)?;
        let transaction = match self
            .pipeline
            .begin(&mut self.store, previous, BlockPatch::content(merged))
        {
            Ok(transaction) => transaction,
            Err(e) => {
                self.store.restore(removal.block, removal.index);
                return Err(e);
            }
        };

        let gateway = self.gateway.clone();
        self.spawn(async move {
            let step = match gateway.update_block(previous, transaction.after).await {
                Err(e) => MergeStep::UpdateFailed(e),
                Ok(updated) => match gateway.delete_block(block_id).await {
                    Ok(()) => MergeStep::Done(updated),
                    Err(e) => MergeStep::DeleteFailed(updated, e),
                },
            };
            Completion::Merged {
                transaction: transaction.id,
                target: previous,
                removal,
                step,
            }
        });

        Ok(Focus {
            block_id: previous,
            caret,
        })
    }

    /// Drop `dragged` above or below `target`
    pub fn drop_block(
        &mut self,
        dragged: BlockId,
        target: BlockId,
        position: DropPosition,
    ) -> EditorResult<()> {
        self.authorize(Permission::ReorderBlocks)?;

        let ids = reorder_ids(&self.store.ids(), dragged, target, position)?;
        self.persist_order(&ids)
    }

    // ---- presence ----

    pub fn send_cursor(&mut self, block_id: BlockId, position: usize) {
        self.send(ClientMessage::CursorPosition { block_id, position });
    }

    pub fn send_typing(&mut self, block_id: BlockId, is_typing: bool) {
        self.send(ClientMessage::UserTyping { block_id, is_typing });
    }

    pub fn send_selection(&mut self, block_id: BlockId) {
        self.send(ClientMessage::BlockSelection { block_id });
    }

    // ---- event loop ----

    /// Wait for the next completion or inbound frame and handle it.
    /// Returns false when nothing further can arrive.
    pub async fn process_next(&mut self) -> bool {
        enum Wakeup {
            Completion(Envelope),
            Frame(String),
            Disconnected,
        }

        let wakeup = match self.channel.as_mut().filter(|c| c.is_open()) {
            Some(channel) => tokio::select! {
                Some(envelope) = self.completions.recv() => Wakeup::Completion(envelope),
                frame = channel.recv() => match frame {
                    Some(frame) => Wakeup::Frame(frame),
                    None => Wakeup::Disconnected,
                },
            },
            None => match self.completions.recv().await {
                Some(envelope) => Wakeup::Completion(envelope),
                None => return false,
            },
        };

        match wakeup {
            Wakeup::Completion(envelope) => self.handle_envelope(envelope),
            Wakeup::Frame(frame) => self.handle_frame(&frame),
            Wakeup::Disconnected => {
                self.notices.push(Notice {
                    block_id: None,
                    error: EditorError::Channel("disconnected".to_string()),
                });
            }
        }
        true
    }

    /// Handle everything until no call, debounce window or queued frame is left
    pub async fn settle(&mut self) {
        loop {
            self.pump_inbound();
            if self.in_flight == 0 && self.debouncer.pending_count() == 0 {
                break;
            }
            match self.completions.recv().await {
                Some(envelope) => self.handle_envelope(envelope),
                None => break,
            }
        }
        self.pump_inbound();
    }

    /// Apply one inbound realtime frame. Malformed frames are dropped.
    pub fn handle_frame(&mut self, frame: &str) {
        match ServerMessage::decode(frame) {
            Ok(message) => self.handle_message(message),
            Err(e) => tracing::warn!(error = %e, "dropping malformed realtime frame"),
        }
    }

    pub fn handle_message(&mut self, message: ServerMessage) {
        if !self.open {
            return;
        }

        if let ServerMessage::Error { message } = &message {
            tracing::warn!(space_id = self.space_id(), "realtime error: {}", message);
            return;
        }

        if self.presence.apply(&message) {
            return;
        }

        match self.reconciler.apply(&mut self.store, &message) {
            Reconciliation::Applied => {
                tracing::debug!(kind = message.kind(), actor = ?message.actor(), "applied remote change");
            }
            Reconciliation::Resync => self.resync(),
            Reconciliation::Echo | Reconciliation::Ignored => {}
        }
    }

    /// Re-fetch the whole block list; the gateway's sequence replaces ours
    pub fn resync(&mut self) {
        let gateway = self.gateway.clone();
        let space_id = self.store.space_id();
        self.spawn(async move {
            Completion::Resynced {
                result: gateway.list_blocks(space_id).await,
            }
        });
    }

    fn pump_inbound(&mut self) {
        let mut frames = Vec::new();
        if let Some(channel) = self.channel.as_mut() {
            while let Some(frame) = channel.try_recv() {
                frames.push(frame);
            }
        }
        for frame in frames {
            self.handle_frame(&frame);
        }
    }

    fn handle_envelope(&mut self, envelope: Envelope) {
        if envelope.epoch != self.epoch {
            tracing::debug!(epoch = envelope.epoch, "discarding result for a closed space");
            return;
        }
        if !matches!(envelope.completion, Completion::Flush { .. }) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        match envelope.completion {
            Completion::Flush { block_id, ticket } => {
                if !self.debouncer.fire(block_id, ticket) {
                    return;
                }
                if let Some(content) = self.intents.remove(&block_id) {
                    if let Err(e) = self.apply(Mutation::UpdateContent { block_id, content }) {
                        tracing::debug!(block_id, error = %e, "debounced edit dropped");
                    }
                }
            }
            Completion::Updated { transaction, result } => {
                let settled = self.pipeline.finish(&mut self.store, transaction, result);
                self.after_settled(settled);
            }
            Completion::Deleted { removal, result } => match result {
                Ok(()) => self.notify(ClientMessage::BlockDeleted {
                    block_id: removal.block.id,
                }),
                Err(e) => {
                    let block_id = removal.block.id;
                    tracing::warn!(block_id, error = %e, "delete failed, restoring block");
                    self.store.restore(removal.block, removal.index);
                    self.notices.push(Notice {
                        block_id: Some(block_id),
                        error: EditorError::Persistence(e),
                    });
                }
            },
            Completion::Merged {
                transaction,
                target,
                removal,
                step,
            } => self.after_merge(transaction, target, removal, step),
            Completion::Reordered { changes, result } => match result {
                Ok(blocks) => {
                    self.replace_from_gateway(blocks);
                    self.notify(ClientMessage::BlocksReordered {
                        space_id: self.store.space_id(),
                        block_ids: self.store.ids(),
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "reorder failed, restoring previous order");
                    for change in &changes {
                        let _ = self.store.revert(
                            change.id,
                            &BlockPatch::order(change.from),
                            &BlockPatch::order(change.to),
                        );
                    }
                    self.notices.push(Notice {
                        block_id: None,
                        error: EditorError::Persistence(e),
                    });
                }
            },
            Completion::Resynced { result } => match result {
                Ok(blocks) => {
                    tracing::debug!(blocks = blocks.len(), "resynced from gateway");
                    self.replace_from_gateway(blocks);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "resync failed");
                    self.notices.push(Notice {
                        block_id: None,
                        error: EditorError::Persistence(e),
                    });
                }
            },
        }
    }

    fn after_settled(&mut self, settled: Settled) {
        match settled {
            Settled::Committed(transaction) => self.notify(ClientMessage::BlockUpdated {
                block_id: transaction.block_id,
                changes: transaction.after,
            }),
            Settled::RolledBack {
                transaction, error, ..
            } => self.notices.push(Notice {
                block_id: Some(transaction.block_id),
                error,
            }),
            Settled::Unknown(id) => {
                tracing::debug!(transaction = id, "completion for unknown transaction");
            }
        }
    }

    fn after_merge(
        &mut self,
        transaction: TransactionId,
        target: BlockId,
        removal: Removal,
        step: MergeStep,
    ) {
        let merged = removal.block.id;
        match step {
            MergeStep::Done(updated) => {
                let settled = self.pipeline.finish(&mut self.store, transaction, Ok(updated));
                self.after_settled(settled);
                // A reload that raced the delete may have brought it back
                if self.store.contains(merged) {
                    if let Err(e) = self.store.remove(merged) {
                        tracing::debug!(block_id = merged, error = %e, "merged block kept");
                    }
                }
                self.notify(ClientMessage::BlockDeleted { block_id: merged });
            }
            MergeStep::UpdateFailed(e) => {
                let settled = self.pipeline.finish(&mut self.store, transaction, Err(e));
                self.store.restore(removal.block, removal.index);
                self.after_settled(settled);
            }
            MergeStep::DeleteFailed(updated, e) => {
                let settled = self.pipeline.finish(&mut self.store, transaction, Ok(updated));
                self.after_settled(settled);

                let error = EditorError::InconsistentMerge { target, merged };
                tracing::error!(
                    block_id = merged,
                    cause = %e,
                    "{}, reloading space",
                    error
                );
                self.resync();
            }
        }
    }

    /// Adopt a freshly fetched block list, keeping writes still in flight
    fn replace_from_gateway(&mut self, blocks: Vec<Block>) {
        self.store.replace_all(blocks);
        self.pipeline.reapply(&mut self.store);
    }

    /// Assign `order` from `ids`, persist changed orders, then let the
    /// gateway renumber and re-fetch the authoritative sequence
    fn persist_order(&mut self, ids: &[BlockId]) -> EditorResult<()> {
        let changes = self.store.reorder(ids)?;
        if changes.is_empty() {
            return Ok(());
        }

        let gateway = self.gateway.clone();
        let space_id = self.store.space_id();
        self.spawn(async move {
            let result = persist_reorder(gateway.as_ref(), space_id, &changes).await;
            Completion::Reordered { changes, result }
        });
        Ok(())
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Completion> + Send + 'static,
    {
        self.in_flight += 1;
        let tx = self.completions_tx.clone();
        let epoch = self.epoch;
        tokio::spawn(async move {
            let completion = task.await;
            let _ = tx.send(Envelope { epoch, completion });
        });
    }

    fn notify(&mut self, message: ClientMessage) {
        if self.config.notify_peers {
            self.send(message);
        }
    }

    fn send(&mut self, message: ClientMessage) {
        if let Some(channel) = self.channel.as_mut() {
            channel.send(&message);
        }
    }

    fn discard_intent(&mut self, block_id: BlockId) {
        self.debouncer.cancel(block_id);
        self.intents.remove(&block_id);
    }

    fn block_type(&self, block_id: BlockId) -> EditorResult<BlockType> {
        self.store
            .get(block_id)
            .map(|b| b.block_type)
            .ok_or(EditorError::NotFound(block_id))
    }

    fn authorize(&self, permission: Permission) -> EditorResult<()> {
        if !self.open {
            return Err(EditorError::NotOpen);
        }
        if has_permission(self.role(), permission, false) {
            Ok(())
        } else {
            Err(EditorError::PermissionDenied(permission))
        }
    }
}

async fn persist_reorder(
    gateway: &dyn PersistenceGateway,
    space_id: SpaceId,
    changes: &[OrderChange],
) -> GatewayResult<Vec<Block>> {
    for change in changes {
        gateway
            .update_block(change.id, BlockPatch::order(change.to))
            .await?;
    }
    gateway.refresh_order(space_id).await?;
    gateway.list_blocks(space_id).await
}

impl Drop for EditSession {
    fn drop(&mut self) {
        self.close();
    }
}
