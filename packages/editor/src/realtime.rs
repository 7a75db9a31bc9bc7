//! # Realtime
//!
//! The per-space notification channel and the reconciler that folds remote
//! mutations into the local [`BlockStore`].
//!
//! A [`RealtimeChannel`] is text frames in both directions: outbound frames go
//! to a [`FrameSink`] supplied by the transport, inbound frames arrive on an
//! unbounded queue. Sending is best-effort and silently skipped once the
//! channel is closed.

use crate::errors::EditorError;
use crate::gateway::GatewayResult;
use crate::store::BlockStore;
use async_trait::async_trait;
use blockspace_common::{ClientMessage, ServerMessage, SpaceId, UserId};
use tokio::sync::mpsc;

/// Transport side of an outbound frame stream
pub trait FrameSink: Send + Sync {
    fn send_frame(&self, frame: String) -> Result<(), String>;

    /// Called once when the owning channel closes
    fn close(&self) {}
}

impl FrameSink for mpsc::UnboundedSender<String> {
    fn send_frame(&self, frame: String) -> Result<(), String> {
        self.send(frame).map_err(|_| "receiver dropped".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Open,
    Closed,
}

pub struct RealtimeChannel {
    space_id: SpaceId,
    sink: Box<dyn FrameSink>,
    inbound: mpsc::UnboundedReceiver<String>,
    state: ChannelState,
}

impl RealtimeChannel {
    pub fn new(
        space_id: SpaceId,
        sink: Box<dyn FrameSink>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self {
            space_id,
            sink,
            inbound,
            state: ChannelState::Open,
        }
    }

    /// Channel backed by plain queues: returns the channel, the receiving end
    /// of its outbound frames and the sending end of its inbound frames.
    pub fn pair(
        space_id: SpaceId,
    ) -> (
        Self,
        mpsc::UnboundedReceiver<String>,
        mpsc::UnboundedSender<String>,
    ) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        (Self::new(space_id, Box::new(out_tx), in_rx), out_rx, in_tx)
    }

    pub fn space_id(&self) -> SpaceId {
        self.space_id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    /// Best-effort send. Returns whether the frame left.
    pub fn send(&mut self, message: &ClientMessage) -> bool {
        if !self.is_open() {
            tracing::debug!(space_id = self.space_id, "channel closed, notification skipped");
            return false;
        }

        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode notification");
                return false;
            }
        };

        match self.sink.send_frame(frame) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(space_id = self.space_id, error = %e, "realtime send failed");
                self.state = ChannelState::Closed;
                false
            }
        }
    }

    /// Next inbound frame; `None` once the transport hung up
    pub async fn recv(&mut self) -> Option<String> {
        if !self.is_open() {
            return None;
        }
        let frame = self.inbound.recv().await;
        if frame.is_none() {
            tracing::warn!(space_id = self.space_id, "realtime channel disconnected");
            self.state = ChannelState::Closed;
        }
        frame
    }

    /// Inbound frame that is already queued, without waiting
    pub fn try_recv(&mut self) -> Option<String> {
        if !self.is_open() {
            return None;
        }
        match self.inbound.try_recv() {
            Ok(frame) => Some(frame),
            Err(mpsc::error::TryRecvError::Empty) => None,
            Err(mpsc::error::TryRecvError::Disconnected) => {
                tracing::warn!(space_id = self.space_id, "realtime channel disconnected");
                self.state = ChannelState::Closed;
                None
            }
        }
    }

    pub fn close(&mut self) {
        if self.state == ChannelState::Open {
            self.state = ChannelState::Closed;
            self.inbound.close();
            self.sink.close();
            tracing::debug!(space_id = self.space_id, "realtime channel closed");
        }
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens the realtime channel of a space with a bearer token
#[async_trait]
pub trait ChannelConnector: Send + Sync {
    async fn connect(&self, space_id: SpaceId, token: &str) -> GatewayResult<RealtimeChannel>;
}

/// What applying one inbound message did
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// The store changed
    Applied,
    /// Our own mutation reported back
    Echo,
    /// Nothing to do (already present, unknown block, non-block message)
    Ignored,
    /// Local state can't be patched incrementally; re-fetch the space
    Resync,
}

/// Applies remote block mutations to the store
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    local_user: UserId,
}

impl Reconciler {
    pub fn new(local_user: UserId) -> Self {
        Self { local_user }
    }

    pub fn apply(&self, store: &mut BlockStore, message: &ServerMessage) -> Reconciliation {
        if let Some(actor) = message.actor() {
            if actor == self.local_user {
                tracing::debug!(kind = message.kind(), "suppressed own echo");
                return Reconciliation::Echo;
            }
        }

        match message {
            ServerMessage::BlockCreated { block, .. } => {
                if block.space_id != store.space_id() {
                    return Reconciliation::Ignored;
                }
                if store.insert(block.clone()) {
                    Reconciliation::Applied
                } else {
                    Reconciliation::Ignored
                }
            }
            ServerMessage::BlockUpdated { block_id, changes, .. } => {
                match store.update(*block_id, changes) {
                    Ok(_) => Reconciliation::Applied,
                    Err(_) => {
                        tracing::debug!(block_id = *block_id, "update for unknown block ignored");
                        Reconciliation::Ignored
                    }
                }
            }
            ServerMessage::BlockDeleted { block_id, .. } => match store.remove(*block_id) {
                Ok(_) => Reconciliation::Applied,
                Err(EditorError::LastBlock(_)) => {
                    tracing::warn!(block_id = *block_id, "peer deleted our last block, resyncing");
                    Reconciliation::Resync
                }
                Err(_) => Reconciliation::Ignored,
            },
            ServerMessage::BlocksReordered { .. } => Reconciliation::Resync,
            _ => Reconciliation::Ignored,
        }
    }
}
