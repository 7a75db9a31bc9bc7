//! # Realtime Hub
//!
//! Relays notifications between the connections of a space. Each connection
//! is a [`RealtimeChannel`] whose outbound sink is a [`HubSink`]: a frame sent
//! by one client is decoded, stamped with the sender's identity and pushed
//! synchronously into the inbound queue of every other connection in the
//! same space. The sender never hears its own frame back, but a second
//! connection of the same user does.

use blockspace_common::{
    has_permission, ActiveUser, ClientMessage, Permission, Role, ServerMessage, SpaceId, User,
    UserId,
};
use blockspace_editor::{FrameSink, RealtimeChannel};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

pub type ConnectionId = u64;

struct Connection {
    space_id: SpaceId,
    user_id: UserId,
    username: String,
    role: Role,
    inbound: mpsc::UnboundedSender<String>,
}

#[derive(Default)]
struct HubState {
    next_id: ConnectionId,
    connections: BTreeMap<ConnectionId, Connection>,
}

#[derive(Default)]
pub struct Hub {
    state: Mutex<HubState>,
}

/// Permission a client notification requires before it is relayed
fn required_permission(message: &ClientMessage) -> Option<Permission> {
    match message {
        ClientMessage::BlockCreated { .. } => Some(Permission::CreateBlocks),
        ClientMessage::BlockUpdated { .. } => Some(Permission::EditBlocks),
        ClientMessage::BlockDeleted { .. } => Some(Permission::DeleteBlocks),
        ClientMessage::BlocksReordered { .. } => Some(Permission::ReorderBlocks),
        _ => None,
    }
}

fn deliver(connection: &Connection, message: &ServerMessage) {
    match message.encode() {
        Ok(frame) => {
            // A closed receiver just means that client is going away
            let _ = connection.inbound.send(frame);
        }
        Err(e) => tracing::warn!(error = %e, "failed to encode realtime message"),
    }
}

impl Hub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an authenticated member and hand back its channel
    pub fn connect(self: &Arc<Self>, space_id: SpaceId, user: &User, role: Role) -> RealtimeChannel {
        let (connection, inbound) = self.register(space_id, user, role);
        let sink = HubSink {
            hub: Arc::clone(self),
            connection,
        };
        RealtimeChannel::new(space_id, Box::new(sink), inbound)
    }

    fn register(&self, space_id: SpaceId, user: &User, role: Role) -> (ConnectionId, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.lock();

        state.next_id += 1;
        let id = state.next_id;

        let active_users = Self::active_in(&state, space_id);
        let connection = Connection {
            space_id,
            user_id: user.id,
            username: user.username.clone(),
            role,
            inbound: tx,
        };

        deliver(
            &connection,
            &ServerMessage::ConnectionEstablished {
                space_id,
                user_id: user.id,
                role,
                active_users,
            },
        );
        let joined = ServerMessage::UserJoined {
            user_id: user.id,
            username: user.username.clone(),
        };
        for other in state.connections.values().filter(|c| c.space_id == space_id) {
            deliver(other, &joined);
        }

        state.connections.insert(id, connection);
        tracing::info!(space_id, user_id = user.id, connection = id, "realtime connection opened");
        (id, rx)
    }

    fn active_in(state: &HubState, space_id: SpaceId) -> Vec<ActiveUser> {
        let mut users: Vec<ActiveUser> = Vec::new();
        for connection in state.connections.values().filter(|c| c.space_id == space_id) {
            if !users.iter().any(|u| u.user_id == connection.user_id) {
                users.push(ActiveUser {
                    user_id: connection.user_id,
                    username: connection.username.clone(),
                });
            }
        }
        users
    }

    /// Collaborators currently connected to a space
    pub fn active_users(&self, space_id: SpaceId) -> Vec<ActiveUser> {
        Self::active_in(&self.lock(), space_id)
    }

    pub fn connection_count(&self, space_id: SpaceId) -> usize {
        self.lock()
            .connections
            .values()
            .filter(|c| c.space_id == space_id)
            .count()
    }

    /// Handle one frame sent by `from`
    fn relay(&self, from: ConnectionId, frame: &str) {
        let state = self.lock();
        let Some(sender) = state.connections.get(&from) else {
            return;
        };

        let message = match ClientMessage::decode(frame) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(connection = from, error = %e, "malformed frame from client");
                deliver(
                    sender,
                    &ServerMessage::Error {
                        message: format!("malformed message: {}", e),
                    },
                );
                return;
            }
        };

        if let Some(permission) = required_permission(&message) {
            if !has_permission(sender.role, permission, false) {
                deliver(
                    sender,
                    &ServerMessage::Error {
                        message: format!("{:?} is not allowed", permission),
                    },
                );
                return;
            }
        }

        let stamped = message.stamp(sender.user_id, &sender.username);
        tracing::debug!(kind = stamped.kind(), space_id = sender.space_id, from, "relaying");
        for (id, other) in &state.connections {
            if *id != from && other.space_id == sender.space_id {
                deliver(other, &stamped);
            }
        }
    }

    /// Apply a membership change to the live connections of `user_id`.
    /// A new role is enforced from the next frame on and re-announced to the
    /// user; `None` (removed from the space) drops the connections.
    pub fn membership_changed(&self, space_id: SpaceId, user_id: UserId, role: Option<Role>) {
        let mut state = self.lock();
        let affected: Vec<ConnectionId> = state
            .connections
            .iter()
            .filter(|(_, c)| c.space_id == space_id && c.user_id == user_id)
            .map(|(id, _)| *id)
            .collect();

        match role {
            Some(role) => {
                let active_users = Self::active_in(&state, space_id);
                for id in affected {
                    if let Some(connection) = state.connections.get_mut(&id) {
                        connection.role = role;
                        deliver(
                            connection,
                            &ServerMessage::ConnectionEstablished {
                                space_id,
                                user_id,
                                role,
                                active_users: active_users.clone(),
                            },
                        );
                    }
                }
                tracing::info!(space_id, user_id, ?role, "live connections switched role");
            }
            None => {
                for id in affected {
                    Self::remove(&mut state, id);
                }
            }
        }
    }

    fn disconnect(&self, id: ConnectionId) {
        Self::remove(&mut self.lock(), id);
    }

    fn remove(state: &mut HubState, id: ConnectionId) {
        let Some(connection) = state.connections.remove(&id) else {
            return;
        };

        let left = ServerMessage::UserLeft {
            user_id: connection.user_id,
            username: connection.username.clone(),
        };
        for other in state
            .connections
            .values()
            .filter(|c| c.space_id == connection.space_id)
        {
            deliver(other, &left);
        }
        tracing::info!(space_id = connection.space_id, connection = id, "realtime connection closed");
    }
}

/// Outbound side of one hub connection
pub struct HubSink {
    hub: Arc<Hub>,
    connection: ConnectionId,
}

impl FrameSink for HubSink {
    fn send_frame(&self, frame: String) -> Result<(), String> {
        self.hub.relay(self.connection, &frame);
        Ok(())
    }

    fn close(&self) {
        self.hub.disconnect(self.connection);
    }
}
