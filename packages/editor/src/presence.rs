//! Roster of remote collaborators in the open space.
//!
//! Fed by presence messages only; never touches blocks.

use blockspace_common::{BlockId, Role, ServerMessage, UserId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub user_id: UserId,
    pub username: String,
    /// Last reported caret: block and char offset
    pub cursor: Option<(BlockId, usize)>,
    /// Block the collaborator is typing in
    pub typing: Option<BlockId>,
    pub selection: Option<BlockId>,
}

impl Collaborator {
    fn new(user_id: UserId, username: impl Into<String>) -> Self {
        Self {
            user_id,
            username: username.into(),
            cursor: None,
            typing: None,
            selection: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Presence {
    local_user: UserId,
    peers: BTreeMap<UserId, Collaborator>,
    /// Role granted to the local user by the server
    role: Option<Role>,
}

impl Presence {
    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            peers: BTreeMap::new(),
            role: None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn collaborators(&self) -> impl Iterator<Item = &Collaborator> {
        self.peers.values()
    }

    pub fn get(&self, user_id: UserId) -> Option<&Collaborator> {
        self.peers.get(&user_id)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Collaborators currently typing in `block_id`
    pub fn typing_in(&self, block_id: BlockId) -> Vec<&Collaborator> {
        self.peers
            .values()
            .filter(|c| c.typing == Some(block_id))
            .collect()
    }

    pub fn clear(&mut self) {
        self.peers.clear();
        self.role = None;
    }

    /// Fold a message into the roster. Returns false for non-presence messages.
    pub fn apply(&mut self, message: &ServerMessage) -> bool {
        match message {
            ServerMessage::ConnectionEstablished {
                user_id,
                role,
                active_users,
                ..
            } => {
                if *user_id == self.local_user {
                    self.role = Some(*role);
                }
                self.peers.clear();
                for user in active_users {
                    self.join(user.user_id, &user.username);
                }
            }
            ServerMessage::UserJoined { user_id, username } => self.join(*user_id, username),
            ServerMessage::UserLeft { user_id, .. } => {
                self.peers.remove(user_id);
            }
            ServerMessage::CursorPosition {
                block_id,
                position,
                user_id,
                username,
            } => {
                if let Some(peer) = self.peer_mut(*user_id, username) {
                    peer.cursor = Some((*block_id, *position));
                }
            }
            ServerMessage::UserTyping {
                block_id,
                is_typing,
                user_id,
                username,
            } => {
                if let Some(peer) = self.peer_mut(*user_id, username) {
                    if *is_typing {
                        peer.typing = Some(*block_id);
                    } else if peer.typing == Some(*block_id) {
                        peer.typing = None;
                    }
                }
            }
            ServerMessage::BlockSelection {
                block_id,
                user_id,
                username,
            } => {
                if let Some(peer) = self.peer_mut(*user_id, username) {
                    peer.selection = Some(*block_id);
                }
            }
            _ => return false,
        }
        true
    }

    fn join(&mut self, user_id: UserId, username: &str) {
        if user_id == self.local_user {
            return;
        }
        self.peers
            .entry(user_id)
            .or_insert_with(|| Collaborator::new(user_id, username));
    }

    /// Roster entry for a peer, created on first sight
    fn peer_mut(&mut self, user_id: UserId, username: &str) -> Option<&mut Collaborator> {
        if user_id == self.local_user {
            return None;
        }
        Some(
            self.peers
                .entry(user_id)
                .or_insert_with(|| Collaborator::new(user_id, username)),
        )
    }
}
