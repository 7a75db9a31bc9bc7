//! # Workspace State
//!
//! The durable side of the system, kept in memory: accounts, bearer tokens,
//! spaces, memberships and blocks. Every operation takes the acting user and
//! enforces membership and the role table before touching anything.
//!
//! ## Ordering rules
//!
//! - Create without an explicit order appends (`max + 1`, or 0)
//! - Delete re-sequences the remaining blocks of the space to `0..n`
//! - `refresh_order` re-sequences by the current `(order, id)`
//! - Listing is always sorted by `(order, id)`

use blockspace_common::{
    has_permission, Block, BlockId, BlockPatch, BlockType, Member, NewBlock, Permission, Role,
    Space, SpaceId, Token, User, UserId,
};
use blockspace_editor::{GatewayError, GatewayResult};
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// How long a bearer token stays valid
pub const TOKEN_TTL_HOURS: i64 = 24;

struct Account {
    user: User,
    salt: String,
    digest: String,
}

struct Grant {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct WorkspaceState {
    accounts: HashMap<UserId, Account>,
    grants: HashMap<String, Grant>,
    spaces: HashMap<SpaceId, Space>,
    members: Vec<Member>,
    blocks: Vec<Block>,

    next_user: UserId,
    next_space: SpaceId,
    next_block: BlockId,
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn resequence(blocks: &mut [Block], space_id: SpaceId) {
    let mut ids: Vec<(i64, BlockId)> = blocks
        .iter()
        .filter(|b| b.space_id == space_id)
        .map(|b| (b.order, b.id))
        .collect();
    ids.sort();

    for (index, (_, id)) in ids.into_iter().enumerate() {
        if let Some(block) = blocks.iter_mut().find(|b| b.id == id) {
            block.order = index as i64;
        }
    }
}

impl WorkspaceState {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- credentials ----

    pub fn register(&mut self, username: &str, email: &str, password: &str) -> GatewayResult<User> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err(GatewayError::Rejected("username, email and password are required".into()));
        }
        if self.accounts.values().any(|a| a.user.email.eq_ignore_ascii_case(email)) {
            return Err(GatewayError::Rejected(format!("email already registered: {}", email)));
        }

        self.next_user += 1;
        let user = User {
            id: self.next_user,
            username: username.to_string(),
            email: email.to_string(),
        };
        let salt = uuid::Uuid::new_v4().simple().to_string();
        let digest = password_digest(&salt, password);

        self.accounts.insert(
            user.id,
            Account {
                user: user.clone(),
                salt,
                digest,
            },
        );
        tracing::info!(user_id = user.id, "account registered");
        Ok(user)
    }

    pub fn login(&mut self, email: &str, password: &str) -> GatewayResult<Token> {
        let user_id = self
            .accounts
            .values()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
            .filter(|a| password_digest(&a.salt, password) == a.digest)
            .map(|a| a.user.id)
            .ok_or(GatewayError::Unauthorized)?;

        Ok(self.issue(user_id))
    }

    /// Trade a valid token for a fresh one; the old one stops working
    pub fn refresh(&mut self, token: &str) -> GatewayResult<Token> {
        let user_id = self.authenticate(token)?;
        self.grants.remove(token);
        Ok(self.issue(user_id))
    }

    pub fn authenticate(&self, token: &str) -> GatewayResult<UserId> {
        match self.grants.get(token) {
            Some(grant) if grant.expires_at > Utc::now() => Ok(grant.user_id),
            _ => Err(GatewayError::Unauthorized),
        }
    }

    pub fn user(&self, user_id: UserId) -> GatewayResult<User> {
        self.accounts
            .get(&user_id)
            .map(|a| a.user.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("user {}", user_id)))
    }

    fn issue(&mut self, user_id: UserId) -> Token {
        let access_token = uuid::Uuid::new_v4().to_string();
        self.grants.insert(
            access_token.clone(),
            Grant {
                user_id,
                expires_at: Utc::now() + Duration::hours(TOKEN_TTL_HOURS),
            },
        );
        Token {
            access_token,
            token_type: "bearer".to_string(),
        }
    }

    // ---- spaces and membership ----

    pub fn membership(&self, space_id: SpaceId, user_id: UserId) -> Option<&Member> {
        self.members
            .iter()
            .find(|m| m.space_id == space_id && m.user_id == user_id)
    }

    /// Membership of `actor` in `space_id` if it grants `permission`
    fn require(&self, actor: UserId, space_id: SpaceId, permission: Permission) -> GatewayResult<&Member> {
        if !self.spaces.contains_key(&space_id) {
            return Err(GatewayError::NotFound(format!("space {}", space_id)));
        }
        let member = self
            .membership(space_id, actor)
            .ok_or_else(|| GatewayError::Forbidden(format!("not a member of space {}", space_id)))?;

        if has_permission(member.role, permission, member.is_creator) {
            Ok(member)
        } else {
            Err(GatewayError::Forbidden(format!("{:?} requires {:?}", member.role, permission)))
        }
    }

    /// New space with the creator as admin and one empty TEXT block
    pub fn create_space(&mut self, actor: UserId, name: &str, description: Option<&str>) -> GatewayResult<Space> {
        let user = self.user(actor)?;

        self.next_space += 1;
        let space = Space {
            id: self.next_space,
            name: name.to_string(),
            description: description.map(str::to_string),
            owner_id: actor,
        };
        self.spaces.insert(space.id, space.clone());
        self.members.push(Member {
            space_id: space.id,
            user_id: actor,
            username: user.username,
            role: Role::Admin,
            is_creator: true,
        });

        self.next_block += 1;
        self.blocks
            .push(Block::new(self.next_block, space.id, BlockType::Text, "", 0));

        tracing::info!(space_id = space.id, owner = actor, "space created");
        Ok(space)
    }

    pub fn list_spaces(&self, actor: UserId) -> Vec<Space> {
        let mut spaces: Vec<Space> = self
            .members
            .iter()
            .filter(|m| m.user_id == actor)
            .filter_map(|m| self.spaces.get(&m.space_id).cloned())
            .collect();
        spaces.sort_by_key(|s| s.id);
        spaces
    }

    pub fn get_space(&self, actor: UserId, space_id: SpaceId) -> GatewayResult<Space> {
        self.require(actor, space_id, Permission::ViewSpace)?;
        self.spaces
            .get(&space_id)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(format!("space {}", space_id)))
    }

    pub fn update_space(
        &mut self,
        actor: UserId,
        space_id: SpaceId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> GatewayResult<Space> {
        self.require(actor, space_id, Permission::EditSpaceSettings)?;
        let space = self
            .spaces
            .get_mut(&space_id)
            .ok_or_else(|| GatewayError::NotFound(format!("space {}", space_id)))?;

        if let Some(name) = name {
            space.name = name.to_string();
        }
        if let Some(description) = description {
            space.description = Some(description.to_string());
        }
        Ok(space.clone())
    }

    pub fn delete_space(&mut self, actor: UserId, space_id: SpaceId) -> GatewayResult<()> {
        self.require(actor, space_id, Permission::DeleteSpace)?;

        self.spaces.remove(&space_id);
        self.members.retain(|m| m.space_id != space_id);
        self.blocks.retain(|b| b.space_id != space_id);
        tracing::info!(space_id, "space deleted");
        Ok(())
    }

    pub fn invite_member(&mut self, actor: UserId, space_id: SpaceId, email: &str, role: Role) -> GatewayResult<Member> {
        self.require(actor, space_id, Permission::ManageMembers)?;

        let user = self
            .accounts
            .values()
            .find(|a| a.user.email.eq_ignore_ascii_case(email))
            .map(|a| a.user.clone())
            .ok_or_else(|| GatewayError::NotFound(format!("user {}", email)))?;
        if self.membership(space_id, user.id).is_some() {
            return Err(GatewayError::Rejected(format!("{} is already a member", email)));
        }

        let member = Member {
            space_id,
            user_id: user.id,
            username: user.username,
            role,
            is_creator: false,
        };
        self.members.push(member.clone());
        Ok(member)
    }

    pub fn list_members(&self, actor: UserId, space_id: SpaceId) -> GatewayResult<Vec<Member>> {
        self.require(actor, space_id, Permission::ViewSpace)?;
        Ok(self
            .members
            .iter()
            .filter(|m| m.space_id == space_id)
            .cloned()
            .collect())
    }

    pub fn remove_member(&mut self, actor: UserId, space_id: SpaceId, user_id: UserId) -> GatewayResult<()> {
        self.require(actor, space_id, Permission::ManageMembers)?;
        match self.membership(space_id, user_id) {
            None => return Err(GatewayError::NotFound(format!("member {}", user_id))),
            Some(m) if m.is_creator => {
                return Err(GatewayError::Rejected("the creator cannot be removed".into()))
            }
            Some(_) => {}
        }

        self.members
            .retain(|m| !(m.space_id == space_id && m.user_id == user_id));
        Ok(())
    }

    pub fn change_role(&mut self, actor: UserId, space_id: SpaceId, user_id: UserId, role: Role) -> GatewayResult<Member> {
        self.require(actor, space_id, Permission::ManageMembers)?;
        let member = self
            .members
            .iter_mut()
            .find(|m| m.space_id == space_id && m.user_id == user_id)
            .ok_or_else(|| GatewayError::NotFound(format!("member {}", user_id)))?;

        if member.is_creator {
            return Err(GatewayError::Rejected("the creator's role is fixed".into()));
        }
        member.role = role;
        Ok(member.clone())
    }

    // ---- blocks ----

    fn space_of(&self, block_id: BlockId) -> GatewayResult<SpaceId> {
        self.blocks
            .iter()
            .find(|b| b.id == block_id)
            .map(|b| b.space_id)
            .ok_or_else(|| GatewayError::NotFound(format!("block {}", block_id)))
    }

    pub fn list_blocks(&self, actor: UserId, space_id: SpaceId) -> GatewayResult<Vec<Block>> {
        self.require(actor, space_id, Permission::ViewBlocks)?;

        let mut blocks: Vec<Block> = self
            .blocks
            .iter()
            .filter(|b| b.space_id == space_id)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| (b.order, b.id));
        Ok(blocks)
    }

    pub fn create_block(&mut self, actor: UserId, request: NewBlock) -> GatewayResult<Block> {
        self.require(actor, request.space_id, Permission::CreateBlocks)?;

        let order = match request.order {
            Some(order) => order,
            None => self
                .blocks
                .iter()
                .filter(|b| b.space_id == request.space_id)
                .map(|b| b.order + 1)
                .max()
                .unwrap_or(0),
        };

        self.next_block += 1;
        let block = Block::new(self.next_block, request.space_id, request.block_type, request.content, order);
        self.blocks.push(block.clone());

        tracing::debug!(block_id = block.id, space_id = block.space_id, order, "block created");
        Ok(block)
    }

    pub fn update_block(&mut self, actor: UserId, block_id: BlockId, patch: &BlockPatch) -> GatewayResult<Block> {
        let space_id = self.space_of(block_id)?;
        let order_only = patch.order.is_some() && BlockPatch { order: None, ..patch.clone() }.is_empty();
        let permission = if order_only {
            Permission::ReorderBlocks
        } else {
            Permission::EditBlocks
        };
        self.require(actor, space_id, permission)?;

        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.id == block_id)
            .ok_or_else(|| GatewayError::NotFound(format!("block {}", block_id)))?;
        patch.apply_to(block);
        Ok(block.clone())
    }

    pub fn delete_block(&mut self, actor: UserId, block_id: BlockId) -> GatewayResult<()> {
        let space_id = self.space_of(block_id)?;
        self.require(actor, space_id, Permission::DeleteBlocks)?;

        if self.blocks.iter().filter(|b| b.space_id == space_id).count() == 1 {
            return Err(GatewayError::Rejected("a space keeps at least one block".into()));
        }

        self.blocks.retain(|b| b.id != block_id);
        resequence(&mut self.blocks, space_id);
        tracing::debug!(block_id, space_id, "block deleted");
        Ok(())
    }

    pub fn refresh_order(&mut self, actor: UserId, space_id: SpaceId) -> GatewayResult<()> {
        self.require(actor, space_id, Permission::ReorderBlocks)?;
        resequence(&mut self.blocks, space_id);
        Ok(())
    }
}
