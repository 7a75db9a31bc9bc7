//! Gateway adapter over the in-memory workspace.
//!
//! A [`WorkspaceClient`] carries one bearer token and implements every
//! contract the editor consumes, so an `EditSession` can run against the
//! reference backend exactly as it would against a remote one.

use crate::hub::Hub;
use crate::state::WorkspaceState;
use async_trait::async_trait;
use blockspace_common::{
    Block, BlockId, BlockPatch, Member, NewBlock, Role, Space, SpaceId, Token, User, UserId,
};
use blockspace_editor::{
    AuthGateway, ChannelConnector, GatewayError, GatewayResult, PersistenceGateway,
    RealtimeChannel, SpaceGateway,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Clone)]
pub struct WorkspaceClient {
    state: Arc<Mutex<WorkspaceState>>,
    hub: Arc<Hub>,
    token: Option<String>,
}

impl WorkspaceClient {
    pub(crate) fn new(state: Arc<Mutex<WorkspaceState>>, hub: Arc<Hub>, token: Option<String>) -> Self {
        Self { state, hub, token }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Same backend, different credential
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self::new(self.state.clone(), self.hub.clone(), Some(token.into()))
    }

    fn lock(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` as the user behind this client's token
    fn as_actor<T>(&self, f: impl FnOnce(&mut WorkspaceState, UserId) -> GatewayResult<T>) -> GatewayResult<T> {
        let token = self.token.as_deref().ok_or(GatewayError::Unauthorized)?;
        let mut state = self.lock();
        let actor = state.authenticate(token)?;
        f(&mut state, actor)
    }
}

#[async_trait]
impl PersistenceGateway for WorkspaceClient {
    async fn list_blocks(&self, space_id: SpaceId) -> GatewayResult<Vec<Block>> {
        self.as_actor(|state, actor| state.list_blocks(actor, space_id))
    }

    async fn create_block(&self, block: NewBlock) -> GatewayResult<Block> {
        self.as_actor(|state, actor| state.create_block(actor, block))
    }

    async fn update_block(&self, id: BlockId, patch: BlockPatch) -> GatewayResult<Block> {
        self.as_actor(|state, actor| state.update_block(actor, id, &patch))
    }

    async fn delete_block(&self, id: BlockId) -> GatewayResult<()> {
        self.as_actor(|state, actor| state.delete_block(actor, id))
    }

    async fn refresh_order(&self, space_id: SpaceId) -> GatewayResult<()> {
        self.as_actor(|state, actor| state.refresh_order(actor, space_id))
    }
}

#[async_trait]
impl SpaceGateway for WorkspaceClient {
    async fn create_space(&self, name: &str, description: Option<&str>) -> GatewayResult<Space> {
        self.as_actor(|state, actor| state.create_space(actor, name, description))
    }

    async fn list_spaces(&self) -> GatewayResult<Vec<Space>> {
        self.as_actor(|state, actor| Ok(state.list_spaces(actor)))
    }

    async fn get_space(&self, id: SpaceId) -> GatewayResult<Space> {
        self.as_actor(|state, actor| state.get_space(actor, id))
    }

    async fn update_space(&self, id: SpaceId, name: Option<&str>, description: Option<&str>) -> GatewayResult<Space> {
        self.as_actor(|state, actor| state.update_space(actor, id, name, description))
    }

    async fn delete_space(&self, id: SpaceId) -> GatewayResult<()> {
        self.as_actor(|state, actor| state.delete_space(actor, id))
    }

    async fn invite_member(&self, space_id: SpaceId, email: &str, role: Role) -> GatewayResult<Member> {
        self.as_actor(|state, actor| state.invite_member(actor, space_id, email, role))
    }

    async fn list_members(&self, space_id: SpaceId) -> GatewayResult<Vec<Member>> {
        self.as_actor(|state, actor| state.list_members(actor, space_id))
    }

    async fn remove_member(&self, space_id: SpaceId, user_id: UserId) -> GatewayResult<()> {
        self.as_actor(|state, actor| state.remove_member(actor, space_id, user_id))?;
        self.hub.membership_changed(space_id, user_id, None);
        Ok(())
    }

    async fn change_role(&self, space_id: SpaceId, user_id: UserId, role: Role) -> GatewayResult<Member> {
        let member = self.as_actor(|state, actor| state.change_role(actor, space_id, user_id, role))?;
        self.hub.membership_changed(space_id, user_id, Some(member.role));
        Ok(member)
    }
}

#[async_trait]
impl AuthGateway for WorkspaceClient {
    async fn register(&self, username: &str, email: &str, password: &str) -> GatewayResult<User> {
        self.lock().register(username, email, password)
    }

    async fn login(&self, email: &str, password: &str) -> GatewayResult<Token> {
        self.lock().login(email, password)
    }

    async fn refresh(&self, token: &str) -> GatewayResult<Token> {
        self.lock().refresh(token)
    }

    async fn current_user(&self, token: &str) -> GatewayResult<User> {
        let state = self.lock();
        let user_id = state.authenticate(token)?;
        state.user(user_id)
    }
}

#[async_trait]
impl ChannelConnector for WorkspaceClient {
    async fn connect(&self, space_id: SpaceId, token: &str) -> GatewayResult<RealtimeChannel> {
        let (user, role) = {
            let state = self.lock();
            let user_id = state.authenticate(token)?;
            let member = state
                .membership(space_id, user_id)
                .ok_or_else(|| GatewayError::Forbidden(format!("not a member of space {}", space_id)))?;
            (state.user(user_id)?, member.role)
        };

        Ok(self.hub.connect(space_id, &user, role))
    }
}
