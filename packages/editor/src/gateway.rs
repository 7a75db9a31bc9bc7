//! # Persistence Gateway
//!
//! Contracts for the remote durable store. The editor only depends on these
//! traits; transports (HTTP, in-memory) live outside the core. The bearer
//! credential is attached by the implementation, and refreshing an expired
//! credential is the implementation's job too.

use async_trait::async_trait;
use blockspace_common::{
    Block, BlockId, BlockPatch, Member, NewBlock, Role, Space, SpaceId, Token, User, UserId,
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Transport failure: {0}")]
    Transport(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Block endpoints
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Blocks of a space in display order
    async fn list_blocks(&self, space_id: SpaceId) -> GatewayResult<Vec<Block>>;

    /// Create a block; the gateway assigns the id
    async fn create_block(&self, block: NewBlock) -> GatewayResult<Block>;

    async fn update_block(&self, id: BlockId, patch: BlockPatch) -> GatewayResult<Block>;

    async fn delete_block(&self, id: BlockId) -> GatewayResult<()>;

    /// Ask the server to recompute dense ordering for a space
    async fn refresh_order(&self, space_id: SpaceId) -> GatewayResult<()>;
}

/// Space and membership endpoints
#[async_trait]
pub trait SpaceGateway: Send + Sync {
    async fn create_space(&self, name: &str, description: Option<&str>) -> GatewayResult<Space>;

    async fn list_spaces(&self) -> GatewayResult<Vec<Space>>;

    async fn get_space(&self, id: SpaceId) -> GatewayResult<Space>;

    async fn update_space(&self, id: SpaceId, name: Option<&str>, description: Option<&str>) -> GatewayResult<Space>;

    async fn delete_space(&self, id: SpaceId) -> GatewayResult<()>;

    async fn invite_member(&self, space_id: SpaceId, email: &str, role: Role) -> GatewayResult<Member>;

    async fn list_members(&self, space_id: SpaceId) -> GatewayResult<Vec<Member>>;

    async fn remove_member(&self, space_id: SpaceId, user_id: UserId) -> GatewayResult<()>;

    async fn change_role(&self, space_id: SpaceId, user_id: UserId, role: Role) -> GatewayResult<Member>;
}

/// Credential endpoints
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn register(&self, username: &str, email: &str, password: &str) -> GatewayResult<User>;

    async fn login(&self, email: &str, password: &str) -> GatewayResult<Token>;

    async fn refresh(&self, token: &str) -> GatewayResult<Token>;

    async fn current_user(&self, token: &str) -> GatewayResult<User>;
}
