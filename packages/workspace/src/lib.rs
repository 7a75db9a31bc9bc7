//! # Blockspace Workspace
//!
//! In-memory reference backend: accounts, spaces, membership, blocks with
//! server-side ordering, and a realtime hub relaying peer notifications.
//!
//! ```rust,ignore
//! let server = WorkspaceServer::new();
//! let ada = server.sign_up("ada", "ada@example.com", "secret")?;
//! let space = ada.client.create_space("notes", None).await?;
//!
//! let gateway = Arc::new(ada.client.clone());
//! let session = EditSession::open(space.id, ada.credentials(), gateway.clone(), gateway, config).await?;
//! ```

mod client;
mod hub;
mod server;
mod state;

pub use client::WorkspaceClient;
pub use hub::{ConnectionId, Hub, HubSink};
pub use server::{SignedIn, WorkspaceServer};
pub use state::{WorkspaceState, TOKEN_TTL_HOURS};
