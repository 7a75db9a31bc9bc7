use crate::client::WorkspaceClient;
use crate::hub::Hub;
use crate::state::WorkspaceState;
use blockspace_common::User;
use blockspace_editor::{Credentials, GatewayResult};
use std::sync::{Arc, Mutex, PoisonError};

/// One in-memory backend: shared state plus its realtime hub
#[derive(Clone, Default)]
pub struct WorkspaceServer {
    state: Arc<Mutex<WorkspaceState>>,
    hub: Arc<Hub>,
}

impl WorkspaceServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Client without a credential, for register/login
    pub fn guest(&self) -> WorkspaceClient {
        WorkspaceClient::new(self.state.clone(), self.hub.clone(), None)
    }

    pub fn client(&self, token: impl Into<String>) -> WorkspaceClient {
        WorkspaceClient::new(self.state.clone(), self.hub.clone(), Some(token.into()))
    }

    /// Register an account and log it in
    pub fn sign_up(&self, username: &str, email: &str, password: &str) -> GatewayResult<SignedIn> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let user = state.register(username, email, password)?;
        let token = state.login(email, password)?;
        drop(state);

        Ok(SignedIn {
            client: self.client(token.access_token),
            user,
        })
    }
}

/// A registered user with an authenticated client
#[derive(Clone)]
pub struct SignedIn {
    pub user: User,
    pub client: WorkspaceClient,
}

impl SignedIn {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            user_id: self.user.id,
            username: self.user.username.clone(),
            token: self.client.token().unwrap_or_default().to_string(),
        }
    }
}
