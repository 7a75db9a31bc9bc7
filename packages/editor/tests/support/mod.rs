//! Scriptable gateway and channel doubles for session tests

#![allow(dead_code)]

use async_trait::async_trait;
use blockspace_editor::{
    Block, BlockId, BlockPatch, BlockType, ChannelConnector, ClientMessage, Credentials,
    EditSession, EditorConfig, GatewayError, GatewayResult, NewBlock, PersistenceGateway,
    RealtimeChannel, Role, ServerMessage, SpaceId,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const ME: i64 = 1;
pub const PEER: i64 = 2;

#[derive(Default)]
struct GatewayState {
    blocks: Vec<Block>,
    next_id: BlockId,
    calls: Vec<String>,
    fail_updates: bool,
    fail_deletes: bool,
    fail_creates: bool,
    latency: Option<Duration>,
}

#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<GatewayState>,
}

impl FakeGateway {
    pub fn new(blocks: Vec<Block>) -> Arc<Self> {
        let next_id = blocks.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        Arc::new(Self {
            state: Mutex::new(GatewayState {
                blocks,
                next_id,
                ..GatewayState::default()
            }),
        })
    }

    pub fn fail_updates(&self, fail: bool) {
        self.state.lock().unwrap().fail_updates = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }

    pub fn fail_creates(&self, fail: bool) {
        self.state.lock().unwrap().fail_creates = fail;
    }

    pub fn set_latency(&self, latency: Duration) {
        self.state.lock().unwrap().latency = Some(latency);
    }

    /// Overwrite server-side state behind the session's back
    pub fn set_blocks(&self, blocks: Vec<Block>) {
        self.state.lock().unwrap().blocks = blocks;
    }

    pub fn blocks(&self, space_id: SpaceId) -> Vec<Block> {
        let mut blocks: Vec<Block> = self
            .state
            .lock()
            .unwrap()
            .blocks
            .iter()
            .filter(|b| b.space_id == space_id)
            .cloned()
            .collect();
        blocks.sort_by_key(|b| (b.order, b.id));
        blocks
    }

    pub fn block(&self, id: BlockId) -> Option<Block> {
        self.state.lock().unwrap().blocks.iter().find(|b| b.id == id).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    async fn delay(&self) {
        let latency = self.state.lock().unwrap().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn injected() -> GatewayError {
    GatewayError::Transport("injected failure".to_string())
}

#[async_trait]
impl PersistenceGateway for FakeGateway {
    async fn list_blocks(&self, space_id: SpaceId) -> GatewayResult<Vec<Block>> {
        self.delay().await;
        self.state.lock().unwrap().calls.push(format!("list {}", space_id));
        Ok(self.blocks(space_id))
    }

    async fn create_block(&self, request: NewBlock) -> GatewayResult<Block> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", request.space_id));
        if state.fail_creates {
            return Err(injected());
        }

        let order = request.order.unwrap_or_else(|| {
            state
                .blocks
                .iter()
                .filter(|b| b.space_id == request.space_id)
                .map(|b| b.order + 1)
                .max()
                .unwrap_or(0)
        });
        let block = Block::new(state.next_id, request.space_id, request.block_type, request.content, order);
        state.next_id += 1;
        state.blocks.push(block.clone());
        Ok(block)
    }

    async fn update_block(&self, id: BlockId, patch: BlockPatch) -> GatewayResult<Block> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("update {}", id));
        if state.fail_updates {
            return Err(injected());
        }

        let block = state
            .blocks
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| GatewayError::NotFound(format!("block {}", id)))?;
        patch.apply_to(block);
        Ok(block.clone())
    }

    async fn delete_block(&self, id: BlockId) -> GatewayResult<()> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("delete {}", id));
        if state.fail_deletes {
            return Err(injected());
        }

        let before = state.blocks.len();
        state.blocks.retain(|b| b.id != id);
        if state.blocks.len() == before {
            return Err(GatewayError::NotFound(format!("block {}", id)));
        }
        Ok(())
    }

    async fn refresh_order(&self, space_id: SpaceId) -> GatewayResult<()> {
        self.delay().await;
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("refresh {}", space_id));

        let mut ids: Vec<(i64, BlockId)> = state
            .blocks
            .iter()
            .filter(|b| b.space_id == space_id)
            .map(|b| (b.order, b.id))
            .collect();
        ids.sort();
        for (index, (_, id)) in ids.into_iter().enumerate() {
            if let Some(block) = state.blocks.iter_mut().find(|b| b.id == id) {
                block.order = index as i64;
            }
        }
        Ok(())
    }
}

struct Connection {
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<String>,
}

/// Hands out queue-backed channels and keeps their far ends
#[derive(Default)]
pub struct FakeConnector {
    role: Option<Role>,
    connections: Mutex<Vec<Connection>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Connector that greets every connection with `connection_established`
    pub fn with_role(role: Role) -> Arc<Self> {
        Arc::new(Self {
            role: Some(role),
            connections: Mutex::new(Vec::new()),
        })
    }

    /// Deliver a frame to the most recent connection
    pub fn push(&self, message: &ServerMessage) {
        self.push_raw(&message.encode().unwrap());
    }

    pub fn push_raw(&self, frame: &str) {
        let connections = self.connections.lock().unwrap();
        let connection = connections.last().expect("no connection");
        connection.inbound.send(frame.to_string()).unwrap();
    }

    /// Drain every frame the sessions sent so far
    pub fn sent(&self) -> Vec<ClientMessage> {
        let mut connections = self.connections.lock().unwrap();
        let mut sent = Vec::new();
        for connection in connections.iter_mut() {
            while let Ok(frame) = connection.outbound.try_recv() {
                sent.push(ClientMessage::decode(&frame).unwrap());
            }
        }
        sent
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }
}

#[async_trait]
impl ChannelConnector for FakeConnector {
    async fn connect(&self, space_id: SpaceId, _token: &str) -> GatewayResult<RealtimeChannel> {
        let (channel, outbound, inbound) = RealtimeChannel::pair(space_id);

        if let Some(role) = self.role {
            let hello = ServerMessage::ConnectionEstablished {
                space_id,
                user_id: ME,
                role,
                active_users: vec![],
            };
            let _ = inbound.send(hello.encode().unwrap());
        }

        self.connections
            .lock()
            .unwrap()
            .push(Connection { outbound, inbound });
        Ok(channel)
    }
}

pub fn credentials() -> Credentials {
    Credentials {
        user_id: ME,
        username: "me".to_string(),
        token: "token".to_string(),
    }
}

pub fn text(id: BlockId, order: i64, content: &str) -> Block {
    Block::new(id, 1, BlockType::Text, content, order)
}

pub fn typed(id: BlockId, order: i64, block_type: BlockType, content: &str) -> Block {
    Block::new(id, 1, block_type, content, order)
}

pub struct Harness {
    pub session: EditSession,
    pub gateway: Arc<FakeGateway>,
    pub connector: Arc<FakeConnector>,
}

pub async fn open(blocks: Vec<Block>) -> Harness {
    open_with(blocks, FakeConnector::new(), EditorConfig::default()).await
}

pub async fn open_with(blocks: Vec<Block>, connector: Arc<FakeConnector>, config: EditorConfig) -> Harness {
    let gateway = FakeGateway::new(blocks);
    let session = EditSession::open(1, credentials(), gateway.clone(), connector.clone(), config)
        .await
        .unwrap();

    Harness {
        session,
        gateway,
        connector,
    }
}

pub fn contents(session: &EditSession) -> Vec<String> {
    session.blocks().iter().map(|b| b.content.clone()).collect()
}
