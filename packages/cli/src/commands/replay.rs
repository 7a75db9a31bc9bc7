use crate::config;
use anyhow::{anyhow, bail, Context, Result};
use blockspace_common::{Block, BlockId, BlockType, Role, SpaceId, StyleFlag, TextSize};
use blockspace_editor::{
    DropPosition, EditSession, EditorConfig, SpaceGateway, TextSurface,
};
use blockspace_workspace::{SignedIn, WorkspaceServer};
use clap::Args;
use colored::Colorize;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON script describing users and steps
    pub script: PathBuf,

    /// Editor config file (defaults to blockspace.config.json in the cwd)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Script file format
#[derive(Debug, Deserialize)]
pub struct Script {
    #[serde(default = "default_space")]
    pub space: String,
    pub users: Vec<ScriptUser>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

fn default_space() -> String {
    "replay".to_string()
}

/// A bare name joins as participant; the first user creates the space
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ScriptUser {
    Name(String),
    Member {
        name: String,
        #[serde(default)]
        role: Role,
    },
}

impl ScriptUser {
    fn name(&self) -> &str {
        match self {
            ScriptUser::Name(name) | ScriptUser::Member { name, .. } => name,
        }
    }

    fn role(&self) -> Role {
        match self {
            ScriptUser::Name(_) => Role::Participant,
            ScriptUser::Member { role, .. } => *role,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Step {
    pub actor: String,
    #[serde(flatten)]
    pub op: Op,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Above,
    Below,
}

/// Blocks are addressed by index in the actor's current view
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Op {
    Append,
    Edit {
        block: usize,
        content: String,
    },
    Enter {
        block: usize,
        #[serde(default)]
        caret: Option<usize>,
    },
    Split {
        block: usize,
        #[serde(default)]
        caret: Option<usize>,
    },
    Backspace {
        block: usize,
        #[serde(default)]
        caret: Option<usize>,
    },
    Retype {
        block: usize,
        #[serde(rename = "type")]
        block_type: BlockType,
    },
    Style {
        block: usize,
        flag: StyleFlag,
    },
    Size {
        block: usize,
        size: TextSize,
    },
    /// Toolbar list button
    List {
        block: usize,
        #[serde(rename = "type")]
        list: BlockType,
    },
    Delete {
        block: usize,
    },
    Drag {
        block: usize,
        target: usize,
        position: Position,
    },
}

struct Participant {
    name: String,
    session: EditSession,
}

pub fn replay(args: ReplayArgs, cwd: &Path) -> Result<()> {
    let source = std::fs::read_to_string(&args.script)
        .with_context(|| format!("Failed to read {}", args.script.display()))?;
    let script: Script = serde_json::from_str(&source)
        .with_context(|| format!("Invalid script {}", args.script.display()))?;
    let config = config::resolve(args.config.as_deref(), cwd)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start runtime")?;

    let participants = runtime.block_on(run(&script, config))?;
    print_documents(&participants);
    Ok(())
}

async fn run(script: &Script, config: EditorConfig) -> Result<Vec<Participant>> {
    if script.users.is_empty() {
        bail!("script needs at least one user");
    }

    let server = WorkspaceServer::new();
    let mut accounts: Vec<SignedIn> = Vec::new();
    for user in &script.users {
        let email = format!("{}@blockspace.local", user.name());
        let account = server
            .sign_up(user.name(), &email, "replay")
            .with_context(|| format!("Failed to register {}", user.name()))?;
        accounts.push(account);
    }

    let owner = &accounts[0];
    let space = owner.client.create_space(&script.space, None).await?;
    for user in script.users.iter().skip(1) {
        let email = format!("{}@blockspace.local", user.name());
        owner
            .client
            .invite_member(space.id, &email, user.role())
            .await?;
    }

    let mut participants = Vec::new();
    for account in &accounts {
        participants.push(Participant {
            name: account.user.username.clone(),
            session: open(account, space.id, config.clone()).await?,
        });
    }

    for (index, step) in script.steps.iter().enumerate() {
        let actor = participants
            .iter()
            .position(|p| p.name == step.actor)
            .ok_or_else(|| anyhow!("step {}: unknown actor {}", index + 1, step.actor))?;

        if let Err(err) = perform(&mut participants[actor].session, &step.op).await {
            println!(
                "{} step {} ({}): {:#}",
                "✗".red(),
                index + 1,
                step.actor,
                err
            );
        }
        settle_all(&mut participants).await;
    }

    Ok(participants)
}

async fn open(account: &SignedIn, space_id: SpaceId, config: EditorConfig) -> Result<EditSession> {
    let gateway = Arc::new(account.client.clone());
    let session = EditSession::open(space_id, account.credentials(), gateway.clone(), gateway, config)
        .await
        .with_context(|| format!("{} could not open the space", account.user.username))?;
    Ok(session)
}

fn block_at(session: &EditSession, index: usize) -> Result<Block> {
    session
        .blocks()
        .get(index)
        .cloned()
        .ok_or_else(|| anyhow!("no block at index {}", index))
}

fn surface(block: &Block, caret: Option<usize>) -> TextSurface {
    match caret {
        Some(caret) => TextSurface::new(block.content.clone()).with_caret(caret),
        None => TextSurface::at_end(block.content.clone()),
    }
}

async fn perform(session: &mut EditSession, op: &Op) -> Result<()> {
    match op {
        Op::Append => {
            session.append_block().await?;
        }
        Op::Edit { block, content } => {
            let id = block_at(session, *block)?.id;
            session.edit_content(id, content.clone())?;
        }
        Op::Enter { block, caret } => {
            let block = block_at(session, *block)?;
            session.press_enter(block.id, &mut surface(&block, *caret))?;
        }
        Op::Split { block, caret } => {
            let block = block_at(session, *block)?;
            session.split_block(block.id, &mut surface(&block, *caret)).await?;
        }
        Op::Backspace { block, caret } => {
            let block = block_at(session, *block)?;
            session.press_backspace(block.id, &mut surface(&block, *caret))?;
        }
        Op::Retype { block, block_type } => {
            let id = block_at(session, *block)?.id;
            session.change_type(id, *block_type)?;
        }
        Op::Style { block, flag } => {
            let id = block_at(session, *block)?.id;
            session.toggle_style(id, *flag)?;
        }
        Op::Size { block, size } => {
            let id = block_at(session, *block)?.id;
            session.set_size(id, *size)?;
        }
        Op::List { block, list } => {
            let id = block_at(session, *block)?.id;
            session.toggle_list(id, *list)?;
        }
        Op::Delete { block } => {
            let id = block_at(session, *block)?.id;
            session.delete_block(id)?;
        }
        Op::Drag {
            block,
            target,
            position,
        } => {
            let dragged = block_at(session, *block)?.id;
            let target = block_at(session, *target)?.id;
            let position = match position {
                Position::Above => DropPosition::Above,
                Position::Below => DropPosition::Below,
            };
            session.drop_block(dragged, target, position)?;
        }
    }
    Ok(())
}

/// Commit pending keystrokes, then let every session drain its traffic
async fn settle_all(participants: &mut [Participant]) {
    for participant in participants.iter_mut() {
        let pending: Vec<BlockId> = participant
            .session
            .store()
            .ids()
            .into_iter()
            .filter(|id| participant.session.pending_content(*id).is_some())
            .collect();
        for id in pending {
            if let Err(err) = participant.session.flush(id) {
                tracing::warn!(block_id = id, error = %err, "flush failed");
            }
        }
    }

    // Second pass picks up resyncs triggered by the first
    for _ in 0..2 {
        for participant in participants.iter_mut() {
            participant.session.settle().await;
            for notice in participant.session.take_notices() {
                println!("{} {}: {}", "!".yellow(), participant.name, notice.error);
            }
        }
    }
}

fn print_documents(participants: &[Participant]) {
    for participant in participants {
        println!();
        println!(
            "{} {}",
            participant.name.bold(),
            format!("({:?})", participant.session.role()).dimmed()
        );
        for block in participant.session.blocks() {
            let size = match block.display_size() {
                Some(TextSize::Normal) | None => String::new(),
                Some(size) => format!(" ({:?})", size).to_lowercase(),
            };
            println!(
                "  {} {}{} {}",
                format!("[{}]", block.order).dimmed(),
                block.block_type.as_str().cyan(),
                size.dimmed(),
                block.content.replace('\n', "⏎")
            );
        }
    }
}
