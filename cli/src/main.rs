mod fixture;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use chatroom_core::{
    AppAction, AppState, ChatMessage, ChatRoomState, FfiApp, PickedKind, PickerItem,
};
use chatroom_memory_backend::MemoryBackend;
use clap::{Parser, Subcommand};
use serde_json::json;

use crate::fixture::Fixture;

#[derive(Debug, Parser)]
#[command(name = "chatroom")]
#[command(about = "Drive the chat-room core against an in-memory backend")]
struct Cli {
    /// Data directory (config file, logs and staged media live here)
    #[arg(long, default_value = ".chatroom-cli")]
    data_dir: PathBuf,

    /// JSON fixture with conversations and history (defaults to a demo group)
    #[arg(long, env = "CHATROOM_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Signed-in user id
    #[arg(long, default_value = "me")]
    user: String,

    /// Seconds to wait for the core to settle
    #[arg(long, default_value_t = 10)]
    timeout: u64,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the default config file contents
    Config,

    /// Open a chat and print its rendered rows
    History {
        #[arg(long, default_value = "demo")]
        chat: String,

        /// Keep loading older pages until the first message
        #[arg(long)]
        all: bool,
    },

    /// Send text and/or media, then print the rendered rows
    Send {
        #[arg(long, default_value = "demo")]
        chat: String,

        /// Message text (caption when media is attached)
        #[arg(long, default_value = "")]
        text: String,

        /// Image files to attach
        #[arg(long)]
        photo: Vec<PathBuf>,

        /// Voice recording to attach, with its duration
        #[arg(long, requires = "audio_secs")]
        audio: Option<PathBuf>,

        #[arg(long)]
        audio_secs: Option<f64>,
    },

    /// React to a message
    React {
        #[arg(long, default_value = "demo")]
        chat: String,

        #[arg(long)]
        message: String,

        #[arg(long, default_value = "👍")]
        emoji: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Command::Config = cli.cmd {
        println!("{}", chatroom_core::default_config_json());
        return Ok(());
    }

    std::fs::create_dir_all(&cli.data_dir)
        .with_context(|| format!("create data dir {}", cli.data_dir.display()))?;
    let app = start(&cli)?;

    match &cli.cmd {
        Command::Config => Ok(()),
        Command::History { chat, all } => cmd_history(&cli, &app, chat, *all).await,
        Command::Send {
            chat,
            text,
            photo,
            audio,
            audio_secs,
        } => {
            let audio = audio.clone().zip(*audio_secs);
            cmd_send(&cli, &app, chat, text, photo, audio).await
        }
        Command::React {
            chat,
            message,
            emoji,
        } => cmd_react(&cli, &app, chat, message, emoji).await,
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn start(cli: &Cli) -> anyhow::Result<Arc<FfiApp>> {
    let fixture = match &cli.fixture {
        Some(path) => Fixture::load(path)?,
        None => Fixture::demo(&cli.user, chatroom_core::now_millis()),
    };
    let backend = Arc::new(MemoryBackend::new());
    fixture.seed(&backend);

    let app = FfiApp::new(cli.data_dir.to_string_lossy().to_string(), backend);
    app.dispatch(AppAction::SignIn {
        user_id: cli.user.clone(),
        display_name: cli.user.clone(),
    });
    Ok(app)
}

async fn wait_for(
    cli: &Cli,
    app: &FfiApp,
    what: &str,
    mut done: impl FnMut(&AppState) -> bool,
) -> anyhow::Result<AppState> {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(cli.timeout);
    loop {
        let state = app.state();
        if done(&state) {
            return Ok(state);
        }
        if let Some(toast) = &state.toast {
            return Err(anyhow!("{what}: {toast}"));
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(anyhow!("timeout waiting for {what}"));
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

fn settled(state: &AppState, chat_id: &str) -> bool {
    !state.busy.opening_chat
        && !state.busy.loading_older
        && state
            .current_chat
            .as_ref()
            .is_some_and(|c| c.chat_id == chat_id)
}

async fn open_chat(cli: &Cli, app: &FfiApp, chat_id: &str) -> anyhow::Result<ChatRoomState> {
    app.dispatch(AppAction::OpenChat {
        chat_id: chat_id.to_string(),
    });
    let state = wait_for(cli, app, "open chat", |s| {
        settled(s, chat_id) && s.current_chat.as_ref().is_some_and(|c| !c.title.is_empty())
    })
    .await?;
    state
        .current_chat
        .ok_or_else(|| anyhow!("chat {chat_id} not open"))
}

fn row(m: &ChatMessage) -> serde_json::Value {
    json!({
        "id": m.id,
        "day": m.show_day_separator.then(|| m.day_label.clone()).flatten(),
        "sender": m.show_sender_name.then(|| m.sender_name.clone()).flatten(),
        "time": m.time_label,
        "kind": format!("{:?}", m.kind),
        "body": m.body,
        "mine": m.is_mine,
        "reactions": m.reactions.iter().map(|r| json!({
            "emoji": r.emoji,
            "count": r.count,
            "mine": r.reacted_by_me,
        })).collect::<Vec<_>>(),
    })
}

fn print_room(room: &ChatRoomState) -> anyhow::Result<()> {
    let out = json!({
        "chat_id": room.chat_id,
        "title": room.title,
        "is_group": room.is_group,
        "can_load_older": room.can_load_older,
        "messages": room.messages.iter().map(row).collect::<Vec<_>>(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────────────

async fn cmd_history(cli: &Cli, app: &FfiApp, chat_id: &str, all: bool) -> anyhow::Result<()> {
    let mut room = open_chat(cli, app, chat_id).await?;
    while all && room.can_load_older {
        let before = room.messages.len();
        app.dispatch(AppAction::LoadOlderMessages { top_visible_id: None });
        let state = wait_for(cli, app, "older page", |s| {
            settled(s, chat_id)
                && s.current_chat
                    .as_ref()
                    .is_some_and(|c| c.messages.len() > before || !c.can_load_older)
        })
        .await?;
        room = state
            .current_chat
            .ok_or_else(|| anyhow!("chat {chat_id} closed"))?;
    }
    print_room(&room)
}

async fn cmd_send(
    cli: &Cli,
    app: &FfiApp,
    chat_id: &str,
    text: &str,
    photos: &[PathBuf],
    audio: Option<(PathBuf, f64)>,
) -> anyhow::Result<()> {
    let room = open_chat(cli, app, chat_id).await?;
    let known = room.messages.len();

    let mut expected = 0;
    if let Some((path, secs)) = audio {
        app.dispatch(AppAction::AddRecordedAudio {
            path: path.to_string_lossy().to_string(),
            duration_secs: secs,
        });
        expected += 1;
    }
    if !photos.is_empty() {
        let items = photos
            .iter()
            .enumerate()
            .map(|(i, path)| PickerItem {
                id: format!("photo-{i}"),
                kind: PickedKind::Image,
                path: path.to_string_lossy().to_string(),
            })
            .collect();
        app.dispatch(AppAction::AddPickerSelection { items });
        expected += photos.len();
    }
    if expected > 0 {
        wait_for(cli, app, "attachments", |s| {
            !s.busy.resolving_media && s.current_chat.as_ref().is_some_and(|c| !c.staged.is_empty())
        })
        .await?;
    } else if text.trim().is_empty() {
        return Err(anyhow!("nothing to send: pass --text, --photo or --audio"));
    } else {
        expected = 1;
    }

    app.dispatch(AppAction::UpdateDraft {
        text: text.to_string(),
    });
    app.dispatch(AppAction::SendMessage);
    let state = wait_for(cli, app, "send", |s| {
        s.uploads.is_empty()
            && s.current_chat
                .as_ref()
                .is_some_and(|c| c.messages.len() >= known + expected)
    })
    .await?;
    let room = state
        .current_chat
        .ok_or_else(|| anyhow!("chat {chat_id} closed"))?;
    print_room(&room)
}

async fn cmd_react(
    cli: &Cli,
    app: &FfiApp,
    chat_id: &str,
    message_id: &str,
    emoji: &str,
) -> anyhow::Result<()> {
    let room = open_chat(cli, app, chat_id).await?;
    if !room.messages.iter().any(|m| m.id == message_id) {
        return Err(anyhow!("message {message_id} is not on the loaded page"));
    }
    app.dispatch(AppAction::AddReaction {
        message_id: message_id.to_string(),
        emoji: emoji.to_string(),
    });
    let state = wait_for(cli, app, "reaction", |s| {
        s.current_chat.as_ref().is_some_and(|c| {
            c.messages
                .iter()
                .any(|m| m.id == message_id && m.reactions.iter().any(|r| r.emoji == emoji && r.reacted_by_me))
        })
    })
    .await?;
    let room = state
        .current_chat
        .ok_or_else(|| anyhow!("chat {chat_id} closed"))?;
    print_room(&room)
}
