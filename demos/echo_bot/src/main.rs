//! Echo Bot Demo
//!
//! A small bot showing the main pieces of gramflow:
//!
//! - command handlers returning a [`TelegramMethod`] that the polling loop
//!   sends for them
//! - typed command arguments with [`CommandArgs`]
//! - a `Feedback` scene that keeps its own state between messages
//! - an outer middleware logging every incoming message
//! - an error handler
//!
//! # Usage
//!
//! ```bash
//! BOT_TOKEN=123456:ABC cargo run --package echo-bot
//! cargo run --package echo-bot -- --config gramflow.toml --profile production
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gramflow::framework::fsm::StorageData;
use gramflow::framework::scene::Scene;
use gramflow::framework::{ErrorEvent, TelegramEvent};
use gramflow::prelude::*;
use gramflow::runtime::ConfigLoader;
use serde_json::json;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "echo-bot", about = "A gramflow echo bot")]
struct Cli {
    /// Configuration file. Searched in the current directory when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile, e.g. `production`.
    #[arg(short, long)]
    profile: Option<String>,

    /// Bot token, taking precedence over the configuration.
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

// ============================================================================
// Commands
// ============================================================================

async fn start(message: Message) -> TelegramMethod {
    let name = message
        .from
        .as_ref()
        .map(|user| user.first_name.as_str())
        .unwrap_or("there");
    TelegramMethod::send_message(
        message.chat.id,
        format!(
            "Hi {name}!\n\
            /echo <text> - Echo text\n\
            /remind <minutes> <text> - Remind me later\n\
            /feedback - Leave feedback\n\
            /menu - Inline buttons"
        ),
    )
}

async fn echo(message: Message, command: CommandObject) -> TelegramMethod {
    let text = command
        .args
        .unwrap_or_else(|| "Usage: /echo <text>".to_string());
    TelegramMethod::send_message(message.chat.id, text)
}

/// Arguments of `/remind`.
#[derive(Parser, Debug, Clone)]
#[command(name = "remind")]
struct Remind {
    minutes: u64,
    text: Vec<String>,
}

async fn remind(message: Message, args: CommandArgs<Remind>, bot: Bot) -> TelegramMethod {
    let Remind { minutes, text } = args.into_inner();
    let chat_id = message.chat.id;
    let text = text.join(" ");

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
        if let Err(e) = bot.send_message(chat_id, format!("⏰ {text}")).await {
            error!(chat_id, error = %e, "Failed to send reminder");
        }
    });

    TelegramMethod::send_message(chat_id, format!("I will remind you in {minutes} min"))
}

async fn menu(message: Message) -> TelegramMethod {
    TelegramMethod::send_message(message.chat.id, "Pick one").param(
        "reply_markup",
        json!({
            "inline_keyboard": [[
                {"text": "Ping", "callback_data": "ping"},
                {"text": "Time", "callback_data": "time"},
            ]]
        }),
    )
}

async fn on_button(query: CallbackQuery) -> TelegramMethod {
    let answer = match query.data.as_deref() {
        Some("ping") => "Pong! 🏓".to_string(),
        Some(other) => format!("You pressed {other}"),
        None => "Nothing to do".to_string(),
    };
    TelegramMethod::answer_callback_query(query.id, Some(answer))
}

// ============================================================================
// Feedback scene
// ============================================================================

fn feedback_scene() -> Arc<Scene> {
    SceneBuilder::new("Feedback")
        .on_enter(EventType::Message, |message: Message, bot: Bot| async move {
            bot.send_message(message.chat.id, "Send your feedback, or /cancel")
                .await?;
            Ok::<_, DispatchError>(())
        })
        .on_exit(EventType::Message, |message: Message, bot: Bot| async move {
            bot.send_message(message.chat.id, "Cancelled").await?;
            Ok::<_, DispatchError>(())
        })
        .handler_after(
            EventType::Message,
            || async {},
            Command::new(["cancel"]),
            After::exit(),
        )
        .handler(
            EventType::Message,
            |message: Message, wizard: SceneWizard| async move {
                let text = message.text.clone().unwrap_or_default();
                let mut patch = StorageData::new();
                patch.insert("feedback".to_string(), json!(text));
                wizard.update_data(patch).await?;
                info!(chat_id = message.chat.id, feedback = %text, "Feedback received");

                wizard.leave(Data::new()).await?;
                Ok::<_, DispatchError>(TelegramMethod::send_message(
                    message.chat.id,
                    "Thanks for the feedback!",
                ))
            },
            (),
        )
        .build()
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.file(path);
    }
    if let Some(profile) = &cli.profile {
        loader = loader.profile(profile);
    }
    let mut config = loader.load()?;
    if let Some(token) = cli.token {
        config.bot.token = token;
    }

    let runtime = GramflowRuntime::from_config(config)?;
    let dp = runtime.dispatcher();

    dp.message()
        .outer_middleware()
        .register(middleware_fn(|next, event, data| async move {
            if let TelegramEvent::Message(message) = &event {
                info!(
                    chat_id = message.chat.id,
                    text = message.text.as_deref().unwrap_or_default(),
                    "Incoming message"
                );
            }
            next(event, data).await
        }));

    let commands = Router::new("commands");
    commands.message().register(start, Command::new(["start", "help"]));
    commands.message().register(echo, Command::new(["echo"]));
    commands.message().register(remind, Command::new(["remind"]));
    commands.message().register(menu, Command::new(["menu"]));
    commands.callback_query().register(on_button, ());

    let scenes = SceneRegistry::new(dp);
    let feedback = feedback_scene();
    scenes.add(feedback.clone())?;
    commands
        .message()
        .register(feedback.as_handler(), Command::new(["feedback"]));

    dp.include_router(&commands)?;

    dp.error().register(
        |event: ErrorEvent| async move {
            error!(
                update_id = event.update.update_id,
                error = %event.exception,
                "Handler failed"
            );
        },
        (),
    );

    dp.startup().register(|bot: Bot| async move {
        info!(bot_id = bot.id(), "Echo bot started");
    });

    runtime.run().await?;
    Ok(())
}
