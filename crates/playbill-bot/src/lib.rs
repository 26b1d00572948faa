use std::time::Duration;

use anyhow::{Result, anyhow};
use playbill_core::config::Config;
use playbill_core::play;
use tracing::{info, warn};

use crate::engine::Engine;
use crate::narrator::Narrator;
use crate::telegram::{TelegramClient, TelegramSettings};

mod actions;
mod commands;
mod engine;
mod handlers;
mod narrator;
mod telegram;

pub async fn run() -> Result<()> {
    let config = Config::load().map_err(|_| anyhow!("Failed to load playbill config"))?;
    let settings = TelegramSettings::from_config(&config)?;

    let plays_dir = config.resolve_plays_dir();
    let plays = play::load_all(&plays_dir)?;
    if plays.is_empty() {
        warn!(dir = %plays_dir.display(), "no plays found");
    }

    let client = TelegramClient::new(settings.bot_token);
    if let Err(err) = client
        .set_my_commands(&commands::telegram_command_specs())
        .await
    {
        warn!(%err, "failed to register bot commands");
    }

    let narrator = Narrator::from_config(&config);
    if narrator.is_none() {
        info!("speech synthesis not configured; audio narration disabled");
    }
    let engine = Engine::new(
        client.clone(),
        plays,
        narrator,
        config.pacing.auto_pause_threshold,
    );

    let mut offset: Option<i64> = None;
    let poll_timeout = Duration::from_secs(30);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("playbill-bot started, polling for updates");

    loop {
        let current_offset = offset;
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutting down");
                break;
            }
            updates = client.get_updates(current_offset, poll_timeout) => {
                let updates = match updates {
                    Ok(updates) => updates,
                    Err(err) => {
                        warn!(%err, "polling error");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.message {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            handlers::handle_message(&engine, message).await;
                        });
                    }
                    if let Some(query) = update.callback_query {
                        let engine = engine.clone();
                        tokio::spawn(async move {
                            handlers::handle_callback(&engine, query).await;
                        });
                    }
                }
            }
        }
    }

    Ok(())
}
