use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use coinsentry::services::{alert_monitor, conversation, lock::InstanceLock, store::WatchStore};
use coinsentry::services::{telegram::TelegramClient, upbit::UpbitClient};
use coinsentry::{config, render, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let settings = config::load();

    if settings.bot_token.is_empty() {
        tracing::error!("BOT_TOKEN is missing, set it in .env");
        return;
    }

    // One writer per document: refuse to start next to a live instance.
    let _lock = match InstanceLock::acquire(Path::new(&settings.lock_file)) {
        Ok(lock) => lock,
        Err(e) => {
            tracing::error!(error = %e, "duplicate instance detected, exiting");
            return;
        }
    };

    let store = WatchStore::load(Path::new(&settings.data_file), settings.default_threshold_pct)
        .expect("failed to load state document");

    let state = AppState {
        upbit: UpbitClient::new(settings.http_timeout_secs),
        telegram: TelegramClient::new(settings.bot_token.clone(), settings.http_timeout_secs),
        store: Arc::new(store),
        settings,
    };

    alert_monitor::spawn_price_alert_monitor(state.clone());

    if !state.settings.chat_id.is_empty() {
        let _ = state
            .telegram
            .send_message(
                &state.settings.chat_id,
                "Bot started. Try the 'view' / 'status' / 'asset' / 'trigger' buttons.",
                Some(render::main_keyboard()),
            )
            .await;
    }

    let loop_state = state.clone();
    tokio::spawn(async move { run_message_loop(loop_state).await });

    tracing::info!("coinsentry is running");

    // keep the lock held until ctrl-c, then release it via Drop
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutting down");
}

async fn run_message_loop(state: AppState) {
    let mut offset = 0i64;

    loop {
        let updates = match state.telegram.get_updates(offset, 30).await {
            Ok(u) => u,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, backing off");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);

            let Some(message) = update.message else { continue };
            let Some(text) = message.text else { continue };
            let chat_id = message.chat.id.to_string();

            // single-tenant bot: ignore everyone but the configured owner
            if !state.settings.chat_id.is_empty() && chat_id != state.settings.chat_id {
                continue;
            }

            let reply = match conversation::handle_message(&state, &chat_id, &text).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "message handling failed");
                    continue;
                }
            };

            if let Err(e) = state
                .telegram
                .send_message(&chat_id, &reply.text, Some(reply.keyboard))
                .await
            {
                tracing::warn!(error = %e, "reply delivery failed");
            }
        }
    }
}
