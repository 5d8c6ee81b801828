use std::fs;
use std::path::Path;
use std::sync::Arc;

use coinsentry::config::Settings;
use coinsentry::models::{PendingAction, PendingInteraction, ValueFlowStep};
use coinsentry::services::conversation::handle_message;
use coinsentry::services::store::WatchStore;
use coinsentry::services::telegram::TelegramClient;
use coinsentry::services::upbit::UpbitClient;
use coinsentry::AppState;

const CHAT: &str = "42";

fn test_state(name: &str) -> AppState {
    let data_file = std::env::temp_dir()
        .join(format!("coinsentry-conv-{name}-{}.json", std::process::id()))
        .to_string_lossy()
        .to_string();
    let _ = fs::remove_file(&data_file);

    let settings = Settings {
        bot_token: String::new(),
        chat_id: CHAT.to_string(),
        default_threshold_pct: 1.0,
        data_file: data_file.clone(),
        lock_file: format!("{data_file}.lock"),
        poll_interval_secs: 3,
        pending_ttl_secs: 3600,
        http_timeout_secs: 1,
    };

    let store = WatchStore::load(Path::new(&data_file), settings.default_threshold_pct)
        .expect("load test store");

    AppState {
        upbit: UpbitClient::new(settings.http_timeout_secs),
        telegram: TelegramClient::new(String::new(), settings.http_timeout_secs),
        store: Arc::new(store),
        settings,
    }
}

#[tokio::test]
async fn add_asset_flow_registers_a_market() {
    let state = test_state("add-flow");

    let r = handle_message(&state, CHAT, "asset").await.unwrap();
    assert!(r.text.contains("Add or remove"));

    let r = handle_message(&state, CHAT, "add").await.unwrap();
    assert!(r.text.contains("Pick an asset"));

    let r = handle_message(&state, CHAT, "btc").await.unwrap();
    assert!(r.text.contains("Added: BTC"));

    let has = state.store.read(|d| d.assets.contains_key("KRW-BTC")).await;
    assert!(has);

    let pending = state.store.read(|d| d.pending.len()).await;
    assert_eq!(pending, 0);
}

#[tokio::test]
async fn re_adding_an_asset_keeps_its_configuration() {
    let state = test_state("add-idempotent");
    state
        .store
        .mutate(|d| {
            let a = d.ensure_asset("KRW-BTC");
            a.avg_price = 123.0;
            a.qty = 2.0;
            a.triggers.push(500.0);
        })
        .await
        .unwrap();

    handle_message(&state, CHAT, "asset").await.unwrap();
    handle_message(&state, CHAT, "add").await.unwrap();
    let r = handle_message(&state, CHAT, "btc").await.unwrap();
    assert!(r.text.contains("Already watching"));

    let a = state.store.read(|d| d.assets["KRW-BTC"].clone()).await;
    assert_eq!(a.avg_price, 123.0);
    assert_eq!(a.qty, 2.0);
    assert_eq!(a.triggers, vec![500.0]);
}

#[tokio::test]
async fn remove_asset_flow() {
    let state = test_state("remove-flow");
    state
        .store
        .mutate(|d| {
            d.ensure_asset("KRW-ETH");
        })
        .await
        .unwrap();

    handle_message(&state, CHAT, "asset").await.unwrap();
    handle_message(&state, CHAT, "remove").await.unwrap();
    let r = handle_message(&state, CHAT, "eth").await.unwrap();
    assert!(r.text.contains("Removed: ETH"));

    let has = state.store.read(|d| d.assets.contains_key("KRW-ETH")).await;
    assert!(!has);
}

#[tokio::test]
async fn cancel_clears_any_step_without_other_mutations() {
    let state = test_state("cancel");

    handle_message(&state, CHAT, "avg").await.unwrap();
    let r = handle_message(&state, CHAT, "cancel").await.unwrap();
    assert!(r.text.contains("Cancelled"));

    let (pending, assets) = state.store.read(|d| (d.pending.len(), d.assets.len())).await;
    assert_eq!(pending, 0);
    assert_eq!(assets, 0);

    // mid-flow cancel, one step deeper
    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    let r = handle_message(&state, CHAT, "CANCEL").await.unwrap();
    assert!(r.text.contains("Cancelled"));
    assert_eq!(state.store.read(|d| d.pending.len()).await, 0);
}

#[tokio::test]
async fn set_avg_flow_accepts_separators() {
    let state = test_state("avg-flow");

    handle_message(&state, CHAT, "avg").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    let r = handle_message(&state, CHAT, "50,000,000").await.unwrap();
    assert!(r.text.contains("cost basis set"));

    let avg = state.store.read(|d| d.assets["KRW-BTC"].avg_price).await;
    assert_eq!(avg, 50_000_000.0);
}

#[tokio::test]
async fn non_numeric_input_re_prompts_without_advancing() {
    let state = test_state("reprompt");

    handle_message(&state, CHAT, "qty").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();

    let r = handle_message(&state, CHAT, "lots").await.unwrap();
    assert!(r.text.contains("Numbers only"));

    // still at the value step: a valid number now completes the flow
    let r = handle_message(&state, CHAT, "0.5").await.unwrap();
    assert!(r.text.contains("quantity set"));

    let qty = state.store.read(|d| d.assets["KRW-BTC"].qty).await;
    assert_eq!(qty, 0.5);
}

#[tokio::test]
async fn inline_threshold_updates_the_default_immediately() {
    let state = test_state("threshold-inline");

    let r = handle_message(&state, CHAT, "threshold 2.5").await.unwrap();
    assert!(r.text.contains("Default threshold set"));

    let (threshold, pending) = state
        .store
        .read(|d| (d.default_threshold_pct, d.pending.len()))
        .await;
    assert_eq!(threshold, 2.5);
    assert_eq!(pending, 0);
}

#[tokio::test]
async fn per_asset_threshold_flow() {
    let state = test_state("threshold-flow");

    handle_message(&state, CHAT, "threshold").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    let r = handle_message(&state, CHAT, "0.5").await.unwrap();
    assert!(r.text.contains("threshold set"));

    let th = state.store.read(|d| d.assets["KRW-BTC"].threshold_pct).await;
    assert_eq!(th, Some(0.5));
}

#[tokio::test]
async fn non_positive_threshold_is_rejected() {
    let state = test_state("threshold-zero");

    handle_message(&state, CHAT, "threshold").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    let r = handle_message(&state, CHAT, "0").await.unwrap();
    assert!(r.text.contains("above zero"));

    let th = state
        .store
        .read(|d| d.assets.get("KRW-BTC").and_then(|a| a.threshold_pct))
        .await;
    assert_eq!(th, None);
}

#[tokio::test]
async fn trigger_direct_flow_adds_a_level() {
    let state = test_state("trigger-direct");

    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    handle_message(&state, CHAT, "set").await.unwrap();
    handle_message(&state, CHAT, "price").await.unwrap();
    let r = handle_message(&state, CHAT, "60,000,000").await.unwrap();
    assert!(r.text.contains("trigger set at 60,000,000"));

    let triggers = state.store.read(|d| d.assets["KRW-BTC"].triggers.clone()).await;
    assert_eq!(triggers, vec![60_000_000.0]);
}

#[tokio::test]
async fn trigger_from_avg_requires_a_cost_basis() {
    let state = test_state("trigger-avg-unset");
    state
        .store
        .mutate(|d| {
            d.ensure_asset("KRW-BTC");
        })
        .await
        .unwrap();

    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    handle_message(&state, CHAT, "set").await.unwrap();
    handle_message(&state, CHAT, "avg ±%").await.unwrap();
    let r = handle_message(&state, CHAT, "5").await.unwrap();
    assert!(r.text.contains("Cost basis is not set"));

    // no trigger added, interaction cleared
    let (triggers, pending) = state
        .store
        .read(|d| (d.assets["KRW-BTC"].triggers.clone(), d.pending.len()))
        .await;
    assert!(triggers.is_empty());
    assert_eq!(pending, 0);
}

#[tokio::test]
async fn trigger_from_avg_applies_the_signed_percent() {
    let state = test_state("trigger-avg");
    state
        .store
        .mutate(|d| {
            d.ensure_asset("KRW-BTC").avg_price = 100.0;
        })
        .await
        .unwrap();

    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    handle_message(&state, CHAT, "set").await.unwrap();
    handle_message(&state, CHAT, "avg ±%").await.unwrap();
    handle_message(&state, CHAT, "10").await.unwrap();

    let triggers = state.store.read(|d| d.assets["KRW-BTC"].triggers.clone()).await;
    assert_eq!(triggers.len(), 1);
    assert!((triggers[0] - 110.0).abs() < 1e-9);

    // negative percent goes below the cost basis
    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    handle_message(&state, CHAT, "set").await.unwrap();
    handle_message(&state, CHAT, "avg ±%").await.unwrap();
    handle_message(&state, CHAT, "-3").await.unwrap();

    let triggers = state.store.read(|d| d.assets["KRW-BTC"].triggers.clone()).await;
    assert_eq!(triggers.len(), 2);
    assert!((triggers[1] - 97.0).abs() < 1e-9);
}

#[tokio::test]
async fn trigger_remove_collapses_duplicates_by_value() {
    let state = test_state("trigger-remove");
    state
        .store
        .mutate(|d| {
            d.ensure_asset("KRW-BTC").triggers = vec![100.0, 100.0, 200.0];
        })
        .await
        .unwrap();

    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    handle_message(&state, CHAT, "remove").await.unwrap();
    let r = handle_message(&state, CHAT, "100").await.unwrap();
    assert!(r.text.contains("Removed 2 trigger(s)"));

    let triggers = state.store.read(|d| d.assets["KRW-BTC"].triggers.clone()).await;
    assert_eq!(triggers, vec![200.0]);
}

#[tokio::test]
async fn trigger_list_and_clear() {
    let state = test_state("trigger-list");
    state
        .store
        .mutate(|d| {
            d.ensure_asset("KRW-BTC").triggers = vec![200.0, 100.0, 100.0];
        })
        .await
        .unwrap();

    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    let r = handle_message(&state, CHAT, "list").await.unwrap();
    // sorted and de-duplicated for display
    assert!(r.text.contains("100"));
    assert!(r.text.contains("200"));

    handle_message(&state, CHAT, "trigger").await.unwrap();
    handle_message(&state, CHAT, "btc").await.unwrap();
    let r = handle_message(&state, CHAT, "clear").await.unwrap();
    assert!(r.text.contains("Cleared 3 trigger(s)"));

    let triggers = state.store.read(|d| d.assets["KRW-BTC"].triggers.clone()).await;
    assert!(triggers.is_empty());
}

#[tokio::test]
async fn unknown_command_replies_with_help() {
    let state = test_state("unknown");

    let r = handle_message(&state, CHAT, "frobnicate").await.unwrap();
    assert!(r.text.contains("Help"));
    assert_eq!(state.store.read(|d| d.pending.len()).await, 0);
}

#[tokio::test]
async fn view_without_assets_points_at_the_add_flow() {
    let state = test_state("view-empty");

    let r = handle_message(&state, CHAT, "view").await.unwrap();
    assert!(r.text.contains("No assets yet"));
}

#[tokio::test]
async fn status_reports_configuration_without_network() {
    let state = test_state("status");
    state
        .store
        .mutate(|d| {
            let a = d.ensure_asset("KRW-BTC");
            a.avg_price = 100.0;
            a.threshold_pct = Some(2.0);
        })
        .await
        .unwrap();

    let r = handle_message(&state, CHAT, "status").await.unwrap();
    assert!(r.text.contains("default threshold: 1%"));
    assert!(r.text.contains("BTC"));
    assert!(r.text.contains("threshold: 2%"));
}

#[tokio::test]
async fn oversized_status_reply_is_clamped_for_delivery() {
    let state = test_state("status-clamp");

    // enough watched assets that the raw status text would blow past
    // Telegram's 4096-char message cap
    state
        .store
        .mutate(|d| {
            for i in 0..60 {
                let a = d.ensure_asset(&format!("KRW-C{i:03}"));
                a.avg_price = 50_000_000.0;
                a.qty = 1.25;
                a.threshold_pct = Some(1.5);
                a.last_notified_price = Some(51_000_000.0);
                a.triggers = vec![60_000_000.0, 70_000_000.0, 80_000_000.0];
            }
        })
        .await
        .unwrap();

    let r = handle_message(&state, CHAT, "status").await.unwrap();
    assert!(r.text.contains("watched assets: 60"));
    assert!(
        r.text.chars().count() <= coinsentry::render::MAX_MESSAGE_CHARS,
        "status reply must fit in one Telegram message"
    );
}

#[tokio::test]
async fn expired_pending_interaction_is_dropped_not_resumed() {
    let state = test_state("expired");

    // a flow abandoned an age ago
    state
        .store
        .mutate(|d| {
            let mut p = PendingInteraction::new(PendingAction::SetAvg {
                step: ValueFlowStep::Symbol,
            });
            p.updated_at = 1; // 1970
            d.pending.insert(CHAT.to_string(), p);
        })
        .await
        .unwrap();

    // this message must hit top-level dispatch, not the stale symbol step
    let r = handle_message(&state, CHAT, "status").await.unwrap();
    assert!(r.text.contains("Status"));
    assert_eq!(state.store.read(|d| d.pending.len()).await, 0);
}
