use std::time::Duration;

use tokio::time;

use crate::models::WatchedAsset;
use crate::{render, AppState};

/// What one tick decided for one asset.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    /// Price moved at least `threshold` percent from the last alerted price.
    Move { from: f64, to: f64, threshold: f64 },

    /// A one-shot trigger level was crossed (boundary equality included).
    TriggerHit { level: f64, price: f64 },
}

pub fn spawn_price_alert_monitor(state: AppState) {
    let period = Duration::from_secs(state.settings.poll_interval_secs.max(1));

    tokio::spawn(async move {
        let mut interval = time::interval(period);

        loop {
            interval.tick().await;

            if let Err(e) = run_tick(&state).await {
                tracing::warn!(error = %e, "alert monitor tick error");
            }
        }
    });
}

async fn run_tick(state: &AppState) -> Result<(), String> {
    // Snapshot the watch list so a slow quote never holds the store lock.
    let markets: Vec<String> = state.store.read(|d| d.assets.keys().cloned().collect()).await;

    for market in markets {
        let current = match state.upbit.price(&market).await {
            Ok(p) => p,
            // no reading this tick; baselines stay untouched
            Err(e) => {
                tracing::debug!(market = %market, error = %e, "price fetch failed, skipping");
                continue;
            }
        };

        if !current.is_finite() || current <= 0.0 {
            continue;
        }

        let outcome = state
            .store
            .mutate(|doc| {
                let default_threshold = doc.default_threshold_pct;
                // the asset may have been removed while we were fetching
                doc.assets.get_mut(&market).map(|asset| {
                    let events = evaluate_tick(asset, current, default_threshold);
                    (events, asset.clone())
                })
            })
            .await
            .map_err(|e| e.to_string())?;

        let Some((events, asset)) = outcome else {
            continue;
        };

        for event in events {
            let text = render::alert_text(&market, &asset, &event);
            // best-effort, at-most-once: state has already advanced
            if let Err(e) = state
                .telegram
                .send_message(&state.settings.chat_id, &text, Some(render::main_keyboard()))
                .await
            {
                tracing::warn!(market = %market, error = %e, "alert delivery failed");
            }
        }
    }

    Ok(())
}

/// One asset, one tick: the percentage-move track first, then the
/// trigger-crossing track, both against the same reading. Pure so tests can
/// drive it with synthetic price sequences.
pub fn evaluate_tick(
    asset: &mut WatchedAsset,
    current: f64,
    default_threshold: f64,
) -> Vec<AlertEvent> {
    let mut events = Vec::new();

    // --- percentage-move track (self-rebasing baseline) ---
    match asset.last_notified_price {
        // cold start: seed only, never notify
        None => asset.last_notified_price = Some(current),
        Some(base) if base > 0.0 => {
            let threshold = asset.effective_threshold(default_threshold);
            let delta = (current / base - 1.0).abs() * 100.0;

            if delta >= threshold {
                events.push(AlertEvent::Move {
                    from: base,
                    to: current,
                    threshold,
                });
                asset.last_notified_price = Some(current);
            }
        }
        // zero baseline: percentage track suppressed, crossings still run
        Some(_) => {}
    }

    // --- trigger-crossing track (one-shot levels) ---
    if let Some(prev) = asset.prev_price {
        asset.triggers.retain(|&level| {
            let hit = (prev < level && level <= current)
                || (prev > level && level >= current)
                || (prev == level && current == level);

            if hit {
                events.push(AlertEvent::TriggerHit {
                    level,
                    price: current,
                });
            }

            !hit
        });
    }

    asset.prev_price = Some(current);

    events
}
