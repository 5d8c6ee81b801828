use chrono::Utc;

use crate::models::asset::{normalize_market, symbol_of};
use crate::models::{
    ManageAssetStep, PendingAction, PendingInteraction, SymbolOnlyStep, TriggerStep, ValueFlowStep,
};
use crate::services::watch_service;
use crate::{render, AppState};

// Recognized at every step of every flow, before anything else.
const CANCEL_WORD: &str = "cancel";

/// What to send back to the chat for one inbound message.
#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub keyboard: serde_json::Value,
}

impl Reply {
    fn main(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: render::main_keyboard(),
        }
    }

    fn with(text: impl Into<String>, keyboard: serde_json::Value) -> Self {
        Self {
            text: text.into(),
            keyboard,
        }
    }
}

/// One discrete step of the conversation: routes the message to the live
/// pending interaction if there is one, otherwise to top-level command
/// dispatch.
pub async fn handle_message(state: &AppState, chat_id: &str, text: &str) -> Result<Reply, String> {
    let text = text.trim();

    let pending = take_live_pending(state, chat_id).await?;

    if let Some(p) = pending {
        if text.eq_ignore_ascii_case(CANCEL_WORD) {
            clear_pending(state, chat_id).await?;
            return Ok(Reply::main("Cancelled."));
        }
        return handle_step(state, chat_id, text, p).await;
    }

    dispatch_command(state, chat_id, text).await
}

// Returns the pending interaction for this chat, dropping it first if it
// went stale (abandoned flows must not hijack unrelated messages forever).
async fn take_live_pending(
    state: &AppState,
    chat_id: &str,
) -> Result<Option<PendingInteraction>, String> {
    let ttl = state.settings.pending_ttl_secs;
    let now = Utc::now().timestamp();

    let snap = state.store.read(|doc| doc.pending.get(chat_id).cloned()).await;

    match snap {
        Some(p) if p.is_expired(ttl, now) => {
            clear_pending(state, chat_id).await?;
            Ok(None)
        }
        other => Ok(other),
    }
}

async fn set_pending(
    state: &AppState,
    chat_id: &str,
    interaction: PendingInteraction,
) -> Result<(), String> {
    state
        .store
        .mutate(|doc| {
            doc.pending.insert(chat_id.to_string(), interaction);
        })
        .await
        .map_err(|e| e.to_string())
}

async fn clear_pending(state: &AppState, chat_id: &str) -> Result<(), String> {
    state
        .store
        .mutate(|doc| {
            doc.pending.remove(chat_id);
        })
        .await
        .map_err(|e| e.to_string())
}

// ---------------- Top-level commands ----------------

async fn dispatch_command(state: &AppState, chat_id: &str, text: &str) -> Result<Reply, String> {
    let head = text
        .split_whitespace()
        .next()
        .unwrap_or("")
        .trim_start_matches('/')
        .to_lowercase();

    match head.as_str() {
        "help" => Ok(Reply::main(render::help_text())),

        "view" | "show" => view_summary(state).await,

        "status" => Ok(Reply::main(state.store.read(render::status_text).await)),

        "asset" | "coin" => {
            let p = PendingInteraction::new(PendingAction::ManageAsset {
                step: ManageAssetStep::Mode,
            });
            set_pending(state, chat_id, p).await?;
            Ok(Reply::with("Add or remove an asset?", render::mode_keyboard()))
        }

        "price" => {
            let p = PendingInteraction::new(PendingAction::Price {
                step: SymbolOnlyStep::Symbol,
            });
            set_pending(state, chat_id, p).await?;
            symbol_prompt(state, "Which asset do you want a quote for?").await
        }

        "avg" => {
            let p = PendingInteraction::new(PendingAction::SetAvg {
                step: ValueFlowStep::Symbol,
            });
            set_pending(state, chat_id, p).await?;
            symbol_prompt(state, "Pick an asset, or type one.").await
        }

        "qty" => {
            let p = PendingInteraction::new(PendingAction::SetQty {
                step: ValueFlowStep::Symbol,
            });
            set_pending(state, chat_id, p).await?;
            symbol_prompt(state, "Pick an asset, or type one.").await
        }

        "threshold" => {
            // "threshold 1.5" adjusts the global default right away; bare
            // "threshold" opens the per-asset flow.
            if let Some(v) = text.split_whitespace().nth(1).and_then(parse_number) {
                if v <= 0.0 {
                    return Ok(Reply::main("Threshold must be above zero."));
                }
                watch_service::set_default_threshold(state, v).await?;
                return Ok(Reply::main(format!("Default threshold set: {v}%")));
            }

            let p = PendingInteraction::new(PendingAction::SetThreshold {
                step: ValueFlowStep::Symbol,
            });
            set_pending(state, chat_id, p).await?;
            symbol_prompt(state, "Which asset gets its own threshold?").await
        }

        "trigger" => {
            let p = PendingInteraction::new(PendingAction::Trigger {
                step: TriggerStep::Symbol,
            });
            set_pending(state, chat_id, p).await?;
            symbol_prompt(state, "Pick an asset, or type one.").await
        }

        _ => Ok(Reply::main(render::help_text())),
    }
}

async fn view_summary(state: &AppState) -> Result<Reply, String> {
    let markets: Vec<String> = state.store.read(|d| d.assets.keys().cloned().collect()).await;

    if markets.is_empty() {
        return Ok(Reply::main("No assets yet. Use 'asset' → add to register one."));
    }

    let mut quotes = Vec::with_capacity(markets.len());
    for market in markets {
        let cur = state.upbit.price(&market).await.unwrap_or(0.0);
        quotes.push((market, cur));
    }

    let body = state
        .store
        .read(|doc| {
            let lines: Vec<String> = quotes
                .iter()
                .filter_map(|(market, cur)| {
                    doc.assets.get(market).map(|a| {
                        render::summary_line(market, a, *cur, doc.effective_threshold(a))
                    })
                })
                .collect();
            lines.join("\n")
        })
        .await;

    Ok(Reply::main(render::clamp_message(format!(
        "📊 View (summary)\n{body}"
    ))))
}

async fn symbol_prompt(state: &AppState, text: &str) -> Result<Reply, String> {
    let kb = state.store.read(render::symbol_keyboard).await;
    Ok(Reply::with(text, kb))
}

// ---------------- Step handlers ----------------

async fn handle_step(
    state: &AppState,
    chat_id: &str,
    text: &str,
    p: PendingInteraction,
) -> Result<Reply, String> {
    match p.action.clone() {
        PendingAction::ManageAsset { step } => manage_asset_step(state, chat_id, text, p, step).await,
        PendingAction::Price { step: SymbolOnlyStep::Symbol } => {
            let market = normalize_market(text);
            clear_pending(state, chat_id).await?;
            match state.upbit.price(&market).await {
                Ok(cur) => Ok(Reply::main(format!(
                    "{} current price {} KRW",
                    symbol_of(&market),
                    render::fmt_krw(cur)
                ))),
                Err(_) => Ok(Reply::main("Price lookup failed.")),
            }
        }
        PendingAction::SetAvg { step } => value_flow_step(state, chat_id, text, p, step, ValueKind::Avg).await,
        PendingAction::SetQty { step } => value_flow_step(state, chat_id, text, p, step, ValueKind::Qty).await,
        PendingAction::SetThreshold { step } => {
            value_flow_step(state, chat_id, text, p, step, ValueKind::Threshold).await
        }
        PendingAction::Trigger { step } => trigger_step(state, chat_id, text, p, step).await,
    }
}

async fn manage_asset_step(
    state: &AppState,
    chat_id: &str,
    text: &str,
    p: PendingInteraction,
    step: ManageAssetStep,
) -> Result<Reply, String> {
    match step {
        ManageAssetStep::Mode => {
            let next = match text.to_lowercase().as_str() {
                "add" => ManageAssetStep::AddSymbol,
                "remove" => ManageAssetStep::RemoveSymbol,
                _ => {
                    return Ok(Reply::with(
                        "Choose 'add' or 'remove'.",
                        render::mode_keyboard(),
                    ))
                }
            };
            set_pending(
                state,
                chat_id,
                p.advance(PendingAction::ManageAsset { step: next }),
            )
            .await?;
            symbol_prompt(state, "Pick an asset, or type one.").await
        }

        ManageAssetStep::AddSymbol => {
            let outcome = watch_service::add_asset(state, text).await?;
            clear_pending(state, chat_id).await?;
            let sym = symbol_of(&outcome.market);
            if outcome.existed {
                Ok(Reply::main(format!("Already watching {sym}.")))
            } else {
                Ok(Reply::main(format!("Added: {sym}")))
            }
        }

        ManageAssetStep::RemoveSymbol => {
            let removed = watch_service::remove_asset(state, text).await?;
            clear_pending(state, chat_id).await?;
            match removed {
                Some(market) => Ok(Reply::main(format!("Removed: {}", symbol_of(&market)))),
                None => Ok(Reply::main("No such asset.")),
            }
        }
    }
}

#[derive(Clone, Copy)]
enum ValueKind {
    Avg,
    Qty,
    Threshold,
}

impl ValueKind {
    fn label(self) -> &'static str {
        match self {
            ValueKind::Avg => "cost basis (KRW)",
            ValueKind::Qty => "quantity",
            ValueKind::Threshold => "threshold (%)",
        }
    }
}

async fn value_flow_step(
    state: &AppState,
    chat_id: &str,
    text: &str,
    mut p: PendingInteraction,
    step: ValueFlowStep,
    kind: ValueKind,
) -> Result<Reply, String> {
    match step {
        ValueFlowStep::Symbol => {
            let market = normalize_market(text);
            p.data.insert("symbol".to_string(), market.clone());

            let next = match kind {
                ValueKind::Avg => PendingAction::SetAvg { step: ValueFlowStep::Value },
                ValueKind::Qty => PendingAction::SetQty { step: ValueFlowStep::Value },
                ValueKind::Threshold => PendingAction::SetThreshold { step: ValueFlowStep::Value },
            };
            set_pending(state, chat_id, p.advance(next)).await?;

            Ok(Reply::with(
                format!("Enter the {} for {}.", kind.label(), symbol_of(&market)),
                render::cancel_keyboard(),
            ))
        }

        ValueFlowStep::Value => {
            let Some(symbol) = p.data.get("symbol").cloned() else {
                return reset_broken_flow(state, chat_id).await;
            };

            // invalid input re-prompts without advancing the step
            let Some(v) = parse_number(text) else {
                return Ok(Reply::with(
                    "Numbers only. 'cancel' to stop.",
                    render::cancel_keyboard(),
                ));
            };

            let reply = match kind {
                ValueKind::Avg => {
                    if v < 0.0 {
                        return Ok(Reply::with(
                            "Cost basis must be zero or more.",
                            render::cancel_keyboard(),
                        ));
                    }
                    let market = watch_service::set_avg_price(state, &symbol, v).await?;
                    format!("{} cost basis set: {} KRW", symbol_of(&market), render::fmt_krw(v))
                }
                ValueKind::Qty => {
                    if v < 0.0 {
                        return Ok(Reply::with(
                            "Quantity must be zero or more.",
                            render::cancel_keyboard(),
                        ));
                    }
                    let market = watch_service::set_qty(state, &symbol, v).await?;
                    format!("{} quantity set: {}", symbol_of(&market), render::fmt_qty(v))
                }
                ValueKind::Threshold => {
                    if v <= 0.0 {
                        return Ok(Reply::with(
                            "Threshold must be above zero.",
                            render::cancel_keyboard(),
                        ));
                    }
                    let market = watch_service::set_asset_threshold(state, &symbol, v).await?;
                    format!("{} threshold set: {v}%", symbol_of(&market))
                }
            };

            clear_pending(state, chat_id).await?;
            Ok(Reply::main(reply))
        }
    }
}

async fn trigger_step(
    state: &AppState,
    chat_id: &str,
    text: &str,
    mut p: PendingInteraction,
    step: TriggerStep,
) -> Result<Reply, String> {
    match step {
        TriggerStep::Symbol => {
            let market = normalize_market(text);
            p.data.insert("symbol".to_string(), market.clone());
            set_pending(
                state,
                chat_id,
                p.advance(PendingAction::Trigger { step: TriggerStep::Op }),
            )
            .await?;
            Ok(Reply::with(
                format!("What about {} triggers?", symbol_of(&market)),
                render::trigger_op_keyboard(),
            ))
        }

        TriggerStep::Op => {
            let Some(symbol) = p.data.get("symbol").cloned() else {
                return reset_broken_flow(state, chat_id).await;
            };

            match text.to_lowercase().as_str() {
                "set" => {
                    p.data.insert("op".to_string(), "set".to_string());
                    set_pending(
                        state,
                        chat_id,
                        p.advance(PendingAction::Trigger { step: TriggerStep::Mode }),
                    )
                    .await?;
                    Ok(Reply::with(
                        "How should the trigger price be derived?",
                        render::trigger_mode_keyboard(),
                    ))
                }
                "remove" => {
                    p.data.insert("op".to_string(), "remove".to_string());
                    set_pending(
                        state,
                        chat_id,
                        p.advance(PendingAction::Trigger { step: TriggerStep::Value }),
                    )
                    .await?;
                    Ok(Reply::with(
                        "Enter the trigger price to remove.",
                        render::cancel_keyboard(),
                    ))
                }
                "list" => {
                    let levels = watch_service::list_triggers(state, &symbol).await?;
                    clear_pending(state, chat_id).await?;
                    if levels.is_empty() {
                        Ok(Reply::main(format!("No triggers set for {}.", symbol_of(&symbol))))
                    } else {
                        let lines: Vec<String> =
                            levels.iter().map(|t| render::fmt_krw(*t)).collect();
                        Ok(Reply::main(format!(
                            "🎯 {} triggers: {}",
                            symbol_of(&symbol),
                            lines.join(", ")
                        )))
                    }
                }
                "clear" => {
                    let removed = watch_service::clear_triggers(state, &symbol).await?;
                    clear_pending(state, chat_id).await?;
                    Ok(Reply::main(format!(
                        "Cleared {removed} trigger(s) for {}.",
                        symbol_of(&symbol)
                    )))
                }
                _ => Ok(Reply::with(
                    "Choose 'set', 'list', 'remove' or 'clear'.",
                    render::trigger_op_keyboard(),
                )),
            }
        }

        TriggerStep::Mode => {
            let mode = match text.to_lowercase().as_str() {
                "price" => "direct",
                "current ±%" => "cur_pct",
                "avg ±%" => "avg_pct",
                _ => {
                    return Ok(Reply::with(
                        "Choose 'price', 'current ±%' or 'avg ±%'.",
                        render::trigger_mode_keyboard(),
                    ))
                }
            };

            p.data.insert("mode".to_string(), mode.to_string());
            set_pending(
                state,
                chat_id,
                p.advance(PendingAction::Trigger { step: TriggerStep::Value }),
            )
            .await?;

            let prompt = if mode == "direct" {
                "Enter the trigger price (KRW)."
            } else {
                "Enter the change in percent, e.g. 5 or -3."
            };
            Ok(Reply::with(prompt, render::cancel_keyboard()))
        }

        TriggerStep::Value => {
            let Some(symbol) = p.data.get("symbol").cloned() else {
                return reset_broken_flow(state, chat_id).await;
            };

            let Some(v) = parse_number(text) else {
                return Ok(Reply::with(
                    "Numbers only. 'cancel' to stop.",
                    render::cancel_keyboard(),
                ));
            };

            if p.data.get("op").map(String::as_str) == Some("remove") {
                let removed = watch_service::remove_trigger(state, &symbol, v).await?;
                clear_pending(state, chat_id).await?;
                if removed > 0 {
                    return Ok(Reply::main(format!(
                        "Removed {removed} trigger(s) at {} for {}.",
                        render::fmt_krw(v),
                        symbol_of(&symbol)
                    )));
                }
                return Ok(Reply::main(format!(
                    "No trigger at {} for {}.",
                    render::fmt_krw(v),
                    symbol_of(&symbol)
                )));
            }

            let level = match p.data.get("mode").map(String::as_str) {
                Some("direct") => {
                    if v <= 0.0 {
                        return Ok(Reply::with(
                            "Trigger price must be above zero.",
                            render::cancel_keyboard(),
                        ));
                    }
                    v
                }
                Some("cur_pct") => {
                    let Ok(cur) = state.upbit.price(&symbol).await else {
                        clear_pending(state, chat_id).await?;
                        return Ok(Reply::main("Price lookup failed."));
                    };
                    cur * (1.0 + v / 100.0)
                }
                Some("avg_pct") => {
                    let avg = watch_service::avg_price_of(state, &symbol).await;
                    if avg <= 0.0 {
                        // precondition surfaced to the user, flow ends here
                        clear_pending(state, chat_id).await?;
                        return Ok(Reply::main(
                            "Cost basis is not set. Use 'avg' first.",
                        ));
                    }
                    avg * (1.0 + v / 100.0)
                }
                _ => return reset_broken_flow(state, chat_id).await,
            };

            if level <= 0.0 {
                clear_pending(state, chat_id).await?;
                return Ok(Reply::main("That works out to a non-positive price."));
            }

            let market = watch_service::add_trigger(state, &symbol, level).await?;
            clear_pending(state, chat_id).await?;
            Ok(Reply::main(format!(
                "🎯 {} trigger set at {} KRW",
                symbol_of(&market),
                render::fmt_krw(level)
            )))
        }
    }
}

// An (action, step, data) combination that should not exist is a defect: log
// it loudly and reset the flow instead of guessing.
async fn reset_broken_flow(state: &AppState, chat_id: &str) -> Result<Reply, String> {
    tracing::error!(chat_id, "pending interaction missing required data, resetting");
    clear_pending(state, chat_id).await?;
    Ok(Reply::main("Something went wrong, the command was reset."))
}

fn parse_number(input: &str) -> Option<f64> {
    let cleaned = input.trim().replace(',', "").replace('%', "");
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}
