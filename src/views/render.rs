use num_format::{Locale, ToFormattedString};
use serde_json::{json, Value};

use crate::models::asset::symbol_of;
use crate::models::{StateDoc, WatchedAsset};
use crate::services::alert_monitor::AlertEvent;

// Telegram rejects message bodies over 4096 chars; long view/status replies
// are cut here, below the hard cap.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Char-safe truncation for outbound message bodies.
pub fn clamp_message(text: String) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text;
    }
    text.chars().take(MAX_MESSAGE_CHARS).collect()
}

// ---------------- Numbers ----------------

/// KRW amounts rounded to whole won with thousands separators.
pub fn fmt_krw(n: f64) -> String {
    if !n.is_finite() {
        return "-".to_string();
    }
    let v = n.round() as i64;
    v.to_formatted_string(&Locale::en)
}

pub fn fmt_qty(q: f64) -> String {
    let s = format!("{q:.8}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() { "0".to_string() } else { s.to_string() }
}

// ---------------- Symbols ----------------

// 🟢 holding in profit / 🔴 holding at a loss / ⚪️ not held or no reading
pub fn profit_emoji(asset: &WatchedAsset, current: Option<f64>) -> &'static str {
    if asset.avg_price <= 0.0 || asset.qty <= 0.0 {
        return "⚪️";
    }
    match current {
        Some(cur) if cur > asset.avg_price => "🟢",
        Some(_) => "🔴",
        None => "⚪️",
    }
}

pub fn pretty_sym(market: &str, emoji: &str) -> String {
    format!("{emoji} {} {emoji}", symbol_of(market))
}

// ---------------- Texts ----------------

pub fn summary_line(market: &str, asset: &WatchedAsset, current: f64, threshold: f64) -> String {
    let cur = (current > 0.0).then_some(current);
    let label = pretty_sym(market, profit_emoji(asset, cur));

    let cost = asset.avg_price * asset.qty;
    let pnl = (current - asset.avg_price) * asset.qty;
    let pnl_pct = if asset.avg_price > 0.0 {
        (current / asset.avg_price - 1.0) * 100.0
    } else {
        0.0
    };

    let mut line = format!(
        "{label} / {} / {} / {} / {} / {} ({pnl_pct:+.2}%) | threshold {threshold}%",
        fmt_krw(asset.avg_price),
        fmt_qty(asset.qty),
        fmt_krw(cost),
        fmt_krw(current),
        fmt_krw(pnl),
    );

    if !asset.triggers.is_empty() {
        let levels: Vec<String> = asset.triggers.iter().map(|t| fmt_krw(*t)).collect();
        line.push_str(&format!(" | triggers: {}", levels.join(", ")));
    }

    line
}

pub fn status_text(doc: &StateDoc) -> String {
    let mut out = format!(
        "⚙️ Status\n- default threshold: {}%\n- watched assets: {}\n",
        doc.default_threshold_pct,
        doc.assets.len()
    );

    if doc.assets.is_empty() {
        out.push_str("- none");
        return clamp_message(out);
    }

    let rows: Vec<String> = doc
        .assets
        .iter()
        .map(|(market, a)| {
            let last = match a.last_notified_price {
                Some(p) => fmt_krw(p),
                None => "none".to_string(),
            };
            let mut row = format!(
                "{} | avg: {} qty: {} | threshold: {}% | last alert: {last}",
                pretty_sym(market, profit_emoji(a, None)),
                fmt_krw(a.avg_price),
                fmt_qty(a.qty),
                doc.effective_threshold(a),
            );
            if !a.triggers.is_empty() {
                let levels: Vec<String> = a.triggers.iter().map(|t| fmt_krw(*t)).collect();
                row.push_str(&format!(" | triggers: {}", levels.join(", ")));
            }
            row
        })
        .collect();

    out.push_str(&rows.join("\n"));
    clamp_message(out)
}

pub fn help_text() -> &'static str {
    "📖 Help\n\
     • Just press the buttons, no slash needed\n\
     • view: profit summary, status: full configuration\n\
     • asset: add/remove watched markets\n\
     • avg / qty / threshold: per-asset settings\n\
     • trigger: one-shot price levels (direct / current ±% / avg ±%), \
     each fires once when crossed and is then removed"
}

pub fn alert_text(market: &str, asset: &WatchedAsset, event: &AlertEvent) -> String {
    match event {
        AlertEvent::Move {
            from,
            to,
            threshold,
        } => {
            let arrow = if to >= from { "📈" } else { "📉" };
            let pct = (to / from - 1.0) * 100.0;
            let label = pretty_sym(market, profit_emoji(asset, Some(*to)));

            let cost = asset.avg_price * asset.qty;
            let pnl = (to - asset.avg_price) * asset.qty;
            let pnl_pct = if asset.avg_price > 0.0 {
                (to / asset.avg_price - 1.0) * 100.0
            } else {
                0.0
            };

            format!(
                "{arrow} move alert ({threshold}%)\n{label}: {} → {} KRW ({pct:+.2}%)\n\
                 [summary] {} / {} / {} / {} / {} / {} ({pnl_pct:+.2}%)",
                fmt_krw(*from),
                fmt_krw(*to),
                symbol_of(market),
                fmt_krw(asset.avg_price),
                fmt_qty(asset.qty),
                fmt_krw(cost),
                fmt_krw(*to),
                fmt_krw(pnl),
            )
        }
        AlertEvent::TriggerHit { level, price } => {
            let label = pretty_sym(market, profit_emoji(asset, Some(*price)));
            format!(
                "🎯 trigger hit\n{label}: now {} KRW (trigger {})",
                fmt_krw(*price),
                fmt_krw(*level),
            )
        }
    }
}

// ---------------- Keyboards ----------------

pub fn main_keyboard() -> Value {
    json!({
        "keyboard": [
            ["view", "status", "help"],
            ["asset", "price", "threshold"],
            ["avg", "qty", "trigger"],
        ],
        "resize_keyboard": true,
    })
}

pub fn mode_keyboard() -> Value {
    json!({
        "keyboard": [["add", "remove"], ["cancel"]],
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}

pub fn cancel_keyboard() -> Value {
    json!({
        "keyboard": [["cancel"]],
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}

pub fn trigger_op_keyboard() -> Value {
    json!({
        "keyboard": [["set", "list"], ["remove", "clear"], ["cancel"]],
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}

pub fn trigger_mode_keyboard() -> Value {
    json!({
        "keyboard": [["price", "current ±%", "avg ±%"], ["cancel"]],
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}

/// Symbol picker built from the watched assets, three per row, with a few
/// well-known defaults when nothing is watched yet.
pub fn symbol_keyboard(doc: &StateDoc) -> Value {
    let mut syms: Vec<String> = doc.assets.keys().map(|m| symbol_of(m).to_string()).collect();
    if syms.is_empty() {
        syms = vec!["BTC".into(), "ETH".into(), "SOL".into()];
    }

    let mut rows: Vec<Vec<String>> = syms.chunks(3).map(|c| c.to_vec()).collect();
    rows.push(vec!["cancel".into()]);

    json!({
        "keyboard": rows,
        "resize_keyboard": true,
        "one_time_keyboard": true,
    })
}
