use serde::{Deserialize, Serialize};

/// One watched market. `avg_price == 0.0` means the cost basis is unset and
/// `qty == 0.0` means the position is not held; both still get alerts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchedAsset {
    #[serde(default)]
    pub avg_price: f64,

    #[serde(default)]
    pub qty: f64,

    // None => the global default threshold applies
    #[serde(default)]
    pub threshold_pct: Option<f64>,

    // Baseline for percentage-move alerts; written only by the alert monitor.
    #[serde(default)]
    pub last_notified_price: Option<f64>,

    // Reading from the previous tick; used only for trigger-crossing checks.
    #[serde(default)]
    pub prev_price: Option<f64>,

    // One-shot price levels; a fired trigger is removed.
    #[serde(default)]
    pub triggers: Vec<f64>,

    // Legacy single target/stop fields. Accepted on load, migrated into
    // `triggers`, never written back.
    #[serde(default, skip_serializing)]
    pub target_price: Option<f64>,

    #[serde(default, skip_serializing)]
    pub stop_price: Option<f64>,
}

impl WatchedAsset {
    /// Per-asset threshold override when set and positive, else the given
    /// global default.
    pub fn effective_threshold(&self, default_pct: f64) -> f64 {
        self.threshold_pct.filter(|t| *t > 0.0).unwrap_or(default_pct)
    }
}

/// Normalizes user input like "btc" or "KRW-BTC" into an Upbit market id.
pub fn normalize_market(input: &str) -> String {
    let s = input.trim().to_uppercase();
    if s.contains('-') { s } else { format!("KRW-{s}") }
}

/// Short symbol for display, e.g. "KRW-BTC" -> "BTC".
pub fn symbol_of(market: &str) -> &str {
    market.rsplit('-').next().unwrap_or(market)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_market_prefixes_krw() {
        assert_eq!(normalize_market("btc"), "KRW-BTC");
        assert_eq!(normalize_market(" eth "), "KRW-ETH");
        assert_eq!(normalize_market("KRW-SOL"), "KRW-SOL");
        assert_eq!(normalize_market("usdt-btc"), "USDT-BTC");
    }

    #[test]
    fn symbol_of_strips_quote_currency() {
        assert_eq!(symbol_of("KRW-BTC"), "BTC");
        assert_eq!(symbol_of("BTC"), "BTC");
    }
}
