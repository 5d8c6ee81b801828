use crate::models::asset::normalize_market;
use crate::AppState;

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub market: String,
    pub existed: bool,
}

/// Starts watching a market. Re-adding an existing one is a no-op that
/// leaves its configuration untouched.
pub async fn add_asset(state: &AppState, symbol: &str) -> Result<AddOutcome, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            let existed = doc.assets.contains_key(&market);
            doc.ensure_asset(&market);
            AddOutcome {
                market: market.clone(),
                existed,
            }
        })
        .await
        .map_err(|e| e.to_string())
}

/// Stops watching a market. Returns the normalized id when something was
/// actually removed.
pub async fn remove_asset(state: &AppState, symbol: &str) -> Result<Option<String>, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| doc.assets.remove(&market).map(|_| market.clone()))
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_avg_price(state: &AppState, symbol: &str, value: f64) -> Result<String, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            doc.ensure_asset(&market).avg_price = value;
            market.clone()
        })
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_qty(state: &AppState, symbol: &str, value: f64) -> Result<String, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            doc.ensure_asset(&market).qty = value;
            market.clone()
        })
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_asset_threshold(
    state: &AppState,
    symbol: &str,
    value: f64,
) -> Result<String, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            doc.ensure_asset(&market).threshold_pct = Some(value);
            market.clone()
        })
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_default_threshold(state: &AppState, value: f64) -> Result<(), String> {
    state
        .store
        .mutate(|doc| doc.default_threshold_pct = value)
        .await
        .map_err(|e| e.to_string())
}

pub async fn add_trigger(state: &AppState, symbol: &str, level: f64) -> Result<String, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            doc.ensure_asset(&market).triggers.push(level);
            market.clone()
        })
        .await
        .map_err(|e| e.to_string())
}

/// Removes every trigger equal to `level` (duplicates collapse by value).
/// Returns how many were dropped.
pub async fn remove_trigger(state: &AppState, symbol: &str, level: f64) -> Result<usize, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            let asset = doc.ensure_asset(&market);
            let before = asset.triggers.len();
            asset.triggers.retain(|&t| t != level);
            before - asset.triggers.len()
        })
        .await
        .map_err(|e| e.to_string())
}

pub async fn clear_triggers(state: &AppState, symbol: &str) -> Result<usize, String> {
    let market = normalize_market(symbol);

    state
        .store
        .mutate(|doc| {
            let asset = doc.ensure_asset(&market);
            let removed = asset.triggers.len();
            asset.triggers.clear();
            removed
        })
        .await
        .map_err(|e| e.to_string())
}

/// Trigger levels for display, duplicates collapsed by value.
pub async fn list_triggers(state: &AppState, symbol: &str) -> Result<Vec<f64>, String> {
    let market = normalize_market(symbol);

    Ok(state
        .store
        .read(|doc| {
            let mut levels = doc
                .assets
                .get(&market)
                .map(|a| a.triggers.clone())
                .unwrap_or_default();
            levels.sort_by(|a, b| a.total_cmp(b));
            levels.dedup();
            levels
        })
        .await)
}

/// Current cost basis for a market, 0.0 when unset or unknown.
pub async fn avg_price_of(state: &AppState, symbol: &str) -> f64 {
    let market = normalize_market(symbol);

    state
        .store
        .read(|doc| doc.assets.get(&market).map(|a| a.avg_price).unwrap_or(0.0))
        .await
}
