use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{PendingInteraction, WatchedAsset};

/// The whole persisted document. Missing fields are back-filled with
/// defaults on load so older files keep working.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDoc {
    #[serde(default)]
    pub assets: BTreeMap<String, WatchedAsset>,

    #[serde(default)]
    pub default_threshold_pct: f64,

    // Pending multi-step interactions, keyed by chat id.
    #[serde(default)]
    pub pending: BTreeMap<String, PendingInteraction>,
}

impl StateDoc {
    /// Creates the asset if missing; re-adding an existing market is a no-op
    /// that returns the existing record.
    pub fn ensure_asset(&mut self, market: &str) -> &mut WatchedAsset {
        self.assets.entry(market.to_string()).or_default()
    }

    /// Per-asset threshold override when set and positive, else the global
    /// default.
    pub fn effective_threshold(&self, asset: &WatchedAsset) -> f64 {
        asset.effective_threshold(self.default_threshold_pct)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_asset_is_idempotent() {
        let mut doc = StateDoc::default();
        doc.ensure_asset("KRW-BTC").avg_price = 123.0;
        doc.ensure_asset("KRW-BTC");
        assert_eq!(doc.assets["KRW-BTC"].avg_price, 123.0);
        assert_eq!(doc.assets.len(), 1);
    }

    #[test]
    fn effective_threshold_falls_back_to_default() {
        let mut doc = StateDoc {
            default_threshold_pct: 1.0,
            ..Default::default()
        };
        doc.ensure_asset("KRW-BTC");
        let a = doc.assets["KRW-BTC"].clone();
        assert_eq!(doc.effective_threshold(&a), 1.0);

        doc.ensure_asset("KRW-BTC").threshold_pct = Some(2.5);
        let a = doc.assets["KRW-BTC"].clone();
        assert_eq!(doc.effective_threshold(&a), 2.5);

        // a non-positive override is as good as unset
        doc.ensure_asset("KRW-BTC").threshold_pct = Some(0.0);
        let a = doc.assets["KRW-BTC"].clone();
        assert_eq!(doc.effective_threshold(&a), 1.0);
    }
}
