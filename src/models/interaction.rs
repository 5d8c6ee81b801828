use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Which multi-step command is in flight, and where it stands. Each command
/// carries its own step enum so an unknown (action, step) pair cannot be
/// represented at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PendingAction {
    ManageAsset { step: ManageAssetStep },
    Price { step: SymbolOnlyStep },
    SetAvg { step: ValueFlowStep },
    SetQty { step: ValueFlowStep },
    SetThreshold { step: ValueFlowStep },
    Trigger { step: TriggerStep },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManageAssetStep {
    Mode,
    AddSymbol,
    RemoveSymbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolOnlyStep {
    Symbol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFlowStep {
    Symbol,
    Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStep {
    Symbol,
    Op,
    Mode,
    Value,
}

/// Persisted state of an in-progress multi-step command for one chat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInteraction {
    #[serde(flatten)]
    pub action: PendingAction,

    // Accumulated partial answers: "symbol", "mode", "op", ...
    #[serde(default)]
    pub data: BTreeMap<String, String>,

    // Epoch seconds of the last step; stale interactions expire lazily.
    #[serde(default)]
    pub updated_at: i64,
}

impl PendingInteraction {
    pub fn new(action: PendingAction) -> Self {
        Self {
            action,
            data: BTreeMap::new(),
            updated_at: Utc::now().timestamp(),
        }
    }

    /// Moves to the next step, keeping accumulated data and refreshing the
    /// staleness clock.
    pub fn advance(mut self, action: PendingAction) -> Self {
        self.action = action;
        self.updated_at = Utc::now().timestamp();
        self
    }

    pub fn is_expired(&self, ttl_secs: i64, now: i64) -> bool {
        ttl_secs > 0 && now - self.updated_at > ttl_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_interaction_round_trips_through_json() {
        let mut p = PendingInteraction::new(PendingAction::Trigger {
            step: TriggerStep::Value,
        });
        p.data.insert("symbol".into(), "KRW-BTC".into());
        p.data.insert("mode".into(), "avg_pct".into());

        let json = serde_json::to_string(&p).unwrap();
        let back: PendingInteraction = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn expiry_is_disabled_when_ttl_is_zero() {
        let p = PendingInteraction {
            action: PendingAction::Price {
                step: SymbolOnlyStep::Symbol,
            },
            data: BTreeMap::new(),
            updated_at: 0,
        };
        assert!(!p.is_expired(0, 1_000_000));
        assert!(p.is_expired(3600, 1_000_000));
    }
}
