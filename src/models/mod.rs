pub mod asset;
pub mod interaction;
pub mod state;

pub use asset::WatchedAsset;
pub use interaction::{
    ManageAssetStep, PendingAction, PendingInteraction, SymbolOnlyStep, TriggerStep, ValueFlowStep,
};
pub use state::StateDoc;
