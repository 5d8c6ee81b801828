//! Library entrypoint for coinsentry.
//!
//! This file exists mainly to make integration tests easy (tests under
//! `tests/` can import the app state, the store, the alert engine and the
//! conversation handler).

pub mod config;
pub mod error;
pub mod models;

pub mod services;

#[path = "views/render.rs"]
pub mod render;

use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub settings: config::Settings,
    pub store: Arc<services::store::WatchStore>,
    pub upbit: services::upbit::UpbitClient,
    pub telegram: services::telegram::TelegramClient,
}
