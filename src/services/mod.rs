pub mod lock;
pub mod store;
pub mod telegram;
pub mod upbit;

pub mod alert_monitor;
pub mod conversation;
pub mod watch_service;
