use std::env;

#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub chat_id: String,

    pub default_threshold_pct: f64,

    pub data_file: String,
    pub lock_file: String,

    pub poll_interval_secs: u64,
    pub pending_ttl_secs: i64,
    pub http_timeout_secs: u64,
}

pub fn load() -> Settings {
    // Loads .env if present (no crash if missing)
    dotenvy::dotenv().ok();

    let bot_token = env::var("BOT_TOKEN").unwrap_or_default().trim().to_string();
    let chat_id = env::var("CHAT_ID").unwrap_or_default().trim().to_string();

    let default_threshold_pct = env::var("THRESHOLD_PCT")
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| *v > 0.0)
        .unwrap_or(1.0);

    let data_file = env::var("DATA_FILE").unwrap_or_else(|_| "portfolio.json".to_string());
    let lock_file = env::var("LOCK_FILE").unwrap_or_else(|_| "bot.lock".to_string());

    let poll_interval_secs = env::var("POLL_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(3);

    // An abandoned multi-step command is dropped after this long; 0 disables expiry.
    let pending_ttl_secs = env::var("PENDING_TTL_SECS")
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(3600);

    let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);

    Settings {
        bot_token,
        chat_id,
        default_threshold_pct,
        data_file,
        lock_file,
        poll_interval_secs,
        pending_ttl_secs,
        http_timeout_secs,
    }
}
