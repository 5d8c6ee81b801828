use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

const UPBIT_API: &str = "https://api.upbit.com/v1";

#[derive(Clone)]
pub struct UpbitClient {
    http: Client,
}

impl UpbitClient {
    pub fn new(timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self { http }
    }

    pub async fn ticker(&self, market: &str) -> Result<TickerResponse, String> {
        let url = format!("{UPBIT_API}/ticker");
        let res = self
            .http
            .get(&url)
            .query(&[("markets", market)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(format!("Upbit ticker failed: {status} {body}"));
        }

        let mut items = res
            .json::<Vec<TickerResponse>>()
            .await
            .map_err(|e| e.to_string())?;

        items
            .pop()
            .ok_or_else(|| format!("Upbit returned no ticker for {market}"))
    }

    /// Current trade price for one market.
    pub async fn price(&self, market: &str) -> Result<f64, String> {
        Ok(self.ticker(market).await?.trade_price)
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TickerResponse {
    pub market: String,

    pub trade_price: f64,

    // 24h traded value in KRW; used only for display ordering
    #[serde(default)]
    pub acc_trade_price_24h: f64,

    // signed 24h change rate, e.g. 0.012 for +1.2%
    #[serde(default)]
    pub signed_change_rate: f64,
}
