use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, warn};

use common::{
    AccountSummary, Candle, CandleSource, Error, ExchangeClient, Fill, Interval, OrderSide,
    Position, PositionSide, Result,
};

const SPOT_URL: &str = "https://api.binance.com";
const FUTURES_URL: &str = "https://fapi.binance.com";
const SPOT_TESTNET_URL: &str = "https://testnet.binance.vision";
const FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

/// REST client for Binance spot market data and USDⓈ-M futures trading.
///
/// Constructed once at startup and injected wherever a `CandleSource` or
/// `ExchangeClient` is needed. Credentials are optional; without them only
/// public endpoints (klines, open interest) work.
pub struct BinanceClient {
    api_key: Option<String>,
    secret: Option<String>,
    spot_url: String,
    futures_url: String,
    http: Client,
}

impl BinanceClient {
    pub fn new(api_key: Option<String>, secret: Option<String>, testnet: bool) -> Result<Self> {
        let (spot_url, futures_url) = if testnet {
            (SPOT_TESTNET_URL, FUTURES_TESTNET_URL)
        } else {
            (SPOT_URL, FUTURES_URL)
        };
        Self::with_base_urls(api_key, secret, spot_url, futures_url)
    }

    pub fn with_base_urls(
        api_key: Option<String>,
        secret: Option<String>,
        spot_url: impl Into<String>,
        futures_url: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Http(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            api_key,
            secret,
            spot_url: spot_url.into(),
            futures_url: futures_url.into(),
            http,
        })
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        match (&self.api_key, &self.secret) {
            (Some(key), Some(secret)) => Ok((key.as_str(), secret.as_str())),
            _ => Err(Error::Config(
                "BINANCE_API_KEY and BINANCE_SECRET are required for account endpoints".into(),
            )),
        }
    }

    fn sign(secret: &str, query: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| Error::Other(format!("invalid HMAC key: {e}")))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    async fn public_get(&self, url: &str) -> Result<String> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_get(&self, path: &str, params: &str) -> Result<String> {
        let (api_key, secret) = self.credentials()?;
        let query = with_timestamp(params);
        let signature = Self::sign(secret, &query)?;
        let url = format!("{}{path}?{query}&signature={signature}", self.futures_url);

        let resp = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }

    async fn signed_post(&self, path: &str, params: &str) -> Result<String> {
        let (api_key, secret) = self.credentials()?;
        let query = with_timestamp(params);
        let signature = Self::sign(secret, &query)?;
        let body = format!("{query}&signature={signature}");
        let url = format!("{}{path}", self.futures_url);

        let resp = self
            .http
            .post(&url)
            .header("X-MBX-APIKEY", api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(Error::Exchange(format!("HTTP {status}: {text}")));
        }
        Ok(text)
    }

    async fn futures_account(&self) -> Result<FuturesAccount> {
        let body = self.signed_get("/fapi/v2/account", "").await?;
        serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))
    }

    async fn market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        quantity: f64,
        reduce_only: bool,
    ) -> Result<Fill> {
        let client_order_id = uuid::Uuid::new_v4().simple().to_string();
        let mut params = format!(
            "symbol={symbol}&side={side}&type=MARKET&quantity={quantity}\
             &newClientOrderId={client_order_id}&newOrderRespType=RESULT"
        );
        if reduce_only {
            params.push_str("&reduceOnly=true");
        }

        debug!(symbol, side = %side, quantity, reduce_only, "Submitting futures order");
        let body = self.signed_post("/fapi/v1/order", &params).await?;
        let resp: OrderResponse =
            serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))?;

        Ok(Fill {
            order_id: resp.client_order_id,
            symbol: symbol.to_string(),
            side,
            price: resp.avg_price.parse().unwrap_or(0.0),
            quantity: resp.executed_qty.parse().unwrap_or(quantity),
            timestamp: Utc::now(),
        })
    }
}

fn with_timestamp(params: &str) -> String {
    let ts = Utc::now().timestamp_millis();
    if params.is_empty() {
        format!("timestamp={ts}")
    } else {
        format!("{params}&timestamp={ts}")
    }
}

#[async_trait]
impl CandleSource for BinanceClient {
    async fn fetch_candles(
        &self,
        symbol: &str,
        interval: Interval,
        window_size: usize,
    ) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/api/v3/klines?symbol={symbol}&interval={interval}&limit={window_size}",
            self.spot_url
        );
        let body = self.public_get(&url).await?;
        let candles = parse_klines(&body)?;
        debug!(symbol, interval = %interval, count = candles.len(), "Klines fetched");
        Ok(candles)
    }
}

#[async_trait]
impl ExchangeClient for BinanceClient {
    async fn account(&self) -> Result<AccountSummary> {
        let account = self.futures_account().await?;
        account.summary()
    }

    async fn open_positions(&self) -> Result<Vec<Position>> {
        let account = self.futures_account().await?;

        let positions = account
            .positions
            .into_iter()
            .filter_map(|p| {
                let amount: f64 = p.position_amt.parse().unwrap_or(0.0);
                if amount == 0.0 {
                    return None;
                }
                Some(Position {
                    symbol: p.symbol,
                    side: if amount > 0.0 { PositionSide::Long } else { PositionSide::Short },
                    quantity: amount.abs(),
                    entry_price: p.entry_price.parse().unwrap_or(0.0),
                    unrealized_pnl: p.unrealized_profit.parse().unwrap_or(0.0),
                    realized_pnl: p.cum_realized_pnl.parse().unwrap_or(0.0),
                    liquidation_price: p.liquidation_price.parse().unwrap_or(0.0),
                })
            })
            .collect();

        Ok(positions)
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64> {
        let end = Utc::now().timestamp_millis();
        let start = end - 5 * 60 * 1000;
        let url = format!(
            "{}/fapi/v1/klines?symbol={symbol}&interval=1m&startTime={start}&endTime={end}&limit=5",
            self.futures_url
        );
        let body = self.public_get(&url).await?;
        let candles = parse_klines(&body)?;

        let last = candles
            .last()
            .ok_or_else(|| Error::Exchange("no candlestick data found".into()))?;
        if last.close <= 0.0 {
            return Err(Error::Exchange("no latest price found".into()));
        }
        Ok(last.close)
    }

    async fn open_position(&self, symbol: &str, side: PositionSide, quantity: f64) -> Result<Fill> {
        let reference_price = self.latest_price(symbol).await?;
        let mut fill = self
            .market_order(symbol, side.opening_side(), quantity, false)
            .await?;
        if fill.price <= 0.0 {
            fill.price = reference_price;
        }
        Ok(fill)
    }

    async fn close_all_positions(&self) -> Result<Vec<Fill>> {
        let positions = self.open_positions().await?;
        let mut fills = Vec::with_capacity(positions.len());
        for position in positions {
            let fill = self
                .market_order(
                    &position.symbol,
                    position.side.closing_side(),
                    position.quantity,
                    true,
                )
                .await?;
            fills.push(fill);
        }
        Ok(fills)
    }

    async fn open_interest(&self, symbol: &str) -> Result<Option<f64>> {
        let url = format!("{}/fapi/v1/openInterest?symbol={symbol}", self.futures_url);
        let body = self.public_get(&url).await?;
        let resp: OpenInterestResponse =
            serde_json::from_str(&body).map_err(|e| Error::Exchange(e.to_string()))?;
        Ok(resp.open_interest.parse().ok())
    }
}

// ─── Kline parsing ────────────────────────────────────────────────────────────

/// Parse Binance's array-of-arrays kline payload into candles (oldest first).
///
/// Array indices: [0] openTime, [1] open, [2] high, [3] low, [4] close,
/// [5] volume, ... Malformed entries are skipped with a warning.
pub fn parse_klines(body: &str) -> Result<Vec<Candle>> {
    let rows: Vec<Vec<serde_json::Value>> = serde_json::from_str(body)?;

    let mut candles = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() < 6 {
            warn!("Skipping malformed kline entry with {} elements", row.len());
            continue;
        }
        candles.push(Candle::new(
            parse_decimal(&row[1])?,
            parse_decimal(&row[2])?,
            parse_decimal(&row[3])?,
            parse_decimal(&row[4])?,
            parse_decimal(&row[5])?,
        ));
    }
    Ok(candles)
}

/// Binance encodes decimals as strings; accept plain numbers too.
fn parse_decimal(value: &serde_json::Value) -> Result<f64> {
    if let Some(s) = value.as_str() {
        return s
            .parse::<f64>()
            .map_err(|e| Error::Exchange(format!("invalid decimal '{s}': {e}")));
    }
    value
        .as_f64()
        .ok_or_else(|| Error::Exchange(format!("expected decimal, got {value}")))
}

// ─── Response types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FuturesAccount {
    #[serde(default)]
    total_wallet_balance: String,
    #[serde(default)]
    available_balance: String,
    #[serde(default)]
    positions: Vec<FuturesPosition>,
}

impl FuturesAccount {
    /// A missing or malformed balance is an error; a zero here would be
    /// recorded as real equity.
    fn summary(&self) -> Result<AccountSummary> {
        Ok(AccountSummary {
            total: parse_balance("totalWalletBalance", &self.total_wallet_balance)?,
            available: parse_balance("availableBalance", &self.available_balance)?,
        })
    }
}

fn parse_balance(field: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|e| Error::Exchange(format!("invalid {field} '{value}': {e}")))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FuturesPosition {
    symbol: String,
    #[serde(default)]
    position_amt: String,
    #[serde(default)]
    entry_price: String,
    #[serde(default)]
    unrealized_profit: String,
    #[serde(default)]
    cum_realized_pnl: String,
    #[serde(default)]
    liquidation_price: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    client_order_id: String,
    #[serde(default)]
    avg_price: String,
    #[serde(default)]
    executed_qty: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OpenInterestResponse {
    open_interest: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_string_encoded_klines() {
        let body = r#"[
            [1499040000000, "0.01634790", "0.80000000", "0.01575800", "0.01577100", "148976.11427815",
             1499644799999, "2434.19055334", 308, "1756.87402397", "28.46694368", "0"],
            [1499040060000, "1.5", "2.5", "1.0", "2.0", "10", 1499040119999, "0", 1, "0", "0", "0"]
        ]"#;
        let candles = parse_klines(body).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].open, 0.0163479);
        assert_eq!(candles[0].volume, 148976.11427815);
        assert_eq!(candles[1], Candle::new(1.5, 2.5, 1.0, 2.0, 10.0));
    }

    #[test]
    fn skips_short_rows() {
        let body = r#"[[1, "1", "1"], [2, "1", "2", "0.5", "1.5", "3"]]"#;
        let candles = parse_klines(body).unwrap();
        assert_eq!(candles, vec![Candle::new(1.0, 2.0, 0.5, 1.5, 3.0)]);
    }

    #[test]
    fn rejects_non_numeric_prices() {
        let body = r#"[[1, "abc", "1", "1", "1", "1"]]"#;
        assert!(matches!(parse_klines(body), Err(Error::Exchange(_))));
    }

    #[test]
    fn rejects_non_array_payload() {
        assert!(matches!(
            parse_klines(r#"{"code": -1121, "msg": "Invalid symbol."}"#),
            Err(Error::Json(_))
        ));
    }

    #[test]
    fn signature_is_hex_hmac_sha256() {
        // Example from the Binance API documentation.
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1\
                     &recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            BinanceClient::sign(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn account_summary_reads_balances() {
        let account: FuturesAccount = serde_json::from_str(
            r#"{"totalWalletBalance": "5012.5", "availableBalance": "4800.25", "positions": []}"#,
        )
        .unwrap();
        let summary = account.summary().unwrap();
        assert_eq!(summary.total, 5012.5);
        assert_eq!(summary.available, 4800.25);
    }

    #[test]
    fn account_summary_rejects_missing_balances() {
        let account: FuturesAccount =
            serde_json::from_str(r#"{"availableBalance": "10", "positions": []}"#).unwrap();
        assert!(matches!(account.summary(), Err(Error::Exchange(_))));

        let account: FuturesAccount =
            serde_json::from_str(r#"{"totalWalletBalance": "10", "availableBalance": "n/a"}"#)
                .unwrap();
        assert!(matches!(account.summary(), Err(Error::Exchange(_))));
    }

    #[tokio::test]
    async fn account_endpoints_require_credentials() {
        let client = BinanceClient::new(None, None, true).unwrap();
        assert!(matches!(client.account().await, Err(Error::Config(_))));
    }
}
