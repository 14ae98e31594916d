use crate::core::errors::ExchangeError;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// HTTP methods accepted by the signed request pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Delete,
}

impl HttpMethod {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// One REST call: method, server-relative path, ordered query params and an optional JSON body.
///
/// Query params are only emitted for GET. They are joined as `k=v&k=v` in the
/// order they were added, without encoding; the server recomputes the signature
/// over the decoded form, see [`RequestDescriptor::signing_path`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Delete, path).with_body(body)
    }

    /// Append a query parameter, keeping insertion order
    pub fn param(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter only when a value is present
    pub fn param_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(key, value),
            None => self,
        }
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path as sent on the wire: `path?k=v&k=v` for GET with params, `path` otherwise
    pub fn request_path(&self) -> String {
        if self.method != HttpMethod::Get || self.params.is_empty() {
            return self.path.clone();
        }

        let query = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }

    /// Path the signature is computed over: `+` becomes a space, then percent-decoding.
    /// Plain paths without params are signed verbatim.
    pub fn signing_path(&self) -> String {
        let raw = self.request_path();
        if self.method != HttpMethod::Get || self.params.is_empty() {
            return raw;
        }

        let spaced = raw.replace('+', " ");
        match urlencoding::decode(&spaced) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => {
                let bytes = urlencoding::decode_binary(spaced.as_bytes());
                String::from_utf8_lossy(&bytes).into_owned()
            }
        }
    }

    /// Serialized body, empty when the request carries none
    pub fn body_bytes(&self) -> Result<Vec<u8>, ExchangeError> {
        match &self.body {
            Some(body) => serde_json::to_vec(body).map_err(|e| {
                ExchangeError::SerializationError(format!("Failed to serialize request body: {}", e))
            }),
            None => Ok(Vec::new()),
        }
    }
}

/// Outcome of a request the server answered successfully or with 429
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResponse {
    Data(Value),
    RateLimited { body: String },
}

impl ApiResponse {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Data(value) => Some(value),
            Self::RateLimited { .. } => None,
        }
    }

    /// Treat a rate-limit answer as an error
    pub fn into_result(self) -> Result<Value, ExchangeError> {
        match self {
            Self::Data(value) => Ok(value),
            Self::RateLimited { body } => Err(ExchangeError::RateLimited(body)),
        }
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T, ExchangeError> {
        let value = self.into_result()?;
        serde_json::from_value(value).map_err(|e| {
            ExchangeError::DeserializationError(format!("Failed to deserialize JSON: {}", e))
        })
    }
}

impl fmt::Display for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data(value) => write!(f, "{}", value),
            Self::RateLimited { body } => write!(f, "rate limited: {}", body),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopMarket,
    TakeProfitMarket,
}

/// A stream subscription: the Socket.IO event name plus the pair argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub event: String,
    pub pair: String,
}

impl Subscription {
    pub fn new(event: impl Into<String>, pair: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            pair: pair.into(),
        }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.event, self.pair)
    }
}

/// Connection state of the streaming client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    Connected,
    Stopped,
}

/// Market data handed to a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    pub symbol: String,
    /// Candle closes, oldest first
    pub closes: Vec<Decimal>,
}

impl MarketSnapshot {
    pub fn last_close(&self) -> Option<Decimal> {
        self.closes.last().copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSignal {
    pub side: OrderSide,
    pub symbol: String,
    pub quantity: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_path_keeps_param_order() {
        let request = RequestDescriptor::get("/trade/api/v2/futures/klines")
            .param("symbol", "BTCUSDT")
            .param("interval", 15)
            .param("exchange", "EXCHANGE_2");

        assert_eq!(
            request.request_path(),
            "/trade/api/v2/futures/klines?symbol=BTCUSDT&interval=15&exchange=EXCHANGE_2"
        );
    }

    #[test]
    fn test_signing_path_is_decoded() {
        let request = RequestDescriptor::get("/trade/api/v2/futures/order").param("order_id", "abc");
        assert_eq!(
            request.signing_path(),
            "/trade/api/v2/futures/order?order_id=abc"
        );

        let encoded = RequestDescriptor::get("/trade/api/v2/futures/trades")
            .param("symbol", "btc%2Fusdt")
            .param("note", "a+b");
        assert_eq!(
            encoded.request_path(),
            "/trade/api/v2/futures/trades?symbol=btc%2Fusdt&note=a+b"
        );
        assert_eq!(
            encoded.signing_path(),
            "/trade/api/v2/futures/trades?symbol=btc/usdt&note=a b"
        );
    }

    #[test]
    fn test_params_ignored_outside_get() {
        let request = RequestDescriptor::post("/trade/api/v2/futures/order", json!({}))
            .param("ignored", "1");
        assert_eq!(request.request_path(), "/trade/api/v2/futures/order");
        assert_eq!(request.signing_path(), "/trade/api/v2/futures/order");
    }

    #[test]
    fn test_param_opt_skips_none() {
        let request = RequestDescriptor::get("/p")
            .param_opt("limit", Some(5))
            .param_opt::<u32>("from_time", None);
        assert_eq!(request.request_path(), "/p?limit=5");
    }

    #[test]
    fn test_body_bytes() {
        let request = RequestDescriptor::get("/p");
        assert!(request.body_bytes().unwrap().is_empty());

        let request = RequestDescriptor::post("/p", json!({"b": 1, "a": 2}));
        assert_eq!(request.body_bytes().unwrap(), br#"{"b":1,"a":2}"#.to_vec());
    }

    #[test]
    fn test_api_response_rate_limited() {
        let response = ApiResponse::RateLimited {
            body: "slow down".to_string(),
        };
        assert!(response.is_rate_limited());
        assert!(response.data().is_none());
        assert!(response.into_result().unwrap_err().is_rate_limited());
    }

    #[test]
    fn test_api_response_into_typed() {
        #[derive(Deserialize)]
        struct Balance {
            balance: u64,
        }

        let response = ApiResponse::Data(json!({"balance": 1000}));
        let balance: Balance = response.into_typed().unwrap();
        assert_eq!(balance.balance, 1000);
    }

    #[test]
    fn test_order_enums_wire_format() {
        assert_eq!(serde_json::to_value(OrderSide::Buy).unwrap(), json!("BUY"));
        assert_eq!(
            serde_json::to_value(OrderType::TakeProfitMarket).unwrap(),
            json!("TAKE_PROFIT_MARKET")
        );
    }
}
