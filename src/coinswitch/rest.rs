use crate::coinswitch::endpoints;
use crate::coinswitch::types::{
    AddMarginRequest, CancelAllRequest, CancelOrderRequest, CreateOrderRequest, LeverageRequest,
    OrderListQuery,
};
use crate::coinswitch::EXCHANGE;
use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{ApiResponse, HttpMethod, RequestDescriptor};
use serde::Serialize;
use serde_json::Value;

/// Thin typed wrapper around `RestClient` for the CoinSwitch PRO futures API.
///
/// One method per endpoint. Every method returns the raw [`ApiResponse`], so a
/// 429 stays visible to the caller.
pub struct CoinSwitchRestClient<R: RestClient> {
    client: R,
}

fn to_body<T: Serialize>(request: &T) -> Result<Value, ExchangeError> {
    serde_json::to_value(request).map_err(|e| {
        ExchangeError::SerializationError(format!("Failed to serialize request body: {}", e))
    })
}

impl<R: RestClient> CoinSwitchRestClient<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    /// Access the underlying signed executor
    pub fn inner(&self) -> &R {
        &self.client
    }

    pub async fn ping(&self) -> Result<ApiResponse, ExchangeError> {
        self.client
            .execute(&RequestDescriptor::get(endpoints::PING))
            .await
    }

    pub async fn validate_keys(&self) -> Result<ApiResponse, ExchangeError> {
        self.client
            .execute(&RequestDescriptor::get(endpoints::VALIDATE_KEYS))
            .await
    }

    // Market data

    pub async fn get_order_book(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::ORDER_BOOK)
            .param("symbol", symbol)
            .param("exchange", EXCHANGE);
        self.client.execute(&request).await
    }

    pub async fn get_trades(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::TRADES)
            .param("symbol", symbol)
            .param("exchange", EXCHANGE);
        self.client.execute(&request).await
    }

    /// Get candlesticks for a symbol
    ///
    /// # Arguments
    /// * `interval` - Candle width in minutes
    /// * `start_time` / `end_time` - Epoch milliseconds
    pub async fn get_candlesticks(
        &self,
        symbol: &str,
        interval: u32,
        limit: Option<u32>,
        start_time: Option<u64>,
        end_time: Option<u64>,
    ) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::KLINES)
            .param("symbol", symbol)
            .param("interval", interval)
            .param("exchange", EXCHANGE)
            .param_opt("start_time", start_time)
            .param_opt("end_time", end_time)
            .param_opt("limit", limit);
        self.client.execute(&request).await
    }

    pub async fn get_instrument_info(&self) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::INSTRUMENT_INFO).param("exchange", EXCHANGE);
        self.client.execute(&request).await
    }

    pub async fn get_ticker(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::TICKER)
            .param("symbol", symbol)
            .param("exchange", EXCHANGE);
        self.client.execute(&request).await
    }

    pub async fn get_all_pairs_ticker(&self) -> Result<ApiResponse, ExchangeError> {
        let request =
            RequestDescriptor::get(endpoints::ALL_PAIRS_TICKER).param("exchange", EXCHANGE);
        self.client.execute(&request).await
    }

    // Orders

    pub async fn create_order(
        &self,
        order: &CreateOrderRequest,
    ) -> Result<ApiResponse, ExchangeError> {
        self.client
            .post(endpoints::ORDER, to_body(order)?)
            .await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<ApiResponse, ExchangeError> {
        let body = to_body(&CancelOrderRequest::new(order_id))?;
        self.client.delete(endpoints::ORDER, body).await
    }

    pub async fn get_order(&self, order_id: &str) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::ORDER).param("order_id", order_id);
        self.client.execute(&request).await
    }

    pub async fn get_open_orders(
        &self,
        query: &OrderListQuery,
    ) -> Result<ApiResponse, ExchangeError> {
        self.client
            .post(endpoints::OPEN_ORDERS, to_body(query)?)
            .await
    }

    pub async fn get_closed_orders(
        &self,
        query: &OrderListQuery,
    ) -> Result<ApiResponse, ExchangeError> {
        self.client
            .post(endpoints::CLOSED_ORDERS, to_body(query)?)
            .await
    }

    pub async fn cancel_all(&self, request: &CancelAllRequest) -> Result<ApiResponse, ExchangeError> {
        self.client
            .post(endpoints::CANCEL_ALL, to_body(request)?)
            .await
    }

    // Account

    pub async fn get_leverage(&self, symbol: &str) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::LEVERAGE)
            .param("exchange", EXCHANGE)
            .param("symbol", symbol);
        self.client.execute(&request).await
    }

    pub async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
    ) -> Result<ApiResponse, ExchangeError> {
        let body = to_body(&LeverageRequest::new(symbol, leverage))?;
        self.client.post(endpoints::LEVERAGE, body).await
    }

    pub async fn get_positions(&self, symbol: Option<&str>) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::POSITIONS)
            .param("exchange", EXCHANGE)
            .param_opt("symbol", symbol);
        self.client.execute(&request).await
    }

    pub async fn get_transactions(
        &self,
        symbol: Option<&str>,
        limit: Option<u32>,
    ) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::TRANSACTIONS)
            .param("exchange", EXCHANGE)
            .param_opt("symbol", symbol)
            .param_opt("limit", limit);
        self.client.execute(&request).await
    }

    pub async fn add_margin(&self, request: &AddMarginRequest) -> Result<ApiResponse, ExchangeError> {
        self.client
            .post(endpoints::ADD_MARGIN, to_body(request)?)
            .await
    }

    pub async fn get_wallet_balance(&self) -> Result<ApiResponse, ExchangeError> {
        let request = RequestDescriptor::get(endpoints::WALLET_BALANCE).param("exchange", EXCHANGE);
        self.client.execute(&request).await
    }

    /// Fetch a fresh listen key for a private stream session
    pub async fn create_listen_key(&self) -> Result<ApiResponse, ExchangeError> {
        self.client
            .execute(&RequestDescriptor::new(HttpMethod::Post, endpoints::LISTEN_KEY))
            .await
    }
}
