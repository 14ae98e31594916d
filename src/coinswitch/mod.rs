pub mod builder;
pub mod codec;
pub mod rest;
pub mod stream;
pub mod types;

pub use builder::{build_account_stream_client, build_rest_client, build_stream_client};
pub use codec::{SocketIoCodec, SocketIoPacket};
pub use rest::CoinSwitchRestClient;
pub use stream::{StopHandle, StreamClient, StreamConfig};
pub use types::{
    AddMarginRequest, CancelAllRequest, CancelOrderRequest, CreateOrderRequest, LeverageRequest,
    OrderListQuery,
};

pub const EXCHANGE_NAME: &str = "coinswitch";

/// Futures venue identifier sent with every trading call
pub const EXCHANGE: &str = "EXCHANGE_2";

pub const BASE_URL: &str = "https://coinswitch.co";

pub const STREAM_BASE_URL: &str = "wss://ws.coinswitch.co";
/// Socket.IO handshake path of the futures rate socket
pub const SOCKET_PATH: &str = "/pro/realtime-rates-socket/futures/exchange_2";
pub const NAMESPACE: &str = "/exchange_2";

/// Socket.IO event names of the futures rate socket
pub mod events {
    pub const ORDER_BOOK: &str = "FETCH_ORDER_BOOK_CS_PRO";
    pub const TICKER_INFO: &str = "FETCH_TICKER_INFO_CS_PRO";
    pub const TRADES: &str = "FETCH_TRADES_CS_PRO";
    /// Pair is `SYMBOL_<minutes>`, e.g. `BTCUSDT_5`
    pub const CANDLESTICK: &str = "FETCH_CANDLESTICK_CS_PRO";

    /// Candle subscriptions take the interval in the pair name
    pub fn candle_pair(symbol: &str, interval_minutes: u32) -> String {
        format!("{}_{}", symbol, interval_minutes)
    }
}

/// REST endpoints, relative to [`BASE_URL`]
pub mod endpoints {
    pub const PING: &str = "/trade/api/v2/ping";
    pub const VALIDATE_KEYS: &str = "/trade/api/v2/validate/keys";
    pub const ORDER_BOOK: &str = "/trade/api/v2/futures/order_book";
    pub const TRADES: &str = "/trade/api/v2/futures/trades";
    pub const KLINES: &str = "/trade/api/v2/futures/klines";
    pub const INSTRUMENT_INFO: &str = "/trade/api/v2/futures/instrument_info";
    pub const ORDER: &str = "/trade/api/v2/futures/order";
    pub const OPEN_ORDERS: &str = "/trade/api/v2/futures/orders/open";
    pub const CLOSED_ORDERS: &str = "/trade/api/v2/futures/orders/closed";
    pub const LEVERAGE: &str = "/trade/api/v2/futures/leverage";
    pub const POSITIONS: &str = "/trade/api/v2/futures/positions";
    pub const TRANSACTIONS: &str = "/trade/api/v2/futures/transactions";
    pub const ADD_MARGIN: &str = "/trade/api/v2/futures/add_margin";
    pub const CANCEL_ALL: &str = "/trade/api/v2/futures/cancel_all";
    pub const WALLET_BALANCE: &str = "/trade/api/v2/futures/wallet_balance";
    pub const TICKER: &str = "/trade/api/v2/futures/ticker";
    pub const ALL_PAIRS_TICKER: &str = "/trade/api/v2/futures/all-pairs/ticker";
    pub const LISTEN_KEY: &str = "/trade/api/v2/user/listenKey";
}
