use crate::coinswitch::EXCHANGE;
use crate::core::types::{OrderSide, OrderType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Body of `POST /trade/api/v2/futures/order`.
///
/// Field order is the wire order. Quantities and prices go out as JSON numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub exchange: String,
    pub symbol: String,
    pub side: OrderSide,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub reduce_only: bool,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Decimal>,
    #[serde(
        default,
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub trigger_price: Option<Decimal>,
}

impl CreateOrderRequest {
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        order_type: OrderType,
    ) -> Self {
        Self {
            exchange: EXCHANGE.to_string(),
            symbol: symbol.into(),
            side,
            quantity,
            order_type,
            reduce_only: false,
            price: None,
            trigger_price: None,
        }
    }

    pub fn market(symbol: impl Into<String>, side: OrderSide, quantity: Decimal) -> Self {
        Self::new(symbol, side, quantity, OrderType::Market)
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self::new(symbol, side, quantity, OrderType::Limit).with_price(price)
    }

    pub fn with_price(mut self, price: Decimal) -> Self {
        self.price = Some(price);
        self
    }

    /// Trigger for `STOP_MARKET` and `TAKE_PROFIT_MARKET` orders
    pub fn with_trigger_price(mut self, trigger_price: Decimal) -> Self {
        self.trigger_price = Some(trigger_price);
        self
    }

    pub fn reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = reduce_only;
        self
    }
}

/// Body of `DELETE /trade/api/v2/futures/order`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderRequest {
    pub exchange: String,
    pub order_id: String,
}

impl CancelOrderRequest {
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            exchange: EXCHANGE.to_string(),
            order_id: order_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageRequest {
    pub symbol: String,
    pub exchange: String,
    pub leverage: u32,
}

impl LeverageRequest {
    pub fn new(symbol: impl Into<String>, leverage: u32) -> Self {
        Self {
            symbol: symbol.into(),
            exchange: EXCHANGE.to_string(),
            leverage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddMarginRequest {
    pub exchange: String,
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub margin: Decimal,
}

impl AddMarginRequest {
    pub fn new(symbol: impl Into<String>, margin: Decimal) -> Self {
        Self {
            exchange: EXCHANGE.to_string(),
            symbol: symbol.into(),
            margin,
        }
    }
}

/// Cancels every open order, optionally restricted to one symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAllRequest {
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl CancelAllRequest {
    pub fn new() -> Self {
        Self {
            exchange: EXCHANGE.to_string(),
            symbol: None,
        }
    }

    pub fn for_symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: Some(symbol.into()),
            ..Self::new()
        }
    }
}

impl Default for CancelAllRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter for the open and closed order listings. Times are epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderListQuery {
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl OrderListQuery {
    pub fn new() -> Self {
        Self {
            exchange: EXCHANGE.to_string(),
            symbol: None,
            from_time: None,
            to_time: None,
            limit: None,
        }
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    pub fn time_range(mut self, from_time: u64, to_time: u64) -> Self {
        self.from_time = Some(from_time);
        self.to_time = Some(to_time);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Default for OrderListQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_market_order_body_is_exact() {
        let order = CreateOrderRequest::market(
            "BTCUSDT",
            OrderSide::Buy,
            Decimal::from_str("0.004").unwrap(),
        );
        assert_eq!(
            serde_json::to_string(&order).unwrap(),
            r#"{"exchange":"EXCHANGE_2","symbol":"BTCUSDT","side":"BUY","quantity":0.004,"order_type":"MARKET","reduce_only":false}"#
        );
    }

    #[test]
    fn test_optional_prices_are_numbers() {
        let order = CreateOrderRequest::new(
            "BTCUSDT",
            OrderSide::Sell,
            Decimal::from_str("0.02").unwrap(),
            OrderType::StopMarket,
        )
        .with_trigger_price(Decimal::from(70000))
        .reduce_only(true);

        assert_eq!(
            serde_json::to_string(&order).unwrap(),
            r#"{"exchange":"EXCHANGE_2","symbol":"BTCUSDT","side":"SELL","quantity":0.02,"order_type":"STOP_MARKET","reduce_only":true,"trigger_price":70000.0}"#
        );

        let limit = CreateOrderRequest::limit(
            "BTCUSDT",
            OrderSide::Buy,
            Decimal::from(2),
            Decimal::from(97000),
        );
        let value = serde_json::to_value(&limit).unwrap();
        assert_eq!(value["price"].as_f64(), Some(97000.0));
        assert!(value.get("trigger_price").is_none());
    }

    #[test]
    fn test_cancel_all_omits_missing_symbol() {
        assert_eq!(
            serde_json::to_string(&CancelAllRequest::new()).unwrap(),
            r#"{"exchange":"EXCHANGE_2"}"#
        );
        assert_eq!(
            serde_json::to_string(&CancelAllRequest::for_symbol("ETHUSDT")).unwrap(),
            r#"{"exchange":"EXCHANGE_2","symbol":"ETHUSDT"}"#
        );
    }

    #[test]
    fn test_order_list_query_filters() {
        let query = OrderListQuery::new().symbol("BTCUSDT").limit(20);
        assert_eq!(
            serde_json::to_string(&query).unwrap(),
            r#"{"exchange":"EXCHANGE_2","symbol":"BTCUSDT","limit":20}"#
        );
    }

    #[test]
    fn test_leverage_and_margin_bodies() {
        assert_eq!(
            serde_json::to_string(&LeverageRequest::new("ETHUSDT", 10)).unwrap(),
            r#"{"symbol":"ETHUSDT","exchange":"EXCHANGE_2","leverage":10}"#
        );
        let margin = serde_json::to_value(AddMarginRequest::new(
            "1000PEPEUSDT",
            Decimal::from(20),
        ))
        .unwrap();
        assert_eq!(margin["margin"].as_f64(), Some(20.0));
    }
}
