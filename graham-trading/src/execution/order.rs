//! Order types.

use serde::{Deserialize, Serialize};

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Whether an order opens or closes a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionEffect {
    Open,
    Close,
}

/// Order size, either shares or notional value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderSize {
    /// Number of shares
    Volume(u64),
    /// Notional value in cash
    Value(f64),
}

/// A market order request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Symbol
    pub symbol: String,
    /// Order size
    pub size: OrderSize,
    /// Order side
    pub side: OrderSide,
    /// Position effect
    pub effect: PositionEffect,
}

impl OrderRequest {
    /// Sell `volume` shares to close a position.
    pub fn close_volume(symbol: &str, volume: u64) -> Self {
        Self {
            symbol: symbol.to_string(),
            size: OrderSize::Volume(volume),
            side: OrderSide::Sell,
            effect: PositionEffect::Close,
        }
    }

    /// Buy `value` worth of shares to open a position.
    pub fn open_value(symbol: &str, value: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            size: OrderSize::Value(value),
            side: OrderSide::Buy,
            effect: PositionEffect::Open,
        }
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Order accepted, fill pending
    Accepted,
    /// Order fully filled
    Filled,
}

/// Gateway acknowledgement of a submitted order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Order ID
    pub order_id: String,
    /// Symbol
    pub symbol: String,
    /// Order side
    pub side: OrderSide,
    /// Order status
    pub status: OrderStatus,
    /// Filled volume
    pub filled_volume: u64,
    /// Average fill price (if filled)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_price: Option<f64>,
    /// Commission charged
    pub commission: f64,
}

impl OrderAck {
    /// Filled notional value.
    pub fn filled_value(&self) -> f64 {
        self.fill_price.unwrap_or(0.0) * self.filled_volume as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_constructors() {
        let sell = OrderRequest::close_volume("SHSE.600000", 1200);
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.effect, PositionEffect::Close);
        assert_eq!(sell.size, OrderSize::Volume(1200));

        let buy = OrderRequest::open_value("SHSE.600000", 50_000.0);
        assert_eq!(buy.side, OrderSide::Buy);
        assert_eq!(buy.effect, PositionEffect::Open);
    }

    #[test]
    fn test_order_request_serialization() {
        let request = OrderRequest::open_value("SZSE.000651", 1e5);
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("Value"));

        let parsed: OrderRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_filled_value() {
        let ack = OrderAck {
            order_id: "PAPER-00000001".into(),
            symbol: "SHSE.600000".into(),
            side: OrderSide::Buy,
            status: OrderStatus::Filled,
            filled_volume: 300,
            fill_price: Some(10.0),
            commission: 0.3,
        };
        assert!((ack.filled_value() - 3000.0).abs() < 1e-9);
    }
}
