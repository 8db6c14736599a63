//! Execution gateway.
//!
//! The strategy only talks to an `ExecutionGateway`: it reads positions and
//! available cash once per invocation and submits market orders.
//!
//! # Architecture
//!
//! ```text
//! ExecutionGateway (trait)
//!        |
//!        v
//!   PaperGateway
//!   (simulation)
//! ```

mod order;
mod paper;
mod position;

pub use order::{OrderAck, OrderRequest, OrderSide, OrderSize, OrderStatus, PositionEffect};
pub use paper::{AccountSummary, PaperConfig, PaperGateway};
pub use position::Position;

use thiserror::Error;

/// Errors reported by an execution gateway.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// Order rejected by the gateway
    #[error("Order rejected: {0}")]
    Rejected(String),
    /// Gateway cannot serve requests right now
    #[error("Gateway unavailable: {0}")]
    Unavailable(String),
    /// No quote or listing for the symbol
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("Insufficient funds: required {required:.2}, available {available:.2}")]
    InsufficientFunds { required: f64, available: f64 },
    #[error("Insufficient position in {symbol}: requested {requested}, held {held}")]
    InsufficientPosition {
        symbol: String,
        requested: u64,
        held: u64,
    },
}

/// Order-execution and account interface.
pub trait ExecutionGateway: Send + Sync {
    /// Gateway name (for logs)
    fn name(&self) -> &'static str;

    /// Current positions
    fn positions(&self) -> Result<Vec<Position>, ExecutionError>;

    /// Cash available for new orders
    fn available_cash(&self) -> Result<f64, ExecutionError>;

    /// Submit a market order
    fn submit_market_order(&self, request: &OrderRequest) -> Result<OrderAck, ExecutionError>;
}
