//! Paper execution gateway (simulation).
//!
//! Market orders fill immediately at the session close adjusted by
//! slippage. Buys are rounded down to whole lots; commission is charged on
//! both sides. Positions are marked at the session close when reported.

use chrono::NaiveDate;
use graham_common::TradingConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use crate::data::{FundamentalsProvider, ProviderError};

use super::order::{OrderAck, OrderRequest, OrderSide, OrderSize, OrderStatus, PositionEffect};
use super::position::Position;
use super::{ExecutionError, ExecutionGateway};

/// Paper gateway settings
#[derive(Debug, Clone, PartialEq)]
pub struct PaperConfig {
    /// Starting cash
    pub initial_cash: f64,
    /// Commission (fraction of notional)
    pub commission_ratio: f64,
    /// Slippage (fraction of price)
    pub slippage_ratio: f64,
    /// Board lot size
    pub lot_size: u64,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self::from_trading(&TradingConfig::default())
    }
}

impl PaperConfig {
    pub fn from_trading(config: &TradingConfig) -> Self {
        Self {
            initial_cash: config.initial_cash,
            commission_ratio: config.commission_ratio,
            slippage_ratio: config.slippage_ratio,
            lot_size: config.lot_size.max(1),
        }
    }
}

/// Account totals of the paper book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSummary {
    /// Available cash
    pub cash: f64,
    /// Market value of positions
    pub market_value: f64,
    /// Cash plus market value
    pub total_assets: f64,
    /// Unrealized P&L
    pub floating_pnl: f64,
    /// Realized P&L since start (net of sell commission)
    pub realized_pnl: f64,
    /// Commission paid since start
    pub commission_paid: f64,
    /// Number of open positions
    pub position_count: usize,
}

struct Book {
    cash: f64,
    positions: BTreeMap<String, Position>,
    session: Option<NaiveDate>,
    order_counter: u64,
    realized_pnl: f64,
    commission_paid: f64,
}

/// Paper trading gateway backed by a quote source.
pub struct PaperGateway<Q: FundamentalsProvider + ?Sized> {
    quotes: Arc<Q>,
    config: PaperConfig,
    book: Mutex<Book>,
}

impl<Q: FundamentalsProvider + ?Sized> PaperGateway<Q> {
    pub fn new(quotes: Arc<Q>, config: PaperConfig) -> Self {
        let book = Book {
            cash: config.initial_cash,
            positions: BTreeMap::new(),
            session: None,
            order_counter: 0,
            realized_pnl: 0.0,
            commission_paid: 0.0,
        };

        Self {
            quotes,
            config,
            book: Mutex::new(book),
        }
    }

    fn book(&self) -> Result<MutexGuard<'_, Book>, ExecutionError> {
        self.book
            .lock()
            .map_err(|_| ExecutionError::Unavailable("paper book lock poisoned".into()))
    }

    /// Set the session used for fills and marks.
    pub fn set_session(&self, date: NaiveDate) -> Result<(), ExecutionError> {
        self.book()?.session = Some(date);
        Ok(())
    }

    /// Current session, if set.
    pub fn session(&self) -> Option<NaiveDate> {
        self.book().ok().and_then(|b| b.session)
    }

    /// Account totals with positions marked at the session close.
    pub fn account(&self) -> Result<AccountSummary, ExecutionError> {
        let positions = self.positions()?;
        let book = self.book()?;
        let market_value: f64 = positions.iter().map(|p| p.market_value).sum();

        Ok(AccountSummary {
            cash: book.cash,
            market_value,
            total_assets: book.cash + market_value,
            floating_pnl: positions.iter().map(|p| p.floating_pnl).sum(),
            realized_pnl: book.realized_pnl,
            commission_paid: book.commission_paid,
            position_count: positions.len(),
        })
    }

    fn quote(&self, symbol: &str, session: NaiveDate) -> Result<f64, ExecutionError> {
        let price = self.quotes.close_price(symbol, session).map_err(|e| match e {
            ProviderError::DataNotAvailable(_) => ExecutionError::UnknownSymbol(symbol.to_string()),
            other => ExecutionError::Unavailable(other.to_string()),
        })?;
        if !(price > 0.0) || !price.is_finite() {
            return Err(ExecutionError::Rejected(format!("invalid quote {} for {}", price, symbol)));
        }
        Ok(price)
    }

    fn fill_buy(
        &self,
        book: &mut Book,
        request: &OrderRequest,
        quote: f64,
    ) -> Result<(u64, f64, f64), ExecutionError> {
        let price = quote * (1.0 + self.config.slippage_ratio);
        let lot = self.config.lot_size;

        let raw_volume = match request.size {
            OrderSize::Volume(v) => v,
            OrderSize::Value(value) => {
                if !(value > 0.0) {
                    return Err(ExecutionError::Rejected(format!("invalid order value {}", value)));
                }
                (value / price).floor() as u64
            }
        };
        let volume = raw_volume / lot * lot;
        if volume == 0 {
            return Err(ExecutionError::Rejected(format!(
                "{} order below one lot of {} shares",
                request.symbol, lot
            )));
        }

        let notional = price * volume as f64;
        let commission = notional * self.config.commission_ratio;
        let required = notional + commission;
        if required > book.cash {
            return Err(ExecutionError::InsufficientFunds {
                required,
                available: book.cash,
            });
        }

        book.cash -= required;
        book.positions
            .entry(request.symbol.clone())
            .and_modify(|p| p.add(volume, price))
            .or_insert_with(|| Position::new(&request.symbol, volume, price));

        Ok((volume, price, commission))
    }

    fn fill_sell(
        &self,
        book: &mut Book,
        request: &OrderRequest,
        quote: f64,
    ) -> Result<(u64, f64, f64), ExecutionError> {
        let price = quote * (1.0 - self.config.slippage_ratio);
        let held = book.positions.get(&request.symbol).map_or(0, |p| p.volume);

        let volume = match request.size {
            OrderSize::Volume(v) => v,
            OrderSize::Value(value) => (value / price).floor() as u64,
        };
        if volume == 0 {
            return Err(ExecutionError::Rejected(format!("{} sell of zero shares", request.symbol)));
        }
        if volume > held {
            return Err(ExecutionError::InsufficientPosition {
                symbol: request.symbol.clone(),
                requested: volume,
                held,
            });
        }

        let notional = price * volume as f64;
        let commission = notional * self.config.commission_ratio;

        if let Some(position) = book.positions.get_mut(&request.symbol) {
            book.realized_pnl += (price - position.cost) * volume as f64 - commission;
            position.volume -= volume;
            if position.volume == 0 {
                book.positions.remove(&request.symbol);
            }
        }
        book.cash += notional - commission;

        Ok((volume, price, commission))
    }
}

impl<Q: FundamentalsProvider + ?Sized> ExecutionGateway for PaperGateway<Q> {
    fn name(&self) -> &'static str {
        "paper"
    }

    fn positions(&self) -> Result<Vec<Position>, ExecutionError> {
        let book = self.book()?;
        let mut positions: Vec<Position> = book.positions.values().cloned().collect();

        if let Some(session) = book.session {
            for position in &mut positions {
                match self.quotes.close_price(&position.symbol, session) {
                    Ok(price) => position.mark(price),
                    Err(e) => debug!(symbol = %position.symbol, error = %e, "No quote, keeping last mark"),
                }
            }
        }

        Ok(positions)
    }

    fn available_cash(&self) -> Result<f64, ExecutionError> {
        Ok(self.book()?.cash)
    }

    fn submit_market_order(&self, request: &OrderRequest) -> Result<OrderAck, ExecutionError> {
        let mut book = self.book()?;
        let session = book
            .session
            .ok_or_else(|| ExecutionError::Unavailable("no trading session set".into()))?;

        match (request.side, request.effect) {
            (OrderSide::Buy, PositionEffect::Open) | (OrderSide::Sell, PositionEffect::Close) => {}
            (side, effect) => {
                return Err(ExecutionError::Rejected(format!(
                    "{:?}/{:?} not supported by paper gateway",
                    side, effect
                )));
            }
        }

        let quote = self.quote(&request.symbol, session)?;
        let (volume, price, commission) = match request.side {
            OrderSide::Buy => self.fill_buy(&mut book, request, quote)?,
            OrderSide::Sell => self.fill_sell(&mut book, request, quote)?,
        };

        book.order_counter += 1;
        book.commission_paid += commission;
        let order_id = format!("PAPER-{:08}", book.order_counter);

        info!(
            gateway = "paper",
            order_id = %order_id,
            side = ?request.side,
            symbol = %request.symbol,
            volume,
            price,
            commission,
            cash = book.cash,
            "Paper order filled"
        );

        Ok(OrderAck {
            order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            status: OrderStatus::Filled,
            filled_volume: volume,
            fill_price: Some(price),
            commission,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
