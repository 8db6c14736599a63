//! Annual rebalance strategy.
//!
//! Once per trading day the strategy decides which day of the year it is:
//! - first session: liquidate every holding
//! - second session: screen the universe and buy the survivors equal-weight
//! - any other day: nothing
//!
//! Flags are tracked per calendar year in `RebalanceState`. A daily
//! invocation works on a copy of the state and commits it only when the
//! invocation succeeds, so a failed day is retried as if it never ran.

mod allocation;
mod state;

pub use allocation::AllocationPlan;
pub use state::{RebalancePhase, RebalanceState};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use graham_common::TradingConfig;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{FundamentalsProvider, TradingCalendar, UniverseQuery};
use crate::error::StrategyError;
use crate::execution::{ExecutionError, ExecutionGateway, OrderAck, OrderRequest};
use crate::screener::{ScreeningEngine, ScreeningParameters, ScreeningRun};

// ============================================================================
// Strategy Settings
// ============================================================================

/// Strategy settings outside the screening thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategySettings {
    /// Exchange whose calendar defines sessions
    pub calendar_exchange: String,
    /// Universe listing request
    pub universe: UniverseQuery,
    /// Fraction of cash split across selections
    pub invest_fraction: f64,
    /// Fraction of cash held back
    pub reserve_fraction: f64,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self::from_config(&TradingConfig::default())
    }
}

impl StrategySettings {
    pub fn from_config(config: &TradingConfig) -> Self {
        Self {
            calendar_exchange: config.calendar_exchange.clone(),
            universe: UniverseQuery {
                market: config.market.clone(),
                security_type: config.security_type.clone(),
                exchanges: config.exchanges.clone(),
            },
            invest_fraction: config.allocation.invest_fraction,
            reserve_fraction: config.allocation.reserve_fraction,
        }
    }
}

// ============================================================================
// Day Action
// ============================================================================

/// An order the strategy submitted and what the gateway answered.
#[derive(Debug, Clone)]
pub struct OrderOutcome {
    pub request: OrderRequest,
    pub result: Result<OrderAck, ExecutionError>,
}

impl OrderOutcome {
    pub fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

/// Why a day produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleReason {
    /// The calendar returned no sessions for the year
    CalendarUnavailable,
    /// Neither the first nor the second session
    NotRebalanceDay,
    /// Today's action already ran this year
    AlreadyProcessed,
    /// Second session reached without a liquidation this year
    LiquidationPending,
}

/// What a daily invocation did.
#[derive(Debug, Clone)]
pub enum DayAction {
    /// Sell orders for every non-empty holding
    Liquidated { orders: Vec<OrderOutcome> },
    /// Screening result and the buys placed for it
    Selected {
        run: ScreeningRun,
        plan: Option<AllocationPlan>,
        orders: Vec<OrderOutcome>,
    },
    Idle(IdleReason),
}

impl DayAction {
    /// Orders submitted today.
    pub fn orders(&self) -> &[OrderOutcome] {
        match self {
            Self::Liquidated { orders } | Self::Selected { orders, .. } => orders,
            Self::Idle(_) => &[],
        }
    }
}

// ============================================================================
// Graham Strategy
// ============================================================================

/// Annually rebalanced Graham defensive strategy.
pub struct GrahamStrategy<C, F, G>
where
    C: TradingCalendar + ?Sized,
    F: FundamentalsProvider + ?Sized,
    G: ExecutionGateway + ?Sized,
{
    calendar: Arc<C>,
    engine: ScreeningEngine<F>,
    gateway: Arc<G>,
    settings: StrategySettings,
    state: RebalanceState,
    frozen_cash: f64,
}

impl<C, F, G> GrahamStrategy<C, F, G>
where
    C: TradingCalendar + ?Sized,
    F: FundamentalsProvider + ?Sized,
    G: ExecutionGateway + ?Sized,
{
    pub fn new(
        calendar: Arc<C>,
        provider: Arc<F>,
        gateway: Arc<G>,
        params: ScreeningParameters,
        settings: StrategySettings,
    ) -> Self {
        let engine = ScreeningEngine::new(provider, params, settings.universe.clone());
        Self {
            calendar,
            engine,
            gateway,
            settings,
            state: RebalanceState::default(),
            frozen_cash: 0.0,
        }
    }

    pub fn state(&self) -> RebalanceState {
        self.state
    }

    /// Cash reserved on the last selection day.
    pub fn frozen_cash(&self) -> f64 {
        self.frozen_cash
    }

    pub fn params(&self) -> &ScreeningParameters {
        self.engine.params()
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    /// Daily entry point.
    ///
    /// On `Err` the rebalance state is exactly what it was before the call.
    pub fn on_trading_day(&mut self, now: NaiveDateTime) -> Result<DayAction, StrategyError> {
        let today = now.date();
        let mut state = self.state.rolled_to(today.year());
        if state != self.state {
            info!(year = today.year(), previous = ?self.state.year, "New year, rebalance state reset");
        }

        let sessions = self.year_sessions(today.year())?;
        let action = if sessions.is_empty() {
            warn!(year = today.year(), exchange = %self.settings.calendar_exchange, "Trading calendar unavailable");
            DayAction::Idle(IdleReason::CalendarUnavailable)
        } else if today == sessions[0] {
            if state.liquidation_done {
                DayAction::Idle(IdleReason::AlreadyProcessed)
            } else {
                let orders = self.liquidate()?;
                state.liquidation_done = true;
                DayAction::Liquidated { orders }
            }
        } else if sessions.len() >= 2 && today == sessions[1] {
            if state.selection_done {
                DayAction::Idle(IdleReason::AlreadyProcessed)
            } else if !state.liquidation_done {
                warn!(date = %today, "Selection day reached before liquidation, skipping selection");
                DayAction::Idle(IdleReason::LiquidationPending)
            } else {
                let (run, plan, orders) = self.select(today)?;
                if let Some(plan) = &plan {
                    self.frozen_cash = plan.frozen_cash;
                }
                state.selection_done = true;
                DayAction::Selected { run, plan, orders }
            }
        } else {
            DayAction::Idle(IdleReason::NotRebalanceDay)
        };

        if state != self.state {
            info!(
                year = ?state.year,
                phase = %state.phase(),
                "Rebalance state updated"
            );
        }
        self.state = state;

        debug!(at = %now, orders = action.orders().len(), "Trading day processed");
        Ok(action)
    }

    fn year_sessions(&self, year: i32) -> Result<Vec<NaiveDate>, StrategyError> {
        let (Some(start), Some(end)) = (
            NaiveDate::from_ymd_opt(year, 1, 1),
            NaiveDate::from_ymd_opt(year, 12, 31),
        ) else {
            return Ok(Vec::new());
        };

        self.calendar
            .trading_sessions(&self.settings.calendar_exchange, start, end)
            .map_err(StrategyError::Calendar)
    }

    /// Sell every non-empty holding in full.
    fn liquidate(&self) -> Result<Vec<OrderOutcome>, StrategyError> {
        let positions = self.gateway.positions().map_err(StrategyError::Account)?;
        info!(positions = positions.len(), gateway = self.gateway.name(), "Liquidating holdings");

        let orders: Vec<OrderOutcome> = positions
            .iter()
            .filter(|p| {
                if p.volume == 0 {
                    debug!(symbol = %p.symbol, "Zero volume, skipping");
                }
                p.volume > 0
            })
            .map(|p| self.submit(OrderRequest::close_volume(&p.symbol, p.volume)))
            .collect();

        Ok(orders)
    }

    /// Screen and buy the survivors equal-weight.
    fn select(
        &self,
        today: NaiveDate,
    ) -> Result<(ScreeningRun, Option<AllocationPlan>, Vec<OrderOutcome>), StrategyError> {
        let run = self.engine.run(today)?;
        if run.results.is_empty() {
            info!(run_id = %run.id, "No security passed screening, nothing to buy");
            return Ok((run, None, Vec::new()));
        }

        let cash = self.gateway.available_cash().map_err(StrategyError::Account)?;
        let plan = AllocationPlan::equal_weight(
            cash,
            run.results.len(),
            self.settings.invest_fraction,
            self.settings.reserve_fraction,
        );

        info!(
            run_id = %run.id,
            selected = plan.count,
            available_cash = cash,
            cash_per_stock = plan.cash_per_stock,
            frozen_cash = plan.frozen_cash,
            "Allocating capital"
        );

        let orders = run
            .results
            .iter()
            .map(|r| self.submit(OrderRequest::open_value(&r.symbol, plan.cash_per_stock)))
            .collect();

        Ok((run, Some(plan), orders))
    }

    fn submit(&self, request: OrderRequest) -> OrderOutcome {
        let result = self.gateway.submit_market_order(&request);
        match &result {
            Ok(ack) => info!(
                order_id = %ack.order_id,
                symbol = %request.symbol,
                side = ?request.side,
                filled_volume = ack.filled_volume,
                "Order submitted"
            ),
            Err(e) => warn!(
                symbol = %request.symbol,
                side = ?request.side,
                error = %e,
                "Order failed"
            ),
        }
        OrderOutcome { request, result }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MarketSnapshot, ProviderError, SnapshotProvider};
    use crate::execution::{OrderSide, OrderStatus, Position};
    use std::sync::Mutex;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate) -> NaiveDateTime {
        d.and_hms_opt(9, 40, 0).unwrap()
    }

    #[derive(Default)]
    struct StubGateway {
        positions: Vec<Position>,
        submitted: Mutex<Vec<OrderRequest>>,
        fail_positions: bool,
    }

    impl ExecutionGateway for StubGateway {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn positions(&self) -> Result<Vec<Position>, ExecutionError> {
            if self.fail_positions {
                return Err(ExecutionError::Unavailable("down".into()));
            }
            Ok(self.positions.clone())
        }

        fn available_cash(&self) -> Result<f64, ExecutionError> {
            Ok(1_000_000.0)
        }

        fn submit_market_order(&self, request: &OrderRequest) -> Result<OrderAck, ExecutionError> {
            self.submitted.lock().unwrap().push(request.clone());
            Ok(OrderAck {
                order_id: "STUB".into(),
                symbol: request.symbol.clone(),
                side: request.side,
                status: OrderStatus::Accepted,
                filled_volume: 0,
                fill_price: None,
                commission: 0.0,
            })
        }
    }

    struct FailingCalendar;

    impl TradingCalendar for FailingCalendar {
        fn trading_sessions(&self, _: &str, _: NaiveDate, _: NaiveDate) -> Result<Vec<NaiveDate>, ProviderError> {
            Err(ProviderError::Network("timeout".into()))
        }
    }

    fn calendar() -> MarketSnapshot {
        MarketSnapshot::default()
            .with_calendar("SHSE", vec![date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 4)])
    }

    fn strategy(
        gateway: StubGateway,
    ) -> GrahamStrategy<SnapshotProvider, SnapshotProvider, StubGateway> {
        let provider = Arc::new(SnapshotProvider::new(calendar()));
        GrahamStrategy::new(
            Arc::clone(&provider),
            provider,
            Arc::new(gateway),
            ScreeningParameters::default(),
            StrategySettings::default(),
        )
    }

    #[test]
    fn test_liquidation_skips_empty_positions() {
        let gateway = StubGateway {
            positions: vec![
                Position::new("SHSE.600000", 1000, 10.0),
                Position::new("SHSE.600001", 0, 10.0),
            ],
            ..Default::default()
        };
        let mut strategy = strategy(gateway);

        let action = strategy.on_trading_day(at(date(2024, 1, 2))).unwrap();
        match &action {
            DayAction::Liquidated { orders } => {
                assert_eq!(orders.len(), 1);
                assert_eq!(orders[0].request.symbol, "SHSE.600000");
                assert_eq!(orders[0].request.side, OrderSide::Sell);
            }
            other => panic!("expected liquidation, got {:?}", other),
        }
        assert_eq!(strategy.state().phase(), RebalancePhase::LiquidationDone);

        // Second call on the same day is a no-op
        let again = strategy.on_trading_day(at(date(2024, 1, 2))).unwrap();
        assert!(matches!(again, DayAction::Idle(IdleReason::AlreadyProcessed)));
        assert_eq!(strategy.gateway().submitted.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_selection_with_empty_universe() {
        let mut strategy = strategy(StubGateway::default());
        strategy.on_trading_day(at(date(2024, 1, 2))).unwrap();

        let action = strategy.on_trading_day(at(date(2024, 1, 3))).unwrap();
        match action {
            DayAction::Selected { run, plan, orders } => {
                assert!(run.results.is_empty());
                assert!(plan.is_none());
                assert!(orders.is_empty());
            }
            other => panic!("expected selection, got {:?}", other),
        }
        assert_eq!(strategy.state().phase(), RebalancePhase::SelectionDone);

        let later = strategy.on_trading_day(at(date(2024, 1, 4))).unwrap();
        assert!(matches!(later, DayAction::Idle(IdleReason::NotRebalanceDay)));
    }

    #[test]
    fn test_selection_requires_liquidation() {
        let mut strategy = strategy(StubGateway::default());
        let action = strategy.on_trading_day(at(date(2024, 1, 3))).unwrap();
        assert!(matches!(action, DayAction::Idle(IdleReason::LiquidationPending)));
        assert_eq!(strategy.state(), RebalanceState::for_year(2024));
    }

    #[test]
    fn test_account_failure_leaves_state() {
        let gateway = StubGateway {
            fail_positions: true,
            ..Default::default()
        };
        let mut strategy = strategy(gateway);

        let err = strategy.on_trading_day(at(date(2024, 1, 2))).unwrap_err();
        assert!(matches!(err, StrategyError::Account(_)));
        assert_eq!(strategy.state(), RebalanceState::default());
    }

    #[test]
    fn test_calendar_failure_and_absence() {
        let provider = Arc::new(SnapshotProvider::new(MarketSnapshot::default()));
        let mut failing = GrahamStrategy::new(
            Arc::new(FailingCalendar),
            Arc::clone(&provider),
            Arc::new(StubGateway::default()),
            ScreeningParameters::default(),
            StrategySettings::default(),
        );
        let err = failing.on_trading_day(at(date(2024, 1, 2))).unwrap_err();
        assert!(matches!(err, StrategyError::Calendar(_)));
        assert_eq!(failing.state(), RebalanceState::default());

        // Snapshot without a calendar behaves as unavailable
        let mut empty = GrahamStrategy::new(
            Arc::clone(&provider),
            provider,
            Arc::new(StubGateway::default()),
            ScreeningParameters::default(),
            StrategySettings::default(),
        );
        let action = empty.on_trading_day(at(date(2024, 1, 2))).unwrap();
        assert!(matches!(action, DayAction::Idle(IdleReason::CalendarUnavailable)));
        assert!(!empty.state().liquidation_done);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = TradingConfig::default();
        config.calendar_exchange = "SZSE".into();
        config.exchanges = vec!["SZSE".into()];
        config.allocation.invest_fraction = 0.9;

        let settings = StrategySettings::from_config(&config);
        assert_eq!(settings.calendar_exchange, "SZSE");
        assert_eq!(settings.universe.exchanges, vec!["SZSE"]);
        assert_eq!(settings.universe.market, "A_SHARE");
        assert!((settings.invest_fraction - 0.9).abs() < 1e-12);
    }
}
