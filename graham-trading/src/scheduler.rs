//! Daily invocation scheduler.
//!
//! Fires the strategy once per cron tick (default 09:40 on weekdays, local
//! time). Each invocation runs on a blocking thread and completes before
//! the next fire time is computed, so invocations never overlap.
//!
//! # Schedule Configuration
//!
//! ```json
//! {
//!   "trading": {
//!     "schedule_cron": "0 40 9 * * Mon-Fri"
//!   }
//! }
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use cron::Schedule;
use std::future::Future;
use std::str::FromStr;
use tracing::{debug, error, info, warn};

use crate::error::StrategyError;
use crate::strategy::DayAction;

/// Result of one strategy invocation.
pub type DayOutcome = Result<DayAction, StrategyError>;

/// Cron-driven daily scheduler
#[derive(Debug)]
pub struct DailyScheduler {
    expression: String,
    schedule: Schedule,
}

impl DailyScheduler {
    /// Parse a 6-field cron expression (with seconds).
    pub fn new(expression: &str) -> Result<Self> {
        let schedule = Schedule::from_str(expression)
            .with_context(|| format!("Invalid schedule cron: {}", expression))?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First fire time strictly after `after`.
    pub fn next_fire_after<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.after(after).next()
    }

    /// Run `job` on every fire time until `shutdown` resolves.
    ///
    /// The job receives the scheduled local time and is handed back when the
    /// loop ends.
    pub async fn run<J, S>(&self, mut job: J, shutdown: S) -> Result<J>
    where
        J: FnMut(NaiveDateTime) -> DayOutcome + Send + 'static,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(cron = %self.expression, "Scheduler started");

        loop {
            let now = Local::now();
            let Some(next) = self.next_fire_after(&now) else {
                warn!(cron = %self.expression, "No upcoming fire time, stopping");
                return Ok(job);
            };

            let wait = (next - now).to_std().unwrap_or_default();
            info!(next = %next, wait_secs = wait.as_secs(), "Waiting for next invocation");

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Scheduler stopped");
                    return Ok(job);
                }
                _ = tokio::time::sleep(wait) => {}
            }

            let (returned, outcome) = invoke(job, next.naive_local()).await?;
            job = returned;
            log_outcome(&outcome);
        }
    }
}

/// Run one invocation on the blocking pool.
pub async fn invoke<J>(mut job: J, at: NaiveDateTime) -> Result<(J, DayOutcome)>
where
    J: FnMut(NaiveDateTime) -> DayOutcome + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let outcome = job(at);
        (job, outcome)
    })
    .await
    .context("Strategy invocation panicked")
}

/// Log what a daily invocation did.
pub fn log_outcome(outcome: &DayOutcome) {
    match outcome {
        Ok(DayAction::Liquidated { orders }) => info!(
            orders = orders.len(),
            accepted = orders.iter().filter(|o| o.is_accepted()).count(),
            "Liquidation day processed"
        ),
        Ok(DayAction::Selected { run, plan, orders }) => info!(
            run_id = %run.id,
            selected = run.results.len(),
            cash_per_stock = plan.map(|p| p.cash_per_stock),
            orders = orders.len(),
            accepted = orders.iter().filter(|o| o.is_accepted()).count(),
            "Selection day processed"
        ),
        Ok(DayAction::Idle(reason)) => debug!(reason = ?reason, "No action today"),
        Err(e) => error!(error = %e, "Strategy invocation failed, state unchanged"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::IdleReason;
    use chrono::{Datelike, NaiveDate, Timelike, Utc, Weekday};

    #[test]
    fn test_invalid_expression() {
        let err = DailyScheduler::new("every morning").unwrap_err();
        assert!(err.to_string().contains("Invalid schedule cron"));
    }

    #[test]
    fn test_next_fire_skips_weekend() {
        let scheduler = DailyScheduler::new("0 40 9 * * Mon-Fri").unwrap();

        // Friday after the fire time
        let friday = Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap();
        let next = scheduler.next_fire_after(&friday).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!((next.hour(), next.minute()), (9, 40));

        // Same morning before the fire time
        let early = Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap();
        assert_eq!(scheduler.next_fire_after(&early), Some(next));
    }

    #[tokio::test]
    async fn test_invoke_returns_job() {
        let mut calls = Vec::new();
        let job = move |at: NaiveDateTime| -> DayOutcome {
            calls.push(at);
            assert_eq!(calls.len(), 1);
            Ok(DayAction::Idle(IdleReason::NotRebalanceDay))
        };

        let at = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap().and_hms_opt(9, 40, 0).unwrap();
        let (_job, outcome) = invoke(job, at).await.unwrap();
        assert!(matches!(outcome, Ok(DayAction::Idle(IdleReason::NotRebalanceDay))));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let scheduler = DailyScheduler::new("0 40 9 * * Mon-Fri").unwrap();
        let job = |_: NaiveDateTime| -> DayOutcome { Ok(DayAction::Idle(IdleReason::NotRebalanceDay)) };

        let returned = scheduler.run(job, async {}).await;
        assert!(returned.is_ok());
    }

    #[tokio::test]
    async fn test_run_fires_job_until_shutdown() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        // Every second, so the loop fires promptly
        let scheduler = DailyScheduler::new("* * * * * *").unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let mut stop = Some(tx);
        let job = move |_: NaiveDateTime| -> DayOutcome {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            if n == 1 {
                // A failed invocation is logged and the loop keeps going
                return Err(StrategyError::Calendar(crate::data::ProviderError::Network(
                    "timeout".into(),
                )));
            }
            if let Some(tx) = stop.take() {
                let _ = tx.send(());
            }
            Ok(DayAction::Idle(IdleReason::NotRebalanceDay))
        };

        let shutdown = async move {
            let _ = rx.await;
        };
        let returned = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            scheduler.run(job, shutdown),
        )
        .await
        .expect("scheduler did not stop");

        assert!(returned.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
