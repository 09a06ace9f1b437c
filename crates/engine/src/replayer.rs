use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use uuid::Uuid;

use common::{Clock, FrozenClock, Market, Result};
use strategy::Strategy;

use crate::runner::step;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaySummary {
    pub ticks: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Replays a strategy over history on a frozen clock.
///
/// Stepping is identical to [`crate::StrategyRunner`]; only the wait differs:
/// the clock is advanced instead of slept on, and the loop ends once the
/// clock reaches `end`.
pub struct StrategyReplayer {
    run_id: Uuid,
    strategy: Box<dyn Strategy>,
    markets: Vec<Arc<dyn Market>>,
    clock: Arc<FrozenClock>,
    end: DateTime<Utc>,
}

impl StrategyReplayer {
    pub fn new(
        run_id: Uuid,
        strategy: Box<dyn Strategy>,
        markets: Vec<Arc<dyn Market>>,
        clock: Arc<FrozenClock>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            strategy,
            markets,
            clock,
            end,
        }
    }

    pub async fn run(mut self) -> Result<ReplaySummary> {
        let delta = Duration::seconds(self.strategy.seconds_delay_between_ticks().max(1));
        let started_at = self.clock.now();
        info!(
            run_id = %self.run_id,
            strategy = %self.strategy.name(),
            since = %started_at,
            till = %self.end,
            "Replay started"
        );

        let mut ticks = 0;
        while self.clock.now() < self.end {
            step(self.run_id, self.strategy.as_mut(), &self.markets).await?;
            ticks += 1;
            self.clock.advance(delta);
        }

        let summary = ReplaySummary {
            ticks,
            started_at,
            finished_at: self.clock.now(),
        };
        info!(run_id = %self.run_id, ticks = summary.ticks, "Replay finished");
        Ok(summary)
    }
}
