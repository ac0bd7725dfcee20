//! Completion barrier between ingestion ticks and the daily rollup.
//!
//! Every ingestion tick registers under the local day it started on. A rollup
//! for day D waits until no tick registered for D + 1 (or earlier) is in
//! flight, then holds the barrier exclusively. A tick that starts just after
//! midnight can still persist an observation stamped before it, so ticks of
//! the following day count too. Ticks that start while a rollup is waiting or
//! running queue behind it instead of being dropped. Nothing is held between
//! ticks.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::NaiveDate;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct BarrierState {
    in_flight: BTreeMap<NaiveDate, usize>,
    rollup_active: bool,
    rollups_waiting: usize,
}

#[derive(Debug, Default)]
pub struct DayBarrier {
    state: Mutex<BarrierState>,
    changed: Notify,
}

/// Held for the duration of one ingestion tick.
#[must_use = "dropping the permit ends the tick immediately"]
pub struct TickPermit<'a> {
    barrier: &'a DayBarrier,
    day: NaiveDate,
}

/// Counts a rollup as waiting until it acquires the barrier or is cancelled.
struct WaitingRollup<'a> {
    barrier: &'a DayBarrier,
}

impl Drop for WaitingRollup<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.barrier.lock();
            state.rollups_waiting = state.rollups_waiting.saturating_sub(1);
        }
        self.barrier.changed.notify_waiters();
    }
}

/// Held for the duration of one rollup.
#[must_use = "dropping the permit ends the rollup immediately"]
pub struct RollupPermit<'a> {
    barrier: &'a DayBarrier,
}

impl DayBarrier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BarrierState> {
        // The state is plain counters; a panic elsewhere cannot leave it half-updated.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an ingestion tick for `day`, waiting while a rollup is waiting or running.
    pub async fn begin_tick(&self, day: NaiveDate) -> TickPermit<'_> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if !state.rollup_active && state.rollups_waiting == 0 {
                    *state.in_flight.entry(day).or_insert(0) += 1;
                    return TickPermit { barrier: self, day };
                }
            }

            tracing::debug!(%day, "Ingestion tick queued behind rollup");
            notified.await;
        }
    }

    /// Wait until no tick for `day + 1` or earlier is in flight, then hold the barrier.
    pub async fn begin_rollup(&self, day: NaiveDate) -> RollupPermit<'_> {
        let horizon = day.succ_opt().unwrap_or(day);
        self.lock().rollups_waiting += 1;
        let _waiting = WaitingRollup { barrier: self };

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                let pending = state.in_flight.range(..=horizon).next().is_some();
                if !state.rollup_active && !pending {
                    state.rollup_active = true;
                    return RollupPermit { barrier: self };
                }
            }

            tracing::debug!(%day, "Rollup waiting for in-flight ingestion");
            notified.await;
        }
    }

    pub fn in_flight(&self, day: NaiveDate) -> usize {
        self.lock().in_flight.get(&day).copied().unwrap_or(0)
    }

    pub fn rollup_active(&self) -> bool {
        self.lock().rollup_active
    }
}

impl Drop for TickPermit<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.barrier.lock();
            if let Some(count) = state.in_flight.get_mut(&self.day) {
                *count -= 1;
                if *count == 0 {
                    state.in_flight.remove(&self.day);
                }
            }
        }
        self.barrier.changed.notify_waiters();
    }
}

impl Drop for RollupPermit<'_> {
    fn drop(&mut self) {
        self.barrier.lock().rollup_active = false;
        self.barrier.changed.notify_waiters();
    }
}
