// ⏰ Scheduler - one cycle now, then one per wall-clock hour boundary
//
//   RunningCycle ──▶ Waiting ──▶ RunningCycle ──▶ Waiting ──▶ ...
//
// There is no terminal state. `run` only returns if a cycle fails.

use crate::error::{EtlError, EtlResult};
use chrono::{Duration as ChronoDuration, DurationRound, Local, NaiveDateTime};
use std::time::Duration;

// ============================================================================
// CLOCK
// ============================================================================

/// Source of local wall time plus a way to wait
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
    fn sleep(&self, duration: Duration);
}

/// Real local time and `thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ============================================================================
// HOUR BOUNDARIES
// ============================================================================

/// First full hour strictly after `now` (14:23:10 → 15:00:00, 15:00:00 → 16:00:00)
pub fn next_hour_boundary(now: NaiveDateTime) -> EtlResult<NaiveDateTime> {
    let hour_start = now
        .duration_trunc(ChronoDuration::hours(1))
        .map_err(|e| EtlError::Schedule(format!("cannot truncate {} to the hour: {}", now, e)))?;

    Ok(hour_start + ChronoDuration::hours(1))
}

/// How long to wait from `now` until the next hour boundary
pub fn wait_until_next_hour(now: NaiveDateTime) -> EtlResult<Duration> {
    let next = next_hour_boundary(now)?;
    (next - now)
        .to_std()
        .map_err(|e| EtlError::Schedule(format!("negative wait until {}: {}", next, e)))
}

// ============================================================================
// STATE MACHINE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    RunningCycle,
    Waiting,
}

pub struct Scheduler<C: Clock> {
    clock: C,
    state: SchedulerState,
    cycles_run: u64,
}

impl<C: Clock> Scheduler<C> {
    /// Starts in `RunningCycle`, so the first cycle runs without waiting
    pub fn new(clock: C) -> Self {
        Scheduler {
            clock,
            state: SchedulerState::RunningCycle,
            cycles_run: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycles_run
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Perform one transition: run a cycle, or sleep until the next hour.
    ///
    /// A failed cycle leaves the state at `RunningCycle`.
    pub fn step<F>(&mut self, cycle: &mut F) -> EtlResult<()>
    where
        F: FnMut(NaiveDateTime) -> EtlResult<()>,
    {
        match self.state {
            SchedulerState::RunningCycle => {
                cycle(self.clock.now())?;
                self.cycles_run += 1;
                self.state = SchedulerState::Waiting;
            }
            SchedulerState::Waiting => {
                let now = self.clock.now();
                let wait = wait_until_next_hour(now)?;
                tracing::debug!("next cycle in {}s", wait.as_secs());
                self.clock.sleep(wait);
                self.state = SchedulerState::RunningCycle;
            }
        }
        Ok(())
    }

    /// Loop forever; only returns with the error of a failed cycle
    pub fn run<F>(&mut self, mut cycle: F) -> EtlResult<()>
    where
        F: FnMut(NaiveDateTime) -> EtlResult<()>,
    {
        loop {
            self.step(&mut cycle)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::cell::{Cell, RefCell};

    /// Clock that jumps forward by exactly the requested sleep
    struct FakeClock {
        now: Cell<NaiveDateTime>,
        sleeps: RefCell<Vec<Duration>>,
    }

    impl FakeClock {
        fn at(now: NaiveDateTime) -> Self {
            FakeClock {
                now: Cell::new(now),
                sleeps: RefCell::new(Vec::new()),
            }
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> NaiveDateTime {
            self.now.get()
        }

        fn sleep(&self, duration: Duration) {
            self.sleeps.borrow_mut().push(duration);
            self.now
                .set(self.now.get() + ChronoDuration::from_std(duration).unwrap());
        }
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 7, 1)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    #[test]
    fn test_next_boundary_and_wait() {
        assert_eq!(next_hour_boundary(time(14, 23, 10)).unwrap(), time(15, 0, 0));
        assert_eq!(
            wait_until_next_hour(time(14, 23, 10)).unwrap(),
            Duration::from_secs(2210)
        );
    }

    #[test]
    fn test_exactly_on_the_hour_waits_full_hour() {
        assert_eq!(next_hour_boundary(time(15, 0, 0)).unwrap(), time(16, 0, 0));
        assert_eq!(
            wait_until_next_hour(time(15, 0, 0)).unwrap(),
            Duration::from_secs(3600)
        );
    }

    #[test]
    fn test_boundary_rolls_over_midnight() {
        let next = next_hour_boundary(time(23, 59, 59)).unwrap();
        assert_eq!(next, NaiveDate::from_ymd_opt(2024, 7, 2).unwrap().and_hms_opt(0, 0, 0).unwrap());
    }

    #[test]
    fn test_first_cycle_runs_immediately_then_on_boundaries() {
        let mut scheduler = Scheduler::new(FakeClock::at(time(14, 23, 10)));
        let mut cycle_times = Vec::new();
        let mut cycle = |now: NaiveDateTime| {
            cycle_times.push(now);
            Ok::<(), EtlError>(())
        };

        // run, wait, run, wait, run
        for _ in 0..5 {
            scheduler.step(&mut cycle).unwrap();
        }

        assert_eq!(cycle_times, vec![time(14, 23, 10), time(15, 0, 0), time(16, 0, 0)]);
        assert_eq!(scheduler.cycles_run(), 3);
        assert_eq!(scheduler.state(), SchedulerState::Waiting);
        assert_eq!(
            *scheduler.clock().sleeps.borrow(),
            vec![Duration::from_secs(2210), Duration::from_secs(3600)]
        );
    }

    #[test]
    fn test_run_stops_on_cycle_error() {
        let mut scheduler = Scheduler::new(FakeClock::at(time(9, 30, 0)));
        let mut calls = 0;

        let result = scheduler.run(|_now| {
            calls += 1;
            if calls == 3 {
                Err(EtlError::Parse("table vanished".to_string()))
            } else {
                Ok(())
            }
        });

        assert!(matches!(result, Err(EtlError::Parse(_))));
        assert_eq!(calls, 3);
        assert_eq!(scheduler.cycles_run(), 2);
        assert_eq!(scheduler.state(), SchedulerState::RunningCycle);
        assert_eq!(scheduler.clock().sleeps.borrow().len(), 2);
    }
}
