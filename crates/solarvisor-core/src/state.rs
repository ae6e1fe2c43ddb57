//! Runtime state owned by the control loop

use chrono::NaiveDate;

/// Counters the control loop carries from tick to tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeState {
    current_day: NaiveDate,
    stops_today: u32,
    tick_count: u64,
}

impl RuntimeState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            current_day: today,
            stops_today: 0,
            tick_count: 0,
        }
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    pub fn stops_today(&self) -> u32 {
        self.stops_today
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Move to `today`, resetting the stop counter if the date changed.
    /// Returns true on rollover.
    pub fn roll_day(&mut self, today: NaiveDate) -> bool {
        if today == self.current_day {
            return false;
        }
        self.current_day = today;
        self.stops_today = 0;
        true
    }

    /// Count a poll. Returns true for the first poll since startup.
    pub fn begin_tick(&mut self) -> bool {
        let first = self.tick_count == 0;
        self.tick_count += 1;
        first
    }

    pub fn record_stop(&mut self) {
        self.stops_today = self.stops_today.saturating_add(1);
    }
}
