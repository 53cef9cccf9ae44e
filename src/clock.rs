//! Injectable calendar clock.
//!
//! Due-date defaulting and status derivation depend on "today"; tests pin it
//! with [`FixedClock`].

use chrono::{Local, NaiveDate};

pub trait Clock: Send + Sync {
    /// Current calendar date in the host's local timezone.
    fn today(&self) -> NaiveDate;
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Clock pinned to a fixed date.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
