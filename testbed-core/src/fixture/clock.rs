//! Clock abstraction with a frozen implementation for tests.

use crate::error::{Result, TestbedError};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Source of the current time.
pub trait ClockProvider: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock reading the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl ClockProvider for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that always returns the same instant until moved with [`FrozenClock::set`].
///
/// # Example
///
/// ```
/// use testbed_core::fixture::{ClockProvider, FrozenClock};
///
/// let clock = FrozenClock::parse("2024-01-15T10:30:00Z").unwrap();
/// assert_eq!(clock.now(), clock.now());
/// assert_eq!(clock.now().timestamp(), 1_705_314_600);
/// ```
#[derive(Debug)]
pub struct FrozenClock {
    frozen: RwLock<DateTime<Utc>>,
}

impl FrozenClock {
    /// Freeze at `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            frozen: RwLock::new(at),
        }
    }

    /// Freeze at the current system time.
    pub fn at_now() -> Self {
        Self::new(Utc::now())
    }

    /// Freeze at an RFC 3339 timestamp.
    pub fn parse(rfc3339: &str) -> Result<Self> {
        let at = DateTime::parse_from_rfc3339(rfc3339).map_err(|e| TestbedError::ConfigValue {
            field: "frozen_clock".to_string(),
            cause: format!("invalid timestamp '{}': {}", rfc3339, e),
        })?;
        Ok(Self::new(at.with_timezone(&Utc)))
    }

    /// Move the clock to `at`.
    pub fn set(&self, at: DateTime<Utc>) {
        *self.frozen.write() = at;
    }
}

impl Default for FrozenClock {
    fn default() -> Self {
        Self::at_now()
    }
}

impl ClockProvider for FrozenClock {
    fn now(&self) -> DateTime<Utc> {
        *self.frozen.read()
    }
}
