//! Test data fixtures.

mod clock;
mod unique;

pub use clock::{ClockProvider, FrozenClock, SystemClock};
pub use unique::{SomeFixture, some_fixture, unique_string};
