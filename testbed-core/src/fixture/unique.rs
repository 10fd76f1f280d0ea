//! Unique values for test data.

use rand::Rng;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Generator of values that do not repeat within a process.
///
/// The counter starts at a random offset so that data left behind by an
/// earlier run is unlikely to collide with the current one.
#[derive(Debug)]
pub struct SomeFixture {
    next: AtomicU64,
}

impl SomeFixture {
    /// Start counting at `first`.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Start counting at a random offset.
    pub fn random() -> Self {
        Self::starting_at(rand::thread_rng().gen_range(0..100_000))
    }

    /// A number never returned before by this fixture.
    pub fn unique_number(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// `some<label>-<n>`, e.g. `someOrderId-4711`.
    pub fn unique_string(&self, label: &str) -> String {
        format!("some{}-{}", label, self.unique_number())
    }

    /// A random v4 uuid.
    pub fn uuid(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// `some:thing:<uuid>`.
    pub fn urn(&self) -> String {
        format!("some:thing:{}", self.uuid())
    }

    /// `<uuid><label>@example.com`.
    pub fn email(&self, label: &str) -> String {
        format!("{}{}@example.com", self.uuid(), label)
    }
}

/// Process-wide fixture.
pub fn some_fixture() -> &'static SomeFixture {
    static FIXTURE: OnceLock<SomeFixture> = OnceLock::new();
    FIXTURE.get_or_init(SomeFixture::random)
}

/// Shorthand for `some_fixture().unique_string(label)`.
pub fn unique_string(label: &str) -> String {
    some_fixture().unique_string(label)
}
