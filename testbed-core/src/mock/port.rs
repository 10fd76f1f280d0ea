//! Port allocation for mock servers.

use crate::error::{Result, TestbedError};
use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

/// Hands out ports from a bounded range, each at most once.
///
/// Share one allocator (behind an `Arc`) between every context of a test
/// binary so that concurrently running suites never collide.
#[derive(Debug)]
pub struct PortAllocator {
    start: u16,
    end: u16,
    next: AtomicU32,
}

impl PortAllocator {
    /// First port of the default range.
    pub const DEFAULT_START: u16 = 9000;
    /// End (exclusive) of the default range.
    pub const DEFAULT_END: u16 = 10000;

    /// Allocate from `range`.
    pub fn range(range: Range<u16>) -> Result<Self> {
        if range.is_empty() {
            return Err(TestbedError::ConfigValue {
                field: "port_range".to_string(),
                cause: format!("range {}..{} is empty", range.start, range.end),
            });
        }
        Ok(Self {
            start: range.start,
            end: range.end,
            next: AtomicU32::new(u32::from(range.start)),
        })
    }

    /// Next unused port.
    pub fn allocate(&self) -> Result<u16> {
        let port = self.next.fetch_add(1, Ordering::Relaxed);
        if port >= u32::from(self.end) {
            return Err(TestbedError::PortsExhausted {
                start: self.start,
                end: self.end,
            });
        }
        // Bounded by `end`, which is a u16.
        Ok(port as u16)
    }

    /// Ports not yet handed out.
    pub fn remaining(&self) -> usize {
        let next = self.next.load(Ordering::Relaxed);
        u32::from(self.end).saturating_sub(next) as usize
    }
}

impl Default for PortAllocator {
    fn default() -> Self {
        Self {
            start: Self::DEFAULT_START,
            end: Self::DEFAULT_END,
            next: AtomicU32::new(u32::from(Self::DEFAULT_START)),
        }
    }
}
