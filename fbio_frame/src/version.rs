//! Commit counter for frame publication

use std::sync::atomic::{AtomicU64, Ordering};

/// Version counter using even/odd versioning
///
/// The single writer moves the counter to an odd value when it starts
/// filling the back slot and to the next even value when the slot is
/// published. Readers use it to tell whether anything new was committed
/// since they last looked.
#[derive(Debug)]
pub struct VersionCounter {
    counter: AtomicU64,
}

impl VersionCounter {
    /// Create a new version counter starting at 0 (even)
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Get current version with acquire ordering
    pub fn load(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Begin write operation - move to odd version
    pub fn begin_write(&self) -> u64 {
        let next = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(Self::is_writing(next), "nested begin_write");
        next
    }

    /// Complete write operation - move to even version
    pub fn end_write(&self) -> u64 {
        let next = self.counter.fetch_add(1, Ordering::AcqRel) + 1;
        debug_assert!(Self::is_stable(next), "end_write without begin_write");
        next
    }

    /// Number of completed commits
    pub fn commits(&self) -> u64 {
        self.load() / 2
    }

    /// Check if version is stable (even)
    pub const fn is_stable(version: u64) -> bool {
        version % 2 == 0
    }

    /// Check if version indicates write in progress (odd)
    pub const fn is_writing(version: u64) -> bool {
        version % 2 == 1
    }
}

impl Default for VersionCounter {
    fn default() -> Self {
        Self::new()
    }
}
