//! Double-buffered frame memory with scoped read/write guards
//!
//! A frame is two equally sized slots plus an index naming the published
//! ("front") slot. The single writer fills the back slot, starting from a
//! copy of the front so partial updates keep untouched bytes, and publishes
//! it when its guard drops. Readers lock whichever slot is front.
//!
//! ```text
//!   writer ──► [ back  ] ──publish──┐
//!                                   ▼
//!   reader ◄── [ front ] ◄──────── front index
//! ```
//!
//! Every slot that is not write-locked holds a complete committed frame,
//! so a reader never observes a half-written update. Neither side ever
//! blocks: `begin_*` uses try-locks and reports failure instead, and the
//! caller skips that cycle.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::version::VersionCounter;

/// Attempts at locking the front slot before giving up for this cycle.
const READ_ATTEMPTS: usize = 3;

/// One fieldbus frame.
#[derive(Debug)]
pub struct FrameBuffer {
    slots: [RwLock<Box<[u8]>>; 2],
    front: AtomicUsize,
    version: VersionCounter,
    writing: AtomicBool,
    online: AtomicBool,
    len: usize,
}

impl FrameBuffer {
    /// Zero-filled frame of `len` bytes, online.
    pub fn new(len: usize) -> Self {
        Self {
            slots: [
                RwLock::new(vec![0u8; len].into_boxed_slice()),
                RwLock::new(vec![0u8; len].into_boxed_slice()),
            ],
            front: AtomicUsize::new(0),
            version: VersionCounter::new(),
            writing: AtomicBool::new(false),
            online: AtomicBool::new(true),
            len,
        }
    }

    /// Frame size in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a zero-sized frame.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of published writes.
    pub fn commits(&self) -> u64 {
        self.version.commits()
    }

    /// Take the frame on or offline. Offline frames fail every `begin_*`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Release);
    }

    /// Whether `begin_*` can currently succeed.
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Lock the published slot for reading.
    ///
    /// Returns `None` when the frame is offline or every attempt collided
    /// with a writer. Nothing is held in that case.
    pub fn begin_read(&self) -> Option<ReadLock<'_>> {
        if !self.is_online() {
            return None;
        }
        for _ in 0..READ_ATTEMPTS {
            let front = self.front.load(Ordering::Acquire);
            if let Some(guard) = self.slots[front].try_read() {
                return Some(ReadLock {
                    guard,
                    commits: self.version.commits(),
                });
            }
        }
        None
    }

    /// Lock the back slot for writing, pre-filled with the published frame.
    ///
    /// Returns `None` when offline, when another writer is active, or when a
    /// slow reader still holds the back slot. The write is published when
    /// the returned guard drops.
    pub fn begin_write(&self) -> Option<WriteLock<'_>> {
        if !self.is_online() {
            return None;
        }
        if self.writing.swap(true, Ordering::AcqRel) {
            return None;
        }
        let front = self.front.load(Ordering::Acquire);
        let back = front ^ 1;
        let Some(mut guard) = self.slots[back].try_write() else {
            self.writing.store(false, Ordering::Release);
            return None;
        };
        guard.copy_from_slice(&self.slots[front].read());
        self.version.begin_write();
        Some(WriteLock {
            buffer: self,
            guard: Some(guard),
            back,
        })
    }

    fn publish(&self, back: usize) {
        self.front.store(back, Ordering::Release);
        self.version.end_write();
        self.writing.store(false, Ordering::Release);
    }
}

/// Shared view of a published frame. Unlocks on drop.
#[derive(Debug)]
pub struct ReadLock<'a> {
    guard: RwLockReadGuard<'a, Box<[u8]>>,
    commits: u64,
}

impl ReadLock<'_> {
    /// Commit count observed when the lock was taken.
    pub fn commits(&self) -> u64 {
        self.commits
    }
}

impl Deref for ReadLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.guard
    }
}

/// Exclusive view of the back slot. Publishes and unlocks on drop.
#[derive(Debug)]
pub struct WriteLock<'a> {
    buffer: &'a FrameBuffer,
    guard: Option<RwLockWriteGuard<'a, Box<[u8]>>>,
    back: usize,
}

impl Deref for WriteLock<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self.guard.as_deref() {
            Some(slot) => &slot[..],
            None => &[],
        }
    }
}

impl DerefMut for WriteLock<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        match self.guard.as_deref_mut() {
            Some(slot) => &mut slot[..],
            None => &mut [],
        }
    }
}

impl Drop for WriteLock<'_> {
    fn drop(&mut self) {
        // Unlock the slot before it becomes visible as front.
        drop(self.guard.take());
        self.buffer.publish(self.back);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_frame_reads_zeroes() {
        let frame = FrameBuffer::new(4);
        let view = frame.begin_read().unwrap();
        assert_eq!(&*view, &[0, 0, 0, 0]);
        assert_eq!(view.commits(), 0);
    }

    #[test]
    fn write_publishes_on_drop() {
        let frame = FrameBuffer::new(2);
        {
            let mut view = frame.begin_write().unwrap();
            view[1] = 0xAB;
            // Not yet visible to readers.
            assert_eq!(frame.begin_read().unwrap()[1], 0x00);
        }
        assert_eq!(frame.begin_read().unwrap()[1], 0xAB);
        assert_eq!(frame.commits(), 1);
    }

    #[test]
    fn back_slot_starts_from_front() {
        let frame = FrameBuffer::new(2);
        frame.begin_write().unwrap()[0] = 0x11;
        frame.begin_write().unwrap()[1] = 0x22;
        assert_eq!(&*frame.begin_read().unwrap(), &[0x11, 0x22]);
    }

    #[test]
    fn second_writer_rejected() {
        let frame = FrameBuffer::new(1);
        let first = frame.begin_write().unwrap();
        assert!(frame.begin_write().is_none());
        drop(first);
        assert!(frame.begin_write().is_some());
    }

    #[test]
    fn offline_frame_fails_without_holding_locks() {
        let frame = FrameBuffer::new(1);
        frame.set_online(false);
        assert!(frame.begin_read().is_none());
        assert!(frame.begin_write().is_none());
        frame.set_online(true);
        // Neither failed begin left anything locked.
        assert!(frame.begin_write().is_some());
        assert!(frame.begin_read().is_some());
    }

    #[test]
    fn reader_holding_old_front_blocks_only_the_writer() {
        let frame = FrameBuffer::new(1);
        frame.begin_write().unwrap()[0] = 1; // front = slot 1
        let old = frame.begin_read().unwrap(); // holds slot 1
        frame.begin_write().unwrap()[0] = 2; // writes slot 0, front = slot 0
        // Next write targets slot 1, still held by the reader.
        assert!(frame.begin_write().is_none());
        assert_eq!(old[0], 1);
        drop(old);
        frame.begin_write().unwrap()[0] = 3;
        assert_eq!(frame.begin_read().unwrap()[0], 3);
    }
}
