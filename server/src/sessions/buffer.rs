//! Pending-output accumulator between the render engine and the flusher.
//!
//! [`OutputBuffer`] is written on every frame the engine renders and drained
//! by the flusher task at a fixed tick. A `dirty` flag lets the flusher skip
//! the lock entirely while nothing has been written.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Concurrency-safe byte accumulator with a lock-free emptiness check.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    pending: Mutex<Vec<u8>>,
    dirty: AtomicBool,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `data` and mark the buffer dirty.
    pub fn write(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.extend_from_slice(data);
        self.dirty.store(true, Ordering::Release);
    }

    /// Drain everything written since the last call.
    ///
    /// Returns `None` without locking when the dirty flag is clear. If the
    /// flag was set but the buffer turns out empty, also returns `None`.
    pub fn take(&self) -> Option<Vec<u8>> {
        if !self.dirty.load(Ordering::Acquire) {
            return None;
        }
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        self.dirty.store(false, Ordering::Release);
        if pending.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut *pending))
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn take_drains_in_write_order() {
        let buf = OutputBuffer::new();
        assert_eq!(buf.take(), None);

        buf.write(b"\x1b[H");
        buf.write(b"hello");
        assert!(buf.is_dirty());
        assert_eq!(buf.take().as_deref(), Some(&b"\x1b[Hhello"[..]));
        assert!(!buf.is_dirty());
        assert_eq!(buf.take(), None);
    }

    #[test]
    fn empty_write_leaves_buffer_clean() {
        let buf = OutputBuffer::new();
        buf.write(b"");
        assert!(!buf.is_dirty());
        assert_eq!(buf.take(), None);
    }

    #[test]
    fn concurrent_writers_lose_nothing() {
        let buf = Arc::new(OutputBuffer::new());
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let buf = Arc::clone(&buf);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        buf.write(b"ab");
                    }
                })
            })
            .collect();

        let mut total = 0;
        while writers.iter().any(|w| !w.is_finished()) {
            total += buf.take().map_or(0, |b| b.len());
        }
        for w in writers {
            w.join().unwrap();
        }
        total += buf.take().map_or(0, |b| b.len());
        assert_eq!(total, 4 * 1000 * 2);
    }
}
