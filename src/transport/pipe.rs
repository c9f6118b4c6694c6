//! A bounded in-memory byte pipe.
//!
//! [`ByteBufferStream`] is the loopback transport used by the tests and
//! examples: a fixed-capacity ring shared by any number of readers and
//! writers. Writers block while the ring is full, readers block while it
//! is empty. [`close`](ByteBufferStream::close) enqueues an end-of-stream
//! marker *behind* any pending bytes, so everything written before the
//! close drains before readers see EOF; after that EOF is sticky.

use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// One slot of the ring: a byte, or the end-of-stream marker.
#[derive(Clone, Copy)]
struct Entry {
    is_eof: bool,
    value: u8,
}

struct Shared {
    state: Mutex<VecDeque<Entry>>,
    capacity: usize,
    readable: Condvar,
    writable: Condvar,
}

/// A cloneable handle to a bounded byte ring implementing `Read` and
/// `Write`. Clones share the same ring, so one clone can serve as the
/// write end and another as the read end.
#[derive(Clone)]
pub struct ByteBufferStream {
    shared: Arc<Shared>,
}

impl ByteBufferStream {
    /// Create a pipe holding at most `capacity` pending entries.
    pub fn new(capacity: usize) -> ByteBufferStream {
        assert!(capacity > 0, "pipe capacity must be positive");
        ByteBufferStream {
            shared: Arc::new(Shared {
                state: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                readable: Condvar::new(),
                writable: Condvar::new(),
            }),
        }
    }

    /// Mark the end of the stream. Bytes already in the ring stay
    /// readable; once they drain, reads return 0 forever.
    pub fn close(&self) {
        self.push_entry(Entry {
            is_eof: true,
            value: 0,
        });
    }

    fn push_entry(&self, entry: Entry) {
        let mut state = self.shared.state.lock();
        while state.len() >= self.shared.capacity {
            self.shared.writable.wait(&mut state);
        }
        state.push_back(entry);
        self.shared.readable.notify_all();
    }
}

impl Read for ByteBufferStream {
    /// Blocks until at least one byte or EOF is available, then drains as
    /// many pending bytes as fit in `buf`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.shared.state.lock();
        loop {
            match state.front() {
                // The marker stays in the ring so EOF is sticky.
                Some(entry) if entry.is_eof => return Ok(0),
                Some(_) => break,
                None => self.shared.readable.wait(&mut state),
            }
        }
        let mut count = 0;
        while count < buf.len() {
            match state.front() {
                Some(entry) if !entry.is_eof => {
                    buf[count] = entry.value;
                    state.pop_front();
                    count += 1;
                }
                _ => break,
            }
        }
        drop(state);
        self.shared.writable.notify_all();
        Ok(count)
    }
}

impl Write for ByteBufferStream {
    /// Blocks until every byte of `buf` is in the ring.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &value in buf {
            self.push_entry(Entry {
                is_eof: false,
                value,
            });
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
