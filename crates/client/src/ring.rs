// Copyright 2025-2026 CEMAXECUTER LLC

//! Bounded byte FIFOs connecting the worker threads.
//!
//! Each buffer is written by exactly one producer and drained by exactly one
//! consumer; `flush` may additionally be called from the control side during
//! a session reset. All operations are non-blocking.

use std::sync::Mutex;

/// Smoothing buffer between the socket and the pacing stage. Large enough
/// to absorb several seconds of jitter at the nominal rate.
pub(crate) const NETWORK_BUFFER_SIZE: usize = 256 * 32768;

/// Feed for the downstream demodulator.
pub(crate) const SAMPLE_BUFFER_SIZE: usize = 32 * 32768;

/// Feed for the spectrum display; only ever needs the freshest samples.
pub(crate) const SPECTRUM_BUFFER_SIZE: usize = 8192;

/// Bounded FIFO of bytes.
///
/// `put` never blocks and never overwrites: when the buffer is full the
/// excess input is dropped and the short count returned. Keeping the
/// producer paced below the drain rate is the caller's job.
pub(crate) struct RingBuffer {
    inner: Mutex<Inner>,
}

struct Inner {
    buf: Box<[u8]>,
    /// Index of the oldest byte.
    read: usize,
    /// Bytes currently stored.
    len: usize,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        RingBuffer {
            inner: Mutex::new(Inner {
                buf: vec![0u8; capacity].into_boxed_slice(),
                read: 0,
                len: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().buf.len()
    }

    /// Bytes available to the consumer.
    pub fn available(&self) -> usize {
        self.inner.lock().unwrap().len
    }

    /// Append as much of `data` as fits; returns the number of bytes stored.
    pub fn put(&self, data: &[u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let cap = inner.buf.len();
        let n = data.len().min(cap - inner.len);
        if n == 0 {
            return 0;
        }

        let write = (inner.read + inner.len) % cap;
        let first = n.min(cap - write);
        inner.buf[write..write + first].copy_from_slice(&data[..first]);
        if first < n {
            inner.buf[..n - first].copy_from_slice(&data[first..n]);
        }
        inner.len += n;
        n
    }

    /// Copy up to `out.len()` bytes into `out`; returns the number copied.
    pub fn get(&self, out: &mut [u8]) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let cap = inner.buf.len();
        let n = out.len().min(inner.len);
        if n == 0 {
            return 0;
        }

        let read = inner.read;
        let first = n.min(cap - read);
        out[..first].copy_from_slice(&inner.buf[read..read + first]);
        if first < n {
            out[first..n].copy_from_slice(&inner.buf[..n - first]);
        }
        inner.read = (read + n) % cap;
        inner.len -= n;
        n
    }

    /// Discard everything currently buffered.
    pub fn flush(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.read = 0;
        inner.len = 0;
    }
}

/// The three buffers data travels through: socket -> network -> pacing ->
/// samples + spectrum.
pub(crate) struct SamplePipeline {
    pub network: RingBuffer,
    pub samples: RingBuffer,
    pub spectrum: RingBuffer,
}

impl SamplePipeline {
    pub fn new() -> Self {
        SamplePipeline {
            network: RingBuffer::new(NETWORK_BUFFER_SIZE),
            samples: RingBuffer::new(SAMPLE_BUFFER_SIZE),
            spectrum: RingBuffer::new(SPECTRUM_BUFFER_SIZE),
        }
    }

    /// Drop any buffered residue, e.g. from a previous session.
    pub fn reset(&self) {
        self.network.flush();
        self.samples.flush();
        self.spectrum.flush();
    }
}
