// Copyright 2025-2026 CEMAXECUTER LLC

//! Pacing thread: drains the network buffer into the sample and spectrum
//! buffers at the nominal input rate.
//!
//! The socket delivers bytes in bursts; the consumer wants a steady
//! [`INPUT_RATE`] samples per second. After an initial prebuffer phase the
//! thread forwards bounded chunks and sleeps against a virtual deadline
//! that advances by exactly the chunk's wall-clock worth of samples. When
//! forwarding falls behind, the deadline is already in the past and the
//! sleep is skipped until it catches up.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::shared::Shared;
use crate::INPUT_RATE;

/// Samples moved per iteration (two bytes each).
const CHUNK_SAMPLES: usize = 32768;

/// Sleep while prebuffering or starved.
const STARVED_SLEEP: Duration = Duration::from_millis(100);

/// Wall-clock budget for `samples` IQ samples at the nominal input rate.
fn forward_period(samples: usize) -> Duration {
    Duration::from_micros(samples as u64 * 1_000_000 / INPUT_RATE as u64)
}

pub(crate) struct PacingWorker {
    shared: Arc<Shared>,
}

impl PacingWorker {
    pub fn new(shared: Arc<Shared>) -> Self {
        PacingWorker { shared }
    }

    pub fn run(self) {
        let mut buf = vec![0u8; CHUNK_SAMPLES * 2];
        let mut next_stop = Instant::now();

        while self.shared.running() {
            if !self.shared.prebuffered.load(Ordering::Relaxed) {
                thread::sleep(STARVED_SLEEP);
                next_stop = Instant::now();
                continue;
            }

            let available = self.shared.pipeline.network.available() / 2;
            let samples = CHUNK_SAMPLES.min(available);
            if samples == 0 {
                // underflow: re-anchor the deadline so the pause does not
                // turn into a burst once data resumes
                thread::sleep(STARVED_SLEEP);
                next_stop = Instant::now();
                continue;
            }

            let amount = self.shared.pipeline.network.get(&mut buf[..samples * 2]);
            self.shared.pipeline.samples.put(&buf[..amount]);
            self.shared.pipeline.spectrum.put(&buf[..amount]);

            next_stop += forward_period(samples);
            let now = Instant::now();
            if next_stop > now {
                thread::sleep(next_stop - now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_period_matches_input_rate() {
        // 32768 samples at 2.048 MS/s are exactly 16 ms
        assert_eq!(forward_period(32768), Duration::from_micros(16_000));
        assert_eq!(forward_period(2048), Duration::from_millis(1));
        assert_eq!(forward_period(0), Duration::ZERO);
    }

    #[test]
    fn test_chunk_fits_pipeline() {
        // one forwarded chunk must fit into the sample buffer
        assert!(CHUNK_SAMPLES * 2 <= crate::ring::SAMPLE_BUFFER_SIZE);
    }
}
