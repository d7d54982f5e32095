// Copyright 2025-2026 CEMAXECUTER LLC

//! Software AGC thread.
//!
//! The remote tuner's hardware AGC is never enabled; instead this thread
//! inspects the amplitude extremes recorded by the receive thread on a
//! fixed 50 ms cadence. A byte at 0 or 255 means at least one sample
//! clipped the 8-bit ADC, so gain steps down. Otherwise the next higher
//! gain step is simulated against the observed extremes and taken only if
//! the predicted amplitudes still fit the ADC range.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sw_tuner::TunerType;

use crate::shared::{MessageLevel, Shared};

const AGC_TICK: Duration = Duration::from_millis(50);

fn is_clipping(min: u8, max: u8) -> bool {
    min == 0 || max == u8::MAX
}

/// Decide the next gain index for the observed amplitude extremes, or
/// `None` to hold. The caller guarantees a known tuner.
fn plan_gain_step(
    tuner: TunerType,
    index: u16,
    current_db: f32,
    min: u8,
    max: u8,
) -> Option<u16> {
    if is_clipping(min, max) {
        return if index > 0 { Some(index - 1) } else { None };
    }

    if (index as usize) + 1 >= sw_tuner::gain_count(tuner) {
        return None;
    }

    // simulate one step up before taking it
    let next_db = sw_tuner::gain_value(tuner, index + 1);
    let lin_gain = 10f32.powf((next_db - current_db) / 20.0);
    let new_max = (max as f32 * lin_gain) as i32;
    let new_min = (min as f32 / lin_gain) as i32;

    // new_min cannot go below zero for unsigned input; both bounds are
    // checked anyway so the two directions read the same
    if new_min >= 0 && new_max <= u8::MAX as i32 {
        Some(index + 1)
    } else {
        None
    }
}

pub(crate) struct AgcWorker {
    shared: Arc<Shared>,
}

impl AgcWorker {
    pub fn new(shared: Arc<Shared>) -> Self {
        AgcWorker { shared }
    }

    pub fn run(self) {
        while self.shared.agc_running() {
            thread::sleep(AGC_TICK);
            if !self.shared.agc_running() {
                break;
            }

            let (tuner, gain_index, gain_value) = {
                let s = self.shared.lock();
                (s.tuner, s.gain_index, s.gain_value)
            };
            let min = self.shared.min_amp.load(Ordering::Relaxed);
            let max = self.shared.max_amp.load(Ordering::Relaxed);
            let enabled = self.shared.agc_enabled.load(Ordering::Relaxed);

            if enabled && tuner != TunerType::Unknown {
                if let Some(next) = plan_gain_step(tuner, gain_index, gain_value, min, max) {
                    let value = self.shared.apply_gain(next);
                    log::debug!("gain index {} -> {} ({:.1} dB)", gain_index, next, value);
                }
            } else if is_clipping(min, max) {
                let text = "ADC overload. Maybe you are using a too high gain.";
                log::info!("{}", text);
                self.shared.send_event(MessageLevel::Information, text);
            }
        }
    }
}
