// Copyright 2025-2026 CEMAXECUTER LLC

//! Tuner identification and gain schedules for RTL-SDR front ends.
//!
//! Every RTL2832U dongle carries one of a handful of analog tuner chips.
//! Each chip supports a fixed, ordered list of gain settings; the remote
//! side addresses them by zero-based index while the values themselves are
//! in dB. The tables below are the librtlsdr gain tables scaled from
//! tenths of a dB to dB.

/// Gain index fallback when the tuner could not be identified.
/// 29 entries matches the R820T, by far the most common chip.
pub const FALLBACK_GAIN_COUNT: usize = 29;

/// Gain value reported for an out-of-range index (effectively "max gain").
pub const GAIN_OUT_OF_RANGE: f32 = 999.0;

const E4K_GAINS: [f32; 14] = [
    -1.0, 1.5, 4.0, 6.5, 9.0, 11.5, 14.0, 16.5, 19.0, 21.5, 24.0, 29.0, 34.0, 42.0,
];

const FC0012_GAINS: [f32; 5] = [-9.9, -4.0, 7.1, 17.9, 19.2];

const FC0013_GAINS: [f32; 23] = [
    -9.9, -7.3, -6.5, -6.3, -6.0, -5.8, -5.4, 5.8, 6.1, 6.3, 6.5, 6.7, 6.8, 7.0, 7.1, 17.9,
    18.1, 18.2, 18.4, 18.6, 18.8, 19.1, 19.7,
];

const FC2580_GAINS: [f32; 1] = [0.0];

/// Shared by the R820T and R828D (same R82xx gain stage).
const R82XX_GAINS: [f32; 29] = [
    0.0, 0.9, 1.4, 2.7, 3.7, 7.7, 8.7, 12.5, 14.4, 15.7, 16.6, 19.7, 20.7, 22.9, 25.4, 28.0,
    29.7, 32.8, 33.8, 36.4, 37.2, 38.6, 40.2, 42.1, 43.4, 43.9, 44.5, 48.0, 49.6,
];

/// Analog tuner chip variants announced by an rtl_tcp server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunerType {
    #[default]
    Unknown,
    E4000,
    Fc0012,
    Fc0013,
    Fc2580,
    R820T,
    R828D,
}

impl TunerType {
    /// Map the wire identifier from the rtl_tcp handshake. Out-of-range
    /// identifiers collapse to `Unknown`.
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => TunerType::E4000,
            2 => TunerType::Fc0012,
            3 => TunerType::Fc0013,
            4 => TunerType::Fc2580,
            5 => TunerType::R820T,
            6 => TunerType::R828D,
            _ => TunerType::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TunerType::Unknown => "Unknown",
            TunerType::E4000 => "E4000",
            TunerType::Fc0012 => "FC0012",
            TunerType::Fc0013 => "FC0013",
            TunerType::Fc2580 => "FC2580",
            TunerType::R820T => "R820T",
            TunerType::R828D => "R828D",
        }
    }
}

impl std::fmt::Display for TunerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The ordered gain table for a tuner, in dB. `None` for `Unknown`.
pub fn gain_schedule(tuner: TunerType) -> Option<&'static [f32]> {
    match tuner {
        TunerType::Unknown => None,
        TunerType::E4000 => Some(&E4K_GAINS),
        TunerType::Fc0012 => Some(&FC0012_GAINS),
        TunerType::Fc0013 => Some(&FC0013_GAINS),
        TunerType::Fc2580 => Some(&FC2580_GAINS),
        TunerType::R820T | TunerType::R828D => Some(&R82XX_GAINS),
    }
}

/// Number of gain steps the tuner supports, [`FALLBACK_GAIN_COUNT`] when
/// the tuner is unknown.
pub fn gain_count(tuner: TunerType) -> usize {
    gain_schedule(tuner).map_or(FALLBACK_GAIN_COUNT, <[f32]>::len)
}

/// Resolve a gain index to its dB value.
///
/// Unknown tuners resolve to 0.0; an index past the end of the schedule
/// resolves to [`GAIN_OUT_OF_RANGE`].
pub fn gain_value(tuner: TunerType, index: u16) -> f32 {
    let Some(schedule) = gain_schedule(tuner) else {
        return 0.0;
    };
    schedule
        .get(index as usize)
        .copied()
        .unwrap_or(GAIN_OUT_OF_RANGE)
}
