// Copyright 2025-2026 CEMAXECUTER LLC

//! Wire format of the rtl_tcp protocol: the 12-byte session handshake,
//! the 5-byte command records, and the 8-bit IQ sample encoding.

use byteorder::{BigEndian, ByteOrder};
use num_complex::Complex32;
use sw_tuner::TunerType;

/// First four bytes of every rtl_tcp session.
pub const HANDSHAKE_MAGIC: &[u8; 4] = b"RTL0";

/// Size of the handshake record on the wire.
pub const DONGLE_INFO_LEN: usize = 12;

pub const CMD_SET_FREQUENCY: u8 = 0x01;
pub const CMD_SET_SAMPLE_RATE: u8 = 0x02;
pub const CMD_SET_GAIN_MODE: u8 = 0x03;
pub const CMD_SET_TUNER_GAIN: u8 = 0x04;
/// Asks an Android rtl_tcp driver to shut itself down.
pub const CMD_ANDROID_EXIT: u8 = 0x7e;

/// Identity of the remote dongle, announced once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DongleInfo {
    pub tuner_type: TunerType,
    pub tuner_gain_count: u32,
}

impl DongleInfo {
    /// Parse the handshake record. Returns `None` when fewer than
    /// [`DONGLE_INFO_LEN`] bytes are given or the magic does not match.
    pub fn parse(bytes: &[u8]) -> Option<DongleInfo> {
        if bytes.len() < DONGLE_INFO_LEN || &bytes[..4] != HANDSHAKE_MAGIC {
            return None;
        }
        Some(DongleInfo {
            tuner_type: TunerType::from_id(BigEndian::read_u32(&bytes[4..8])),
            tuner_gain_count: BigEndian::read_u32(&bytes[8..12]),
        })
    }
}

/// A control command: one opcode byte plus a big-endian i32 parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Center frequency in Hz.
    SetFrequency(i32),
    /// Sample rate in Hz.
    SetSampleRate(i32),
    /// 0 = tuner AGC, 1 = manual gain.
    SetGainMode(i32),
    /// Manual gain in tenths of a dB.
    SetTunerGain(i32),
    AndroidExit,
}

impl Command {
    pub fn opcode(&self) -> u8 {
        match self {
            Command::SetFrequency(_) => CMD_SET_FREQUENCY,
            Command::SetSampleRate(_) => CMD_SET_SAMPLE_RATE,
            Command::SetGainMode(_) => CMD_SET_GAIN_MODE,
            Command::SetTunerGain(_) => CMD_SET_TUNER_GAIN,
            Command::AndroidExit => CMD_ANDROID_EXIT,
        }
    }

    pub fn param(&self) -> i32 {
        match *self {
            Command::SetFrequency(p)
            | Command::SetSampleRate(p)
            | Command::SetGainMode(p)
            | Command::SetTunerGain(p) => p,
            Command::AndroidExit => 0,
        }
    }

    /// Serialize to the 5-byte wire record.
    pub fn encode(&self) -> [u8; 5] {
        let mut out = [0u8; 5];
        out[0] = self.opcode();
        BigEndian::write_i32(&mut out[1..], self.param());
        out
    }

    /// Inverse of [`encode`](Command::encode); `None` for unknown opcodes.
    pub fn decode(bytes: &[u8; 5]) -> Option<Command> {
        let param = BigEndian::read_i32(&bytes[1..]);
        match bytes[0] {
            CMD_SET_FREQUENCY => Some(Command::SetFrequency(param)),
            CMD_SET_SAMPLE_RATE => Some(Command::SetSampleRate(param)),
            CMD_SET_GAIN_MODE => Some(Command::SetGainMode(param)),
            CMD_SET_TUNER_GAIN => Some(Command::SetTunerGain(param)),
            CMD_ANDROID_EXIT => Some(Command::AndroidExit),
            _ => None,
        }
    }
}

/// Convert one unsigned IQ byte pair to a complex sample in [-1, 1).
/// The wire format biases both components by 128.
pub fn complex_from_iq(i: u8, q: u8) -> Complex32 {
    Complex32::new(
        (i as f32 - 128.0) / 128.0,
        (q as f32 - 128.0) / 128.0,
    )
}
