// Copyright 2025-2026 CEMAXECUTER LLC

//! Client for the `rtl_tcp` wire protocol.
//!
//! An rtl_tcp server exposes an RTL-SDR dongle over TCP: the first 12 bytes
//! of a session identify the tuner, the rest is an endless stream of 8-bit
//! unsigned IQ samples, and the client steers the tuner with 5-byte command
//! records in the reverse direction.
//!
//! This crate keeps such a session alive and useful:
//!
//! - a receive thread performs the handshake, classifies socket errors and
//!   reconnects on its own;
//! - incoming bytes pass through a large network ring buffer and are
//!   re-emitted by a pacing thread at the nominal sample rate, so bursty
//!   arrival (Wi-Fi, congested links) does not reach the consumer;
//! - a software AGC thread watches the raw amplitude extremes of each
//!   received chunk and steps the remote tuner gain up or down to fill the
//!   ADC range without clipping.
//!
//! The public entry point is [`RtlTcpClient`]. Consumers drain
//! [`Complex32`](num_complex::Complex32) samples with
//! [`read_samples`](RtlTcpClient::read_samples) and listen for session
//! events (disconnects, overload warnings) on the channel returned by
//! [`events`](RtlTcpClient::events).

mod agc;
mod pacing;
pub mod proto;
mod receive;
mod ring;
mod session;
mod shared;
mod socket;

pub use proto::{complex_from_iq, Command, DongleInfo};
pub use session::RtlTcpClient;
pub use shared::{MessageLevel, SessionEvent};
pub use sw_tuner::TunerType;

/// Nominal IQ sample rate expected by the downstream consumer, in samples
/// per second. This is the rate requested from the server right after the
/// handshake and the rate the pacing stage re-establishes on delivery.
pub const INPUT_RATE: u32 = 2_048_000;
