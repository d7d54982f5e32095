// Copyright 2025-2026 CEMAXECUTER LLC

//! State shared between the session controller and the worker threads.
//!
//! The session mutex guards the connection flags, the tuner identity and
//! the gain settings; it is never held across a blocking socket call, a
//! sleep or a join. The amplitude extremes and the prebuffer latch are
//! plain atomics: each has a single writer, and a stale read merely delays
//! one AGC tick or one pacing iteration.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::thread::JoinHandle;

use crossbeam::channel::Sender;
use sw_tuner::TunerType;

use crate::proto::Command;
use crate::ring::SamplePipeline;
use crate::socket::Socket;

/// Severity of a [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Information,
    Error,
}

/// Out-of-band notification for the embedding application: disconnects,
/// connect failures, overload warnings.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub level: MessageLevel,
    pub text: String,
}

/// Flags and settings guarded by the session mutex.
pub(crate) struct SessionState {
    pub running: bool,
    pub connected: bool,
    /// Lifecycle flag of the AGC thread; distinct from the user-facing
    /// AGC switch, which only decides whether gain steps are taken.
    pub agc_running: bool,
    /// True from (re)connect until a valid handshake has been parsed.
    pub first_data: bool,
    pub host: String,
    pub port: u16,
    pub frequency: i32,
    pub gain_index: u16,
    pub gain_value: f32,
    pub tuner: TunerType,
    pub tuner_gain_count: u32,
}

pub(crate) struct Shared {
    pub session: Mutex<SessionState>,
    pub pipeline: SamplePipeline,
    pub socket: Socket,
    /// Set once the network buffer first reached half capacity; cleared by
    /// every reset.
    pub prebuffered: AtomicBool,
    /// User-facing AGC switch.
    pub agc_enabled: AtomicBool,
    /// Amplitude extremes of the most recent receive iteration. Written by
    /// the receive thread, read by the AGC thread.
    pub min_amp: AtomicU8,
    pub max_amp: AtomicU8,
    /// Handle of the AGC thread; joined before every relaunch and on stop.
    pub agc_handle: Mutex<Option<JoinHandle<()>>>,
    events: Sender<SessionEvent>,
}

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 1234;
pub(crate) const DEFAULT_GAIN_INDEX: u16 = 6;

impl Shared {
    pub fn new(events: Sender<SessionEvent>) -> Self {
        Shared {
            session: Mutex::new(SessionState {
                running: false,
                connected: false,
                agc_running: false,
                first_data: true,
                host: DEFAULT_HOST.to_string(),
                port: DEFAULT_PORT,
                frequency: 0,
                gain_index: DEFAULT_GAIN_INDEX,
                gain_value: 0.0,
                tuner: TunerType::Unknown,
                tuner_gain_count: 0,
            }),
            pipeline: SamplePipeline::new(),
            socket: Socket::new(),
            prebuffered: AtomicBool::new(false),
            agc_enabled: AtomicBool::new(false),
            min_amp: AtomicU8::new(u8::MAX),
            max_amp: AtomicU8::new(0),
            agc_handle: Mutex::new(None),
            events,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap()
    }

    pub fn running(&self) -> bool {
        self.lock().running
    }

    pub fn agc_running(&self) -> bool {
        self.lock().agc_running
    }

    pub fn send_event(&self, level: MessageLevel, text: impl Into<String>) {
        let _ = self.events.send(SessionEvent {
            level,
            text: text.into(),
        });
    }

    /// Emit a command if a session is up; failures and partial writes are
    /// dropped on the floor, the receive side is authoritative for session
    /// health.
    pub fn send_command(&self, command: Command) {
        let connected = self.lock().connected;
        if connected && self.socket.valid() {
            let _ = self.socket.send(&command.encode());
        }
    }

    /// Select a gain index: updates the cached index and resolved dB value,
    /// then asks the remote tuner for it (in tenths of a dB). Returns the
    /// resolved value.
    pub fn apply_gain(&self, index: u16) -> f32 {
        let value = {
            let mut s = self.lock();
            s.gain_index = index;
            s.gain_value = sw_tuner::gain_value(s.tuner, index);
            s.gain_value
        };
        self.send_command(Command::SetTunerGain((10.0 * value).round() as i32));
        value
    }

    /// Flush all pipeline buffers and drop the prebuffer latch.
    pub fn reset(&self) {
        self.pipeline.reset();
        self.prebuffered.store(false, Ordering::Relaxed);
    }

    /// Join a previous AGC thread, if any. Must not be called with the
    /// session mutex held: the AGC thread takes it on every tick.
    pub fn join_agc(&self) {
        let handle = self.agc_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }
}
