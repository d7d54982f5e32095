// Copyright 2025-2026 CEMAXECUTER LLC

//! Receive thread: connect, handshake, stream, reconnect.
//!
//! The outer loop owns the session lifecycle. While `running` it keeps the
//! socket connected, (re)launches the AGC thread after joining any previous
//! incarnation, and hands off to [`ReceiveWorker::receive_once`] for the
//! actual reads. A lost connection only tears down the socket; the next
//! iteration reconnects. A failed connect ends the session for good.

use std::io;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::agc::AgcWorker;
use crate::proto::{Command, DongleInfo, DONGLE_INFO_LEN};
use crate::shared::{MessageLevel, Shared};
use crate::INPUT_RATE;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on bytes accumulated per receive iteration.
const READ_CHUNK: usize = 8192;

/// Network buffer fill ratio that ends the prebuffer phase.
const PREBUFFER_FILL: f32 = 0.5;

/// What to do about a failed `recv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Retry,
    ConnectionLost,
    Fatal,
}

fn classify(err: &io::Error) -> Disposition {
    use io::ErrorKind::*;
    match err.kind() {
        Interrupted | WouldBlock => Disposition::Retry,
        // WSAECONNABORTED is recoverable on Windows sockets
        ConnectionAborted if cfg!(windows) => Disposition::Retry,
        ConnectionAborted | ConnectionReset | NotConnected | BrokenPipe | UnexpectedEof => {
            Disposition::ConnectionLost
        }
        _ => Disposition::Fatal,
    }
}

pub(crate) struct ReceiveWorker {
    shared: Arc<Shared>,
    buf: Vec<u8>,
}

impl ReceiveWorker {
    pub fn new(shared: Arc<Shared>) -> Self {
        ReceiveWorker {
            shared,
            buf: vec![0u8; READ_CHUNK],
        }
    }

    pub fn run(mut self) {
        loop {
            let mut s = self.shared.lock();
            if !s.running {
                break;
            }

            if !s.connected {
                let host = s.host.clone();
                let port = s.port;
                log::info!("connecting to {}:{}", host, port);

                if self.shared.socket.connect(&host, port, CONNECT_TIMEOUT) {
                    log::info!("connected to {}:{}", host, port);
                    s.connected = true;

                    // stop() may have run while we were inside connect;
                    // never bring a session up past that point
                    if !s.running {
                        s.connected = false;
                        drop(s);
                        self.shared.socket.close();
                        break;
                    }

                    if !s.agc_running {
                        // the previous AGC thread may still be draining its
                        // final tick; join it before spawning a fresh one
                        drop(s);
                        self.shared.join_agc();
                        s = self.shared.lock();

                        if s.running && s.connected {
                            s.agc_running = true;
                            let shared = Arc::clone(&self.shared);
                            let handle = thread::spawn(move || AgcWorker::new(shared).run());
                            *self.shared.agc_handle.lock().unwrap() = Some(handle);
                        }
                    }

                    s.first_data = true;
                    drop(s);
                    self.shared.reset();
                    continue;
                }

                log::warn!("could not connect to {}:{}", host, port);
                s.running = false;
                s.agc_running = false;
                drop(s);
                self.shared.send_event(
                    MessageLevel::Error,
                    format!("Connection failed to server {}:{}", host, port),
                );
                break;
            }

            drop(s);
            self.receive_once();
        }
    }

    /// One receive iteration: accumulate up to [`READ_CHUNK`] bytes, consume
    /// the handshake if this is the first data of the session, then forward
    /// the payload into the network buffer and record amplitude extremes.
    fn receive_once(&mut self) {
        let mut read = 0usize;

        while self.shared.socket.valid() && read < self.buf.len() {
            match self.shared.socket.recv(&mut self.buf[read..]) {
                Ok(0) => self.handle_disconnect(),
                Ok(n) => read += n,
                Err(e) => match classify(&e) {
                    Disposition::Retry => {}
                    Disposition::ConnectionLost => self.handle_disconnect(),
                    Disposition::Fatal => {
                        log::error!("recv error: {}", e);
                        self.handle_disconnect();
                        return;
                    }
                },
            }

            if !self.shared.running() {
                break;
            }
        }

        let (connected, first_data) = {
            let s = self.shared.lock();
            (s.connected, s.first_data)
        };
        if read == 0 || !connected || !self.shared.socket.valid() {
            return;
        }

        let mut offset = 0usize;
        if first_data {
            if read < DONGLE_INFO_LEN {
                // incomplete first packet (e.g. connection closed during
                // startup); the next iteration gets a fresh attempt
                return;
            }

            let Some(info) = DongleInfo::parse(&self.buf[..DONGLE_INFO_LEN]) else {
                log::error!("did not find the \"RTL0\" magic key");
                self.handle_disconnect();
                let mut s = self.shared.lock();
                s.agc_running = false;
                s.running = false;
                return;
            };

            log::info!("tuner type: {}", info.tuner_type);
            log::info!("tuner gain count: {}", info.tuner_gain_count);

            let (gain_index, frequency) = {
                let mut s = self.shared.lock();
                s.first_data = false;
                s.tuner = info.tuner_type;
                s.tuner_gain_count = info.tuner_gain_count;
                (s.gain_index, s.frequency)
            };

            // gain is always driven from here; the tuner's own AGC stays off
            self.shared.send_command(Command::SetGainMode(1));
            self.shared.apply_gain(gain_index);
            self.shared.send_command(Command::SetSampleRate(INPUT_RATE as i32));
            self.shared.send_command(Command::SetFrequency(frequency));

            offset = DONGLE_INFO_LEN;
        }

        if read <= offset {
            return;
        }
        let payload = &self.buf[offset..read];
        self.shared.pipeline.network.put(payload);

        if !self.shared.prebuffered.load(Ordering::Relaxed) {
            let fill = self.shared.pipeline.network.available() as f32
                / self.shared.pipeline.network.capacity() as f32;
            if fill >= PREBUFFER_FILL {
                log::info!("network buffer filled to {:.0}%", fill * 100.0);
                self.shared.prebuffered.store(true, Ordering::Relaxed);
            }
        }

        let (min, max) = amplitude_extremes(payload);
        self.shared.min_amp.store(min, Ordering::Relaxed);
        self.shared.max_amp.store(max, Ordering::Relaxed);
    }

    fn handle_disconnect(&self) {
        {
            let mut s = self.shared.lock();
            s.connected = false;
            s.first_data = true;
        }
        self.shared
            .send_event(MessageLevel::Error, "RTL-TCP connection closed.");
        self.shared.socket.close();
    }
}

/// Min and max of the raw payload bytes. IQ interleaving does not matter
/// here; clipping shows up as 0x00 or 0xff on either component.
fn amplitude_extremes(payload: &[u8]) -> (u8, u8) {
    let mut min = u8::MAX;
    let mut max = 0u8;
    for &b in payload {
        min = min.min(b);
        max = max.max(b);
    }
    (min, max)
}
