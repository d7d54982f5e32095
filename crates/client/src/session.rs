// Copyright 2025-2026 CEMAXECUTER LLC

//! Session controller: the public face of the client.
//!
//! Owns the worker threads and enforces start/stop atomicity. All methods
//! take `&self`; the embedding application may call them from any thread.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver};
use num_complex::Complex32;
use sw_tuner::TunerType;

use crate::pacing::PacingWorker;
use crate::proto::{complex_from_iq, Command};
use crate::receive::ReceiveWorker;
use crate::ring::RingBuffer;
use crate::shared::{SessionEvent, Shared};

/// Grace period after spawning the workers, long enough for the connect
/// and handshake to settle before `restart` reports the outcome.
const STARTUP_GRACE: Duration = Duration::from_millis(500);

/// Client for a remote rtl_tcp server.
///
/// ```no_run
/// use sw_client::RtlTcpClient;
///
/// let client = RtlTcpClient::new();
/// client.set_server_address("10.0.0.17");
/// client.set_port(1234);
/// client.set_frequency(222_064_000);
/// if client.restart() {
///     let mut samples = vec![num_complex::Complex32::default(); 4096];
///     let n = client.read_samples(&mut samples);
///     println!("got {} samples", n);
/// }
/// client.stop();
/// ```
pub struct RtlTcpClient {
    shared: Arc<Shared>,
    events: Receiver<SessionEvent>,
    receive_thread: Mutex<Option<JoinHandle<()>>>,
    pacing_thread: Mutex<Option<JoinHandle<()>>>,
}

impl RtlTcpClient {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        RtlTcpClient {
            shared: Arc::new(Shared::new(tx)),
            events: rx,
            receive_thread: Mutex::new(None),
            pacing_thread: Mutex::new(None),
        }
    }

    /// Channel carrying disconnects, connect failures and overload
    /// warnings. May be cloned and read from any thread.
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.events.clone()
    }

    /// Host used by the next connect.
    pub fn set_server_address(&self, host: &str) {
        self.shared.lock().host = host.to_string();
    }

    /// Port used by the next connect.
    pub fn set_port(&self, port: u16) {
        self.shared.lock().port = port;
    }

    /// Retune the remote dongle. Takes effect immediately when connected,
    /// otherwise on the next handshake.
    pub fn set_frequency(&self, hz: i32) {
        self.shared.lock().frequency = hz;
        self.shared.send_command(Command::SetFrequency(hz));
    }

    pub fn frequency(&self) -> i32 {
        self.shared.lock().frequency
    }

    /// Select a gain index from the current tuner's schedule; returns the
    /// resolved gain in dB.
    pub fn set_gain(&self, index: u16) -> f32 {
        self.shared.apply_gain(index)
    }

    /// Currently selected gain in dB.
    pub fn gain(&self) -> f32 {
        self.shared.lock().gain_value
    }

    /// Number of gain steps of the current tuner (29 when unknown).
    pub fn gain_count(&self) -> u32 {
        sw_tuner::gain_count(self.shared.lock().tuner) as u32
    }

    /// Enable or disable the software AGC.
    pub fn set_agc(&self, on: bool) {
        self.shared
            .agc_enabled
            .store(on, std::sync::atomic::Ordering::Relaxed);
    }

    /// Tuner chip announced by the server, `Unknown` before the handshake.
    pub fn tuner_type(&self) -> TunerType {
        self.shared.lock().tuner
    }

    /// Gain step count announced by the server in the handshake. The local
    /// schedule (see [`gain_count`](RtlTcpClient::gain_count)) stays
    /// authoritative for index resolution.
    pub fn tuner_gain_count(&self) -> u32 {
        self.shared.lock().tuner_gain_count
    }

    /// Drain up to `out.len()` complex samples from the demodulator feed;
    /// returns the number of samples written.
    pub fn read_samples(&self, out: &mut [Complex32]) -> usize {
        read_convert(&self.shared.pipeline.samples, out)
    }

    /// Drain up to `count` complex samples from the spectrum feed.
    pub fn read_spectrum_samples(&self, count: usize) -> Vec<Complex32> {
        let mut out = vec![Complex32::default(); count];
        let n = read_convert(&self.shared.pipeline.spectrum, &mut out);
        out.truncate(n);
        out
    }

    /// Complex samples currently waiting in the demodulator feed.
    pub fn samples_to_read(&self) -> usize {
        self.shared.pipeline.samples.available() / 2
    }

    /// Flush all pipeline buffers and restart the prebuffer phase.
    pub fn reset(&self) {
        self.shared.reset();
    }

    /// Start the session. Idempotent: returns true immediately when already
    /// running. Otherwise joins residue of a previous failed start, spawns
    /// the pacing and receive threads (the receive thread brings up the AGC
    /// thread once connected), waits half a second and reports whether the
    /// connection is up.
    pub fn restart(&self) -> bool {
        if self.shared.lock().running {
            return true;
        }

        // threads from a failed previous start have exited by now but must
        // be joined before their slots are reused
        self.join_workers();

        self.shared.lock().running = true;

        let shared = Arc::clone(&self.shared);
        *self.pacing_thread.lock().unwrap() =
            Some(thread::spawn(move || PacingWorker::new(shared).run()));

        let shared = Arc::clone(&self.shared);
        *self.receive_thread.lock().unwrap() =
            Some(thread::spawn(move || ReceiveWorker::new(shared).run()));

        thread::sleep(STARTUP_GRACE);
        self.shared.lock().connected
    }

    /// Tear the session down and join all worker threads. Safe to call
    /// concurrently with a pending connect or a blocked read; closing the
    /// socket is what unblocks the receive thread.
    pub fn stop(&self) {
        #[cfg(target_os = "android")]
        self.shared.send_command(Command::AndroidExit);

        {
            let mut s = self.shared.lock();
            self.shared.socket.close();
            s.running = false;
            s.connected = false;
        }

        self.join_workers();
    }

    /// True while the session (not necessarily the connection) is up.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn description(&self) -> String {
        let s = self.shared.lock();
        format!("rtl_tcp_client (server: {}:{})", s.host, s.port)
    }

    /// Join receive, AGC and pacing threads, in that order.
    fn join_workers(&self) {
        if let Some(handle) = self.receive_thread.lock().unwrap().take() {
            let _ = handle.join();
        }

        self.shared.lock().agc_running = false;
        self.shared.join_agc();

        if let Some(handle) = self.pacing_thread.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Default for RtlTcpClient {
    fn default() -> Self {
        RtlTcpClient::new()
    }
}

impl Drop for RtlTcpClient {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Pull bytes out of a ring buffer and convert IQ pairs to complex
/// samples; returns the number of samples produced.
fn read_convert(buffer: &RingBuffer, out: &mut [Complex32]) -> usize {
    let mut bytes = vec![0u8; out.len() * 2];
    let amount = buffer.get(&mut bytes);
    let pairs = amount / 2;
    for (slot, pair) in out.iter_mut().zip(bytes[..pairs * 2].chunks_exact(2)) {
        *slot = complex_from_iq(pair[0], pair[1]);
    }
    pairs
}
