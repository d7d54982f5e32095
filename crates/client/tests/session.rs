//! End-to-end session tests against an in-process rtl_tcp server.
//!
//! Each test binds its own listener on an ephemeral port and scripts the
//! server side of the protocol: handshake, payload, disconnects.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use num_complex::Complex32;
use sw_client::{Command, MessageLevel, RtlTcpClient};

const NETWORK_BUFFER: usize = 256 * 32768;
const R820T_ID: u32 = 5;

fn handshake(tuner: u32, gains: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(12);
    out.extend_from_slice(b"RTL0");
    out.extend_from_slice(&tuner.to_be_bytes());
    out.extend_from_slice(&gains.to_be_bytes());
    out
}

fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    cond()
}

fn new_client(port: u16) -> RtlTcpClient {
    let client = RtlTcpClient::new();
    client.set_server_address("127.0.0.1");
    client.set_port(port);
    client
}

#[test]
fn clean_connect_streams_samples() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (cmd_tx, cmd_rx) = mpsc::channel();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&handshake(R820T_ID, 29)).unwrap();

        // enough centered samples to pass the 50% prebuffer threshold
        let chunk = vec![128u8; 65536];
        let mut sent = 0usize;
        while sent < NETWORK_BUFFER / 2 + 4 * chunk.len() {
            if stream.write_all(&chunk).is_err() {
                return;
            }
            sent += chunk.len();
        }

        // the four startup commands arrive right after the handshake
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut cmds = Vec::new();
        for _ in 0..4 {
            let mut rec = [0u8; 5];
            if stream.read_exact(&mut rec).is_err() {
                break;
            }
            cmds.push(rec);
        }
        let _ = cmd_tx.send(cmds);

        // hold the connection until the client goes away
        let mut sink = [0u8; 64];
        while let Ok(n) = stream.read(&mut sink) {
            if n == 0 {
                break;
            }
        }
    });

    let client = new_client(port);
    client.set_frequency(222_064_000);
    client.set_gain(6);
    assert!(client.restart());
    assert!(client.is_running());
    assert_eq!(client.gain_count(), 29);

    let cmds = cmd_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(cmds.len(), 4);
    assert_eq!(client.tuner_gain_count(), 29);
    assert_eq!(Command::decode(&cmds[0]), Some(Command::SetGainMode(1)));
    // gain index 6 on the R820T is 8.7 dB -> 87 tenths
    assert_eq!(Command::decode(&cmds[1]), Some(Command::SetTunerGain(87)));
    assert_eq!(
        Command::decode(&cmds[2]),
        Some(Command::SetSampleRate(2_048_000))
    );
    assert_eq!(
        Command::decode(&cmds[3]),
        Some(Command::SetFrequency(222_064_000))
    );

    // samples flow once the prebuffer phase ends, centered bytes map to 0+0i
    let mut samples = vec![Complex32::default(); 4096];
    let mut got = 0usize;
    assert!(wait_for(
        || {
            got = client.read_samples(&mut samples);
            got > 0
        },
        Duration::from_secs(10)
    ));
    for s in &samples[..got] {
        assert_eq!(*s, Complex32::new(0.0, 0.0));
    }

    // the spectrum feed carries the same stream
    assert!(wait_for(
        || !client.read_spectrum_samples(1024).is_empty(),
        Duration::from_secs(10)
    ));

    // a reset drains the pipeline; nothing refills it because the network
    // buffer stays below the prebuffer threshold afterwards
    assert!(wait_for(
        || {
            client.reset();
            client.samples_to_read() == 0
        },
        Duration::from_secs(5)
    ));

    client.stop();
    assert!(!client.is_running());
    server.join().unwrap();
}

#[test]
fn bad_magic_ends_the_session() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();

        // a full receive window of garbage so the header check runs
        let mut junk = vec![0xAAu8; 8192];
        junk[..4].copy_from_slice(b"XXXX");
        stream.write_all(&junk).unwrap();

        // the client must close without sending a single command
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut buf = [0u8; 5];
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => {}
            Ok(n) => panic!("client sent {} unexpected bytes", n),
        }
    });

    let client = new_client(port);
    let events = client.events();
    client.restart();

    assert!(wait_for(|| !client.is_running(), Duration::from_secs(10)));

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.level, MessageLevel::Error);
    assert_eq!(event.text, "RTL-TCP connection closed.");

    client.stop();
    server.join().unwrap();
}

#[test]
fn reconnects_after_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let (cmd_tx, cmd_rx) = mpsc::channel();

    let server = thread::spawn(move || {
        // first session: handshake plus payload, then drop mid-stream
        {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(&handshake(R820T_ID, 29)).unwrap();
            stream.write_all(&[128u8; 16384]).unwrap();

            stream
                .set_read_timeout(Some(Duration::from_secs(10)))
                .unwrap();
            let mut startup = [0u8; 20];
            let _ = stream.read_exact(&mut startup);
        }

        // second session: the client must redo the whole handshake
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&handshake(R820T_ID, 29)).unwrap();
        stream.write_all(&[128u8; 8192]).unwrap();

        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        let mut cmds = Vec::new();
        for _ in 0..4 {
            let mut rec = [0u8; 5];
            if stream.read_exact(&mut rec).is_err() {
                break;
            }
            cmds.push(rec);
        }
        let _ = cmd_tx.send(cmds);

        let mut sink = [0u8; 64];
        while let Ok(n) = stream.read(&mut sink) {
            if n == 0 {
                break;
            }
        }
    });

    let client = new_client(port);
    client.set_frequency(178_352_000);
    let events = client.events();
    client.restart();

    // the mid-stream drop is reported, then the client reconnects
    let event = events.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(event.level, MessageLevel::Error);
    assert_eq!(event.text, "RTL-TCP connection closed.");

    let cmds = cmd_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(cmds.len(), 4, "startup sequence missing on reconnect");
    assert_eq!(Command::decode(&cmds[0]), Some(Command::SetGainMode(1)));
    assert!(client.is_running());

    client.stop();
    server.join().unwrap();
}

#[test]
fn stop_unblocks_a_pending_read() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        // handshake only; the client blocks waiting for sample data
        stream.write_all(&handshake(R820T_ID, 29)).unwrap();

        let mut sink = [0u8; 64];
        while let Ok(n) = stream.read(&mut sink) {
            if n == 0 {
                break;
            }
        }
    });

    let client = Arc::new(new_client(port));
    assert!(client.restart());

    // run stop() on its own thread so a hang fails the test instead of
    // wedging the harness
    let stopper = {
        let client = Arc::clone(&client);
        thread::spawn(move || client.stop())
    };

    let deadline = Instant::now() + Duration::from_secs(10);
    while !stopper.is_finished() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(stopper.is_finished(), "stop() hung on a blocked read");
    stopper.join().unwrap();
    assert!(!client.is_running());

    server.join().unwrap();
}

#[test]
fn connect_failure_gives_up_with_an_event() {
    // bind and immediately drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = new_client(port);
    let events = client.events();
    assert!(!client.restart());
    assert!(wait_for(|| !client.is_running(), Duration::from_secs(5)));

    let event = events.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(event.level, MessageLevel::Error);
    assert_eq!(
        event.text,
        format!("Connection failed to server 127.0.0.1:{}", port)
    );

    client.stop();
}

#[test]
fn restart_is_idempotent() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let server = thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        stream.write_all(&handshake(R820T_ID, 29)).unwrap();

        let mut sink = [0u8; 64];
        while let Ok(n) = stream.read(&mut sink) {
            if n == 0 {
                break;
            }
        }
    });

    let client = new_client(port);
    assert!(client.restart());
    // second call returns immediately without spawning anything new
    let before = Instant::now();
    assert!(client.restart());
    assert!(before.elapsed() < Duration::from_millis(400));
    assert!(client.is_running());

    client.stop();
    assert!(!client.is_running());
    server.join().unwrap();
}
