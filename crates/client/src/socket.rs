// Copyright 2025-2026 CEMAXECUTER LLC

//! Thread-safe handle to the TCP session.
//!
//! The receive thread blocks in [`Socket::recv`] while the control side may
//! call [`Socket::close`] at any moment; `close` shuts the connection down
//! instead of merely dropping it, which turns a blocked read on another
//! thread into an immediate return.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) struct Socket {
    stream: Mutex<Option<TcpStream>>,
}

impl Socket {
    pub fn new() -> Self {
        Socket {
            stream: Mutex::new(None),
        }
    }

    /// Establish a connection with a bounded timeout. Returns false on
    /// resolve failure, refusal or timeout.
    pub fn connect(&self, host: &str, port: u16, timeout: Duration) -> bool {
        let addrs = match (host, port).to_socket_addrs() {
            Ok(addrs) => addrs,
            Err(e) => {
                log::warn!("could not resolve {}:{}: {}", host, port, e);
                return false;
            }
        };

        for addr in addrs {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    *self.stream.lock().unwrap() = Some(stream);
                    return true;
                }
                Err(e) => log::debug!("connect {}: {}", addr, e),
            }
        }
        false
    }

    pub fn valid(&self) -> bool {
        self.stream.lock().unwrap().is_some()
    }

    /// Single write, partials are not retried.
    pub fn send(&self, data: &[u8]) -> io::Result<usize> {
        match self.stream.lock().unwrap().as_ref() {
            Some(mut stream) => stream.write(data),
            None => Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed")),
        }
    }

    /// Blocking read. The stream handle is cloned out of the lock first so
    /// that `close` stays callable while the read waits for bytes.
    pub fn recv(&self, out: &mut [u8]) -> io::Result<usize> {
        let stream = {
            let guard = self.stream.lock().unwrap();
            match guard.as_ref() {
                Some(stream) => stream.try_clone()?,
                None => {
                    return Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"))
                }
            }
        };
        (&stream).read(out)
    }

    /// Idempotent; safe from any thread, including while another thread is
    /// blocked in [`recv`](Socket::recv).
    pub fn close(&self) {
        if let Some(stream) = self.stream.lock().unwrap().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}
