use rand::RngCore;
use rand::rngs::OsRng;
use socket2::Socket;
use std::io;
use std::time::{Duration, Instant, SystemTime};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EchoFailure, PingError};
use crate::packet::{Verdict, build_echo_request, classify};
use crate::socket::{EchoTransport, SocketSlot, resolve};
use crate::stats::{Summary, summarize};

/// How a recorded attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Reply,
    Failure(EchoFailure),
    /// The receive itself failed; the run is aborted after this record.
    Fault(io::ErrorKind),
}

impl Outcome {
    pub fn is_reply(&self) -> bool {
        matches!(self, Outcome::Reply)
    }

    fn of(result: &Result<(), PingError>) -> Self {
        match result {
            Ok(()) => Outcome::Reply,
            Err(PingError::Echo(failure)) => Outcome::Failure(*failure),
            Err(PingError::Io(e)) => Outcome::Fault(e.kind()),
            Err(_) => Outcome::Fault(io::ErrorKind::Other),
        }
    }
}

/// One attempt that got as far as waiting for a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoRecord {
    pub outcome: Outcome,
    pub sent: SystemTime,
    pub received: SystemTime,
}

/// Echo exchange engine bound to one run configuration.
///
/// Attempts run strictly one after another through `&mut self`. The socket is
/// opened on the first attempt and stays open until [`EchoSender::close`].
pub struct EchoSender<T: EchoTransport = Socket> {
    config: Config,
    identifier: Option<u16>,
    sequence: u16,
    socket: SocketSlot<T>,
    results: Vec<EchoRecord>,
}

impl<T: EchoTransport> EchoSender<T> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            identifier: None,
            sequence: 0,
            socket: SocketSlot::empty(),
            results: Vec::new(),
        }
    }

    /// Engine with an already open transport.
    pub fn with_transport(config: Config, transport: T) -> Self {
        Self {
            socket: SocketSlot::with(transport),
            ..Self::new(config)
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sequence(&self) -> u16 {
        self.sequence
    }

    pub fn results(&self) -> &[EchoRecord] {
        &self.results
    }

    /// Draw the echo identifier on first use and keep it for the engine's lifetime.
    pub fn ensure_id(&mut self) -> Result<u16, PingError> {
        if let Some(id) = self.identifier {
            return Ok(id);
        }

        let mut buf = [0u8; 2];
        OsRng.try_fill_bytes(&mut buf)?;
        let id = u16::from_be_bytes(buf);
        debug!("Allocated echo identifier {:#06x}", id);

        self.identifier = Some(id);
        Ok(id)
    }

    pub fn ensure_open(&mut self) -> Result<(), PingError> {
        self.socket
            .ensure_open(self.config.ip_version, self.config.ttl)
            .map(|_| ())
    }

    /// Send one echo request and wait for its answer.
    ///
    /// Failures before the request leaves the socket are returned without a
    /// record. Once sent, the attempt is always recorded and the sequence
    /// number advances, whatever the outcome.
    pub fn send_and_receive(&mut self) -> Result<(), PingError> {
        let id = self.ensure_id()?;
        self.ensure_open()?;

        let packet = build_echo_request(
            self.config.ip_version,
            id,
            self.sequence,
            self.config.size,
            &self.config.payload,
        )?;

        let dest = resolve(self.config.ip_version, &self.config.dest)?;

        let socket = self.socket.get_mut()?;
        let written = socket.send_to(&packet, dest)?;
        let sent = SystemTime::now();
        debug!("Sent echo seq {} to {} ({} bytes)", self.sequence, dest, written);

        let result = self.receive();
        let received = SystemTime::now();

        self.results.push(EchoRecord {
            outcome: Outcome::of(&result),
            sent,
            received,
        });
        self.sequence = self.sequence.wrapping_add(1);

        result
    }

    /// Read until a datagram for this engine arrives or the timeout elapses.
    ///
    /// Foreign datagrams are skipped without extending the deadline.
    fn receive(&mut self) -> Result<(), PingError> {
        let id = self.ensure_id()?;
        let ip_version = self.config.ip_version;
        let deadline = Instant::now() + Duration::from_secs(self.config.timeout_secs);
        let mut buf = vec![0u8; self.config.size];
        let socket = self.socket.get_mut()?;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(EchoFailure::TimeoutExceeded.into());
            }
            socket.set_read_timeout(remaining)?;

            let amt = match socket.recv(&mut buf) {
                Ok(amt) => amt,
                Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                    return Err(EchoFailure::TimeoutExceeded.into());
                }
                Err(e) => {
                    warn!("Receive failed on raw socket: {}", e);
                    return Err(e.into());
                }
            };

            match classify(&buf[..amt], id, ip_version)? {
                Verdict::Foreign => {
                    debug!("Ignoring {} byte datagram not addressed to us", amt);
                    continue;
                }
                Verdict::Reply => return Ok(()),
                Verdict::Failure(failure) => return Err(failure.into()),
            }
        }
    }

    pub fn summary(&self) -> Summary {
        summarize(&self.results)
    }

    /// Release the socket. Closing an engine that never opened one is an error.
    pub fn close(&mut self) -> Result<(), PingError> {
        self.socket.close()?;
        info!("Echo sender closed after {} attempts", self.results.len());
        Ok(())
    }
}
