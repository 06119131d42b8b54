use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read};
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::PingError;

/// `SO_RCVTIMEO` has microsecond resolution and treats zero as "wait forever".
const MIN_READ_TIMEOUT: Duration = Duration::from_micros(1);

/// Address family the engine speaks, derived from the configured IP version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

impl TryFrom<u8> for IpFamily {
    type Error = PingError;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        match version {
            4 => Ok(IpFamily::V4),
            6 => Ok(IpFamily::V6),
            _ => Err(PingError::BadIpVersion),
        }
    }
}

impl IpFamily {
    fn matches(self, addr: &IpAddr) -> bool {
        matches!((self, addr), (IpFamily::V4, IpAddr::V4(_)) | (IpFamily::V6, IpAddr::V6(_)))
    }
}

/// Raw datagram endpoint used by the exchange engine.
///
/// Implemented for [`socket2::Socket`]; the engine only needs to send whole
/// datagrams, bound its reads by a timeout and read whole datagrams back.
pub trait EchoTransport: Sized {
    fn open(family: IpFamily, ttl: u32) -> io::Result<Self>;

    fn send_to(&self, packet: &[u8], dest: IpAddr) -> io::Result<usize>;

    fn set_read_timeout(&self, timeout: Duration) -> io::Result<()>;

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

impl EchoTransport for Socket {
    fn open(family: IpFamily, ttl: u32) -> io::Result<Self> {
        let socket = match family {
            IpFamily::V4 => {
                let socket = Socket::new(Domain::IPV4, Type::RAW, Some(Protocol::ICMPV4))?;
                socket.set_ttl(ttl)?;
                socket
            }
            IpFamily::V6 => {
                let socket = Socket::new(Domain::IPV6, Type::RAW, Some(Protocol::ICMPV6))?;
                socket.set_unicast_hops_v6(ttl)?;
                socket
            }
        };

        info!("Opened raw {:?} ICMP socket (ttl {})", family, ttl);
        Ok(socket)
    }

    fn send_to(&self, packet: &[u8], dest: IpAddr) -> io::Result<usize> {
        let addr = SockAddr::from(SocketAddr::new(dest, 0));
        Socket::send_to(self, packet, &addr)
    }

    fn set_read_timeout(&self, timeout: Duration) -> io::Result<()> {
        Socket::set_read_timeout(self, Some(timeout.max(MIN_READ_TIMEOUT)))
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read(buf)
    }
}

/// Lazily opened socket slot owned by the engine.
#[derive(Debug)]
pub struct SocketSlot<T> {
    socket: Option<T>,
}

impl<T: EchoTransport> SocketSlot<T> {
    pub fn empty() -> Self {
        Self { socket: None }
    }

    pub fn with(socket: T) -> Self {
        Self { socket: Some(socket) }
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    /// Open the socket on first use. Later calls are no-ops.
    pub fn ensure_open(&mut self, ip_version: u8, ttl: u32) -> Result<&mut T, PingError> {
        if self.socket.is_none() {
            let family = IpFamily::try_from(ip_version)?;
            self.socket = Some(T::open(family, ttl)?);
        }

        match self.socket.as_mut() {
            Some(socket) => Ok(socket),
            None => Err(not_open()),
        }
    }

    pub fn get_mut(&mut self) -> Result<&mut T, PingError> {
        self.socket.as_mut().ok_or_else(not_open)
    }

    pub fn close(&mut self) -> Result<(), PingError> {
        match self.socket.take() {
            Some(socket) => {
                drop(socket);
                debug!("Raw socket closed");
                Ok(())
            }
            None => Err(not_open()),
        }
    }
}

fn not_open() -> PingError {
    PingError::Io(io::Error::new(io::ErrorKind::NotConnected, "socket is not open"))
}

/// Resolve `dest` to an address of the configured family.
///
/// Literals are taken as-is, anything else goes through the system resolver.
/// Every failure collapses into [`PingError::BadIpAddress`].
pub fn resolve(ip_version: u8, dest: &str) -> Result<IpAddr, PingError> {
    let family = IpFamily::try_from(ip_version)?;

    if let Ok(addr) = dest.parse::<IpAddr>() {
        let addr = match (family, addr) {
            (IpFamily::V4, IpAddr::V6(v6)) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(addr),
            _ => addr,
        };
        return if family.matches(&addr) {
            Ok(addr)
        } else {
            Err(PingError::BadIpAddress)
        };
    }

    (dest, 0)
        .to_socket_addrs()
        .map_err(|_| PingError::BadIpAddress)?
        .map(|sa| sa.ip())
        .find(|addr| family.matches(addr))
        .ok_or(PingError::BadIpAddress)
}
