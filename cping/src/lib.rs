//! ICMP/ICMPv6 echo exchange over raw sockets.
//!
//! [`EchoSender`] runs one echo attempt at a time against a single
//! destination, classifies whatever comes back, and keeps a timestamped record
//! of every attempt for [`stats::summarize`].

pub mod config;
pub mod error;
pub mod packet;
pub mod payload;
pub mod sender;
pub mod socket;
pub mod stats;

pub use config::Config;
pub use error::{EchoFailure, PingError};
pub use sender::{EchoRecord, EchoSender, Outcome};
pub use stats::Summary;
