//! Core types shared by the sender and receiver

use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::ops::{Add, AddAssign};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EndpointError;

/// Where a sender connects to, or a receiver binds on
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Resolve to socket addresses.
    ///
    /// Accepts IPv4/IPv6 literals and hostnames. Resolution failures are
    /// reported as connect-time errors by the sender.
    pub fn resolve(&self) -> std::io::Result<Vec<SocketAddr>> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AddrNotAvailable,
                format!("{} resolved to no addresses", self.host),
            ));
        }
        Ok(addrs)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    /// Parse `host:port` or `[v6]:port`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| EndpointError::MissingPort(s.to_string()))?;

        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        if host.is_empty() {
            return Err(EndpointError::EmptyHost(s.to_string()));
        }

        let port = parse_port(port)?;
        Ok(Endpoint::new(host, port))
    }
}

/// Parse a port in `1..=65535`
pub fn parse_port(s: &str) -> Result<u16, EndpointError> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(EndpointError::InvalidPort(s.to_string())),
        Ok(port) => Ok(port),
    }
}

/// Running total of bytes moved by one transfer
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ByteCount(pub u64);

impl ByteCount {
    pub const ZERO: ByteCount = ByteCount(0);

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Add<u64> for ByteCount {
    type Output = ByteCount;

    fn add(self, rhs: u64) -> ByteCount {
        ByteCount(self.0 + rhs)
    }
}

impl AddAssign<u64> for ByteCount {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl From<ByteCount> for u64 {
    fn from(b: ByteCount) -> u64 {
        b.0
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which file of a session an error refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileRole {
    Source,
    Destination,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Source => f.write_str("source"),
            FileRole::Destination => f.write_str("destination"),
        }
    }
}

/// Which way bytes were flowing when a data-loop error happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IoDirection {
    Send,
    Receive,
}

impl fmt::Display for IoDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoDirection::Send => f.write_str("send"),
            IoDirection::Receive => f.write_str("receive"),
        }
    }
}

/// How the receiver's data loop ended.
///
/// The stream has no length prefix or end marker, so `PeerClosed` covers both
/// a sender that finished and one whose connection died with a plain EOF.
/// `PeerReset` is reported only when the transport says so explicitly; the
/// bytes received before the reset are kept either way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    PeerClosed,
    PeerReset,
}

/// Result of a successful send
#[derive(Clone, Debug)]
pub struct SendReport {
    pub endpoint: Endpoint,
    pub bytes: ByteCount,
    pub chunks: u64,
    pub elapsed: Duration,
}

impl SendReport {
    pub fn summary(&self) -> String {
        format!(
            "Sent {} bytes in {} chunks to {} in {:.2}s ({})",
            self.bytes,
            self.chunks,
            self.endpoint,
            self.elapsed.as_secs_f64(),
            human_rate(self.bytes, self.elapsed)
        )
    }
}

/// Result of a successful receive
#[derive(Clone, Debug)]
pub struct ReceiveReport {
    pub peer: SocketAddr,
    pub bytes: ByteCount,
    pub chunks: u64,
    pub elapsed: Duration,
    pub completion: Completion,
}

impl ReceiveReport {
    /// True when the peer closed the stream without the transport reporting a reset
    pub fn is_clean(&self) -> bool {
        self.completion == Completion::PeerClosed
    }

    pub fn summary(&self) -> String {
        let ending = match self.completion {
            Completion::PeerClosed => "peer closed",
            Completion::PeerReset => "peer reset, data may be truncated",
        };
        format!(
            "Received {} bytes in {} chunks from {} in {:.2}s ({}) - {}",
            self.bytes,
            self.chunks,
            self.peer,
            self.elapsed.as_secs_f64(),
            human_rate(self.bytes, self.elapsed),
            ending
        )
    }
}

/// Normalize an optional deadline: a zero duration means "no deadline",
/// the same as `None`. The socket setters reject zero outright.
pub fn deadline(timeout: Option<Duration>) -> Option<Duration> {
    timeout.filter(|d| !d.is_zero())
}

/// Format a transfer rate as a human-readable string
pub fn human_rate(bytes: ByteCount, elapsed: Duration) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let secs = elapsed.as_secs_f64();
    let bps = if secs > 0.0 { bytes.0 as f64 / secs } else { 0.0 };

    if bps >= GB {
        format!("{:.2} GB/s", bps / GB)
    } else if bps >= MB {
        format!("{:.2} MB/s", bps / MB)
    } else if bps >= KB {
        format!("{:.2} KB/s", bps / KB)
    } else {
        format!("{:.0} B/s", bps)
    }
}
