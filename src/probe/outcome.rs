//! Probe outcome types.

use serde::Serialize;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;

/// Shared taxonomy of diagnostic failures across all probe kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    ResolutionFailure,
    ConnectionRefused,
    ConnectFailure,
    ProtocolError,
    NameNotFound,
    NoRecord,
    NoServersAvailable,
    Unclassified,
}

impl ErrorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::ResolutionFailure => "resolution_failure",
            ErrorKind::ConnectionRefused => "connection_refused",
            ErrorKind::ConnectFailure => "connect_failure",
            ErrorKind::ProtocolError => "protocol_error",
            ErrorKind::NameNotFound => "name_not_found",
            ErrorKind::NoRecord => "no_record",
            ErrorKind::NoServersAvailable => "no_servers_available",
            ErrorKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::Timeout => "timed out",
            ErrorKind::ResolutionFailure => "name resolution failed",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::ConnectFailure => "connect failure",
            ErrorKind::ProtocolError => "protocol error",
            ErrorKind::NameNotFound => "domain does not exist",
            ErrorKind::NoRecord => "no matching record",
            ErrorKind::NoServersAvailable => "no DNS servers available",
            ErrorKind::Unclassified => "unexpected error",
        };
        f.write_str(text)
    }
}

/// A classified probe failure.
///
/// `detail` is opaque diagnostic text (the unresolved name, the library's
/// error message, ...). Nothing in the crate inspects it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {detail}")]
pub struct ProbeFailure {
    pub kind: ErrorKind,
    pub detail: String,
}

impl ProbeFailure {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Probe-specific data attached to a successful outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Peer address the TCP connection was established with.
    Connected { peer: SocketAddr },
    /// Status code of the first HTTP response, whatever its class.
    Status { code: u16 },
    /// First address record returned by the resolver.
    Resolved { ip: IpAddr },
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Connected { peer } => write!(f, "connected to {}", peer),
            Payload::Status { code } => write!(f, "status {}", code),
            Payload::Resolved { ip } => write!(f, "resolved to {}", ip),
        }
    }
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { latency: Duration, payload: Payload },
    Failure(ProbeFailure),
}

impl Outcome {
    pub fn success(latency: Duration, payload: Payload) -> Self {
        Outcome::Success { latency, payload }
    }

    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Outcome::Failure(ProbeFailure::new(kind, detail))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn latency(&self) -> Option<Duration> {
        match self {
            Outcome::Success { latency, .. } => Some(*latency),
            Outcome::Failure(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Outcome::Success { payload, .. } => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure) => Some(failure.kind),
        }
    }

    pub fn failure_ref(&self) -> Option<&ProbeFailure> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }
}

impl From<ProbeFailure> for Outcome {
    fn from(failure: ProbeFailure) -> Self {
        Outcome::Failure(failure)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success { latency, payload } => {
                write!(f, "{} in {:.3}s", payload, latency.as_secs_f64())
            }
            Outcome::Failure(failure) => write!(f, "failed: {}", failure),
        }
    }
}
