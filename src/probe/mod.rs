//! Probe module for network diagnostics.
//!
//! Supports TCP connect, HTTP and DNS probes. Every probe returns an
//! [`Outcome`]; failures are classified into [`ErrorKind`] and never escape
//! as errors.

pub mod classify;
mod dns;
mod http;
mod outcome;
mod tcp;

pub use dns::*;
pub use http::*;
pub use outcome::*;
pub use tcp::*;

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Default TCP port when the caller does not name one.
pub const DEFAULT_TCP_PORT: u16 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProbeKind {
    Tcp,
    Http,
    Dns,
}

impl ProbeKind {
    /// Timeout applied when the configuration does not override it.
    pub fn default_timeout(&self) -> Duration {
        match self {
            ProbeKind::Tcp => Duration::from_secs(2),
            ProbeKind::Http => Duration::from_secs(5),
            ProbeKind::Dns => Duration::from_secs(5),
        }
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbeKind::Tcp => "tcp",
            ProbeKind::Http => "http",
            ProbeKind::Dns => "dns",
        })
    }
}

/// DNS record type queried by the DNS probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecordType {
    #[default]
    A,
    Aaaa,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        })
    }
}

/// What a probe is pointed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeTarget {
    Tcp { host: String, port: u16 },
    Http { url: String },
    Dns { domain: String, record_type: RecordType },
}

impl ProbeTarget {
    pub fn tcp(host: &str, port: u16) -> Self {
        ProbeTarget::Tcp {
            host: host.to_string(),
            port,
        }
    }

    pub fn http(url: &str) -> Self {
        ProbeTarget::Http {
            url: url.to_string(),
        }
    }

    pub fn dns(domain: &str) -> Self {
        Self::dns_record(domain, RecordType::A)
    }

    pub fn dns_record(domain: &str, record_type: RecordType) -> Self {
        ProbeTarget::Dns {
            domain: domain.to_string(),
            record_type,
        }
    }

    pub fn kind(&self) -> ProbeKind {
        match self {
            ProbeTarget::Tcp { .. } => ProbeKind::Tcp,
            ProbeTarget::Http { .. } => ProbeKind::Http,
            ProbeTarget::Dns { .. } => ProbeKind::Dns,
        }
    }

    /// The host, URL or domain this target names.
    pub fn address(&self) -> &str {
        match self {
            ProbeTarget::Tcp { host, .. } => host,
            ProbeTarget::Http { url } => url,
            ProbeTarget::Dns { domain, .. } => domain,
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Tcp { host, port } => write!(f, "{}:{}", host, port),
            ProbeTarget::Http { url } => f.write_str(url),
            ProbeTarget::Dns {
                domain,
                record_type,
            } => write!(f, "{} {}", domain, record_type),
        }
    }
}

/// A timed network operation.
///
/// Implementations must turn every failure into an [`Outcome::Failure`] and
/// release whatever connection they opened before returning.
pub trait Probe {
    fn execute(
        &self,
        target: &ProbeTarget,
        timeout: Duration,
    ) -> impl Future<Output = Outcome> + Send;
}

/// The real probes, dispatching on the target kind.
#[derive(Debug, Clone, Default)]
pub struct NetworkProbe {
    dns_server: Option<SocketAddr>,
}

impl NetworkProbe {
    pub fn new(dns_server: Option<SocketAddr>) -> Self {
        Self { dns_server }
    }

    pub fn dns_server(&self) -> Option<SocketAddr> {
        self.dns_server
    }
}

impl Probe for NetworkProbe {
    async fn execute(&self, target: &ProbeTarget, timeout: Duration) -> Outcome {
        let outcome = match target {
            ProbeTarget::Tcp { host, port } => run_tcp_probe(host, *port, timeout).await,
            ProbeTarget::Http { url } => run_http_probe(url, timeout).await,
            ProbeTarget::Dns {
                domain,
                record_type,
            } => match self.dns_server {
                Some(server) => run_dns_probe(domain, *record_type, server, timeout).await,
                None => Outcome::failure(ErrorKind::NoServersAvailable, "no resolver configured"),
            },
        };

        // Enforce timeout check
        let outcome = match outcome {
            Outcome::Success { latency, .. } if latency >= timeout => Outcome::failure(
                ErrorKind::Timeout,
                format!("no response within {:?}", timeout),
            ),
            other => other,
        };

        match &outcome {
            Outcome::Success { latency, payload } => {
                tracing::debug!(probe = %target, ?latency, %payload, "probe succeeded");
            }
            Outcome::Failure(failure) => {
                tracing::debug!(probe = %target, kind = failure.kind.label(), detail = %failure.detail, "probe failed");
            }
        }

        outcome
    }
}
