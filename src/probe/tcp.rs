//! TCP connect probe.
//!
//! Uses a blocking socket in spawn_blocking so the connect timing is not
//! skewed by the async scheduler.

use std::net::{IpAddr, Shutdown, SocketAddr};
use std::time::{Duration, Instant};

use socket2::{Domain, Protocol, Socket, Type};

use super::classify::classify_connect_error;
use super::{ErrorKind, Outcome, Payload, ProbeFailure};

/// Open a TCP connection to `host:port` and report how long it took.
///
/// Name resolution and the connect share one deadline; the measured latency
/// covers both, which is what a client opening the connection experiences.
pub async fn run_tcp_probe(host: &str, port: u16, timeout: Duration) -> Outcome {
    let start = Instant::now();

    let addr = match tokio::time::timeout(timeout, resolve_address(host, port)).await {
        Ok(Ok(addr)) => addr,
        Ok(Err(failure)) => return failure.into(),
        Err(_) => {
            return Outcome::failure(
                ErrorKind::Timeout,
                format!("resolving {} took longer than {:?}", host, timeout),
            )
        }
    };

    let remaining = timeout.saturating_sub(start.elapsed());
    if remaining.is_zero() {
        return Outcome::failure(
            ErrorKind::Timeout,
            format!("no time left to connect to {} after resolving", addr),
        );
    }

    let result = tokio::task::spawn_blocking(move || connect_blocking(addr, remaining, start)).await;

    match result {
        Ok(Ok(latency)) => Outcome::success(latency, Payload::Connected { peer: addr }),
        Ok(Err(e)) => {
            let kind = classify_connect_error(&e);
            if kind == ErrorKind::Unclassified {
                tracing::warn!("TCP probe to {} failed with unexpected error: {}", addr, e);
            }
            Outcome::failure(kind, format!("{}: {}", addr, e))
        }
        Err(e) => Outcome::failure(ErrorKind::Unclassified, format!("spawn_blocking failed: {}", e)),
    }
}

/// Resolve `host` to a socket address, preferring IPv4.
async fn resolve_address(host: &str, port: u16) -> Result<SocketAddr, ProbeFailure> {
    // Try direct parse first
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let addrs: Vec<SocketAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| {
            ProbeFailure::new(
                ErrorKind::ResolutionFailure,
                format!("failed to resolve {}: {}", host, e),
            )
        })?
        .collect();

    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| {
            ProbeFailure::new(
                ErrorKind::ResolutionFailure,
                format!("no addresses found for {}", host),
            )
        })
}

/// Connect with a hard timeout and close the socket again.
///
/// Returns the time elapsed since `start` at the moment the handshake
/// completed.
fn connect_blocking(addr: SocketAddr, timeout: Duration, start: Instant) -> std::io::Result<Duration> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.connect_timeout(&addr.into(), timeout)?;
    let latency = start.elapsed();

    // Peer may already have closed; the drop below releases the fd either way
    let _ = socket.shutdown(Shutdown::Both);
    Ok(latency)
}
