//! Configuration module for netprobe.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use hickory_resolver::system_conf::read_system_conf;
use thiserror::Error;

use crate::probe::ProbeKind;

const DNS_PORT: u16 = 53;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid resolver address {0:?}, expected ip or ip:port")]
    InvalidResolver(String),
}

/// Diagnostics configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DiagConfig {
    /// TCP connect timeout (default: 2s)
    pub tcp_timeout: Duration,
    /// HTTP request timeout (default: 5s)
    pub http_timeout: Duration,
    /// DNS query timeout (default: 5s)
    pub dns_timeout: Duration,
    /// Resolver queried by the DNS probe (default: first system name server)
    pub dns_server: Option<SocketAddr>,
    /// Directory that saved reports go to (default: "reports")
    pub report_dir: PathBuf,
    /// Attempts per monitor run (default: 5)
    pub monitor_count: u32,
    /// Pause between monitor attempts (default: 1s)
    pub monitor_interval: Duration,
}

impl Default for DiagConfig {
    fn default() -> Self {
        Self {
            tcp_timeout: ProbeKind::Tcp.default_timeout(),
            http_timeout: ProbeKind::Http.default_timeout(),
            dns_timeout: ProbeKind::Dns.default_timeout(),
            dns_server: None,
            report_dir: PathBuf::from("reports"),
            monitor_count: 5,
            monitor_interval: Duration::from_secs(1),
        }
    }
}

impl DiagConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `NETPROBE_TCP_TIMEOUT`, `NETPROBE_HTTP_TIMEOUT`, `NETPROBE_DNS_TIMEOUT`: seconds
    /// - `NETPROBE_DNS_SERVER`: resolver as `ip` or `ip:port`
    /// - `NETPROBE_REPORT_DIR`: report directory
    /// - `NETPROBE_MONITOR_COUNT`: attempts per monitor run
    /// - `NETPROBE_MONITOR_INTERVAL`: seconds between attempts
    pub fn load() -> Self {
        let mut cfg = Self::from_lookup(|name| env::var(name).ok());
        if cfg.dns_server.is_none() {
            cfg.dns_server = system_resolver();
        }
        cfg
    }

    /// Build a configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(timeout) = seconds_var(&lookup, "NETPROBE_TCP_TIMEOUT") {
            cfg.tcp_timeout = timeout;
        }
        if let Some(timeout) = seconds_var(&lookup, "NETPROBE_HTTP_TIMEOUT") {
            cfg.http_timeout = timeout;
        }
        if let Some(timeout) = seconds_var(&lookup, "NETPROBE_DNS_TIMEOUT") {
            cfg.dns_timeout = timeout;
        }

        if let Some(server) = lookup("NETPROBE_DNS_SERVER") {
            match parse_resolver(&server) {
                Ok(addr) => cfg.dns_server = Some(addr),
                Err(e) => tracing::warn!("Ignoring NETPROBE_DNS_SERVER: {}", e),
            }
        }

        if let Some(dir) = lookup("NETPROBE_REPORT_DIR") {
            cfg.report_dir = PathBuf::from(dir);
        }

        if let Some(count) = lookup("NETPROBE_MONITOR_COUNT") {
            match count.parse::<u32>() {
                Ok(count) if count > 0 => cfg.monitor_count = count,
                _ => tracing::warn!("Ignoring NETPROBE_MONITOR_COUNT={:?}", count),
            }
        }

        // Zero is a valid interval here, unlike the timeouts
        if let Some(interval) = lookup("NETPROBE_MONITOR_INTERVAL") {
            match interval.parse::<f64>() {
                Ok(secs) if secs.is_finite() && secs >= 0.0 => {
                    cfg.monitor_interval = Duration::from_secs_f64(secs)
                }
                _ => tracing::warn!("Ignoring NETPROBE_MONITOR_INTERVAL={:?}", interval),
            }
        }

        cfg
    }

    pub fn timeout_for(&self, kind: ProbeKind) -> Duration {
        match kind {
            ProbeKind::Tcp => self.tcp_timeout,
            ProbeKind::Http => self.http_timeout,
            ProbeKind::Dns => self.dns_timeout,
        }
    }
}

fn seconds_var<F>(lookup: &F, name: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(name)?;
    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs > 0.0 => Some(Duration::from_secs_f64(secs)),
        _ => {
            tracing::warn!("Ignoring {}={:?}: expected a positive number of seconds", name, value);
            None
        }
    }
}

/// Parse a resolver address given as `ip` or `ip:port`.
pub fn parse_resolver(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    if let Ok(addr) = value.parse::<SocketAddr>() {
        return Ok(addr);
    }
    value
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, DNS_PORT))
        .map_err(|_| ConfigError::InvalidResolver(value.to_string()))
}

/// First name server of the operating system's resolver configuration.
pub fn system_resolver() -> Option<SocketAddr> {
    match read_system_conf() {
        Ok((config, _opts)) => config.name_servers().first().map(|ns| ns.socket_addr),
        Err(e) => {
            tracing::debug!("Could not read system resolver config: {}", e);
            None
        }
    }
}
