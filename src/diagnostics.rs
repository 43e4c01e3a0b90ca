//! Invocation surface: one entry point per diagnostic.
//!
//! Everything runs sequentially. Results come back as values; progress goes to
//! the configured [`Observer`] unless the facade is quiet.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::config::DiagConfig;
use crate::monitor::{aggregate, AggregateStats, Monitor, MonitorError, SampleSeries};
use crate::observer::{Observer, Silent};
use crate::probe::{NetworkProbe, Outcome, Probe, ProbeTarget, DEFAULT_TCP_PORT};
use crate::report::{
    Report, ReportAssembler, ReportSink, SectionResult, SinkError, API_CHECK, DNS_CHECK, MONITOR,
    PING,
};

/// A finished monitor run.
#[derive(Debug, Clone)]
pub struct MonitorRun {
    pub series: SampleSeries,
    pub stats: AggregateStats,
}

/// Targets and monitor parameters for a full report.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub host: String,
    pub url: String,
    pub domain: String,
    pub monitor_port: u16,
    pub monitor_count: u32,
    pub monitor_interval: Duration,
}

impl ReportRequest {
    pub fn from_config(cfg: &DiagConfig) -> Self {
        Self {
            host: "google.com".to_string(),
            url: "https://api.github.com".to_string(),
            domain: "google.com".to_string(),
            monitor_port: DEFAULT_TCP_PORT,
            monitor_count: cfg.monitor_count,
            monitor_interval: cfg.monitor_interval,
        }
    }
}

/// A report plus what happened when it was handed to the sink, if it was.
#[derive(Debug)]
pub struct GeneratedReport {
    pub report: Report,
    pub persisted: Option<Result<PathBuf, SinkError>>,
}

pub struct Diagnostics<P = NetworkProbe> {
    config: DiagConfig,
    probe: P,
    observer: Arc<dyn Observer>,
    quiet: bool,
}

impl Diagnostics<NetworkProbe> {
    pub fn new(config: DiagConfig) -> Self {
        let probe = NetworkProbe::new(config.dns_server);
        Self::with_probe(config, probe)
    }
}

impl<P: Probe> Diagnostics<P> {
    pub fn with_probe(config: DiagConfig, probe: P) -> Self {
        Self {
            config,
            probe,
            observer: Arc::new(Silent),
            quiet: false,
        }
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = observer;
        self
    }

    /// Suppress observer output; results are still returned.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn config(&self) -> &DiagConfig {
        &self.config
    }

    fn events(&self) -> &dyn Observer {
        if self.quiet {
            &Silent
        } else {
            self.observer.as_ref()
        }
    }

    /// TCP connect to port 80 of `host`.
    pub async fn ping(&self, host: &str) -> Outcome {
        self.probe_once(PING, &ProbeTarget::tcp(host, DEFAULT_TCP_PORT)).await
    }

    /// GET `url` and report its status.
    pub async fn http_check(&self, url: &str) -> Outcome {
        self.probe_once(API_CHECK, &ProbeTarget::http(url)).await
    }

    /// Resolve the A record of `domain`.
    pub async fn dns_check(&self, domain: &str) -> Outcome {
        self.probe_once(DNS_CHECK, &ProbeTarget::dns(domain)).await
    }

    async fn probe_once(&self, name: &str, target: &ProbeTarget) -> Outcome {
        let timeout = self.config.timeout_for(target.kind());
        let outcome = self.probe.execute(target, timeout).await;
        if let Outcome::Failure(failure) = &outcome {
            tracing::info!("{} {} failed: {}", name, target, failure);
        }
        self.events().probe(name, target, &outcome);
        outcome
    }

    /// Connect to `host:port` `count` times, `interval` apart.
    pub async fn monitor(
        &self,
        host: &str,
        port: u16,
        count: u32,
        interval: Duration,
    ) -> Result<MonitorRun, MonitorError> {
        let target = ProbeTarget::tcp(host, port);
        let series = Monitor::new(&self.probe)
            .observer(self.events())
            .timeout(self.config.tcp_timeout)
            .run(&target, count, interval)
            .await?;

        let stats = aggregate(&series);
        self.events().monitor_finished(&target, &stats);
        Ok(MonitorRun { series, stats })
    }

    /// Run every diagnostic against the request's targets and assemble the
    /// results. Individual probe failures end up inside the report.
    pub async fn generate_report(
        &self,
        request: &ReportRequest,
        sink: Option<&dyn ReportSink>,
    ) -> Result<GeneratedReport, MonitorError> {
        if request.monitor_count == 0 {
            return Err(MonitorError::NoAttempts);
        }

        let mut assembler = ReportAssembler::new();

        let ping_target = ProbeTarget::tcp(&request.host, DEFAULT_TCP_PORT);
        let outcome = self.probe_once(PING, &ping_target).await;
        assembler.record(PING, SectionResult::Probe { target: ping_target, outcome });

        let api_target = ProbeTarget::http(&request.url);
        let outcome = self.probe_once(API_CHECK, &api_target).await;
        assembler.record(API_CHECK, SectionResult::Probe { target: api_target, outcome });

        let dns_target = ProbeTarget::dns(&request.domain);
        let outcome = self.probe_once(DNS_CHECK, &dns_target).await;
        assembler.record(DNS_CHECK, SectionResult::Probe { target: dns_target, outcome });

        let run = self
            .monitor(
                &request.host,
                request.monitor_port,
                request.monitor_count,
                request.monitor_interval,
            )
            .await?;
        assembler.record(
            MONITOR,
            SectionResult::Monitor {
                target: run.series.target().clone(),
                stats: run.stats,
            },
        );

        let report = assembler.finish();
        self.events().report(&report);

        let persisted = sink.map(|sink| ReportAssembler::publish(&report, sink, self.events()));

        Ok(GeneratedReport { report, persisted })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::testing::{connected, ScriptedProbe};
    use crate::observer::testing::Recorder;
    use crate::probe::{ErrorKind, Payload};
    use crate::report::JsonFileSink;
    use std::net::{IpAddr, Ipv4Addr};

    fn request(count: u32) -> ReportRequest {
        ReportRequest {
            host: "192.0.2.10".to_string(),
            url: "http://192.0.2.10/".to_string(),
            domain: "example.com".to_string(),
            monitor_port: 80,
            monitor_count: count,
            monitor_interval: Duration::ZERO,
        }
    }

    fn script() -> Vec<Outcome> {
        vec![
            // ping
            Outcome::failure(ErrorKind::ConnectionRefused, "192.0.2.10:80: refused"),
            // api-check
            Outcome::success(Duration::from_millis(80), Payload::Status { code: 500 }),
            // dns-check
            Outcome::success(
                Duration::from_millis(5),
                Payload::Resolved {
                    ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 10)),
                },
            ),
            // monitor
            connected(10),
            connected(30),
        ]
    }

    #[tokio::test]
    async fn test_report_survives_failed_probe() {
        let recorder = Arc::new(Recorder::default());
        let diag = Diagnostics::with_probe(DiagConfig::default(), ScriptedProbe::new(script()))
            .observer(recorder.clone());

        let generated = diag.generate_report(&request(2), None).await.unwrap();
        let report = generated.report;

        assert!(generated.persisted.is_none());
        assert_eq!(report.len(), 4);
        assert_eq!(report.failures(), 1);
        assert!(report.get(PING).unwrap().is_failure());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["api-check"]["status"], 500);
        assert_eq!(json["monitor"]["success_rate"], 1.0);
        assert_eq!(json["monitor"]["average_latency"], 0.02);

        assert_eq!(
            recorder.lines(),
            vec![
                "probe ping failed",
                "probe api-check ok",
                "probe dns-check ok",
                "attempt 1/2 ok",
                "attempt 2/2 ok",
                "monitor 192.0.2.10:80 1.00",
                "report 4",
            ]
        );
    }

    #[tokio::test]
    async fn test_report_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonFileSink::new(dir.path());
        let diag = Diagnostics::with_probe(DiagConfig::default(), ScriptedProbe::new(script()));

        let generated = diag.generate_report(&request(2), Some(&sink)).await.unwrap();
        let path = generated.persisted.unwrap().unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_sink_failure_keeps_report() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let sink = JsonFileSink::new(file.path().join("reports"));
        let recorder = Arc::new(Recorder::default());
        let diag = Diagnostics::with_probe(DiagConfig::default(), ScriptedProbe::new(script()))
            .observer(recorder.clone());

        let generated = diag.generate_report(&request(2), Some(&sink)).await.unwrap();
        assert!(matches!(generated.persisted, Some(Err(SinkError::Io { .. }))));
        assert_eq!(generated.report.len(), 4);
        assert!(recorder.lines().last().unwrap().starts_with("persist failed"));
    }

    #[tokio::test]
    async fn test_quiet_suppresses_events() {
        let recorder = Arc::new(Recorder::default());
        let diag = Diagnostics::with_probe(DiagConfig::default(), ScriptedProbe::new(script()))
            .observer(recorder.clone())
            .quiet(true);

        let outcome = diag.ping("192.0.2.10").await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::ConnectionRefused));
        assert!(recorder.lines().is_empty());
    }

    #[tokio::test]
    async fn test_monitor_counts_every_attempt() {
        let probe = ScriptedProbe::new(vec![
            connected(10),
            Outcome::failure(ErrorKind::Timeout, "slow"),
            Outcome::failure(ErrorKind::Timeout, "slow"),
        ]);
        let diag = Diagnostics::with_probe(DiagConfig::default(), probe);

        let run = diag.monitor("192.0.2.10", 8080, 3, Duration::ZERO).await.unwrap();
        assert_eq!(run.series.len(), 3);
        assert_eq!(run.series.target(), &ProbeTarget::tcp("192.0.2.10", 8080));
        assert_eq!(run.stats.successes, 1);
        assert_eq!(run.stats.average_latency, Some(Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_report_rejects_zero_attempts() {
        let probe = ScriptedProbe::new(script());
        let diag = Diagnostics::with_probe(DiagConfig::default(), probe);

        let result = diag.generate_report(&request(0), None).await;
        assert!(matches!(result, Err(MonitorError::NoAttempts)));
    }

    #[tokio::test]
    async fn test_ping_closed_local_port() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let diag = Diagnostics::new(DiagConfig::default());

        let run = diag.monitor("127.0.0.1", port, 2, Duration::ZERO).await.unwrap();
        assert_eq!(run.series.len(), 2);
        assert_eq!(run.stats.success_rate, 0.0);
        assert_eq!(run.stats.average_latency, None);
    }
}
