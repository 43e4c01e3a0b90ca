//! Report assembly.
//!
//! A [`Report`] collects the results of several distinct probes under fixed
//! section names. A failed probe fills its own section with a failure entry;
//! it never prevents the other sections from being filled.

mod sink;

pub use sink::*;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::monitor::AggregateStats;
use crate::observer::Observer;
use crate::probe::{Outcome, Payload, ProbeFailure, ProbeTarget};

/// Section names used by the full diagnostics report.
pub const PING: &str = "ping";
pub const API_CHECK: &str = "api-check";
pub const DNS_CHECK: &str = "dns-check";
pub const MONITOR: &str = "monitor";

/// What a section is built from.
#[derive(Debug, Clone, PartialEq)]
pub enum SectionResult {
    Probe { target: ProbeTarget, outcome: Outcome },
    Monitor { target: ProbeTarget, stats: AggregateStats },
}

/// One section of a report.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEntry {
    Probe {
        target: ProbeTarget,
        latency: Duration,
        payload: Payload,
    },
    Monitor {
        target: ProbeTarget,
        stats: AggregateStats,
    },
    Failed {
        target: ProbeTarget,
        failure: ProbeFailure,
    },
}

impl ReportEntry {
    pub fn target(&self) -> &ProbeTarget {
        match self {
            ReportEntry::Probe { target, .. }
            | ReportEntry::Monitor { target, .. }
            | ReportEntry::Failed { target, .. } => target,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ReportEntry::Failed { .. })
    }
}

impl From<SectionResult> for ReportEntry {
    fn from(result: SectionResult) -> Self {
        match result {
            SectionResult::Probe {
                target,
                outcome: Outcome::Success { latency, payload },
            } => ReportEntry::Probe {
                target,
                latency,
                payload,
            },
            SectionResult::Probe {
                target,
                outcome: Outcome::Failure(failure),
            } => ReportEntry::Failed { target, failure },
            SectionResult::Monitor { target, stats } => ReportEntry::Monitor { target, stats },
        }
    }
}

/// The assembled results of one diagnostics run.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    generated_at: DateTime<Utc>,
    sections: Vec<(String, ReportEntry)>,
}

impl Report {
    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn get(&self, name: &str) -> Option<&ReportEntry> {
        self.sections
            .iter()
            .find(|(section, _)| section == name)
            .map(|(_, entry)| entry)
    }

    /// Sections in the order they were recorded.
    pub fn sections(&self) -> impl Iterator<Item = (&str, &ReportEntry)> {
        self.sections.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn failures(&self) -> usize {
        self.sections.iter().filter(|(_, entry)| entry.is_failure()).count()
    }
}

/// Builds a [`Report`] section by section.
#[derive(Debug, Default)]
pub struct ReportAssembler {
    sections: Vec<(String, ReportEntry)>,
}

impl ReportAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a section. Recording a name twice replaces the earlier entry.
    pub fn record(&mut self, name: impl Into<String>, result: SectionResult) -> &mut Self {
        let name = name.into();
        let entry = ReportEntry::from(result);
        match self.sections.iter_mut().find(|(section, _)| *section == name) {
            Some(slot) => slot.1 = entry,
            None => self.sections.push((name, entry)),
        }
        self
    }

    pub fn finish(self) -> Report {
        Report {
            generated_at: Utc::now(),
            sections: self.sections,
        }
    }

    /// Hand a finished report to `sink`.
    ///
    /// A persistence failure is logged, reported to the observer and returned
    /// to the caller. The report itself stays valid either way.
    pub fn publish(
        report: &Report,
        sink: &dyn ReportSink,
        observer: &dyn Observer,
    ) -> Result<PathBuf, SinkError> {
        match sink.persist(report) {
            Ok(location) => {
                tracing::info!("Report saved to {}", location.display());
                observer.persisted(&location);
                Ok(location)
            }
            Err(e) => {
                tracing::error!("Failed to save report: {}", e);
                observer.persist_failed(&e);
                Err(e)
            }
        }
    }
}

/// Assemble a report from named results in one go.
pub fn assemble<I, S>(results: I) -> Report
where
    I: IntoIterator<Item = (S, SectionResult)>,
    S: Into<String>,
{
    let mut assembler = ReportAssembler::new();
    for (name, result) in results {
        assembler.record(name, result);
    }
    assembler.finish()
}

// ============================================================================
// Serialization
// ============================================================================

impl Serialize for Report {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.sections.len()))?;
        for (name, entry) in &self.sections {
            map.serialize_entry(name, entry)?;
        }
        map.end()
    }
}

impl Serialize for ReportEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        write_target(&mut map, self.target())?;

        match self {
            ReportEntry::Probe {
                latency, payload, ..
            } => {
                match payload {
                    Payload::Connected { peer } => map.serialize_entry("peer", &peer.to_string())?,
                    Payload::Status { code } => map.serialize_entry("status", code)?,
                    Payload::Resolved { ip } => map.serialize_entry("ip", &ip.to_string())?,
                }
                map.serialize_entry("latency", &latency.as_secs_f64())?;
            }
            ReportEntry::Monitor { stats, .. } => {
                map.serialize_entry("attempts", &stats.attempts)?;
                map.serialize_entry("successes", &stats.successes)?;
                map.serialize_entry("success_rate", &stats.success_rate)?;
                map.serialize_entry("average_latency", &stats.average_latency.map(|d| d.as_secs_f64()))?;
                map.serialize_entry("min_latency", &stats.min_latency.map(|d| d.as_secs_f64()))?;
                map.serialize_entry("max_latency", &stats.max_latency.map(|d| d.as_secs_f64()))?;
                map.serialize_entry("failures", &stats.failures)?;
            }
            ReportEntry::Failed { failure, .. } => {
                map.serialize_entry("error", &failure.kind)?;
                map.serialize_entry("detail", &failure.detail)?;
            }
        }

        map.end()
    }
}

fn write_target<M: SerializeMap>(map: &mut M, target: &ProbeTarget) -> Result<(), M::Error> {
    match target {
        ProbeTarget::Tcp { host, port } => {
            map.serialize_entry("host", host)?;
            map.serialize_entry("port", port)?;
        }
        ProbeTarget::Http { url } => map.serialize_entry("url", url)?,
        ProbeTarget::Dns {
            domain,
            record_type,
        } => {
            map.serialize_entry("domain", domain)?;
            map.serialize_entry("record_type", &record_type.to_string())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::{aggregate, SampleSeries};
    use crate::observer::testing::Recorder;
    use crate::probe::ErrorKind;
    use std::net::{IpAddr, Ipv4Addr};

    fn full_report_with_failed_ping() -> Report {
        let monitor_target = ProbeTarget::tcp("example.com", 80);
        let series = SampleSeries::new(
            monitor_target.clone(),
            vec![
                Outcome::success(
                    Duration::from_millis(40),
                    Payload::Connected {
                        peer: "192.0.2.1:80".parse().unwrap(),
                    },
                ),
                Outcome::failure(ErrorKind::Timeout, "slow"),
            ],
        )
        .unwrap();

        assemble([
            (
                PING,
                SectionResult::Probe {
                    target: ProbeTarget::tcp("unreachable.example", 80),
                    outcome: Outcome::failure(ErrorKind::ConnectionRefused, "192.0.2.9:80: refused"),
                },
            ),
            (
                API_CHECK,
                SectionResult::Probe {
                    target: ProbeTarget::http("https://api.example.com"),
                    outcome: Outcome::success(Duration::from_millis(250), Payload::Status { code: 200 }),
                },
            ),
            (
                DNS_CHECK,
                SectionResult::Probe {
                    target: ProbeTarget::dns("example.com"),
                    outcome: Outcome::success(
                        Duration::from_millis(20),
                        Payload::Resolved {
                            ip: IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)),
                        },
                    ),
                },
            ),
            (
                MONITOR,
                SectionResult::Monitor {
                    target: monitor_target,
                    stats: aggregate(&series),
                },
            ),
        ])
    }

    #[test]
    fn test_partial_failure_keeps_siblings() {
        let report = full_report_with_failed_ping();

        assert_eq!(report.len(), 4);
        assert_eq!(report.failures(), 1);
        assert!(report.get(PING).unwrap().is_failure());
        assert!(!report.get(API_CHECK).unwrap().is_failure());
        assert!(!report.get(DNS_CHECK).unwrap().is_failure());
        assert!(!report.get(MONITOR).unwrap().is_failure());
    }

    #[test]
    fn test_json_shape() {
        let report = full_report_with_failed_ping();
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["ping"]["host"], "unreachable.example");
        assert_eq!(json["ping"]["error"], "connection_refused");
        assert_eq!(json["api-check"]["url"], "https://api.example.com");
        assert_eq!(json["api-check"]["status"], 200);
        assert_eq!(json["api-check"]["latency"], 0.25);
        assert_eq!(json["dns-check"]["ip"], "192.0.2.1");
        assert_eq!(json["monitor"]["success_rate"], 0.5);
        assert_eq!(json["monitor"]["average_latency"], 0.04);
        assert_eq!(json["monitor"]["failures"]["timeout"], 1);
    }

    #[test]
    fn test_monitor_without_successes_serializes_null_average() {
        let target = ProbeTarget::tcp("192.0.2.1", 81);
        let series = SampleSeries::new(
            target.clone(),
            vec![Outcome::failure(ErrorKind::Timeout, "slow")],
        )
        .unwrap();
        let report = assemble([(
            MONITOR,
            SectionResult::Monitor {
                target,
                stats: aggregate(&series),
            },
        )]);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["monitor"]["success_rate"], 0.0);
        assert!(json["monitor"]["average_latency"].is_null());
    }

    #[test]
    fn test_record_replaces_same_name() {
        let mut assembler = ReportAssembler::new();
        assembler.record(
            PING,
            SectionResult::Probe {
                target: ProbeTarget::tcp("a.example", 80),
                outcome: Outcome::failure(ErrorKind::Timeout, "slow"),
            },
        );
        assembler.record(
            PING,
            SectionResult::Probe {
                target: ProbeTarget::tcp("b.example", 80),
                outcome: Outcome::failure(ErrorKind::Timeout, "slow"),
            },
        );
        let report = assembler.finish();
        assert_eq!(report.len(), 1);
        assert_eq!(report.get(PING).unwrap().target().address(), "b.example");
    }

    struct BrokenSink;

    impl ReportSink for BrokenSink {
        fn persist(&self, _report: &Report) -> Result<PathBuf, SinkError> {
            Err(SinkError::PermissionDenied {
                path: PathBuf::from("/reports"),
            })
        }
    }

    #[test]
    fn test_publish_failure_is_reported() {
        let report = full_report_with_failed_ping();
        let recorder = Recorder::default();

        let result = ReportAssembler::publish(&report, &BrokenSink, &recorder);
        assert!(matches!(result, Err(SinkError::PermissionDenied { .. })));
        assert_eq!(recorder.lines(), vec!["persist failed permission denied writing /reports"]);
        assert_eq!(report.len(), 4);
    }
}
