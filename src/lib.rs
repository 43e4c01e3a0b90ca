//! netprobe - network diagnostics
//!
//! Probes a host with TCP connects, HTTP requests and DNS lookups, repeats
//! probes to derive health statistics, and assembles the results into a
//! report.

pub mod config;
pub mod diagnostics;
pub mod monitor;
pub mod observer;
pub mod probe;
pub mod report;

pub use config::DiagConfig;
pub use diagnostics::{Diagnostics, GeneratedReport, MonitorRun, ReportRequest};
pub use monitor::{aggregate, AggregateStats, Monitor, MonitorError, SampleSeries};
pub use observer::{AttemptEvent, Observer, Silent};
pub use probe::{ErrorKind, NetworkProbe, Outcome, Payload, Probe, ProbeFailure, ProbeKind, ProbeTarget};
pub use report::{JsonFileSink, Report, ReportAssembler, ReportEntry, ReportSink, SinkError};
