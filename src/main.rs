//! netprobe - network diagnostics from the command line.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use netprobe::monitor::AggregateStats;
use netprobe::observer::AttemptEvent;
use netprobe::probe::{Outcome, ProbeTarget, DEFAULT_TCP_PORT};
use netprobe::report::{Report, SinkError};
use netprobe::{DiagConfig, Diagnostics, JsonFileSink, Observer, ReportRequest, ReportSink};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "netprobe")]
#[command(about = "Network diagnostics: TCP, HTTP and DNS probes", long_about = None)]
struct Cli {
    /// Suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a TCP connection to port 80 of a host
    Ping { host: String },

    /// Send one GET request and report the status code
    #[command(alias = "test-api")]
    HttpCheck { url: String },

    /// Resolve the A record of a domain
    DnsCheck { domain: String },

    /// Connect to a host repeatedly and summarize the results
    Monitor {
        host: String,

        #[arg(short, long, default_value_t = DEFAULT_TCP_PORT)]
        port: u16,

        /// Number of attempts (default: NETPROBE_MONITOR_COUNT or 5)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
        count: Option<u32>,

        /// Seconds to wait after each attempt (default: NETPROBE_MONITOR_INTERVAL or 1)
        #[arg(short, long, value_parser = parse_interval)]
        interval: Option<Duration>,
    },

    /// Run every diagnostic and print the assembled report
    Report {
        /// Also write the report to NETPROBE_REPORT_DIR
        #[arg(long)]
        save: bool,
    },
}

fn parse_interval(value: &str) -> Result<Duration, String> {
    let secs: f64 = value.parse().map_err(|e| format!("{}", e))?;
    Duration::try_from_secs_f64(secs).map_err(|_| format!("{} is not a non-negative number of seconds", value))
}

/// Prints progress lines to stdout.
struct Console;

impl Observer for Console {
    fn attempt(&self, event: &AttemptEvent<'_>) {
        match event.outcome {
            Outcome::Success { latency, .. } => println!(
                "Attempt [{}/{}]: Connected in {:.3}s",
                event.index,
                event.count,
                latency.as_secs_f64()
            ),
            Outcome::Failure(failure) => println!(
                "Attempt [{}/{}]: Failed ({})",
                event.index, event.count, failure
            ),
        }
    }

    fn probe(&self, name: &str, target: &ProbeTarget, outcome: &Outcome) {
        println!("{} {}: {}", name, target, outcome);
    }

    fn monitor_finished(&self, target: &ProbeTarget, stats: &AggregateStats) {
        println!("Monitor {}: Success Rate {:.0}%", target, stats.success_rate * 100.0);
        match stats.average_latency {
            Some(avg) => println!("Average Latency: {:.3}s", avg.as_secs_f64()),
            None => println!("Average Latency: N/A"),
        }
    }

    fn report(&self, report: &Report) {
        println!("=== Network Diagnostics Report ===");
        match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render report: {}", e),
        }
    }

    fn persisted(&self, location: &Path) {
        println!("Report saved to {}", location.display());
    }

    fn persist_failed(&self, error: &SinkError) {
        println!("Failed to save report: {}", error);
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("netprobe=warn".parse()?))
        .init();

    let cfg = DiagConfig::load();

    let diag = Diagnostics::new(cfg.clone())
        .observer(Arc::new(Console))
        .quiet(cli.quiet);

    match cli.command {
        Command::Ping { host } => {
            diag.ping(&host).await;
        }
        Command::HttpCheck { url } => {
            diag.http_check(&url).await;
        }
        Command::DnsCheck { domain } => {
            diag.dns_check(&domain).await;
        }
        Command::Monitor {
            host,
            port,
            count,
            interval,
        } => {
            let count = count.unwrap_or(cfg.monitor_count);
            let interval = interval.unwrap_or(cfg.monitor_interval);
            diag.monitor(&host, port, count, interval).await?;
        }
        Command::Report { save } => {
            let request = ReportRequest::from_config(&cfg);
            let sink = JsonFileSink::new(&cfg.report_dir);
            let sink = save.then_some(&sink as &dyn ReportSink);
            diag.generate_report(&request, sink).await?;
        }
    }

    Ok(())
}
