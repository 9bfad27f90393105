//! AIMetrics CLI
//!
//! Command-line interface for the AIMetrics usage monitor.

use std::path::PathBuf;
use std::process::ExitCode;

use aimetrics::api::HttpServer;
use aimetrics::config::StorageBackend;
use aimetrics::db::{Database, PostgresPool};
use aimetrics::models::{
    AccuracyMetrics, Alert, CostBreakdown, MetricsSummary, TimeRange, TimelineDataPoint,
};
use aimetrics::{Config, Monitor};
use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// AIMetrics - usage metrics and alerting for AI backends
#[derive(Parser)]
#[command(name = "aimetrics")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "AIMETRICS_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (for commands that support it)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API and the threshold scheduler
    Serve {
        /// HTTP API port (overrides configuration)
        #[arg(long, env = "AIMETRICS_HTTP_PORT")]
        http_port: Option<u16>,
    },

    /// Show the metrics summary
    Summary {
        /// Time range (24h, 7d, 30d, all)
        #[arg(long, default_value = "24h")]
        range: TimeRange,
    },

    /// Show the bucketed request timeline
    Timeline {
        /// Time range (24h, 7d, 30d, all)
        #[arg(long, default_value = "24h")]
        range: TimeRange,
    },

    /// Show quota usage and projected monthly cost
    Costs,

    /// Show confidence and decision rates
    Accuracy,

    /// Inspect and manage alerts
    Alerts {
        #[command(subcommand)]
        command: AlertsCommands,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand)]
enum AlertsCommands {
    /// List recent alerts
    List {
        /// Maximum number of results
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// List unacknowledged alerts
    Pending,

    /// Evaluate the threshold rules now
    Check,

    /// Acknowledge an alert
    Ack {
        /// Alert ID
        alert_id: Uuid,

        /// Acknowledging user
        #[arg(long, env = "USER")]
        user: String,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let result = match cli.command {
        Commands::Serve { http_port } => run_serve(config, http_port).await,
        Commands::Summary { range } => {
            run_report(&config, cli.format, |m| async move { m.metrics_summary(range).await }).await
        }
        Commands::Timeline { range } => {
            run_report(&config, cli.format, |m| async move { m.request_timeline(range).await }).await
        }
        Commands::Costs => {
            run_report(&config, cli.format, |m| async move { m.cost_breakdown().await }).await
        }
        Commands::Accuracy => {
            run_report(&config, cli.format, |m| async move { m.accuracy_metrics().await }).await
        }
        Commands::Alerts { command } => run_alerts(&config, command, cli.format).await,
        Commands::Db { command } => run_db(&config, command).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if config.logging.format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn open_monitor(config: &Config) -> anyhow::Result<Monitor> {
    if config.storage.backend == StorageBackend::Memory {
        warn!("Using the in-memory backend; records do not outlive this process");
    }
    let db = Database::new(config)
        .await
        .context("failed to open the metrics store")?;
    Ok(Monitor::new(&db, config))
}

/// Run one read against a freshly opened monitor and print the result
async fn run_report<F, Fut, T>(config: &Config, format: OutputFormat, query: F) -> anyhow::Result<()>
where
    F: FnOnce(Monitor) -> Fut,
    Fut: std::future::Future<Output = T>,
    T: Serialize + Render,
{
    let monitor = open_monitor(config).await?;
    print_output(format, &query(monitor).await)
}

async fn run_serve(config: Config, http_port: Option<u16>) -> anyhow::Result<()> {
    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install the Prometheus recorder")?;

    let monitor = open_monitor(&config).await?;

    let engine = monitor.alert_engine().clone();
    tokio::spawn(async move { engine.start().await });

    let port = http_port.unwrap_or(config.server.http_port);
    let addr = format!("{}:{}", config.server.host, port);
    info!(
        backend = ?config.storage.backend,
        check_interval = ?config.alerting.check_interval,
        "Starting AIMetrics on {}",
        addr
    );

    let server = HttpServer::new(monitor, Some(prometheus));

    tokio::select! {
        result = server.serve(&addr) => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}

async fn run_alerts(
    config: &Config,
    command: AlertsCommands,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let monitor = open_monitor(config).await?;

    match command {
        AlertsCommands::List { limit } => print_output(format, &monitor.recent_alerts(limit).await),
        AlertsCommands::Pending => print_output(format, &monitor.unacknowledged_alerts().await),
        AlertsCommands::Check => print_output(format, &monitor.check_thresholds().await),
        AlertsCommands::Ack { alert_id, user } => {
            let alert = monitor.acknowledge_alert(alert_id, &user).await?;
            print_output(format, &alert)
        }
    }
}

async fn run_db(config: &Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            if config.storage.backend != StorageBackend::Postgres {
                anyhow::bail!("migrations only apply to the postgres storage backend");
            }
            let pool = PostgresPool::new(&config.database).await?;
            pool.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}

fn print_output<T: Serialize + Render>(format: OutputFormat, value: &T) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => print!("{}", value.render()),
    }
    Ok(())
}

/// Plain-text rendering for terminal output
trait Render {
    fn render(&self) -> String;
}

impl Render for MetricsSummary {
    fn render(&self) -> String {
        let mut out = format!(
            "Metrics ({}: {} .. {})\n",
            self.time_range,
            self.start_date.format("%Y-%m-%d %H:%M"),
            self.end_date.format("%Y-%m-%d %H:%M")
        );
        out += &format!(
            "  requests      {} ({} ok, {} failed)\n",
            self.total_requests, self.successful_requests, self.failed_requests
        );
        out += &format!("  success rate  {:.1}%\n", self.success_rate);
        out += &format!("  avg latency   {:.0}ms\n", self.avg_response_time);
        out += &format!("  avg confidence {:.2}\n", self.avg_confidence);
        out += &format!("  total cost    ${:.4}\n", self.total_cost);
        for (service, m) in &self.by_service {
            out += &format!(
                "  {:<12} {:>6} req  {:>5.1}%  {:>6.0}ms\n",
                service.as_str(),
                m.total_requests,
                m.success_rate,
                m.avg_response_time
            );
        }
        if self.truncated {
            out += "  (scan cap reached; oldest records in the window were skipped)\n";
        }
        out
    }
}

impl Render for Vec<TimelineDataPoint> {
    fn render(&self) -> String {
        if self.is_empty() {
            return "No requests in range\n".to_string();
        }
        self.iter()
            .map(|p| {
                format!(
                    "{}  {:>6} req  {:>5.1}%  {:>6.0}ms\n",
                    p.timestamp.format("%Y-%m-%d %H:%M"),
                    p.requests,
                    p.success_rate,
                    p.avg_response_time
                )
            })
            .collect()
    }
}

impl Render for CostBreakdown {
    fn render(&self) -> String {
        let mut out = String::from("Costs (last 30 days)\n");
        for (service, cost) in &self.services {
            out += &format!(
                "  {:<12} {:>8} / {:<8} req  {:>5.1}%  ${:.4}\n",
                service.as_str(),
                cost.requests,
                cost.free_limit,
                cost.usage_percentage,
                cost.cost
            );
        }
        out += &format!("  total         ${:.4}\n", self.total);
        out += &format!("  projected     ${:.4} / month\n", self.projected_monthly);
        out
    }
}

impl Render for AccuracyMetrics {
    fn render(&self) -> String {
        format!(
            "Accuracy (last 30 days)\n  avg confidence  {:.2} (high {}, medium {}, low {})\n  decisions       {}\n  approved        {:.1}%\n  rejected        {:.1}%\n  processing ok   {:.1}%\n",
            self.avg_confidence,
            self.confidence_distribution.high,
            self.confidence_distribution.medium,
            self.confidence_distribution.low,
            self.total_decisions,
            self.approval_rate,
            self.rejection_rate,
            self.processing_success_rate
        )
    }
}

impl Render for Alert {
    fn render(&self) -> String {
        let ack = match (&self.acknowledged_by, self.acknowledged_at) {
            (Some(by), Some(at)) => format!("  acked by {by} at {}", at.format("%Y-%m-%d %H:%M")),
            _ => String::new(),
        };
        format!(
            "{}  {:<8} {:<18} {}  {}{}\n",
            self.timestamp.format("%Y-%m-%d %H:%M"),
            self.severity.as_str(),
            self.alert_type.as_str(),
            self.id,
            self.message,
            ack
        )
    }
}

impl Render for Vec<Alert> {
    fn render(&self) -> String {
        if self.is_empty() {
            return "No alerts\n".to_string();
        }
        self.iter().map(Render::render).collect()
    }
}
