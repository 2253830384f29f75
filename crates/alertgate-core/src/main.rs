//! AlertGate CLI
//!
//! Command-line interface for inspecting configuration, evaluating quiet
//! hours and replaying alert bursts through the admission gates.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use alertgate::alerting::{Admission, AdmissionController, Digest, LogSink, NotificationDelivery, Stage};
use alertgate::clock::{Clock, MockClock};
use alertgate::config::LoggingConfig;
use alertgate::models::{
    AlertEvent, QueuedNotification, QuietHoursConfig, Severity, StormStatus, ThrottleConfig,
    ThrottleSummary,
};
use alertgate::quiet_hours::{
    next_delivery_time, parse_quiet_hours_config, should_suppress, QueueManagerOptions,
    QuietHoursQueueManager,
};
use alertgate::Config;
use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// AlertGate - admission control for alert pipelines
#[derive(Parser)]
#[command(name = "alertgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ALERTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration
    Validate,

    /// Evaluate quiet hours at an instant
    CheckQuietHours {
        /// Instant to evaluate (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,

        /// Alert severity (critical, error, warning, info)
        #[arg(long, default_value = "info")]
        severity: Severity,

        /// Window start (HH:MM), overrides the configured window
        #[arg(long, requires = "end")]
        start: Option<String>,

        /// Window end (HH:MM)
        #[arg(long, requires = "start")]
        end: Option<String>,

        /// IANA timezone for --start/--end
        #[arg(long, default_value = "UTC")]
        timezone: String,
    },

    /// Replay a synthetic alert stream through every gate
    Simulate {
        /// Number of alerts
        #[arg(long, default_value = "200")]
        events: usize,

        /// Rule the alerts belong to
        #[arg(long, default_value = "simulated-rule")]
        rule: String,

        /// Simulated time between alerts in milliseconds
        #[arg(long, default_value = "250")]
        spacing_ms: u64,

        /// Throttle limit per period; 0 disables throttling
        #[arg(long, default_value = "10")]
        max_alerts: u32,

        /// Throttle period in seconds
        #[arg(long, default_value = "60")]
        period: u64,

        /// Payload field to throttle by (e.g. device_id, interface.name)
        #[arg(long)]
        group_by: Option<String>,

        /// Number of distinct devices emitting alerts
        #[arg(long, default_value = "3")]
        devices: usize,

        /// Severity of every simulated alert
        #[arg(long, default_value = "warning")]
        severity: Severity,

        /// Simulated start instant (RFC 3339); defaults to now
        #[arg(long)]
        start_at: Option<DateTime<Utc>>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(cli.verbose, &config.logging);

    // Execute command
    let result = match cli.command {
        Commands::Validate => run_validate(&config, cli.format),
        Commands::CheckQuietHours {
            at,
            severity,
            start,
            end,
            timezone,
        } => run_check_quiet_hours(&config, at, severity, start.zip(end), &timezone, cli.format),
        Commands::Simulate {
            events,
            rule,
            spacing_ms,
            max_alerts,
            period,
            group_by,
            devices,
            severity,
            start_at,
        } => {
            let throttle = ThrottleConfig {
                max_alerts,
                period_seconds: period,
                group_by_field: group_by,
            };
            let options = SimulateOptions {
                events,
                rule,
                spacing: StdDuration::from_millis(spacing_ms),
                throttle,
                devices: devices.max(1),
                severity,
                start_at: start_at.unwrap_or_else(Utc::now),
            };
            run_simulate(config, options, cli.format).await
        }
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool, logging: &LoggingConfig) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if logging.format.eq_ignore_ascii_case("json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_validate(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let quiet_hours = config.quiet_hours().context("invalid quiet_hours section")?;
    info!("Configuration valid");

    if format == OutputFormat::Json {
        return print_json(&json!({
            "storm": config.storm,
            "queue": config.queue,
            "quiet_hours": quiet_hours,
            "logging": config.logging,
        }));
    }

    println!("Configuration OK");
    println!(
        "  storm:       threshold {} per {}s, cooldown {}s",
        config.storm.threshold, config.storm.window_seconds, config.storm.cooldown_seconds
    );
    println!(
        "  queue:       max {} per channel, tick {}, delivery timeout {}",
        config.queue.max_queue_size,
        humantime::format_duration(config.queue.tick_interval),
        humantime::format_duration(config.queue.delivery_timeout)
    );
    match quiet_hours {
        Some(q) => println!(
            "  quiet hours: {}-{} {} (bypass critical: {}, days: {})",
            q.start_time,
            q.end_time,
            q.timezone,
            q.bypass_critical,
            format_days(&q.days_of_week)
        ),
        None => println!("  quiet hours: not configured"),
    }
    Ok(())
}

fn format_days(days: &[u8]) -> String {
    if days.is_empty() {
        return "all".to_string();
    }
    days.iter().map(u8::to_string).collect::<Vec<_>>().join(",")
}

fn run_check_quiet_hours(
    config: &Config,
    at: Option<DateTime<Utc>>,
    severity: Severity,
    window: Option<(String, String)>,
    timezone: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let quiet_hours = match window {
        Some((start, end)) => parse_quiet_hours_config(&json!({
            "startTime": start,
            "endTime": end,
            "timezone": timezone,
        }))?,
        None => config
            .quiet_hours()?
            .context("no quiet hours configured; pass --start/--end or set quiet_hours in the config file")?,
    };

    let now = at.unwrap_or_else(Utc::now);
    let decision = should_suppress(&quiet_hours, severity, now);
    let next_delivery = next_delivery_time(&quiet_hours, now)?;
    debug!(suppress = decision.suppress, reason = ?decision.reason, "Quiet hours evaluated");

    if format == OutputFormat::Json {
        return print_json(&json!({
            "at": now,
            "severity": severity,
            "suppress": decision.suppress,
            "reason": decision.reason,
            "next_delivery": next_delivery,
        }));
    }

    let verdict = if decision.suppress { "HOLD" } else { "DELIVER" };
    println!("{verdict} {severity} at {}", now.to_rfc3339());
    if let Some(reason) = decision.reason {
        println!("  reason:        {reason}");
    }
    println!("  next delivery: {}", next_delivery.to_rfc3339());
    Ok(())
}

struct SimulateOptions {
    events: usize,
    rule: String,
    spacing: StdDuration,
    throttle: ThrottleConfig,
    devices: usize,
    severity: Severity,
    start_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize)]
struct SimulationReport {
    events: usize,
    delivered: usize,
    dropped_storm: usize,
    dropped_throttle: usize,
    deferred: usize,
    queue_rejected: usize,
    storm: Option<StormStatus>,
    throttle: Option<ThrottleSummary>,
    summaries_published: usize,
    digests: Vec<Digest>,
}

async fn run_simulate(
    config: Config,
    options: SimulateOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let quiet_hours: Option<QuietHoursConfig> = config.quiet_hours()?;
    let clock = Arc::new(MockClock::new(options.start_at));
    let spacing = chrono::Duration::from_std(options.spacing).context("spacing out of range")?;

    let controller = AdmissionController::new(config.storm.clone(), clock.clone());
    let delivery: Arc<dyn NotificationDelivery> = Arc::new(LogSink);
    let channel_queue = QuietHoursQueueManager::new(QueueManagerOptions {
        quiet_hours: quiet_hours.clone().unwrap_or_default(),
        clock: clock.clone(),
        delivery: Some(delivery),
        max_queue_size: config.queue.max_queue_size,
        tick_interval: config.queue.tick_interval,
        delivery_timeout: config.queue.delivery_timeout,
    })?;

    info!(
        events = options.events,
        rule_id = %options.rule,
        start = %options.start_at,
        "Starting simulation"
    );

    let mut report = SimulationReport {
        events: options.events,
        ..SimulationReport::default()
    };

    for i in 0..options.events {
        let device_id = format!("router-{}", i % options.devices);
        let event = AlertEvent {
            rule_id: options.rule.clone(),
            device_id: device_id.clone(),
            event_type: "interface.down".to_string(),
            severity: options.severity,
            fields: json!({
                "device_id": device_id,
                "interface": { "name": format!("ether{}", i % 4 + 1) },
            }),
        };

        match controller.admit(&event, Some(&options.throttle), quiet_hours.as_ref()) {
            Admission::Deliver => report.delivered += 1,
            Admission::Dropped { stage: Stage::Storm, .. } => report.dropped_storm += 1,
            Admission::Dropped { stage: Stage::Throttle, .. } => report.dropped_throttle += 1,
            Admission::Deferred { .. } => {
                report.deferred += 1;
                let notification = QueuedNotification::new(
                    "default",
                    Uuid::now_v7().to_string(),
                    format!("{} on {}", event.event_type, event.device_id),
                    format!("Rule {} fired for {}", event.rule_id, event.device_id),
                    event.severity,
                    event.event_type.clone(),
                )
                .with_data(event.fields.clone());

                if let Err(e) = channel_queue.enqueue(notification) {
                    debug!(error = %e, "Notification not queued");
                    report.queue_rejected += 1;
                }
            }
        }

        clock.advance(spacing);
    }

    report.storm = Some(controller.storm().get_status());
    report.throttle = controller.throttle().get_summary(&options.rule);
    report.summaries_published = controller.throttle().publish_summaries(&LogSink).await;
    report.digests = controller.drain_digests();

    if let Err(e) = channel_queue.flush_all().await {
        warn!(error = %e, "Failed to flush queued notifications");
    }
    channel_queue.close().await;

    info!(finished_at = %clock.now(), "Simulation finished");

    if format == OutputFormat::Json {
        return print_json(&report);
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &SimulationReport) {
    println!("Simulated {} alerts", report.events);
    println!("  delivered:         {}", report.delivered);
    println!("  dropped (storm):   {}", report.dropped_storm);
    println!("  dropped (throttle): {}", report.dropped_throttle);
    println!("  deferred:          {}", report.deferred);
    if report.queue_rejected > 0 {
        println!("  queue rejected:    {}", report.queue_rejected);
    }

    if let Some(storm) = &report.storm {
        println!();
        println!(
            "Storm: {} (rate {:.1}/min, threshold {:.1}/min, suppressed {})",
            if storm.in_storm { "ACTIVE" } else { "clear" },
            storm.current_rate,
            storm.threshold_rate,
            storm.suppressed_count
        );
    }

    if let Some(summary) = &report.throttle {
        println!();
        println!(
            "Throttle {}: {} per {}s, allowed {}, suppressed {}",
            summary.rule_id,
            summary.max_alerts,
            summary.period_seconds,
            summary.total_allowed,
            summary.total_suppressed
        );
        for group in &summary.groups {
            println!(
                "  {:<20} allowed {:>4}  suppressed {:>4}",
                group.group, group.allowed, group.suppressed
            );
        }
    }

    for digest in &report.digests {
        println!();
        print!("{}", digest.message);
    }
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "alertgate", &mut io::stdout());
}
