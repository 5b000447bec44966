use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::builder::FalseyValueParser;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use muxprobe::probe::{DEFAULT_TEST_KEY, DEFAULT_TEST_VALUE};
use muxprobe::{ClusterEndpointConfig, ProbeRunner, Report, ReportStatus};

/// muxprobe - Redis Cluster connectivity probe
#[derive(Parser, Debug)]
#[command(name = "muxprobe")]
#[command(version)]
#[command(about = "Checks that a Redis cluster is reachable, readable and writable", long_about = None)]
struct Cli {
    /// Comma-separated seed nodes (host:port, redis:// or rediss:// URLs)
    #[arg(
        short = 'n',
        long = "nodes",
        env = "REDIS_CLUSTER_NODES",
        default_value = "localhost:6379"
    )]
    nodes: String,

    /// Connect with TLS
    #[arg(long = "tls", env = "REDIS_TLS", value_parser = FalseyValueParser::new())]
    tls: bool,

    /// PEM file with CA certificates to trust (implies --tls)
    #[arg(long = "ca-cert", env = "REDIS_CA_CERT", value_name = "PATH")]
    ca_cert: Option<PathBuf>,

    /// ACL username
    #[arg(long = "username", env = "REDIS_USERNAME")]
    username: Option<String>,

    /// Password sent with AUTH
    #[arg(long = "password", env = "REDIS_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-step timeout in seconds (0 disables)
    #[arg(long = "timeout", default_value_t = 5)]
    timeout: u64,

    /// Key written and deleted by the probe
    #[arg(long = "key", default_value = DEFAULT_TEST_KEY)]
    key: String,

    /// Value written and read back by the probe
    #[arg(long = "value", default_value = DEFAULT_TEST_VALUE)]
    value: String,

    /// Append a random suffix to the key on every run
    #[arg(long = "unique-key")]
    unique_key: bool,

    /// Print the report as JSON
    #[arg(long = "json")]
    json: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut builder = ClusterEndpointConfig::builder()
        .seeds_from_str(&cli.nodes)
        .tls(cli.tls)
        .step_timeout((cli.timeout > 0).then(|| Duration::from_secs(cli.timeout)))
        .test_key(cli.key)
        .test_value(cli.value)
        .unique_key(cli.unique_key);
    if let Some(path) = cli.ca_cert {
        builder = builder.ca_cert(path);
    }
    if let Some(username) = cli.username {
        builder = builder.username(username);
    }
    if let Some(password) = cli.password {
        builder = builder.password(password);
    }

    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let report = match ProbeRunner::cluster().run(&config).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    if cli.json {
        if let Err(e) = render_json(&report) {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    } else {
        render_text(&config.seeds_display(), &report);
    }

    if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn render_text(seeds: &str, report: &Report) {
    println!("Redis Cluster Connection Test");
    println!("=============================");
    println!("seeds: {seeds}");
    println!();

    for step in report.steps() {
        println!(
            "{:<13} {:<8} {:>9.1}ms  {}",
            step.name().as_str(),
            step.status().to_string(),
            millis(step.duration()),
            step.detail()
        );
    }

    let status = match report.status() {
        ReportStatus::Ok => "ok",
        ReportStatus::Failed => "failed",
    };
    println!();
    println!("status: {status} ({:.1}ms)", millis(report.elapsed()));
}

#[cfg(feature = "json")]
fn render_json(report: &Report) -> Result<(), serde_json::Error> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}

#[cfg(not(feature = "json"))]
fn render_json(_report: &Report) -> Result<(), &'static str> {
    Err("JSON output requires the `json` feature")
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
