//! Intruder - templated HTTP request fuzzer
//!
//! Substitutes wordlist entries into marked request fields, dispatches the
//! requests across a worker pool and reports the responses that match.

mod app;
mod error;
mod fuzzer;
mod http;
mod reporting;

pub use error::*;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::app::Config;
use crate::fuzzer::{
    error_policy, wordlist_from_spec, Fuzzer, Mutator, PayloadEncoding, RunOutcome, StopHandle, SCANNERS,
};
use crate::http::ReqwestTransport;
use crate::reporting::{ConsoleSink, ReportWriter, ScanReport};

/// Templated HTTP request fuzzer
#[derive(Parser, Debug)]
#[command(name = "intruder")]
#[command(author, version, about = "Templated HTTP request fuzzer", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "INTRUDER_CONFIG")]
    config: Option<PathBuf>,

    /// Target URL; the marker marks where payloads go
    #[arg(short, long)]
    url: Option<String>,

    /// Wordlist: a path, file:PATH, list:a,b,c, range:1-100 or builtin:NAME
    #[arg(short, long, env = "INTRUDER_WORDLIST")]
    wordlist: Option<String>,

    /// HTTP method
    #[arg(short = 'X', long)]
    method: Option<String>,

    /// Extra methods to run every job with (comma separated)
    #[arg(long, value_delimiter = ',')]
    methods: Vec<String>,

    /// Header as 'Name: value' (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Parameter as 'key=value'; an empty value receives the payload (repeatable)
    #[arg(short = 'd', long = "param")]
    params: Vec<String>,

    /// Payload marker
    #[arg(long)]
    marker: Option<String>,

    /// Worker pool size
    #[arg(short, long)]
    threads: Option<usize>,

    /// Delay per worker after each request, in milliseconds
    #[arg(long)]
    delay: Option<u64>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Deepest recursion level to follow
    #[arg(long)]
    max_rlevel: Option<usize>,

    /// Proxy URL (repeatable, rotated per request)
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// Payload prefix (repeatable)
    #[arg(long = "prefix")]
    prefixes: Vec<String>,

    /// Payload suffix (repeatable)
    #[arg(long = "suffix")]
    suffixes: Vec<String>,

    /// Case transform: upper, lower or capitalize
    #[arg(long)]
    case: Option<String>,

    /// Encoder name, optionally scoped as name@regex (repeatable)
    #[arg(short, long = "encoder")]
    encoders: Vec<String>,

    /// Status codes to match, e.g. 200,301-302
    #[arg(long)]
    match_status: Option<String>,

    /// Response time comparator in seconds, e.g. '>=2'
    #[arg(long)]
    match_time: Option<String>,

    /// Response size comparator, e.g. '>1500'
    #[arg(long)]
    match_size: Option<String>,

    /// Word count comparator
    #[arg(long)]
    match_words: Option<String>,

    /// Line count comparator
    #[arg(long)]
    match_lines: Option<String>,

    /// Regex the body must contain
    #[arg(long)]
    match_regex: Option<String>,

    /// Compare against a baseline request instead of only the status
    #[arg(long)]
    legacy_delta: bool,

    /// Status code to drop
    #[arg(long)]
    filter_status: Option<String>,

    /// Drop results whose body matches this regex
    #[arg(long)]
    filter_regex: Option<String>,

    /// Scanner to run on matches (repeatable)
    #[arg(long = "scanner")]
    scanners: Vec<String>,

    /// Abort the run on the first request error
    #[arg(long)]
    abort_on_error: bool,

    /// Report format: txt, csv or json
    #[arg(short, long)]
    format: Option<String>,

    /// Report file (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show mutation steps for every match
    #[arg(short, long)]
    verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "INTRUDER_LOG_LEVEL")]
    log_level: String,

    /// Log file path (enables file logging)
    #[arg(long, env = "INTRUDER_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Enable JSON structured logging
    #[arg(long, env = "INTRUDER_LOG_JSON")]
    log_json: bool,

    /// Generate default configuration and exit; written to --config when given
    #[arg(long)]
    generate_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate_config: bool,

    /// List payload encoders and exit
    #[arg(long)]
    list_encoders: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle special commands first
    if cli.generate_config {
        return generate_default_config(cli.config.as_deref());
    }
    if cli.list_encoders {
        list_encoders();
        return Ok(());
    }

    // Initialize logging
    init_logging(&cli)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Intruder");

    let result = run(cli).await;
    if let Err(e) = &result {
        if let Some(fuzz_error) = e.downcast_ref::<FuzzError>() {
            tracing::error!("{}", fuzz_error.user_message());
        }
    }
    result
}

/// Initialize the logging system
fn init_logging(cli: &Cli) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    if let Some(log_path) = &cli.log_file {
        // File-based logging with rotation
        let dir = log_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        let filename = log_path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("intruder.log");
        let file_appender = RollingFileAppender::new(Rotation::DAILY, dir, filename);

        if cli.log_json {
            // JSON structured logging to file
            let file_layer = fmt::layer().json().with_writer(file_appender).with_ansi(false);
            subscriber.with(file_layer).init();
        } else {
            // Plain text logging to file
            let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
            subscriber.with(file_layer).init();
        }
    } else if cli.log_json {
        subscriber.with(fmt::layer().json().with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    Ok(())
}

/// Load configuration with CLI overrides
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    // Apply CLI overrides
    let engine = &mut config.engine;
    if let Some(wordlist) = &cli.wordlist {
        engine.wordlist = Some(wordlist.clone());
    }
    if let Some(threads) = cli.threads {
        engine.threads = threads;
    }
    if let Some(delay) = cli.delay {
        engine.delay_ms = delay;
    }
    if let Some(timeout) = cli.timeout {
        engine.timeout_secs = timeout;
    }
    if let Some(max_rlevel) = cli.max_rlevel {
        engine.max_rlevel = max_rlevel;
    }
    if !cli.methods.is_empty() {
        engine.methods = cli.methods.clone();
    }
    if !cli.proxies.is_empty() {
        engine.proxies = cli.proxies.clone();
    }
    engine.abort_on_error |= cli.abort_on_error;

    let request = &mut config.request;
    if let Some(url) = &cli.url {
        request.url = url.clone();
    }
    if let Some(method) = &cli.method {
        request.method = method.clone();
    }
    if let Some(marker) = &cli.marker {
        request.marker = marker.clone();
    }
    request.headers.extend(cli.headers.iter().cloned());
    request.params.extend(cli.params.iter().cloned());

    let mutation = &mut config.mutation;
    mutation.prefixes.extend(cli.prefixes.iter().cloned());
    mutation.suffixes.extend(cli.suffixes.iter().cloned());
    mutation.encoders.extend(cli.encoders.iter().cloned());
    if cli.case.is_some() {
        mutation.case = cli.case.clone();
    }

    let matcher = &mut config.matcher;
    for (slot, value) in [
        (&mut matcher.status, &cli.match_status),
        (&mut matcher.time, &cli.match_time),
        (&mut matcher.size, &cli.match_size),
        (&mut matcher.words, &cli.match_words),
        (&mut matcher.lines, &cli.match_lines),
        (&mut matcher.regex, &cli.match_regex),
        (&mut config.filter.status, &cli.filter_status),
        (&mut config.filter.regex, &cli.filter_regex),
    ] {
        if value.is_some() {
            *slot = value.clone();
        }
    }
    matcher.legacy_delta |= cli.legacy_delta;

    config.scanners.enabled.extend(cli.scanners.iter().cloned());
    if let Some(format) = &cli.format {
        config.output.format = format.clone();
    }
    if cli.output.is_some() {
        config.output.path = cli.output.clone();
    }

    // Validate configuration
    config.validate().map_err(FuzzError::from)?;

    Ok(config)
}

/// Generate default configuration file
fn generate_default_config(path: Option<&Path>) -> Result<()> {
    let config = Config::default();
    match path {
        Some(path) => config.save(Some(path)),
        None => {
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn list_encoders() {
    for encoding in PayloadEncoding::all() {
        println!("{:<12} {}", encoding.short_name(), encoding.name());
    }
    println!("\nScanners: {}", SCANNERS.join(", "));
}

/// Wire SIGINT/SIGTERM to a graceful stop
async fn handle_signals(stop: StopHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigint, mut sigterm) = match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(sigint), Ok(sigterm)) => (sigint, sigterm),
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to register signal handlers");
                return;
            }
        };

        tokio::select! {
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, initiating shutdown");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, initiating shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to register Ctrl+C handler");
            return;
        }
        tracing::info!("Received Ctrl+C, initiating shutdown");
    }

    stop.stop();
}

/// Build every component from the configuration and run it
async fn run(cli: Cli) -> Result<()> {
    // Load and validate configuration
    let config = load_config(&cli)?;

    if cli.validate_config {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    let template = config.template().map_err(FuzzError::from)?;
    let spec = config
        .engine
        .wordlist
        .as_deref()
        .ok_or_else(|| FuzzError::from(ConfigError::MissingField("engine.wordlist".into())))?;
    let source = wordlist_from_spec(spec)?;
    let wordlist = source.build()?;
    tracing::info!(source = %source.name(), entries = wordlist.len(), "Wordlist loaded");

    let mutator = Arc::new(Mutator::new(config.mutation().map_err(FuzzError::from)?));
    let scanners = config.scanners(Arc::new(wordlist.clone())).map_err(FuzzError::from)?;
    let transport = ReqwestTransport::new(&config.transport_settings()).map_err(FuzzError::from)?;
    let writer = ReportWriter::new(
        config.report_format().map_err(FuzzError::from)?,
        config.output.path.clone(),
    );

    let stop = StopHandle::new();
    tokio::spawn(handle_signals(stop.clone()));

    let fuzzer = Fuzzer::new(config.fuzzer_config(), template, Arc::new(transport))
        .with_matcher(config.matcher().map_err(FuzzError::from)?)
        .with_filter(config.filter().map_err(FuzzError::from)?)
        .with_scanners(scanners)
        .with_sink(Arc::new(ConsoleSink { verbose: cli.verbose }))
        .with_error_callback(error_policy(config.engine.abort_on_error))
        .with_stop_handle(stop);

    let start_time = Utc::now();
    let report = fuzzer.run(mutator, wordlist).await?;
    let outcome = report.outcome.clone();

    let scan_report = ScanReport::new(report, start_time);
    writer.write(&scan_report).context("Failed to write report")?;

    match outcome {
        RunOutcome::Completed => tracing::info!("Intruder finished"),
        RunOutcome::Cancelled => tracing::warn!("Run cancelled, partial results reported"),
        RunOutcome::Aborted(reason) => anyhow::bail!("Run aborted: {}", reason),
    }
    Ok(())
}
