//! psglot - live monitor for MySQL performance_schema counter tables.
//!
//! Usage:
//!   psglot                       # TUI, 1 second interval
//!   psglot 5                     # TUI, 5 second interval
//!   psglot --batch --count 10    # log descriptions 10 times, no TUI
//!   psglot --demo                # scripted server, no connection needed
//!
//! Connection parameters come from MYSQL_HOST, MYSQL_TCP_PORT, MYSQL_USER
//! and MYSQL_PWD.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use psglot::collector::mock::MockExecutor;
use psglot::collector::{
    CollectorRegistry, ConnectionConfig, DisplayMode, GlobalStatus, MysqlExecutor,
    QueryExecutor, RetryPolicy, SetupInstruments, TableSource, enable_or_warn, server_variable,
    tables,
};
use psglot::config::{MonitorConfig, parse_sources};
use psglot::tui::{App, ServerInfo};

/// Rows logged per source in batch mode.
const BATCH_TOP_ROWS: usize = 5;

/// Live monitor for MySQL performance_schema counter tables.
#[derive(Parser)]
#[command(name = "psglot", about = "MySQL performance_schema monitor", version)]
struct Args {
    /// Update interval in seconds.
    #[arg(value_name = "INTERVAL", default_value = "1")]
    interval: u64,

    /// Start with lifetime counters instead of deltas since start.
    #[arg(long)]
    absolute: bool,

    /// Comma-separated sources to poll
    /// (statements, table_io, file_io, stages, mutex, memory).
    #[arg(long, value_name = "LIST")]
    sources: Option<String>,

    /// Per-fetch time budget in seconds.
    #[arg(long, default_value = "5", value_name = "SECS")]
    fetch_timeout: u64,

    /// Consecutive failures before a source is marked failed.
    #[arg(long, default_value = "3", value_name = "N")]
    max_failures: u32,

    /// Do not enable mutex/stage instruments in setup_instruments.
    #[arg(long)]
    no_configure: bool,

    /// Log source descriptions instead of running the TUI.
    #[arg(long)]
    batch: bool,

    /// Number of batch iterations (default: until Ctrl-C).
    #[arg(long, requires = "batch")]
    count: Option<u64>,

    /// Write logs to this file (the TUI owns the terminal).
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,

    /// Use a scripted demo server instead of connecting.
    #[arg(long)]
    demo: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
///
/// The TUI logs only to `--log-file`; without one, logging stays off.
fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>, tui: bool) -> Result<(), String> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("cannot open log file '{}': {}", path.display(), e))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None if tui => {}
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn monitor_config(args: &Args) -> MonitorConfig {
    let mut config = MonitorConfig {
        interval: Duration::from_secs(args.interval),
        retry: RetryPolicy {
            fetch_timeout: Duration::from_secs(args.fetch_timeout),
            max_consecutive_failures: args.max_failures,
        },
        initial_mode: if args.absolute {
            DisplayMode::Absolute
        } else {
            DisplayMode::Relative
        },
        configure_instruments: !args.no_configure,
        ..MonitorConfig::default()
    };
    if let Some(list) = &args.sources {
        config.sources = parse_sources(list);
    }
    config
}

fn fatal(msg: impl std::fmt::Display) -> ! {
    error!("{}", msg);
    eprintln!("Error: {}", msg);
    std::process::exit(1);
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.verbose, args.quiet, args.log_file.as_deref(), !args.batch) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let config = monitor_config(&args);
    if let Err(e) = config.validate() {
        fatal(e);
    }

    info!("psglot {} starting", env!("CARGO_PKG_VERSION"));

    // Executor: real server or scripted demo
    let (executor, endpoint): (Arc<dyn QueryExecutor>, String) = if args.demo {
        (Arc::new(MockExecutor::typical_server()), "demo".to_string())
    } else {
        let conn = match ConnectionConfig::from_env() {
            Ok(c) => c,
            Err(e) => fatal(e),
        };
        match MysqlExecutor::connect(&conn, config.retry.fetch_timeout, config.sources.len() + 1) {
            Ok(executor) => (Arc::new(executor), conn.describe()),
            Err(e) => fatal(format!("cannot connect to {}: {}", conn.describe(), e)),
        }
    };
    info!("Server: {}", endpoint);

    let version = server_variable(executor.as_ref(), "version").unwrap_or_else(|e| {
        warn!("cannot read server version: {}", e);
        None
    });
    let datadir = server_variable(executor.as_ref(), "datadir").unwrap_or_else(|e| {
        warn!("cannot read datadir, file names stay absolute: {}", e);
        None
    });

    let mut instruments = SetupInstruments::new(Arc::clone(&executor));
    if config.configure_instruments
        && let Err(e) = enable_or_warn(&mut instruments)
    {
        error!("{}; continuing with current instrumentation", e);
    }

    let mut registry = CollectorRegistry::new(config.interval);
    for id in &config.sources {
        let Some(schema) = tables::by_id(id, datadir.as_deref()) else {
            continue;
        };
        let source = Box::new(TableSource::new(schema, Arc::clone(&executor)));
        if let Err(e) = registry.register(source, config.retry, config.initial_mode) {
            registry.shutdown();
            restore_instruments(&mut instruments);
            fatal(format!("cannot start collector for '{}': {}", id, e));
        }
    }
    info!(
        "Config: interval={}s, sources={}, mode={}",
        config.interval.as_secs(),
        config.sources.join(","),
        config.initial_mode.as_str()
    );

    let status = GlobalStatus::new(Arc::clone(&executor));
    let mut result = if args.batch {
        run_batch(&registry, &status, config.interval, args.count);
        Ok(registry)
    } else {
        let server = ServerInfo {
            endpoint,
            version,
            uptime_secs: None,
        };
        App::new(registry, Some(status), server).run(config.interval)
    };

    // Graceful shutdown; a registry lost to a TUI error stops on drop
    if let Ok(registry) = &mut result {
        registry.shutdown();
    }
    restore_instruments(&mut instruments);

    if let Err(e) = result {
        eprintln!("Error running TUI: {}", e);
        std::process::exit(1);
    }
}

/// Puts back instrument settings changed at startup. Must run before any
/// exit once `enable_or_warn` has been called.
fn restore_instruments(instruments: &mut SetupInstruments) {
    if let Err(e) = instruments.restore_configuration() {
        error!("{}", e);
        eprintln!("Error: {}", e);
    }
}

/// Logs each source's description and top rows every interval until
/// Ctrl-C or `count` iterations.
fn run_batch(registry: &CollectorRegistry, status: &GlobalStatus, interval: Duration, count: Option<u64>) {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    match status.get("Uptime") {
        Ok(Some(uptime)) => info!("Server uptime: {}s", uptime),
        Ok(None) => {}
        Err(e) => warn!("cannot read server uptime: {}", e),
    }

    let mut iteration: u64 = 0;
    while running.load(Ordering::SeqCst) {
        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
        if !running.load(Ordering::SeqCst) {
            break;
        }

        iteration += 1;
        for id in registry.sources() {
            let Some(bundle) = registry.latest(id) else {
                continue;
            };
            if !bundle.enabled {
                continue;
            }
            info!("{}", bundle.description());
            info!("  {}", bundle.headings());
            for line in bundle.row_content().into_iter().take(BATCH_TOP_ROWS) {
                info!("  {}", line);
            }
            info!("  {}", bundle.total_row_content());
        }

        if count.is_some_and(|c| iteration >= c) {
            break;
        }
    }
    info!("Shutting down...");
}
