//! confmgrd - subsystem client registry and object ownership directory
//!
//! Connects to every configured subsystem daemon, keeps those connections
//! alive as daemons stop and restart, and serves as the lookup point for
//! which daemon owns each configuration object type.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! confmgrd start
//!
//! # Start the daemon (background/daemonized)
//! confmgrd start -d
//!
//! # Stop the daemon
//! confmgrd stop
//!
//! # Check daemon status
//! confmgrd status
//!
//! # Validate descriptor files without connecting
//! confmgrd --config ./confmgrd.toml check
//! ```

use std::env;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use confmgr_core::{ReadinessEvent, StatusEvent};
use confmgrd::config::{DaemonConfig, CONFIG_ENV, DEFAULT_CONFIG_PATH};
use confmgrd::context::ControlPlane;
use confmgrd::registry::RegistryError;
use confmgrd::status_feed::StatusFeedServer;
use confmgrd::tcp_client::tcp_catalog;

/// Buffered status events between the feed and the registry.
const STATUS_CHANNEL_CAPACITY: usize = 64;

/// confmgr daemon - subsystem connection manager
#[derive(Parser, Debug)]
#[command(name = "confmgrd", version, about)]
struct Args {
    /// Configuration file (defaults to $CONFMGR_CONFIG, then /etc/confmgr/confmgrd.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
    /// Build the registry and directory, report warnings, and exit
    Check,
}

fn config_path(arg: Option<PathBuf>) -> PathBuf {
    arg.or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("confmgr")
}

fn pid_file_path() -> PathBuf {
    state_dir().join("confmgrd.pid")
}

fn log_file_path() -> PathBuf {
    state_dir().join("confmgrd.log")
}

fn read_pid() -> Option<u32> {
    let mut file = File::open(pid_file_path()).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        remove_pid_file();
    }
    None
}

fn stop_daemon(pid: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let result = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
        if result != 0 {
            bail!("Failed to send SIGTERM to process {pid}");
        }
    }
    #[cfg(not(unix))]
    {
        bail!("Stop command is only supported on Unix systems");
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<DaemonConfig> {
    DaemonConfig::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = config_path(args.config);

    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'confmgrd stop' to stop it first.");
                process::exit(1);
            }

            // Fail before forking so config errors reach the terminal
            let config = load_config(&config_path)?;

            if daemon {
                daemonize()?;
            }

            write_pid()?;

            let result = run_daemon(config);

            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");

                if let Ok(config) = DaemonConfig::load_or_default(&config_path) {
                    if config.status_socket.exists() {
                        println!("Status socket: {}", config.status_socket.display());
                    }
                }

                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
        Command::Check => check(&config_path),
    }
}

fn check(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let catalog = tcp_catalog(&config.known_clients);

    let plane = ControlPlane::initialize(&config, &catalog, CancellationToken::new())
        .context("Configuration check failed")?;

    println!("Clients: {}", plane.registry().len());
    for name in plane.registry().names() {
        let address = plane
            .registry()
            .get(name.as_str())
            .map(|handle| handle.address().to_string())
            .unwrap_or_default();
        println!("  {name} -> {address}");
    }
    println!("Object types: {}", plane.directory().len());

    if plane.report().is_clean() {
        println!("No warnings.");
    } else {
        println!("Warnings: {}", plane.report().len());
        for warning in plane.report().warnings() {
            println!("  {warning}");
        }
    }
    Ok(())
}

fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = File::create(&log_path).context("Failed to create log file for stderr")?;

    let daemonize = Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr);

    daemonize.start().context("Failed to daemonize")?;

    Ok(())
}

#[tokio::main]
async fn run_daemon(config: DaemonConfig) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("confmgrd=info".parse()?)
                .add_directive("confmgr_core=info".parse()?)
                .add_directive("confmgr_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "confmgr daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let catalog = tcp_catalog(&config.known_clients);
    let plane = ControlPlane::initialize(&config, &catalog, cancel_token.clone())
        .context("Failed to initialize control plane")?;

    let (status_tx, status_rx) = mpsc::channel::<StatusEvent>(STATUS_CHANNEL_CAPACITY);

    let feed = StatusFeedServer::new(&config.status_socket, status_tx, cancel_token.clone());
    tokio::spawn(async move {
        if let Err(e) = feed.run().await {
            error!(error = %e, "Status feed error");
        }
    });

    let listener_registry = Arc::clone(plane.registry());
    tokio::spawn(async move {
        listener_registry.listen_to_status_changes(status_rx).await;
    });

    let (progress_tx, mut progress_rx) = mpsc::channel::<ReadinessEvent>(plane.registry().len() + 1);
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            match &event {
                ReadinessEvent::Connected(name) => debug!(client = %name, "Client reported ready"),
                ReadinessEvent::InitDone => debug!(marker = %event, "Readiness reported"),
            }
        }
    });

    match plane.registry().connect_all(&progress_tx).await {
        Ok(()) => {}
        Err(RegistryError::Cancelled) => {
            warn!(unconnected = ?plane.registry().unconnected_clients(), "Shut down before all clients connected");
        }
        Err(e) => return Err(e.into()),
    }
    drop(progress_tx);

    cancel_token.cancelled().await;

    plane.registry().disconnect_from_all_clients().await;

    info!("confmgr daemon stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
