//! tcpush CLI - push one file to a listening peer over raw TCP
//!
//! Usage:
//!   tcpush receive [--port P] [--output FILE]   Wait for one file
//!   tcpush send <file> <host> [--port P]        Push a file
//!   tcpush digest <file>                        Print a BLAKE3 digest
//!   tcpush xor <file> --key K                   XOR a file in place (not encryption)
//!   tcpush config show|path|init                Inspect or create the config file

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use tcpush_core::digest::file_digest;
use tcpush_core::{
    parse_port, transform_file, Completion, Config, Endpoint, ReceiveOptions, Receiver,
    SendOptions, TransferError,
};

/// Exit status for failures outside a transfer (bad config, rejected
/// credentials). Sits above the transfer status codes (1-9).
const CLI_FAILURE: u8 = 10;

#[derive(Parser, Debug)]
#[command(name = "tcpush")]
#[command(about = "Push a single file to a listening peer over TCP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (default: platform config directory)
    #[arg(long = "config", global = true)]
    config_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a file to a waiting receiver
    Send {
        /// File to send
        file: PathBuf,

        /// Receiver host or IP address
        host: String,

        /// Receiver port [default: from config, else 8080]
        #[arg(short, long, value_parser = parse_port)]
        port: Option<u16>,

        /// User name, required when the config has an [auth] section
        #[arg(short, long)]
        user: Option<String>,

        /// Password, required when the config has an [auth] section
        #[arg(long, env = "TCPUSH_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Bytes per read/write
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Give up connecting after this many seconds
        #[arg(long)]
        connect_timeout: Option<u64>,

        /// Fail a write that blocks longer than this many seconds
        #[arg(long)]
        write_timeout: Option<u64>,

        /// Print the file's BLAKE3 digest before sending
        #[arg(long)]
        digest: bool,
    },

    /// Accept one sender and write what it sends to a file
    Receive {
        /// Port to listen on (0 picks a free port) [default: from config, else 8080]
        #[arg(short, long)]
        port: Option<u16>,

        /// Destination file, overwritten if present [default: received_file.txt]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Bind address [default: 0.0.0.0]
        #[arg(short, long)]
        bind: Option<IpAddr>,

        /// Bytes per read/write
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Fail if the sender goes quiet for this many seconds
        #[arg(long)]
        read_timeout: Option<u64>,

        /// Print the received file's BLAKE3 digest
        #[arg(long)]
        digest: bool,
    },

    /// Print the BLAKE3 digest of a file
    Digest {
        /// File to hash
        file: PathBuf,
    },

    /// XOR a file in place with a repeating key.
    ///
    /// This is NOT encryption and offers no protection. Running it again
    /// with the same key restores the file.
    Xor {
        /// File to rewrite
        file: PathBuf,

        /// Key bytes (UTF-8)
        #[arg(short, long)]
        key: String,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_status(&e))
        }
    }
}

/// Transfer failures exit with their status code; everything else with
/// [`CLI_FAILURE`].
fn exit_status(e: &anyhow::Error) -> u8 {
    match e.downcast_ref::<TransferError>() {
        Some(transfer) => transfer.status_code().exit_status(),
        None => CLI_FAILURE,
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config_file.as_deref())?;

    match cli.command {
        Commands::Send {
            file,
            host,
            port,
            user,
            password,
            chunk_size,
            connect_timeout,
            write_timeout,
            digest,
        } => {
            check_credentials(&config, user.as_deref(), password.as_deref())?;

            let endpoint = Endpoint::new(host, port.unwrap_or(config.sender.port));
            let mut options = SendOptions::from(&config.sender);
            if let Some(size) = chunk_size {
                options.chunk_size = checked_chunk_size(size)?;
            }
            if let Some(secs) = connect_timeout {
                options.connect_timeout = timeout(secs);
            }
            if let Some(secs) = write_timeout {
                options.write_timeout = timeout(secs);
            }

            run_send(&file, &endpoint, &options, digest)
        }

        Commands::Receive {
            port,
            output,
            bind,
            chunk_size,
            read_timeout,
            digest,
        } => {
            let port = port.unwrap_or(config.receiver.port);
            let destination = output.unwrap_or_else(|| config.receiver.destination.clone());
            let mut options = ReceiveOptions::from(&config.receiver);
            if let Some(addr) = bind {
                options.bind = addr;
            }
            if let Some(size) = chunk_size {
                options.chunk_size = checked_chunk_size(size)?;
            }
            if let Some(secs) = read_timeout {
                options.read_timeout = timeout(secs);
            }

            run_receive(port, &destination, options, digest)
        }

        Commands::Digest { file } => {
            let digest =
                file_digest(&file).with_context(|| format!("Failed to read {:?}", file))?;
            println!("{}  {}", digest, file.display());
            Ok(())
        }

        Commands::Xor { file, key } => {
            let bytes = transform_file(&file, key.as_bytes())?;
            println!("{}: {} bytes transformed", file.display(), bytes);
            Ok(())
        }

        Commands::Config { action } => run_config(action, &config, cli.config_file.as_deref()),
    }
}

fn run_send(file: &Path, endpoint: &Endpoint, options: &SendOptions, digest: bool) -> Result<()> {
    if digest {
        // A missing file is reported by the transfer itself, with its own status.
        match file_digest(file) {
            Ok(d) => println!("{}  {}", d, file.display()),
            Err(e) => warn!("Could not hash {:?}: {}", file, e),
        }
    }

    let report = tcpush_core::send_file(file, endpoint, options)?;
    println!("{}", report.summary());
    Ok(())
}

fn run_receive(port: u16, destination: &Path, options: ReceiveOptions, digest: bool) -> Result<()> {
    let receiver = Receiver::bind(port, options)?;
    info!("Waiting for a sender on port {}", receiver.port());

    let report = receiver.receive_into(destination)?;
    println!("{}", report.summary());
    if report.completion == Completion::PeerReset {
        warn!(
            "Connection was reset by {}; {:?} may be incomplete",
            report.peer, destination
        );
    }

    if digest {
        let d = file_digest(destination)
            .with_context(|| format!("Failed to read {:?}", destination))?;
        println!("{}  {}", d, destination.display());
    }
    Ok(())
}

fn run_config(action: ConfigAction, config: &Config, explicit: Option<&Path>) -> Result<()> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Config::default_path(),
    };

    match action {
        ConfigAction::Show => {
            let mut shown = config.clone();
            if shown.auth.password.is_some() {
                shown.auth.password = Some("********".into());
            }
            print!(
                "{}",
                toml::to_string_pretty(&shown).context("Failed to serialize config")?
            );
        }
        ConfigAction::Path => match path {
            Some(path) => println!("{}", path.display()),
            None => bail!("No config directory available on this platform"),
        },
        ConfigAction::Init { force } => {
            let Some(path) = path else {
                bail!("No config directory available on this platform");
            };
            if path.exists() && !force {
                bail!("{:?} already exists (use --force to overwrite)", path);
            }
            Config::default().save_to(&path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}

/// An explicit `--config` must load; the default location falls back to
/// defaults with a warning.
fn load_config(explicit: Option<&Path>) -> Result<Config> {
    match explicit {
        Some(path) => {
            if !path.exists() {
                bail!("Config file {:?} does not exist", path);
            }
            Config::load_from(path).with_context(|| format!("Failed to load config {:?}", path))
        }
        None => Ok(Config::load()),
    }
}

fn check_credentials(config: &Config, user: Option<&str>, password: Option<&str>) -> Result<()> {
    if !config.auth.is_enabled() {
        if user.is_some() || password.is_some() {
            warn!("Credentials given but no [auth] section is configured; ignoring them");
        }
        return Ok(());
    }

    let (Some(user), Some(password)) = (user, password) else {
        bail!("This configuration requires --user and --password to send");
    };
    if !config.auth.verifier().verify(user, password) {
        bail!("Invalid user or password");
    }
    Ok(())
}

fn checked_chunk_size(size: usize) -> Result<usize> {
    if size == 0 {
        bail!("--chunk-size must be greater than zero");
    }
    Ok(size)
}

/// Zero disables the deadline
fn timeout(secs: u64) -> Option<std::time::Duration> {
    (secs > 0).then(|| std::time::Duration::from_secs(secs))
}
