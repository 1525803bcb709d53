//! Cinder driver daemon
//!
//! Boot order: read configuration, open the syslog, compile the auto and
//! boot objects, restore the snapshot (if one exists) and replay the
//! transaction log, open the listener, then enter the tick loop.

use cinder_driver::config::{Config, ConfigFile};
use cinder_driver::{Driver, db};
use clap::Parser as ClapParser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(ClapParser)]
#[command(name = "cinderd")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Cinder driver - multi-user persistent object runtime", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "cinderd.toml")]
    config: PathBuf,

    /// Script library root (overrides the config file)
    #[arg(long)]
    lib: Option<PathBuf>,

    /// Snapshot to load at boot
    #[arg(long)]
    load: Option<PathBuf>,

    /// Snapshot written by saves
    #[arg(long)]
    save: Option<PathBuf>,

    /// TCP port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Disable the soft cycle limit
    #[arg(long)]
    no_soft_cycles: bool,

    /// Disable the hard cycle limit
    #[arg(long)]
    no_hard_cycles: bool,

    /// Start with a fresh world even when a snapshot exists
    #[arg(long)]
    fresh: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut config = if cli.config.exists() {
        match Config::from_file(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("cinderd: {e}");
                process::exit(1);
            }
        }
    } else {
        let mut c = Config::default();
        c.apply(ConfigFile::default());
        c
    };
    if let Some(lib) = cli.lib {
        config.lib_root = lib;
    }
    if let Some(load) = cli.load {
        config.load_db = load;
    }
    if let Some(save) = cli.save {
        config.save_db = save;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if cli.no_soft_cycles {
        config.use_soft_cycles = false;
    }
    if cli.no_hard_cycles {
        config.use_hard_cycles = false;
    }

    init_logging(&config);

    let mut driver = Driver::new(config);
    if let Err(e) = driver.load_boot_objects() {
        error!("{e}");
        process::exit(1);
    }

    if !cli.fresh && driver.config.load_db.exists() {
        let load = driver.config.load_db.clone();
        if let Err(e) = db::load_snapshot(&mut driver, &load) {
            // refuse to run with a partial world
            error!(error = %e, "snapshot restore failed; aborting");
            process::exit(1);
        }
        let log = driver.config.transact_log.clone();
        if let Err(e) = db::replay_transactions(&mut driver, &log) {
            error!(error = %e, "transaction log replay failed; aborting");
            process::exit(1);
        }
    } else {
        info!("starting with a fresh world");
    }

    let port = driver.config.port;
    if let Err(e) = driver.conns.listen(port) {
        error!(port, error = %e, "cannot open listener");
        process::exit(1);
    }

    let code = driver.run();
    process::exit(code);
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);
    match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.syslog)
    {
        Ok(file) => {
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .with(file_layer)
                .init();
        }
        Err(e) => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .init();
            tracing::warn!(path = %config.syslog.display(), error = %e, "cannot open syslog file");
        }
    }
}
