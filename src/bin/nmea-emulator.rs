//! NMEA/AIS instrument emulator daemon.
//!
//! Usage:
//!   nmea-emulator -c /etc/nmea-emulator/sim.conf
//!   nmea-emulator -c /etc/nmea-emulator/sim.conf --stderr   # log to stderr

use std::path::PathBuf;
use std::process;

use clap::Parser;
use log::{error, info};
use nmea_emulator::{config, util, Engine};

#[derive(Debug, Parser)]
#[command(name = "nmea-emulator", about = "Marine NMEA 0183 + AIS instrument emulator")]
struct Cli {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", default_value = "/etc/nmea-emulator/sim.conf")]
    config: PathBuf,

    /// Log to stderr instead of syslog (useful for debugging).
    #[arg(long)]
    stderr: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match config::load_config(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("nmea-emulator: config error: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = config::validate_config(&cfg) {
        eprintln!("nmea-emulator: config validation: {e}");
        process::exit(1);
    }

    let use_syslog = cfg.log_syslog && !cli.stderr;
    setup_logging(use_syslog).expect("failed to set up logging");

    if let Some(pid_file) = &cfg.pid_file {
        if let Err(e) = util::write_pid_file(pid_file) {
            error!("cannot write PID file {}: {e}", pid_file.display());
        }
    }

    info!(
        "nmea-emulator starting (udp={}:{}, tcp={}:{}, interval={}s, targets={})",
        cfg.udp_host, cfg.udp_port, cfg.tcp_host, cfg.tcp_port, cfg.interval_s, cfg.ais.num_targets
    );

    let pid_file = cfg.pid_file.clone();
    let engine = Engine::new(None);
    if let Err(e) = engine.start(cfg).await {
        error!("engine failed to start: {e}");
        process::exit(1);
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {e}");
    }
    info!("nmea-emulator shutting down");
    if let Err(e) = engine.stop().await {
        error!("engine stop error: {e}");
    }
    if let Some(pid_file) = pid_file {
        util::remove_pid_file(&pid_file);
    }
}

fn setup_logging(use_syslog: bool) -> anyhow::Result<()> {
    if use_syslog {
        let formatter = syslog::Formatter3164 {
            facility: syslog::Facility::LOG_DAEMON,
            hostname: None,
            process: "nmea-emulator".into(),
            pid: process::id(),
        };
        let logger = syslog::unix(formatter).map_err(|e| anyhow::anyhow!("syslog connect failed: {e}"))?;
        log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
            .map(|()| log::set_max_level(log::LevelFilter::Info))
            .map_err(|e| anyhow::anyhow!("set_logger: {e}"))?;
    } else {
        env_logger::Builder::from_default_env().filter_level(log::LevelFilter::Debug).init();
    }
    Ok(())
}
