#![forbid(unsafe_code)]

//! numerdash demo binary entry point.

mod cli;
mod config_file;
mod sim;

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use numerdash::prelude::*;
use numerdash::{ConfigError, SharedPanel};
use tracing_subscriber::EnvFilter;

use crate::sim::SimulatedOps;

fn main() {
    let opts = cli::Opts::parse();

    if let Err(err) = init_logging(opts.log.as_deref()) {
        eprintln!("Failed to open log file: {err}");
        std::process::exit(1);
    }

    let config = match load_config(&opts) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    };

    let panel = SharedPanel::new();
    let ops = SimulatedOps::new(
        config.required_download_ids.iter().cloned(),
        Duration::from_millis(opts.step_ms),
        panel.clone(),
    );

    let mut dashboard = match Dashboard::builder(config).operations(ops).panel(panel).build() {
        Ok(dashboard) => dashboard,
        Err(err) => {
            eprintln!("Failed to initialize: {err}");
            std::process::exit(1);
        }
    };

    if opts.auto_download {
        let handle = dashboard.handle().clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(200));
            handle.start_download();
        });
    }
    if opts.exit_after_ms > 0 {
        let signal = dashboard.handle().signal().clone();
        let after = Duration::from_millis(opts.exit_after_ms);
        thread::spawn(move || {
            thread::sleep(after);
            signal.stop();
        });
    }

    if let Err(err) = dashboard.run() {
        tracing::error!(error = %err, "dashboard exited with error");
        eprintln!("Runtime error: {err}");
        std::process::exit(1);
    }
}

fn load_config(opts: &cli::Opts) -> Result<DashboardConfig, ConfigError> {
    let mut config = match &opts.config {
        Some(path) => config_file::load(path)?,
        None => DashboardConfig::default(),
    };
    config.apply_env()?;
    if opts.no_auto_train {
        config.auto_train_after_download = false;
    }
    config.validate()?;
    Ok(config)
}

/// Install the log subscriber. Stdout belongs to the dashboard, so logs go to
/// a file or nowhere.
fn init_logging(path: Option<&Path>) -> io::Result<()> {
    let filter =
        EnvFilter::try_from_env("NUMERDASH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    match path {
        Some(path) => {
            let file = File::create(path)?;
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
    Ok(())
}
