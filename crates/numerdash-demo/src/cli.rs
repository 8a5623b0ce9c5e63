#![forbid(unsafe_code)]

//! Command-line argument parsing for the demo.
//!
//! Parses args manually. Supports environment overrides via the
//! `NUMERDASH_DEMO_*` prefix; explicit flags win over the environment.

use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const HELP_TEXT: &str = "\
numerdash-demo: Numerai dashboard with simulated operations

USAGE:
    numerdash-demo [OPTIONS]

OPTIONS:
    --config=PATH        TOML file with a [dashboard] table
    --log=PATH           Write logs to PATH (filter with NUMERDASH_LOG)
    --auto-download      Start a download cycle right after launch
    --no-auto-train      Do not train when downloads finish
    --step-ms=N          Simulated work step in milliseconds (default: 120)
    --exit-after-ms=N    Quit after N milliseconds (0 = never)
    --help, -h           Show this help message
    --version, -V        Show version

KEYS:
    q / Ctrl-C  quit          p / space  pause
    d           download      t          train
    s           submit        n          new model
    h / ?       help          /          command mode

ENVIRONMENT VARIABLES:
    NUMERDASH_DEMO_CONFIG         Override --config
    NUMERDASH_DEMO_LOG            Override --log
    NUMERDASH_DEMO_STEP_MS        Override --step-ms
    NUMERDASH_DEMO_EXIT_AFTER_MS  Override --exit-after-ms
    NUMERDASH_LOG                 Log filter (default: info)";

/// Parsed command-line options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opts {
    pub config: Option<PathBuf>,
    pub log: Option<PathBuf>,
    pub auto_download: bool,
    pub no_auto_train: bool,
    /// Simulated work step.
    pub step_ms: u64,
    /// Auto-exit after this many milliseconds (0 = disabled).
    pub exit_after_ms: u64,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            config: None,
            log: None,
            auto_download: false,
            no_auto_train: false,
            step_ms: 120,
            exit_after_ms: 0,
        }
    }
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Run(Opts),
    Help,
    Version,
}

impl Opts {
    /// Parse the process arguments and environment, exiting on `--help`,
    /// `--version` or a bad flag.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        match parse_from(&args, |k| std::env::var(k).ok()) {
            Ok(Parsed::Run(opts)) => opts,
            Ok(Parsed::Help) => {
                println!("{HELP_TEXT}");
                std::process::exit(0);
            }
            Ok(Parsed::Version) => {
                println!("numerdash-demo {VERSION}");
                std::process::exit(0);
            }
            Err(msg) => {
                eprintln!("{msg}\n\n{HELP_TEXT}");
                std::process::exit(2);
            }
        }
    }
}

/// Parse `args` with environment values from `env`.
pub fn parse_from(args: &[String], env: impl Fn(&str) -> Option<String>) -> Result<Parsed, String> {
    let mut opts = Opts::default();

    if let Some(val) = env("NUMERDASH_DEMO_CONFIG") {
        opts.config = Some(PathBuf::from(val));
    }
    if let Some(val) = env("NUMERDASH_DEMO_LOG") {
        opts.log = Some(PathBuf::from(val));
    }
    if let Some(val) = env("NUMERDASH_DEMO_STEP_MS")
        && let Ok(n) = val.parse()
    {
        opts.step_ms = n;
    }
    if let Some(val) = env("NUMERDASH_DEMO_EXIT_AFTER_MS")
        && let Ok(n) = val.parse()
    {
        opts.exit_after_ms = n;
    }

    for arg in args {
        match arg.as_str() {
            "--help" | "-h" => return Ok(Parsed::Help),
            "--version" | "-V" => return Ok(Parsed::Version),
            "--auto-download" => opts.auto_download = true,
            "--no-auto-train" => opts.no_auto_train = true,
            other => {
                if let Some(val) = other.strip_prefix("--config=") {
                    opts.config = Some(PathBuf::from(val));
                } else if let Some(val) = other.strip_prefix("--log=") {
                    opts.log = Some(PathBuf::from(val));
                } else if let Some(val) = other.strip_prefix("--step-ms=") {
                    opts.step_ms = parse_number("--step-ms", val)?;
                } else if let Some(val) = other.strip_prefix("--exit-after-ms=") {
                    opts.exit_after_ms = parse_number("--exit-after-ms", val)?;
                } else {
                    return Err(format!("Unknown argument: {other}"));
                }
            }
        }
    }
    Ok(Parsed::Run(opts))
}

fn parse_number(flag: &str, val: &str) -> Result<u64, String> {
    val.parse()
        .map_err(|_| format!("Invalid value for {flag}: {val}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults() {
        assert_eq!(parse_from(&[], no_env), Ok(Parsed::Run(Opts::default())));
    }

    #[test]
    fn flags_parse() {
        let parsed = parse_from(
            &args(&["--config=dash.toml", "--auto-download", "--step-ms=5"]),
            no_env,
        )
        .unwrap();
        let Parsed::Run(opts) = parsed else {
            panic!("expected run");
        };
        assert_eq!(opts.config, Some(PathBuf::from("dash.toml")));
        assert!(opts.auto_download);
        assert_eq!(opts.step_ms, 5);
    }

    #[test]
    fn flags_override_env() {
        let env = |k: &str| (k == "NUMERDASH_DEMO_STEP_MS").then(|| "50".to_string());
        let Ok(Parsed::Run(opts)) = parse_from(&args(&["--step-ms=7"]), env) else {
            panic!("expected run");
        };
        assert_eq!(opts.step_ms, 7);
        let Ok(Parsed::Run(opts)) = parse_from(&[], env) else {
            panic!("expected run");
        };
        assert_eq!(opts.step_ms, 50);
    }

    #[test]
    fn rejects_unknown_and_bad_numbers() {
        assert!(parse_from(&args(&["--bogus"]), no_env).is_err());
        assert!(parse_from(&args(&["--exit-after-ms=soon"]), no_env).is_err());
        assert_eq!(parse_from(&args(&["-h"]), no_env), Ok(Parsed::Help));
    }
}
