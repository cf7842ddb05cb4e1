use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "roomgrid",
    version,
    about = "Room availability calendar for small hotels and apartments"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rcfile", global = true)]
    pub rcfile: Option<PathBuf>,

    #[arg(long = "catalog", global = true)]
    pub catalog: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the availability grid for every room.
    Grid {
        /// First day of the window (YYYY-MM-DD, today, tomorrow, monday, +3...).
        #[arg(long, default_value = "today")]
        start: String,

        /// Number of days to show; defaults to `window.days`.
        #[arg(long, allow_hyphen_values = true)]
        days: Option<i64>,

        #[arg(long)]
        json: bool,

        #[arg(long)]
        parallel: bool,
    },
    /// Search rooms for a stay and show the calendar from check-in.
    Search {
        #[arg(long = "check-in")]
        check_in: Option<String>,

        #[arg(long = "check-out")]
        check_out: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// List rooms in the catalog.
    Rooms {
        #[arg(long)]
        json: bool,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Grid {
            start: "today".to_string(),
            days: None,
            json: false,
            parallel: false,
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.key=value` / `rc.key:value` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = if let Some((k, v)) = rest.split_once('=') {
                Some((format!("rc.{k}"), v.to_string()))
            } else if let Some((k, v)) = rest.split_once(':') {
                Some((format!("rc.{k}"), v.to_string()))
            } else {
                None
            };

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<OsString> {
        raw.iter().map(OsString::from).collect()
    }

    #[test]
    fn extracts_positional_overrides() {
        let pre = preprocess_args(&args(&[
            "roomgrid",
            "rc.window.days=7",
            "grid",
            "rc.checkout.policy:exclusive",
        ]))
        .expect("preprocess");

        assert_eq!(pre.cleaned_args, args(&["roomgrid", "grid"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.window.days".to_string(), "7".to_string()),
                ("rc.checkout.policy".to_string(), "exclusive".to_string()),
            ]
        );
    }

    #[test]
    fn parses_grid_subcommand() {
        let cli = GlobalCli::parse_from(args(&[
            "roomgrid",
            "grid",
            "--start",
            "2024-03-10",
            "--days",
            "15",
            "--rc",
            "color=off",
        ]));

        match cli.command {
            Some(Command::Grid { start, days, .. }) => {
                assert_eq!(start, "2024-03-10");
                assert_eq!(days, Some(15));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.rc_overrides.len(), 1);
        assert_eq!(cli.rc_overrides[0].key, "color");
    }

    #[test]
    fn search_dates_are_optional_at_parse_time() {
        let cli = GlobalCli::parse_from(args(&["roomgrid", "search", "--check-in", "2024-03-16"]));
        assert!(matches!(
            cli.command,
            Some(Command::Search { check_out: None, .. })
        ));
    }
}
