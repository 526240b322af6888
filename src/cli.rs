use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "stacks")]
#[command(version)]
#[command(about = "Inspect and read content archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  stacks info wikipedia.zip               show title, language, counts and tags\n  \
  stacks resolve wikipedia.zip /old       print where /old redirects to\n  \
  stacks cat wikipedia.zip /home --range 0-99   first 100 bytes of /home")]
pub struct Cli {
    /// Configuration file [default: stacks/config.toml in the platform config directory]
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show an archive's metadata without registering it
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// List every content path
    Ls {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the path a content path finally redirects to
    Resolve {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        path: String,
    },
    /// Write content to standard output
    Cat {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        path: String,
        /// Inclusive byte range; `0-0` is the first byte
        #[arg(long, value_name = "START-END", value_parser = parse_range)]
        range: Option<(u64, u64)>,
    },
    /// Print the archive's main page path
    MainPage {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print a random article path
    Random {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Cli {
    /// Log level after applying `-v`/`-q` to the configured one.
    pub fn log_level(&self, configured: Level) -> Level {
        if self.quiet {
            return Level::ERROR;
        }
        // More verbose levels compare greater.
        match self.verbose {
            0 => configured,
            1 => configured.max(Level::INFO),
            2 => configured.max(Level::DEBUG),
            _ => Level::TRACE,
        }
    }
}

fn parse_range(raw: &str) -> Result<(u64, u64), String> {
    let (start, end) = raw.split_once('-').ok_or_else(|| format!("expected START-END, got {raw:?}"))?;
    let start: u64 = start.trim().parse().map_err(|_| format!("invalid range start {start:?}"))?;
    let end: u64 = end.trim().parse().map_err(|_| format!("invalid range end {end:?}"))?;
    if end < start {
        return Err(format!("range end {end} is before start {start}"));
    }
    Ok((start, end))
}
