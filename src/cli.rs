//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::parser::ValueSource;
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};

use harvest_core::{
    DEFAULT_CONCURRENCY, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_START_URL,
};

/// Default output file name.
pub const DEFAULT_OUTPUT: &str = "star_wars_characters.csv";

/// Harvest paginated Star Wars API records into a single CSV table.
///
/// Follows `next` pointers from the start URL, replaces each character's
/// homeworld URL with the planet name, drops relational and audit fields,
/// and writes one CSV file.
#[derive(Parser, Debug, Clone)]
#[command(name = "harvest")]
#[command(author, version, about)]
pub struct Args {
    /// First page to fetch
    #[arg(default_value = DEFAULT_START_URL)]
    pub start_url: String,

    /// Output CSV path ("-" writes to stdout)
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Maximum concurrent reference lookups per page (1-100)
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY as u8, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: u8,

    /// HTTP connect timeout in seconds (1-3600)
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout: u64,

    /// Total per-request timeout in seconds (1-3600)
    #[arg(short = 't', long, default_value_t = DEFAULT_REQUEST_TIMEOUT_SECS, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub timeout: u64,

    /// Config file path (defaults to $XDG_CONFIG_HOME/swapi-harvest/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Returns true when output goes to stdout.
    #[must_use]
    pub fn writes_to_stdout(&self) -> bool {
        self.output.as_os_str() == "-"
    }
}

/// Which arguments were given explicitly on the command line.
///
/// Explicit values win over the config file; defaults lose to it.
#[derive(Debug, Clone, Copy, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CliValueSources {
    pub start_url: bool,
    pub output: bool,
    pub concurrency: bool,
    pub connect_timeout: bool,
    pub timeout: bool,
    pub verbose: bool,
    pub quiet: bool,
}

/// Parses process arguments, exiting with usage on error.
pub fn parse_with_sources() -> (Args, CliValueSources) {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|err| err.exit());
    (args, sources_from(&matches))
}

/// Parses an explicit argument list.
///
/// # Errors
///
/// Returns the clap error for invalid arguments, `--help`, and `--version`.
#[cfg_attr(not(test), allow(dead_code))]
pub fn try_parse_from_with_sources<I, T>(itr: I) -> Result<(Args, CliValueSources), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let matches = Args::command().try_get_matches_from(itr)?;
    let args = Args::from_arg_matches(&matches)?;
    Ok((args, sources_from(&matches)))
}

fn sources_from(matches: &ArgMatches) -> CliValueSources {
    CliValueSources {
        start_url: is_commandline_value(matches, "start_url"),
        output: is_commandline_value(matches, "output"),
        concurrency: is_commandline_value(matches, "concurrency"),
        connect_timeout: is_commandline_value(matches, "connect_timeout"),
        timeout: is_commandline_value(matches, "timeout"),
        verbose: is_commandline_value(matches, "verbose"),
        quiet: is_commandline_value(matches, "quiet"),
    }
}

fn is_commandline_value(matches: &ArgMatches, id: &str) -> bool {
    matches.value_source(id) == Some(ValueSource::CommandLine)
}
