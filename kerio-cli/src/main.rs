//! CLI for Kerio JSON-RPC administration APIs.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::Value;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::session::{Action, Connection};

#[derive(Parser)]
#[command(
    name = "kerio",
    version,
    about = "Call Kerio Control and Samepage JSON-RPC APIs"
)]
struct Cli {
    /// Raise log verbosity (-v debug, -vv trace with raw HTTP).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    connection: Connection,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in, call a method, print its result and log out.
    Call {
        /// Method name (e.g., Users.get).
        method: String,
        /// Parameters as a JSON object.
        params: Option<String>,
    },

    /// Print the server API version.
    ApiVersion,

    /// Print the server's named constants (Kerio Control only).
    Constants,

    /// Download a file to a directory.
    Download {
        /// Server path of the file.
        url: String,
        /// Target directory.
        dir: PathBuf,
        /// File name to save as (default: file.bin).
        name: Option<String>,
    },

    /// Upload a file.
    Upload {
        /// Local file to upload.
        path: PathBuf,
        /// Item the file belongs to (Samepage).
        #[arg(long)]
        parent: Option<u64>,
    },

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if let Err(e) = cli.dispatch() {
        eprintln!("kerio: {e:#}");
        std::process::exit(1);
    }
}

/// Logs to stderr; `-v` overrides `RUST_LOG`, which defaults to `warn`.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

impl Cli {
    fn dispatch(self) -> Result<()> {
        let action = match self.command {
            Command::Call { method, params } => Action::Call {
                method,
                params: parse_params(params.as_deref())?,
            },
            Command::ApiVersion => Action::ApiVersion,
            Command::Constants => Action::Constants,
            Command::Download { url, dir, name } => Action::Download {
                url,
                dir,
                name: name.unwrap_or_default(),
            },
            Command::Upload { path, parent } => Action::Upload { path, parent },
            Command::Completion { shell } => {
                clap_complete::generate(shell, &mut Self::command(), "kerio", &mut std::io::stdout());
                return Ok(());
            }
        };

        print_value(&self.connection.run(action)?)
    }
}

/// Parses optional JSON params; absent means `null`.
fn parse_params(raw: Option<&str>) -> Result<Value> {
    match raw {
        None => Ok(Value::Null),
        Some(s) => serde_json::from_str(s)
            .map_err(|e| anyhow::anyhow!("params are not valid JSON: {e}")),
    }
}

/// Prints strings bare and everything else as pretty JSON.
fn print_value(value: &Value) -> Result<()> {
    match value {
        Value::Null => {}
        Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(other)?),
    }
    Ok(())
}
