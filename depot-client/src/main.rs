//! Depot command-line client

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use depot_client::constants::{DEFAULT_ADDR, DEFAULT_TIMEOUT, ERR_NO_LOCAL_NAME};
use depot_client::listing::format_listing;
use depot_client::DepotClient;

/// Depot file service client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    addr: String,

    /// Seconds allowed for the whole call
    #[arg(short, long, default_value_t = DEFAULT_TIMEOUT.as_secs())]
    timeout: u64,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored files
    List,
    /// Upload a local file
    Upload {
        /// Local file to send
        file: PathBuf,
        /// Name to store it under (defaults to the local file name)
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Download a stored file
    Download {
        /// Stored file name
        name: String,
        /// Local destination (defaults to the stored name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let client = DepotClient::new(args.addr, Duration::from_secs(args.timeout));

    match args.command {
        Command::List => {
            let files = client.list().await?;
            println!("{}", format_listing(&files));
        }
        Command::Upload { file, name } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("{}{}", ERR_NO_LOCAL_NAME, file.display()))?,
            };
            let message = client
                .upload(&file, &name)
                .await
                .with_context(|| format!("upload of {} failed", file.display()))?;
            println!("{message}");
        }
        Command::Download { name, output } => {
            let output = output.unwrap_or_else(|| PathBuf::from(&name));
            let bytes = client
                .download(&name, &output)
                .await
                .with_context(|| format!("download of {name} failed"))?;
            println!("{} ({} bytes)", output.display(), bytes);
        }
    }

    Ok(())
}

/// Log to stderr; `RUST_LOG` overrides the level from `-v`
fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("depot={level},depot_client={level}")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
