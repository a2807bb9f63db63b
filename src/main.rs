use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use toolbridge::config::CliOverrides;

/// Expose a running application's tools to MCP clients.
#[derive(Debug, Parser)]
#[command(name = "toolbridge", version, about)]
struct Args {
    /// Target application identifier or full channel name.
    #[arg(long)]
    channel: Option<String>,

    /// Port for the HTTP front-end.
    #[arg(long)]
    port: Option<u16>,

    /// Address for the HTTP front-end.
    #[arg(long)]
    host: Option<String>,

    /// Config file (must exist).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deadline for each proxied call, in milliseconds.
    #[arg(long)]
    call_timeout_ms: Option<u64>,

    /// Deadline for the `list-tools` call, in milliseconds.
    #[arg(long)]
    discovery_timeout_ms: Option<u64>,

    /// Write logs to this file instead of stderr.
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl From<Args> for CliOverrides {
    fn from(args: Args) -> Self {
        Self {
            config: args.config,
            channel: args.channel,
            host: args.host,
            port: args.port,
            call_timeout_ms: args.call_timeout_ms,
            discovery_timeout_ms: args.discovery_timeout_ms,
            log_file: args.log_file,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match toolbridge::run(args.into()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("toolbridge: {e:#}");
            ExitCode::FAILURE
        }
    }
}
