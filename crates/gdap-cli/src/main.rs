//! gdap - debug adapter bridge binary
//!
//! Started by the IDE with stdio wired to the frontend: requests come
//! in Content-Length framed on stdin, responses and events go out on
//! stdout. Logs therefore go to stderr, or to a file with --log-file.

mod wire;

use anyhow::Result;
use clap::Parser;
use gdap::{FrontendChannel, SessionController};
use gdap_logging::{error, info, LogConfig, WorkerGuard};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

#[derive(Parser, Debug)]
#[command(name = "gdap", version, about = "Debug adapter bridge for the Gideros player")]
struct Cli {
    /// Enable debug-level logging
    #[arg(long)]
    debug: bool,

    /// Write logs to a file instead of stderr
    #[arg(long, env = "GDAP_LOG_FILE")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(&cli)?;
    info!("gdap starting (pid {})", std::process::id());

    let frontend = Arc::new(FrontendChannel::new(tokio::io::stdout()));
    let session = SessionController::new(frontend.clone());

    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stop = frontend.stop_signal();
    loop {
        tokio::select! {
            request = wire::read_request(&mut reader) => match request {
                Ok(Some(request)) => {
                    if let Err(e) = session.handle(request).await {
                        // The 1104 response is already on the wire
                        error!("Fatal error, terminating: {}", e);
                        session.shutdown();
                        std::process::exit(1);
                    }
                }
                Ok(None) => {
                    info!("Frontend closed the stream, shutting down");
                    break;
                }
                Err(e) => {
                    // Framing is broken, no request to answer
                    error!("Unreadable frontend message, terminating: {:#}", e);
                    session.shutdown();
                    std::process::exit(1);
                }
            },
            _ = stop.wait_for(|stopped| *stopped) => {
                info!("Session disconnected, exiting");
                break;
            }
        }
    }

    session.shutdown();
    Ok(())
}

fn init_logging(cli: &Cli) -> Result<Option<WorkerGuard>> {
    let config = LogConfig::new().debug(cli.debug);
    match &cli.log_file {
        Some(path) => {
            let guard = gdap_logging::init_with_file(config, path)?;
            Ok(Some(guard))
        }
        None => {
            gdap_logging::init(config);
            Ok(None)
        }
    }
}
