//! Entry point for `calc-udp`.
//!
//! Parses CLI arguments and dispatches into either **server** or **client**
//! mode.  All actual protocol work is delegated to library modules;
//! `main.rs` owns only process setup (logging, argument parsing).

use clap::{Parser, Subcommand};

/// Arithmetic-assignment request/response protocol over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Run the assignment server.
    Server {
        /// Local address to bind (host:port or [host]:port).
        addr: String,
    },
    /// Run one client transaction against a server.
    Client {
        /// Server address (host:port or [host]:port).
        addr: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Server { addr } => {
            log::info!("starting server on {addr}");
            calc_udp::server::run(&addr).await?;
        }
        Mode::Client { addr } => {
            log::info!("starting client against {addr}");
            calc_udp::client::run(&addr).await?;
        }
    }

    Ok(())
}
