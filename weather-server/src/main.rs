//! Binary crate for the `weather` services.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and picking the service to run
//! - HTTP routing and error mapping
//! - Wiring shared connections into the core components

use clap::Parser;

mod cli;
mod http;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    cmd.run().await
}
