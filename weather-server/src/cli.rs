use clap::{Parser, Subcommand};
use weather_core::{
    Config,
    config::{DEFAULT_HISTORY_PORT, DEFAULT_INGEST_PORT},
    provider::provider_from_config,
    telemetry::init_tracing,
};

use crate::server;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather ingestion and history services")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the ingestion API: fetch current weather and publish it.
    Ingest {
        /// Listen port; overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run the history API together with the event consumer.
    History {
        /// Listen port; overrides PORT.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Fetch current weather for a city and print it, without publishing.
    Show {
        /// City name, passed to the provider as-is.
        city: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let config = Config::load()?;
        init_tracing(config.production);

        match self.command {
            Command::Ingest { port } => {
                let port = port.unwrap_or_else(|| config.port_or(DEFAULT_INGEST_PORT));
                server::run_ingest(&config, port).await
            }
            Command::History { port } => {
                let port = port.unwrap_or_else(|| config.port_or(DEFAULT_HISTORY_PORT));
                server::run_history(&config, port).await
            }
            Command::Show { city } => {
                let provider = provider_from_config(&config)?;
                let reading = provider.current(&city).await?;
                println!(
                    "{}: {:.1}°C, {}",
                    reading.city,
                    reading.temperature,
                    if reading.condition.is_empty() { "-" } else { reading.condition.as_str() }
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_service_subcommands() {
        let cli = Cli::try_parse_from(["weather", "history", "--port", "9001"]).unwrap();
        assert!(matches!(cli.command, Command::History { port: Some(9001) }));

        let cli = Cli::try_parse_from(["weather", "ingest"]).unwrap();
        assert!(matches!(cli.command, Command::Ingest { port: None }));
    }

    #[test]
    fn show_requires_a_city() {
        assert!(Cli::try_parse_from(["weather", "show"]).is_err());

        let cli = Cli::try_parse_from(["weather", "show", "Istanbul"]).unwrap();
        assert!(matches!(cli.command, Command::Show { city } if city == "Istanbul"));
    }
}
