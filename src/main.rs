use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use travel_assistant::agent::{ReplyKind, TravelAssistant};
use travel_assistant::config::Config;
use travel_assistant::core::InMemorySessionStore;
use travel_assistant::llm::OllamaProvider;
use travel_assistant::services::{OpenWeatherClient, WeatherProvider};
use travel_assistant::transport;

#[derive(Parser)]
#[command(name = "travel-assistant")]
#[command(author, version, about = "Travel assistant chat service backed by a local Ollama model", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (default: platform config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat API
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides config and HOST)
        #[arg(long)]
        host: Option<String>,
    },

    /// Ask a single question and print the reply
    Ask {
        /// The question to ask
        message: String,

        /// Model to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,

        /// Send the message straight to the completion endpoint, bypassing the assistant
        #[arg(long)]
        raw: bool,
    },

    /// Print the current weather summary for a city
    Weather {
        /// City name
        city: String,
    },

    /// List models installed on the Ollama server
    Models,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "travel_assistant=debug,tower_http=debug"
    } else {
        "travel_assistant=info,tower_http=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(host) = host {
                config.server.host = host;
            }
            transport::run_http_server(config).await?;
        }
        Commands::Ask {
            message,
            model,
            raw,
        } => {
            let mut ollama = OllamaProvider::new(&config.llm);
            if let Some(model) = model.as_deref() {
                ollama = ollama.with_model(model);
            }
            if raw {
                let reply = ollama
                    .generate(&message)
                    .await
                    .context("Failed to get a completion")?;
                println!("{}", reply.trim());
                return Ok(());
            }

            let llm = Arc::new(ollama);
            let weather = Arc::new(OpenWeatherClient::new(&config.weather));
            let sessions = Arc::new(InMemorySessionStore::new());
            let assistant = TravelAssistant::from_config(&config, llm, weather, sessions);

            let outcome = assistant
                .chat(None, &message)
                .await
                .context("Failed to get a reply")?;
            if outcome.kind != ReplyKind::Model {
                tracing::debug!("Answered with canned {:?} reply", outcome.kind);
            }
            println!("{}", outcome.reply);
        }
        Commands::Weather { city } => {
            let client = OpenWeatherClient::new(&config.weather);
            println!("{}", client.fetch_weather(&city).await);
        }
        Commands::Models => {
            let ollama = OllamaProvider::new(&config.llm);
            let models = ollama
                .list_models()
                .await
                .with_context(|| format!("Failed to reach Ollama at {}", ollama.base_url()))?;
            if models.is_empty() {
                println!("No models installed");
            }
            for model in models {
                println!("{}", model.name);
            }
        }
    }

    Ok(())
}
