//! Jarvis - credit-metered assistant chat
//!
//! A conversation engine with a single-flight request guard, the in-memory
//! backend it talks to, and a terminal client.

mod api;
mod config;
mod console;
mod persona;
mod runtime;
mod session;
mod state_machine;
mod transcript;
mod transport;

use api::{create_router, AppState};
use clap::{Parser, Subcommand};
use config::{ClientConfig, ServerConfig};
use console::ChatOptions;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jarvis")]
#[command(about = "Jarvis assistant: backend server and terminal chat", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the in-memory backend over HTTP
    Serve {
        /// Listen port (overrides JARVIS_PORT / PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Chat with Jarvis from the terminal
    Chat {
        /// Backend base URL (overrides JARVIS_API_BASE)
        #[arg(long)]
        api_base: Option<String>,
        /// Use an in-process backend instead of HTTP
        #[arg(long)]
        offline: bool,
        #[arg(long, default_value = "user@example.com")]
        email: String,
        #[arg(long, default_value = "Demo User")]
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port } => {
            init_server_logging();
            let mut config = ServerConfig::from_env();
            if let Some(port) = port {
                config.port = port;
            }
            serve(config).await
        }
        Commands::Chat {
            api_base,
            offline,
            email,
            name,
        } => {
            init_client_logging();
            let mut config = ClientConfig::from_env();
            if let Some(api_base) = api_base {
                config.api_base = api_base;
            }
            console::run(
                config,
                ChatOptions {
                    offline,
                    email,
                    name,
                },
            )
            .await
        }
    }
}

fn init_server_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jarvis=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();
}

/// Stdout belongs to the conversation, so logs go to stderr
fn init_client_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jarvis=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn serve(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Jarvis backend listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
