mod config;
mod serve;

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::GatewayConfig;
use crate::serve::AppState;

/// OAuth gateway that reads files stored in CAD documents.
#[derive(Parser)]
#[command(name = "camel-gateway", version, about = "camel gateway HTTP server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
        /// Path to TLS certificate PEM file (requires --tls-key)
        #[arg(long)]
        tls_cert: Option<PathBuf>,
        /// Path to TLS private key PEM file (requires --tls-cert)
        #[arg(long)]
        tls_key: Option<PathBuf>,
    },

    /// Validate the environment configuration and exit
    CheckConfig,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match GatewayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    match cli.command {
        Commands::CheckConfig => {
            println!("configuration ok: {config:#?}");
        }
        Commands::Serve {
            port,
            tls_cert,
            tls_key,
        } => {
            // Validate TLS flags: both must be provided or neither
            if tls_cert.is_some() != tls_key.is_some() {
                eprintln!("error: --tls-cert and --tls-key must both be provided");
                process::exit(1);
            }
            // The session cookie is Secure, so plain HTTP would loop on sign-in.
            if cfg!(not(feature = "tls")) && tls_cert.is_some() {
                eprintln!("error: --tls-cert requires a build with the `tls` feature");
                process::exit(1);
            }
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {e}");
                    process::exit(1);
                }
            };
            let result = rt.block_on(async {
                let state = Arc::new(AppState::from_config(&config));
                serve::start_server(port, state, tls_cert, tls_key).await
            });
            if let Err(e) = result {
                tracing::error!(error = %e, "server error");
                process::exit(1);
            }
        }
    }
}
