//! Vellum command line client.

mod cli;
mod wiring;

use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use vellum_domain::{GatewayRequest, GatewayResponse};
use vellum_infrastructure::load_settings;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr; stdout carries response bodies.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    tracing::debug!(base_url = %settings.base_url, context = %cli.context, "settings loaded");

    let store = wiring::token_store(&settings, cli.context, cli.seed_pair()).await?;
    let gateway = wiring::build_gateway(&settings, store)?;

    match cli.command {
        Command::Get {
            path,
            query,
            public,
        } => {
            let mut request = GatewayRequest::get(path);
            request.query = query;
            if public {
                request = request.public();
            }
            print_response(&gateway.execute(request).await?);
        }
        Command::Post { path, json, public } => {
            let body: serde_json::Value = serde_json::from_str(&json)?;
            let mut request = GatewayRequest::post(path).with_json(&body)?;
            if public {
                request = request.public();
            }
            print_response(&gateway.execute(request).await?);
        }
        Command::Token => match gateway.ensure_valid_access_token().await {
            Some(token) => println!("{token}"),
            None => return Err("no valid session".into()),
        },
        Command::SignOut => {
            gateway.sign_out().await?;
            tracing::info!("signed out");
        }
    }

    Ok(())
}

fn print_response(response: &GatewayResponse) {
    if !response.status.is_success() {
        tracing::warn!(status = response.status.as_u16(), "request did not succeed");
    }
    eprintln!("{} ({} ms)", response.status, response.duration.as_millis());
    println!("{}", response.text());
}
