//! Command line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vellum_domain::{StorageContext, TokenPair};

/// Send requests to the backend through the authenticated gateway.
#[derive(Parser, Debug)]
#[command(name = "vellum", version, about)]
pub struct Cli {
    /// Settings file (TOML). Missing files are ignored.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Where tokens live: `persistent` (session file) or `request` (this run only).
    #[arg(long, global = true, default_value = "persistent")]
    pub context: StorageContext,

    /// Access token to start from. In the persistent context it is saved.
    #[arg(long, global = true)]
    pub access_token: Option<String>,

    /// Refresh token to start from. In the persistent context it is saved.
    #[arg(long, global = true)]
    pub refresh_token: Option<String>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send a GET request.
    Get {
        /// Path below the base URL, e.g. `/essays`.
        path: String,
        /// Query parameter as `key=value`; repeatable.
        #[arg(long = "query", short = 'q', value_parser = parse_key_value)]
        query: Vec<(String, String)>,
        /// Send without a credential.
        #[arg(long)]
        public: bool,
    },
    /// Send a POST request with a JSON body.
    Post {
        /// Path below the base URL.
        path: String,
        /// JSON body.
        #[arg(long, default_value = "{}")]
        json: String,
        /// Send without a credential.
        #[arg(long)]
        public: bool,
    },
    /// Print a valid access token, refreshing if needed.
    Token,
    /// End the session locally and at the identity service.
    SignOut,
}

impl Cli {
    /// Tokens given on the command line, if any.
    #[must_use]
    pub fn seed_pair(&self) -> Option<TokenPair> {
        let pair = TokenPair::from_parts(self.access_token.clone(), self.refresh_token.clone());
        (!pair.is_empty()).then_some(pair)
    }
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
