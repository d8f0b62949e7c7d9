use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STORE_PATH: &str = ".store";
pub const DEFAULT_MAX_BODY_BYTES: usize = 512 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store_path: String,
    pub public_url: Option<String>,
    pub max_body_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Local emulator of the Vercel Blob API")]
pub struct Args {
    /// Host to bind to (overrides BLOB_EMULATOR_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where blobs are stored (overrides VERCEL_STORE_PATH)
    #[arg(long)]
    pub store_path: Option<String>,

    /// Public base URL used in blob URLs (overrides BLOB_EMULATOR_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Largest accepted request body in bytes (overrides BLOB_EMULATOR_MAX_BODY_BYTES)
    #[arg(long)]
    pub max_body_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name))
    }

    /// Merge CLI args over values looked up through `lookup`, over defaults.
    fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("BLOB_EMULATOR_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT);
        let env_store = lookup("VERCEL_STORE_PATH").unwrap_or_else(|_| DEFAULT_STORE_PATH.into());
        let env_public_url = lookup("BLOB_EMULATOR_PUBLIC_URL")
            .ok()
            .filter(|url| !url.is_empty());
        let env_max_body = parse_var(&lookup, "BLOB_EMULATOR_MAX_BODY_BYTES")?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            store_path: args.store_path.unwrap_or(env_store),
            public_url: args.public_url.or(env_public_url),
            max_body_bytes: args.max_body_bytes.unwrap_or(env_max_body),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Origin for blob URLs when a request carries no `Host` header.
    pub fn fallback_origin(&self) -> String {
        format!("http://localhost:{}", self.port)
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
