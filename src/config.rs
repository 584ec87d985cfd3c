use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Parcel pricing and storage block service")]
pub struct Args {
    /// Host to bind to (overrides PARCELPOINT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PARCELPOINT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides PARCELPOINT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Pool size (overrides PARCELPOINT_MAX_CONNECTIONS)
    #[arg(long)]
    pub max_connections: Option<u32>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

fn parsed_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge explicit CLI values over the environment, then defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        let env_host = env::var("PARCELPOINT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parsed_env("PARCELPOINT_PORT", 3000u16)?;
        let env_db = env::var("PARCELPOINT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/parcelpoint.db".into());
        let env_max_connections = parsed_env("PARCELPOINT_MAX_CONNECTIONS", 5u32)?;

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            max_connections: args.max_connections.unwrap_or(env_max_connections),
        };
        anyhow::ensure!(cfg.max_connections > 0, "max_connections must be at least 1");

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_values_win() {
        let args = Args::try_parse_from([
            "parcelpoint",
            "--host",
            "127.0.0.1",
            "--port",
            "8080",
            "--database-url",
            "sqlite::memory:",
            "--max-connections",
            "2",
            "--migrate",
        ])
        .unwrap();
        assert!(args.migrate);

        let cfg = AppConfig::from_args(args).unwrap();
        assert_eq!(cfg.addr(), "127.0.0.1:8080");
        assert_eq!(cfg.database_url, "sqlite::memory:");
        assert_eq!(cfg.max_connections, 2);
    }

    #[test]
    fn zero_connections_is_rejected() {
        let args = Args {
            host: Some("localhost".into()),
            port: Some(1),
            database_url: Some("sqlite::memory:".into()),
            max_connections: Some(0),
            migrate: false,
        };
        assert!(AppConfig::from_args(args).is_err());
    }

    #[test]
    fn bad_port_flag_fails_to_parse() {
        assert!(Args::try_parse_from(["parcelpoint", "--port", "http"]).is_err());
    }
}
