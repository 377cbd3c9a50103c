use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;

/// Command line options.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "A tiny discussion board")]
pub struct Cli {
    /// Override bind address (host:port).
    #[arg(long)]
    pub bind: Option<String>,
    /// Override server port.
    #[arg(long)]
    pub port: Option<u16>,
    /// Path to the SQLite database file.
    #[arg(long)]
    pub database: Option<String>,
    /// Secret used to sign session cookies.
    #[arg(long)]
    pub session_key: Option<String>,
    /// Enable or disable logging (true/false).
    #[arg(long)]
    pub logging: Option<bool>,
    /// Path to configuration file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the web server (default).
    Serve,
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbCommand {
    /// Create the tables if they do not exist.
    Init,
    /// Drop all tables.
    Drop,
    /// Drop and recreate all tables.
    Reset,
}

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone)]
pub struct Config {
    /// Address to bind the HTTP server to.
    pub bind: String,
    /// SQLite database path, or `:memory:`.
    pub database: String,
    /// Cookie signing secret. A random one is generated when unset.
    pub session_key: Option<String>,
    /// Lifetime of the session cookie.
    pub session_ttl: Duration,
    /// Whether info level logging is enabled.
    pub logging_enabled: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("database", &self.database)
            .field("session_key", &self.session_key.as_ref().map(|_| "<redacted>"))
            .field("session_ttl", &self.session_ttl)
            .field("logging_enabled", &self.logging_enabled)
            .finish()
    }
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    database: FileDatabase,
    #[serde(default)]
    session: FileSession,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize)]
struct FileServer {
    #[serde(default = "default_port")]
    port: u16,
}

#[derive(Deserialize)]
struct FileDatabase {
    #[serde(default = "default_database")]
    path: String,
}

#[derive(Deserialize)]
struct FileSession {
    #[serde(default)]
    key: Option<String>,
    #[serde(default = "default_ttl_hours")]
    ttl_hours: u64,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_port() -> u16 {
    8000
}

fn default_database() -> String {
    "topical.db".into()
}

fn default_ttl_hours() -> u64 {
    24 * 30
}

fn default_logging() -> bool {
    true
}

impl Default for FileServer {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Default for FileDatabase {
    fn default() -> Self {
        Self {
            path: default_database(),
        }
    }
}

impl Default for FileSession {
    fn default() -> Self {
        Self {
            key: None,
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration from CLI, environment variables, config file and defaults.
    pub fn load(cli: &Cli) -> Result<Self> {
        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("TOPICAL_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/topical.toml"));

        let file_cfg = match fs::read(&config_path) {
            Ok(bytes) => {
                let contents = String::from_utf8_lossy(&bytes);
                toml::from_str::<FileConfig>(&contents).context("invalid config file")?
            }
            Err(_) => FileConfig::default(),
        };
        let mut port = file_cfg.server.port;
        let mut database = file_cfg.database.path;
        let mut session_key = file_cfg.session.key;
        let mut ttl_hours = file_cfg.session.ttl_hours;
        let mut logging = file_cfg.logging.enabled;

        // environment overrides
        if let Ok(p) = std::env::var("PORT") {
            if let Ok(p) = p.parse::<u16>() {
                port = p;
            }
        }
        if let Ok(d) = std::env::var("DATABASE_URL") {
            database = d;
        }
        if let Ok(k) = std::env::var("SESSION_KEY") {
            session_key = Some(k);
        }
        if let Ok(h) = std::env::var("SESSION_TTL_HOURS") {
            if let Ok(h) = h.parse::<u64>() {
                ttl_hours = h;
            }
        }
        if let Ok(l) = std::env::var("TOPICAL_LOGGING") {
            if let Ok(l) = l.parse::<bool>() {
                logging = l;
            }
        }

        // CLI overrides
        if let Some(p) = cli.port {
            port = p;
        }
        if let Some(d) = &cli.database {
            database = d.clone();
        }
        if let Some(k) = &cli.session_key {
            session_key = Some(k.clone());
        }
        if let Some(l) = cli.logging {
            logging = l;
        }

        if !(1024..=65535).contains(&port) {
            anyhow::bail!("invalid_port");
        }
        if session_key.as_deref().is_some_and(str::is_empty) {
            anyhow::bail!("empty_session_key");
        }
        let Some(ttl_secs) = ttl_hours.checked_mul(3600) else {
            anyhow::bail!("invalid_session_ttl");
        };

        // bind address precedence for host override
        let bind = if let Some(b) = &cli.bind {
            b.clone()
        } else if let Ok(b) = std::env::var("BIND") {
            b
        } else {
            format!("127.0.0.1:{}", port)
        };

        Ok(Self {
            bind,
            database,
            session_key,
            session_ttl: Duration::from_secs(ttl_secs),
            logging_enabled: logging,
        })
    }
}
