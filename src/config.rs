//! Server configuration from command-line flags and environment variables.
//!
//! Flags win over environment variables, which win over defaults.

use std::time::Duration;
use thiserror::Error;

use crate::store::StoreConfig;
use crate::{DEFAULT_EVICTION_GRACE_SECS, DEFAULT_HOST, DEFAULT_PORT};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} requires a value")]
    MissingValue(&'static str),

    #[error("invalid value for {flag}: '{value}'")]
    InvalidValue { flag: &'static str, value: String },

    #[error("invalid store: {0}")]
    InvalidStore(String),

    #[error("unknown argument: {0}")]
    UnknownArgument(String),
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve(Config),
    Help,
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub store: StoreConfig,
    /// Overrides the `Host`/`X-Forwarded-Proto` derived link base.
    pub public_url: Option<String>,
    /// Extra store lifetime for TTL'd pastes. `None` disables eviction.
    pub eviction_grace: Option<Duration>,
    /// Honour the `x-test-now-ms` header.
    pub test_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            store: StoreConfig::Memory,
            public_url: None,
            eviction_grace: Some(Duration::from_secs(DEFAULT_EVICTION_GRACE_SECS)),
            test_mode: false,
        }
    }
}

impl Config {
    /// Reads the process arguments and environment.
    pub fn load() -> Result<Command, ConfigError> {
        Self::parse(std::env::args().skip(1), |key| std::env::var(key).ok())
    }

    /// Parses `args` (without the program name), consulting `env` for
    /// anything not given on the command line.
    pub fn parse<I, E>(args: I, env: E) -> Result<Command, ConfigError>
    where
        I: IntoIterator<Item = String>,
        E: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(host) = env("FLASHPASTE_HOST") {
            config.host = host;
        }
        if let Some(port) = env("FLASHPASTE_PORT") {
            config.port = parse_value("FLASHPASTE_PORT", &port)?;
        }
        if let Some(store) = env("FLASHPASTE_STORE") {
            config.store = store.parse().map_err(ConfigError::InvalidStore)?;
        }
        if let Some(url) = env("FLASHPASTE_PUBLIC_URL") {
            config.public_url = Some(url).filter(|u| !u.is_empty());
        }
        if let Some(grace) = env("FLASHPASTE_EVICTION_GRACE_SECS") {
            config.eviction_grace = parse_grace("FLASHPASTE_EVICTION_GRACE_SECS", &grace)?;
        }
        config.test_mode = env("TEST_MODE").is_some_and(|v| v == "1");

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--host" | "-h" => {
                    config.host = args.next().ok_or(ConfigError::MissingValue("--host"))?;
                }
                "--port" | "-p" => {
                    let value = args.next().ok_or(ConfigError::MissingValue("--port"))?;
                    config.port = parse_value("--port", &value)?;
                }
                "--store" | "-s" => {
                    let value = args.next().ok_or(ConfigError::MissingValue("--store"))?;
                    config.store = value.parse().map_err(ConfigError::InvalidStore)?;
                }
                "--public-url" => {
                    let value = args
                        .next()
                        .ok_or(ConfigError::MissingValue("--public-url"))?;
                    config.public_url = Some(value);
                }
                "--eviction-grace" => {
                    let value = args
                        .next()
                        .ok_or(ConfigError::MissingValue("--eviction-grace"))?;
                    config.eviction_grace = parse_grace("--eviction-grace", &value)?;
                }
                "--test-mode" => config.test_mode = true,
                "--help" => return Ok(Command::Help),
                "--version" | "-v" => return Ok(Command::Version),
                _ => return Err(ConfigError::UnknownArgument(arg)),
            }
        }

        Ok(Command::Serve(config))
    }

    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(flag: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        flag,
        value: value.to_string(),
    })
}

/// `0` turns store-level eviction off.
fn parse_grace(flag: &'static str, value: &str) -> Result<Option<Duration>, ConfigError> {
    let secs: u64 = parse_value(flag, value)?;
    Ok((secs > 0).then(|| Duration::from_secs(secs)))
}

pub fn help_text() -> String {
    format!(
        r#"
flashpaste - share text behind expiring, view-limited links

USAGE:
    flashpaste [OPTIONS]

OPTIONS:
    -h, --host <HOST>             Host to bind to (default: {host})
    -p, --port <PORT>             Port to listen on (default: {port})
    -s, --store <STORE>           memory | redis://[:pass@]host[:port][/db] | none
                                  (default: memory)
        --public-url <URL>        Base for returned links instead of the Host header
        --eviction-grace <SECS>   Keep expired pastes in the store this long
                                  (default: {grace}, 0 = never evict)
        --test-mode               Honour the x-test-now-ms request header
    -v, --version                 Print version information
        --help                    Print this help message

ENVIRONMENT:
    FLASHPASTE_HOST, FLASHPASTE_PORT, FLASHPASTE_STORE, FLASHPASTE_PUBLIC_URL,
    FLASHPASTE_EVICTION_GRACE_SECS, TEST_MODE=1, RUST_LOG

EXAMPLES:
    flashpaste                                 # In-memory store on {host}:{port}
    flashpaste --store redis://127.0.0.1:6379  # Keep pastes in Redis
    curl -X POST localhost:{port}/api/pastes -d '{{"content":"hi","max_views":1}}'
"#,
        host = DEFAULT_HOST,
        port = DEFAULT_PORT,
        grace = DEFAULT_EVICTION_GRACE_SECS,
    )
}
