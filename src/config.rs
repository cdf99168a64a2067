use std::{fmt::Display, str::FromStr};

use anyhow::{anyhow, bail};

/// Server settings, read from `.env` and the process environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub max_db_connections: u32,
    /// `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Per-connection outbound queue length.
    pub outbound_buffer: usize,
    /// Drawing events kept per room, `0` keeps everything.
    pub event_retention: u32,
    /// Drawing events waiting to be written before new ones are dropped.
    pub event_queue: usize,
    pub public_rooms_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_owned(),
            database_url: "sqlite://chalkline.db".to_owned(),
            max_db_connections: 16,
            cors_origins: vec!["*".to_owned()],
            outbound_buffer: 256,
            event_retention: 1000,
            event_queue: 1024,
            public_rooms_limit: 50,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();

        let config = Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            database_url: lookup("DATABASE_URL").unwrap_or(defaults.database_url),
            max_db_connections: parse(&lookup, "MAX_DB_CONNECTIONS", defaults.max_db_connections)?,
            cors_origins: match lookup("CORS_ORIGINS") {
                Some(raw) => raw
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(str::to_owned)
                    .collect(),
                None => defaults.cors_origins,
            },
            outbound_buffer: parse(&lookup, "OUTBOUND_BUFFER", defaults.outbound_buffer)?,
            event_retention: parse(&lookup, "EVENT_RETENTION", defaults.event_retention)?,
            event_queue: parse(&lookup, "EVENT_QUEUE", defaults.event_queue)?,
            public_rooms_limit: parse(&lookup, "PUBLIC_ROOMS_LIMIT", defaults.public_rooms_limit)?,
        };

        if config.outbound_buffer == 0 {
            bail!("OUTBOUND_BUFFER must be at least 1");
        }
        if config.event_queue == 0 {
            bail!("EVENT_QUEUE must be at least 1");
        }

        Ok(config)
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}
