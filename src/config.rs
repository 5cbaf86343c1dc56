use std::{env, net::IpAddr, net::SocketAddr, path::PathBuf, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

pub struct Config {
    pub address: SocketAddr,
    pub db_path: PathBuf,
    pub upload_dir: PathBuf,
    pub log_level: log::LevelFilter,
    pub session_ttl: chrono::Duration,
}

impl Config {
    /// Reads `BIND_ADDRESS`, `PORT`, `DB_PATH`, `UPLOAD_DIR`, `LOG_LEVEL` and
    /// `SESSION_TTL_DAYS`, falling back to defaults for unset variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let ip: IpAddr = parse(&lookup, "BIND_ADDRESS", IpAddr::from([127, 0, 0, 1]))?;
        let port: u16 = parse(&lookup, "PORT", 5000)?;
        let ttl_days: u16 = parse(&lookup, "SESSION_TTL_DAYS", db::DEFAULT_SESSION_TTL_DAYS as u16)?;

        Ok(Self {
            address: SocketAddr::new(ip, port),
            db_path: lookup("DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("db.json")),
            upload_dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            log_level: parse(&lookup, "LOG_LEVEL", log::LevelFilter::Info)?,
            session_ttl: chrono::Duration::days(i64::from(ttl_days)),
        })
    }
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
