use std::env;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/casework.db";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Self {
        let raw = env::var("DATABASE_URL_OVERRIDE")
            .or_else(|_| env::var("DATABASE_URL"))
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());

        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            database_url: clean_connection_string(&raw),
            port,
        }
    }
}

/// Strips a `psql '<url>'` wrapper that is easy to paste by accident from a
/// provider console.
pub fn clean_connection_string(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("psql")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('\''))
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(trimmed)
        .to_string()
}
