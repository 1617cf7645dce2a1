use std::{
    env,
    fmt::{self, Display},
    path::PathBuf,
    str::FromStr,
};

use log::{info, warn};
use rand::RngCore;

pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub secret: Vec<u8>,
    pub token_hours: i64,
    pub media_root: PathBuf,
    pub site_name: String,
    /// Public origin used to build absolute links, without trailing slash.
    pub site_url: String,
    /// TrueType font for exports, relative to `media_root`.
    pub pdf_font: String,
}

#[derive(Debug)]
pub struct ConfigError {
    key: &'static str,
    info: String,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid {} value: {}", self.key, self.info)
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(e) = dotenvy::dotenv() {
            info!("No .env file loaded ({e})");
        }

        Ok(Self {
            port: try_load("FOODGRAM_PORT", "8000")?,
            database_url: require("DATABASE_URL")?,
            database_max_connections: try_load("DATABASE_MAX_CONNECTIONS", "5")?,
            redis_url: try_load("REDIS_URL", "redis://127.0.0.1/")?,
            secret: load_secret("FOODGRAM_SECRET"),
            token_hours: try_load("FOODGRAM_TOKEN_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            site_name: try_load("SITE_NAME", "foodgram")?,
            site_url: try_load::<String>("SITE_URL", "http://localhost:8000")?
                .trim_end_matches('/')
                .to_string(),
            pdf_font: try_load("PDF_FONT", "fonts/DejaVuSerif.ttf")?,
        })
    }

    pub fn media_url(&self, path: &str) -> String {
        format!("{}/media/{}", self.site_url, path.trim_start_matches('/'))
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn require(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or(ConfigError {
        key,
        info: String::from("variable is required"),
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError {
            key,
            info: e.to_string(),
        })
}

fn load_secret(key: &str) -> Vec<u8> {
    match var(key) {
        Some(secret) => secret.into_bytes(),
        None => {
            warn!("{key} not set, generating a random secret; sessions will not survive a restart");
            let mut secret = vec![0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            secret
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_invalid_values() {
        env::remove_var("FOODGRAM_TEST_PORT");
        assert_eq!(try_load::<u16>("FOODGRAM_TEST_PORT", "8000").unwrap(), 8000);

        env::set_var("FOODGRAM_TEST_PORT", "not-a-port");
        let error = try_load::<u16>("FOODGRAM_TEST_PORT", "8000").unwrap_err();
        assert!(error.to_string().contains("FOODGRAM_TEST_PORT"));
        env::remove_var("FOODGRAM_TEST_PORT");
    }

    #[test]
    fn missing_secret_is_random() {
        env::remove_var("FOODGRAM_TEST_SECRET");
        let a = load_secret("FOODGRAM_TEST_SECRET");
        let b = load_secret("FOODGRAM_TEST_SECRET");

        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
