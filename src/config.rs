//! Runtime configuration read from the environment
//!
//! `main` loads a `.env` file first (if any), so every variable below can live
//! there as well.
//!
//! - `PORT` - Server port number (default: 8080)
//! - `DATABASE_URL` - Path to the redb file (default: "data.db")
//! - `PUBLIC_URL` - Base used when composing short links (default: "http://localhost:{PORT}")
//! - `AUTHORIZATION` - Shared secret required on `/api` routes (unset or empty disables it)
//! - `PAGE_SIZE` - Default page limit for list endpoints (default: 6)

use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

/// Upper bound for any `limit` query parameter
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub public_url: String,
    pub api_key: Option<String>,
    pub page_size: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let port: u16 = try_load("PORT", 8080);
        let public_url = env::var("PUBLIC_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        Self {
            port,
            database_path: env::var("DATABASE_URL").unwrap_or_else(|_| "data.db".to_string()),
            public_url,
            api_key: env::var("AUTHORIZATION").ok().filter(|key| !key.is_empty()),
            page_size: try_load::<usize>("PAGE_SIZE", 6).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Resolves `page`/`limit` query values into `(page, limit, offset)`.
    ///
    /// The offset saturates, so an absurd page number is just an empty page.
    pub fn paginate(&self, page: Option<usize>, limit: Option<usize>) -> (usize, usize, usize) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(self.page_size).clamp(1, MAX_PAGE_SIZE);
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            database_path: "data.db".to_string(),
            public_url: "http://localhost:8080".to_string(),
            api_key: None,
            page_size: 6,
        }
    }
}

fn try_load<T>(key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Invalid {key} value '{raw}': {e}, using default {default}");
            default
        }),
        Err(_) => {
            info!("{key} not set, using default: {default}");
            default
        }
    }
}
