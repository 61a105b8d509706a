//! Application configuration loaded from environment variables.

use domain::Address;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `DATABASE_URL` — Postgres connection string; in-memory store when unset
/// - `PUBLIC_BASE_URL` — externally reachable base URL for label links
/// - `WEBHOOK_SECRET` — shared secret for webhook signatures
/// - `PLATFORM_BASE_URL` / `PLATFORM_ACCESS_TOKEN` — upstream platform API
/// - `SHIP_FROM_*` — warehouse origin address for carrier calls
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub public_base_url: String,
    pub webhook_secret: String,
    pub platform_base_url: Option<String>,
    pub platform_access_token: Option<String>,
    pub ship_from: Address,
}

impl Config {
    /// Loads configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            database_url: std::env::var("DATABASE_URL").ok(),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}")),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            platform_base_url: std::env::var("PLATFORM_BASE_URL").ok(),
            platform_access_token: std::env::var("PLATFORM_ACCESS_TOKEN").ok(),
            ship_from: Address {
                name: env_or("SHIP_FROM_NAME", "Warehouse"),
                line1: env_or("SHIP_FROM_LINE1", ""),
                line2: std::env::var("SHIP_FROM_LINE2").ok(),
                city: env_or("SHIP_FROM_CITY", ""),
                region: env_or("SHIP_FROM_REGION", ""),
                postal_code: env_or("SHIP_FROM_POSTAL_CODE", ""),
                country: env_or("SHIP_FROM_COUNTRY", "US"),
            },
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_url: None,
            public_base_url: "http://localhost:8080".to_string(),
            webhook_secret: String::new(),
            platform_base_url: None,
            platform_access_token: None,
            ship_from: Address {
                name: "Warehouse".to_string(),
                line1: String::new(),
                line2: None,
                city: String::new(),
                region: String::new(),
                postal_code: String::new(),
                country: "US".to_string(),
            },
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
