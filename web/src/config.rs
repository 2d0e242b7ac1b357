//! Server configuration from the environment.

use anyhow::Context;

/// Runtime configuration for the server binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Maximum connections in the database pool.
    pub max_db_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// `DATABASE_URL` is required. `HOST` defaults to `0.0.0.0`, `PORT`
    /// to `3000` and `MAX_DB_CONNECTIONS` to `10`.
    ///
    /// # Errors
    ///
    /// Returns an error when `DATABASE_URL` is unset or a numeric
    /// variable fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("PORT must be a number")?;
        let max_db_connections = std::env::var("MAX_DB_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .context("MAX_DB_CONNECTIONS must be a number")?;
        Ok(Self {
            database_url,
            host,
            port,
            max_db_connections,
        })
    }

    /// The socket address string to bind.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
