use std::env;

/// Database configuration.
///
/// Reads from the `POTLUCK_DATABASE_URL` environment variable, falling back
/// to `postgresql://localhost:5432/potluck` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl DbConfig {
    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/potluck";

    /// Environment variable holding the connection URL.
    pub const URL_ENV: &str = "POTLUCK_DATABASE_URL";

    const DEFAULT_MAX_CONNECTIONS: u32 = 5;

    /// Build a config from the environment.
    ///
    /// Priority: `POTLUCK_DATABASE_URL` env var, then the compile-time default.
    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::URL_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self::new(database_url)
    }

    /// Build a config from an explicit URL (useful for tests and CLI flags).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Override the pool size.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Split the URL into `(prefix up to the last '/', db name, query suffix)`.
    fn split(&self) -> Option<(&str, &str, &str)> {
        let (base, query) = match self.database_url.find('?') {
            Some(q) => self.database_url.split_at(q),
            None => (self.database_url.as_str(), ""),
        };
        let slash = base.rfind('/')?;
        // Reject bare scheme URLs such as `postgresql://host`.
        if base[..slash].ends_with('/') {
            return None;
        }
        Some((&base[..slash], &base[slash + 1..], query))
    }

    /// Extract the database name from the URL.
    ///
    /// Returns `None` if the URL has no path component. Query parameters
    /// are not part of the name.
    pub fn database_name(&self) -> Option<&str> {
        self.split()
            .map(|(_, name, _)| name)
            .filter(|name| !name.is_empty())
    }

    /// Return a URL pointing at the `postgres` maintenance database on the
    /// same host, keeping any query parameters. Used to issue
    /// `CREATE DATABASE` when the target DB does not yet exist.
    pub fn maintenance_url(&self) -> String {
        match self.split() {
            Some((prefix, _, query)) => format!("{prefix}/postgres{query}"),
            None => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
