use std::env;
use std::time::Duration;

/// Database connection and pool settings.
///
/// The URL comes from `MEALGEN_DATABASE_URL`, falling back to
/// `postgresql://localhost:5432/mealgen`. The pool size comes from
/// `MEALGEN_DB_MAX_CONNECTIONS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
    /// Concurrent runs share the pool for cache reads, background cache
    /// writes and audit inserts.
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DbConfig {
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/mealgen";
    pub const ENV_VAR: &str = "MEALGEN_DATABASE_URL";

    pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
    pub const MAX_CONNECTIONS_ENV: &str = "MEALGEN_DB_MAX_CONNECTIONS";

    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. An unusable pool size falls
    /// back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup(Self::ENV_VAR)
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_URL.to_owned());
        let max_connections = lookup(Self::MAX_CONNECTIONS_ENV)
            .and_then(|raw| parse_max_connections(&raw))
            .unwrap_or(Self::DEFAULT_MAX_CONNECTIONS);
        Self::new(url).with_max_connections(max_connections)
    }

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: Self::DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// At least one connection is always allowed.
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }

    /// The database name in the URL path, if any.
    pub fn database_name(&self) -> Option<&str> {
        self.database_url
            .rsplit('/')
            .next()
            .map(|s| s.split('?').next().unwrap_or(s))
            .filter(|s| !s.is_empty() && !s.contains(':') && !s.contains('@'))
    }

    /// Same server, `postgres` database. `db-init` connects here to create
    /// the target database.
    pub fn maintenance_url(&self) -> String {
        match self.database_url.rfind('/') {
            Some(pos) => format!("{}/postgres", &self.database_url[..pos]),
            None => self.database_url.clone(),
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// A positive connection count, or `None`.
pub fn parse_max_connections(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}
