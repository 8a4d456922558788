use crate::error::{
    BadEnvVarSnafu, InvalidDatabaseUrlSnafu, ParseMaxConnectionsSnafu, StudentsResult,
};
use dotenvy::var;
use snafu::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{env::VarError, str::FromStr, sync::Arc, time::Duration};

const DEFAULT_DB_URL: &str = "sqlite::memory:";
const DEFAULT_SERVER_IP: &str = "127.0.0.1:8080";

/// Reads an env var, treating "not set" as `None` and anything else unreadable as an error.
fn optional_env_var(name: &'static str) -> StudentsResult<Option<String>> {
    match var(name) {
        Ok(value) => Ok(Some(value)),
        Err(dotenvy::Error::EnvVar(VarError::NotPresent)) => Ok(None),
        Err(e) => Err(e).context(BadEnvVarSnafu { name }),
    }
}

#[derive(Clone, Debug)]
pub struct RuntimeConfiguration {
    db_config: Arc<DbConfig>,
    server_ip: String,
}

impl RuntimeConfiguration {
    pub fn new() -> StudentsResult<Self> {
        Ok(Self {
            db_config: Arc::new(DbConfig::new()?),
            server_ip: optional_env_var("STUDENTS_SERVER_IP")?
                .unwrap_or_else(|| DEFAULT_SERVER_IP.to_string()),
        })
    }

    pub fn db_config(&self) -> Arc<DbConfig> {
        self.db_config.clone()
    }

    pub fn server_ip(&self) -> &str {
        &self.server_ip
    }
}

#[derive(Debug)]
pub struct DbConfig {
    url: String,
    max_connections: u32,
}

impl DbConfig {
    pub fn new() -> StudentsResult<Self> {
        let url =
            optional_env_var("STUDENTS_DB_URL")?.unwrap_or_else(|| DEFAULT_DB_URL.to_string());
        let max_connections = match optional_env_var("STUDENTS_DB_MAX_CONNECTIONS")? {
            Some(original) => original
                .parse()
                .context(ParseMaxConnectionsSnafu { original })?,
            None => 1,
        };

        Ok(Self {
            url,
            max_connections,
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self {
            url: DEFAULT_DB_URL.to_string(),
            max_connections: 1,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    pub fn connect_options(&self) -> StudentsResult<SqliteConnectOptions> {
        Ok(SqliteConnectOptions::from_str(&self.url)
            .context(InvalidDatabaseUrlSnafu {
                url: self.url.clone(),
            })?
            .create_if_missing(true))
    }

    /// Every connection to an in-memory database sees its own empty database, so those pools
    /// hold exactly one connection that is never closed.
    pub fn pool_options(&self) -> SqlitePoolOptions {
        if self.is_in_memory() {
            SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            SqlitePoolOptions::new().max_connections(self.max_connections.max(1))
        }
    }
}
