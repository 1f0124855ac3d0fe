//! Connection URI builder for the supported database kinds

use crate::error::{EditorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    Sqlite,
    MySql,
    PostgreSql,
}

impl DatabaseKind {
    pub fn scheme(&self) -> &'static str {
        match self {
            DatabaseKind::Sqlite => "sqlite",
            DatabaseKind::MySql => "mysql",
            DatabaseKind::PostgreSql => "postgresql",
        }
    }

    pub fn default_driver(&self) -> Option<&'static str> {
        match self {
            DatabaseKind::Sqlite => None,
            DatabaseKind::MySql => Some("pymysql"),
            DatabaseKind::PostgreSql => Some("psycopg2"),
        }
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme())
    }
}

impl FromStr for DatabaseKind {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DatabaseKind::Sqlite),
            "mysql" => Ok(DatabaseKind::MySql),
            "postgresql" | "postgres" | "pg" => Ok(DatabaseKind::PostgreSql),
            other => Err(EditorError::InvalidUri(format!("unknown database kind '{}'", other))),
        }
    }
}

/// Network location of a server database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Netloc {
    pub username: String,
    pub password: String,
    pub host: String,
    pub port: Option<u16>,
}

impl Netloc {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            host: "localhost".to_string(),
            port: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

impl fmt::Display for Netloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}@{}", self.username, self.password, self.host)?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}

/// URI scheme for a database kind, `kind+driver` when a driver applies.
pub fn protocol(kind: DatabaseKind, driver: Option<&str>) -> Result<String> {
    if kind == DatabaseKind::Sqlite && driver.is_some() {
        return Err(EditorError::InvalidUri(
            "sqlite does not support any drivers".to_string(),
        ));
    }

    match driver.or(kind.default_driver()) {
        Some(driver) => Ok(format!("{}+{}", kind.scheme(), driver)),
        None => Ok(kind.scheme().to_string()),
    }
}

pub fn build_uri(
    kind: DatabaseKind,
    path: &str,
    netloc: Option<&Netloc>,
    driver: Option<&str>,
) -> Result<String> {
    if kind == DatabaseKind::Sqlite && netloc.is_some() {
        return Err(EditorError::InvalidUri(
            "sqlite does not support remote databases".to_string(),
        ));
    }

    let proto = protocol(kind, driver)?;
    Ok(match netloc {
        Some(netloc) => format!("{}://{}/{}", proto, netloc, path),
        None => format!("{}:///{}", proto, path),
    })
}
