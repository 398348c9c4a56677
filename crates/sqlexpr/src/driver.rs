//! Database drivers, connections and the per-compile rendering context.

use crate::error::{ExprError, ExprResult};
use crate::version::Version;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Identifier of a database backend.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(into = "String")]
pub enum Driver {
    MySql,
    Postgres,
    Sqlite,
    SqlServer,
    Other(String),
}

impl Driver {
    /// Canonical driver name (`mysql`, `pgsql`, `sqlite`, `sqlsrv`).
    pub fn name(&self) -> &str {
        match self {
            Driver::MySql => "mysql",
            Driver::Postgres => "pgsql",
            Driver::Sqlite => "sqlite",
            Driver::SqlServer => "sqlsrv",
            Driver::Other(name) => name,
        }
    }

    /// Check if the driver has a built-in dialect.
    pub fn is_known(&self) -> bool {
        !matches!(self, Driver::Other(_))
    }

    /// All drivers with a built-in dialect.
    pub fn known() -> [Driver; 4] {
        [Driver::MySql, Driver::Postgres, Driver::Sqlite, Driver::SqlServer]
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Driver> for String {
    fn from(d: Driver) -> Self {
        d.name().to_string()
    }
}

impl FromStr for Driver {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Driver::from(s))
    }
}

impl From<&str> for Driver {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Driver::MySql,
            "pgsql" | "postgres" | "postgresql" => Driver::Postgres,
            "sqlite" | "sqlite3" => Driver::Sqlite,
            "sqlsrv" | "sqlserver" | "mssql" => Driver::SqlServer,
            other => Driver::Other(other.to_string()),
        }
    }
}

impl From<&Driver> for Driver {
    fn from(d: &Driver) -> Self {
        d.clone()
    }
}

/// The connection collaborator consumed by the compiler.
///
/// Only the driver and (optionally) the server version are needed to pick the
/// right grammar fragment and dialect.
pub trait Connection: Send + Sync {
    /// Driver of the connection.
    fn driver(&self) -> Driver;

    /// Server version reported by the database, if known.
    fn server_version(&self) -> Option<Version> {
        None
    }

    /// Rendering context for a compile against this connection.
    fn render_context(&self) -> RenderContext {
        RenderContext {
            driver: Some(self.driver()),
            version: self.server_version(),
        }
    }
}

impl<C: Connection + ?Sized> Connection for &C {
    fn driver(&self) -> Driver {
        (**self).driver()
    }

    fn server_version(&self) -> Option<Version> {
        (**self).server_version()
    }
}

/// A connection description that never talks to a server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StaticConnection {
    driver: Driver,
    version: Option<Version>,
}

impl StaticConnection {
    /// Create a connection description for a driver.
    pub fn new(driver: impl Into<Driver>) -> Self {
        Self {
            driver: driver.into(),
            version: None,
        }
    }

    /// Set the reported server version.
    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn mysql() -> Self {
        Self::new(Driver::MySql)
    }

    pub fn postgres() -> Self {
        Self::new(Driver::Postgres)
    }

    pub fn sqlite() -> Self {
        Self::new(Driver::Sqlite)
    }

    pub fn sql_server() -> Self {
        Self::new(Driver::SqlServer)
    }
}

impl Connection for StaticConnection {
    fn driver(&self) -> Driver {
        self.driver.clone()
    }

    fn server_version(&self) -> Option<Version> {
        self.version.clone()
    }
}

/// A live Postgres connection.
///
/// The server version is read once when the connection is wrapped.
pub struct PgConnection {
    client: tokio_postgres::Client,
    version: Version,
    raw_version: String,
}

impl PgConnection {
    /// Wrap a connected client, reading `server_version` from the server.
    pub async fn from_client(client: tokio_postgres::Client) -> ExprResult<Self> {
        let row = client.query_one("SHOW server_version", &[]).await?;
        let raw_version: String = row
            .try_get(0)
            .map_err(|e| ExprError::Connection(format!("failed to read server_version: {e}")))?;
        tracing::debug!(
            target: "sqlexpr.connection",
            server_version = %raw_version,
            "connected to postgres"
        );
        Ok(Self {
            client,
            version: Version::parse(&raw_version),
            raw_version,
        })
    }

    /// The server version string as reported by Postgres.
    pub fn raw_version(&self) -> &str {
        &self.raw_version
    }

    /// The wrapped client.
    pub fn client(&self) -> &tokio_postgres::Client {
        &self.client
    }
}

impl Connection for PgConnection {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn server_version(&self) -> Option<Version> {
        Some(self.version.clone())
    }
}

/// Explicit driver/version context threaded through a compile.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub driver: Option<Driver>,
    pub version: Option<Version>,
}

impl RenderContext {
    /// Context for a driver with no version.
    pub fn new(driver: impl Into<Driver>) -> Self {
        Self {
            driver: Some(driver.into()),
            version: None,
        }
    }

    /// Context without any driver (grammar expressions fall back to their own settings).
    pub fn unset() -> Self {
        Self::default()
    }

    /// Set the version.
    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Build the context from a connection.
    pub fn from_connection(conn: &(impl Connection + ?Sized)) -> Self {
        conn.render_context()
    }
}
