//! Per-driver, per-version SQL fragment tables.
//!
//! A [`Grammar`] holds alternative texts for one logical expression and picks the one
//! matching the driver (and server version) a query is compiled for:
//!
//! ```ignore
//! use sqlexpr::Grammar;
//!
//! let geom = Grammar::new()
//!     .mysql("ST_GeomFromText(?, ?, 'axis-order=long-lat')")
//!     .postgres("ST_GeomFromText(?, ?)");
//!
//! assert_eq!(geom.resolve_for("pgsql", None)?, "ST_GeomFromText(?, ?)");
//! ```
//!
//! Resolution for a driver walks its registered versions in ascending numeric order and
//! keeps the last fragment whose version is `<=` the requested one. Fragments registered
//! without a version use [`Version::ZERO`] and act as the default.

use crate::driver::{Driver, RenderContext};
use crate::error::{ExprError, ExprResult};
use crate::version::Version;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Mutex;

type ResolvedCache = HashMap<Driver, HashMap<Version, String>>;

/// A driver/version dispatch table for a SQL fragment.
pub struct Grammar {
    fragments: BTreeMap<Driver, BTreeMap<Version, String>>,
    driver: Option<Driver>,
    version: Option<Version>,
    resolved: Mutex<ResolvedCache>,
}

impl Grammar {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            fragments: BTreeMap::new(),
            driver: None,
            version: None,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    // ==================== Registration ====================

    /// Register (or overwrite) the fragment for a driver at a minimum version.
    ///
    /// Invalidates the resolution cache of that driver only.
    pub fn register(&mut self, driver: impl Into<Driver>, text: impl Into<String>, version: impl Into<Version>) {
        let driver = driver.into();
        self.invalidate(&driver);
        self.fragments
            .entry(driver)
            .or_default()
            .insert(version.into(), text.into());
    }

    /// Register a fragment for a driver at a minimum version (consuming builder).
    pub fn for_driver(
        mut self,
        driver: impl Into<Driver>,
        text: impl Into<String>,
        version: impl Into<Version>,
    ) -> Self {
        self.register(driver, text, version);
        self
    }

    /// Register the default (version 0) fragment for a driver.
    pub fn grammar(self, driver: impl Into<Driver>, text: impl Into<String>) -> Self {
        self.for_driver(driver, text, Version::ZERO)
    }

    /// Register the default MySQL fragment.
    pub fn mysql(self, text: impl Into<String>) -> Self {
        self.grammar(Driver::MySql, text)
    }

    /// Register a MySQL fragment for servers at or above `version`.
    pub fn mysql_version(self, text: impl Into<String>, version: impl Into<Version>) -> Self {
        self.for_driver(Driver::MySql, text, version)
    }

    /// Register the default Postgres fragment.
    pub fn postgres(self, text: impl Into<String>) -> Self {
        self.grammar(Driver::Postgres, text)
    }

    /// Register a Postgres fragment for servers at or above `version`.
    pub fn postgres_version(self, text: impl Into<String>, version: impl Into<Version>) -> Self {
        self.for_driver(Driver::Postgres, text, version)
    }

    /// Register the default SQLite fragment.
    pub fn sqlite(self, text: impl Into<String>) -> Self {
        self.grammar(Driver::Sqlite, text)
    }

    /// Register a SQLite fragment for library versions at or above `version`.
    pub fn sqlite_version(self, text: impl Into<String>, version: impl Into<Version>) -> Self {
        self.for_driver(Driver::Sqlite, text, version)
    }

    /// Register the default SQL Server fragment.
    pub fn sql_server(self, text: impl Into<String>) -> Self {
        self.grammar(Driver::SqlServer, text)
    }

    /// Register a SQL Server fragment for servers at or above `version`.
    pub fn sql_server_version(self, text: impl Into<String>, version: impl Into<Version>) -> Self {
        self.for_driver(Driver::SqlServer, text, version)
    }

    // ==================== Ambient context ====================

    /// The ambient driver, if set.
    pub fn driver(&self) -> Option<&Driver> {
        self.driver.as_ref()
    }

    /// Set the ambient driver.
    pub fn set_driver(&mut self, driver: impl Into<Driver>) {
        self.driver = Some(driver.into());
    }

    /// Set the ambient driver (consuming builder).
    pub fn with_driver(mut self, driver: impl Into<Driver>) -> Self {
        self.set_driver(driver);
        self
    }

    /// The ambient version, if set.
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Set the ambient version.
    pub fn set_version(&mut self, version: impl Into<Version>) {
        self.version = Some(version.into());
    }

    /// Set the ambient version (consuming builder).
    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.set_version(version);
        self
    }

    // ==================== Inspection ====================

    /// Drivers with at least one registered fragment.
    pub fn drivers(&self) -> impl Iterator<Item = &Driver> {
        self.fragments.keys()
    }

    /// Check if a driver has any registered fragment.
    pub fn supports(&self, driver: &Driver) -> bool {
        self.fragments.contains_key(driver)
    }

    /// Human-readable dump of registered drivers and versions.
    pub fn registered(&self) -> String {
        if self.fragments.is_empty() {
            return "(none)".to_string();
        }
        self.fragments
            .iter()
            .map(|(driver, versions)| {
                let versions: Vec<String> = versions.keys().map(|v| v.to_string()).collect();
                format!("{}[{}]", driver, versions.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ")
    }

    // ==================== Resolution ====================

    /// Resolve using only the ambient driver/version.
    pub fn resolve(&self) -> ExprResult<String> {
        self.resolve_with(None, None)
    }

    /// Alias of [`Grammar::resolve`].
    pub fn resolve_ambient(&self) -> ExprResult<String> {
        self.resolve()
    }

    /// Resolve for an explicit driver; the version falls back to the ambient one, then 0.
    pub fn resolve_for(&self, driver: impl Into<Driver>, version: Option<Version>) -> ExprResult<String> {
        let driver = driver.into();
        self.resolve_with(Some(&driver), version.as_ref())
    }

    /// Resolve for a rendering context; missing fields fall back to the ambient ones.
    pub fn resolve_in(&self, ctx: &RenderContext) -> ExprResult<String> {
        self.resolve_with(ctx.driver.as_ref(), ctx.version.as_ref())
    }

    fn resolve_with(&self, driver: Option<&Driver>, version: Option<&Version>) -> ExprResult<String> {
        let Some(driver) = driver.or(self.driver.as_ref()) else {
            tracing::warn!(target: "sqlexpr.grammar", registered = %self.registered(), "grammar resolved without driver");
            return Err(ExprError::DriverNotConfigured {
                registered: self.registered(),
            });
        };
        let zero = Version::ZERO;
        let version = version.or(self.version.as_ref()).unwrap_or(&zero);

        let Some(versions) = self.fragments.get(driver) else {
            tracing::warn!(target: "sqlexpr.grammar", %driver, "grammar not defined for driver");
            return Err(ExprError::GrammarNotDefinedForDriver {
                driver: driver.to_string(),
                registered: self.registered(),
            });
        };

        if let Some(hit) = self.cached(driver, version) {
            return Ok(hit);
        }

        let mut winner: Option<&String> = None;
        for (registered, text) in versions {
            if registered > version {
                break;
            }
            winner = Some(text);
        }

        let Some(text) = winner else {
            tracing::warn!(target: "sqlexpr.grammar", %driver, %version, "grammar not defined for version");
            return Err(ExprError::GrammarNotDefinedForVersion {
                driver: driver.to_string(),
                version: version.to_string(),
                registered: self.registered(),
            });
        };

        tracing::trace!(target: "sqlexpr.grammar", %driver, %version, fragment = %text, "grammar resolved");
        self.store(driver, version, text);
        Ok(text.clone())
    }

    fn cached(&self, driver: &Driver, version: &Version) -> Option<String> {
        let cache = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(driver).and_then(|m| m.get(version)).cloned()
    }

    fn store(&self, driver: &Driver, version: &Version, text: &str) {
        let mut cache = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        cache
            .entry(driver.clone())
            .or_default()
            .insert(version.clone(), text.to_string());
    }

    fn invalidate(&mut self, driver: &Driver) {
        let cache = self.resolved.get_mut().unwrap_or_else(|e| e.into_inner());
        cache.remove(driver);
    }

    /// Number of cached resolutions for a driver.
    pub fn cached_len(&self, driver: &Driver) -> usize {
        let cache = self.resolved.lock().unwrap_or_else(|e| e.into_inner());
        cache.get(driver).map_or(0, HashMap::len)
    }
}

impl Default for Grammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Grammar {
    fn clone(&self) -> Self {
        let resolved = self.resolved.lock().unwrap_or_else(|e| e.into_inner()).clone();
        Self {
            fragments: self.fragments.clone(),
            driver: self.driver.clone(),
            version: self.version.clone(),
            resolved: Mutex::new(resolved),
        }
    }
}

impl fmt::Debug for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("fragments", &self.fragments)
            .field("driver", &self.driver)
            .field("version", &self.version)
            .finish()
    }
}
