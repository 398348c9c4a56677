//! Self-check of expression resolution against a connection.
//!
//! The doctor answers "would my expressions compile for this connection?" without
//! running any user query: it checks that a dialect exists, that the server version is
//! known, that a grammar resolves to the connection's fragment, and that an expression
//! with bindings compiles with aligned placeholders.

use crate::compile::Compiler;
use crate::dialect;
use crate::driver::Connection;
use crate::expr::Expression;
use crate::grammar::Grammar;
use crate::qb;
use crate::value::Value;
use serde::Serialize;

/// Result of a single check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckOutcome {
    Passed,
    Failed,
    Ignored,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub outcome: CheckOutcome,
    pub message: String,
}

impl DoctorCheck {
    fn passed(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            outcome: CheckOutcome::Passed,
            message: message.into(),
        }
    }

    fn failed(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            outcome: CheckOutcome::Failed,
            message: message.into(),
        }
    }

    fn ignored(name: &'static str, message: impl Into<String>) -> Self {
        Self {
            name,
            outcome: CheckOutcome::Ignored,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorReport {
    pub driver: String,
    pub server_version: Option<String>,
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    /// Check if no check failed.
    pub fn success(&self) -> bool {
        self.checks.iter().all(|c| c.outcome != CheckOutcome::Failed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &DoctorCheck> {
        self.checks.iter().filter(|c| c.outcome == CheckOutcome::Failed)
    }
}

pub struct Doctor;

impl Doctor {
    pub fn run(conn: &dyn Connection) -> DoctorReport {
        let driver = conn.driver();
        let version = conn.server_version();
        let ctx = conn.render_context();

        let mut checks = Vec::with_capacity(4);

        checks.push(match dialect::for_driver(&driver) {
            Ok(d) => DoctorCheck::passed("dialect", format!("{} dialect available", d.driver())),
            Err(e) => DoctorCheck::failed("dialect", e.to_string()),
        });

        checks.push(match &version {
            Some(v) => DoctorCheck::passed("server_version", format!("server version {v}")),
            None => DoctorCheck::ignored(
                "server_version",
                "server version unknown; versioned grammar fragments resolve as version 0",
            ),
        });

        let marker = Grammar::new()
            .mysql("'mysql'")
            .postgres("'pgsql'")
            .sqlite("'sqlite'")
            .sql_server("'sqlsrv'");
        checks.push(match marker.resolve_in(&ctx) {
            Ok(text) if text.contains(driver.name()) => {
                DoctorCheck::passed("grammar", format!("resolved {text}"))
            }
            Ok(text) => DoctorCheck::failed(
                "grammar",
                format!("resolved {text} for driver {driver}"),
            ),
            Err(e) => DoctorCheck::failed("grammar", e.to_string()),
        });

        checks.push(Self::check_bindings(conn));

        let report = DoctorReport {
            driver: driver.to_string(),
            server_version: version.map(|v| v.to_string()),
            checks,
        };
        tracing::info!(
            target: "sqlexpr.doctor",
            driver = %report.driver,
            success = report.success(),
            "doctor finished"
        );
        report
    }

    fn check_bindings(conn: &dyn Connection) -> DoctorCheck {
        let price = Expression::grammar_with_bindings(
            Grammar::new()
                .mysql("IF(state = 'TX', ?, ?)")
                .postgres("CASE WHEN state = 'TX' THEN ? ELSE ? END")
                .sqlite("CASE WHEN state = 'TX' THEN ? ELSE ? END")
                .sql_server("CASE WHEN state = 'TX' THEN ? ELSE ? END"),
            [200, 100],
        );
        let query = qb::table("products").where_("price", ">", price);

        let compiled = match Compiler::new(conn).and_then(|c| c.select(&query)) {
            Ok(compiled) => compiled,
            Err(e) => return DoctorCheck::failed("bindings", e.to_string()),
        };
        if compiled.bindings != [Value::Int(200), Value::Int(100)] {
            return DoctorCheck::failed(
                "bindings",
                format!("unexpected bindings {:?} for `{}`", compiled.bindings, compiled.sql),
            );
        }
        DoctorCheck::passed("bindings", compiled.sql)
    }
}
