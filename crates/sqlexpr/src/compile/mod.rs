//! The compile pipeline.
//!
//! Every compiling operation runs the same phases:
//!
//! ```text
//! Idle -> ConfiguringExpressions -> RenderingText -> CollectingBindings -> Done
//! ```
//!
//! Grammar expressions are resolved against the compiler's [`RenderContext`] before any
//! text is rendered, and bindings are only collected once rendering succeeded, so a
//! failing compile never evaluates deferred bindings.

mod config;

pub use config::{CompileConfig, PlaceholderStyle};

use crate::collect;
use crate::dialect::{self, Dialect, Renderer};
use crate::driver::{Connection, RenderContext};
use crate::error::{ExprError, ExprResult};
use crate::expr::Expression;
use crate::qb::{Ident, Query, SqlValue, Values};
use crate::value::Value;
use serde::Serialize;
use std::fmt;
use tokio_postgres::types::ToSql;

/// Phase of a compiling call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePhase {
    Idle,
    ConfiguringExpressions,
    RenderingText,
    CollectingBindings,
    Done,
}

impl fmt::Display for CompilePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompilePhase::Idle => "idle",
            CompilePhase::ConfiguringExpressions => "configuring_expressions",
            CompilePhase::RenderingText => "rendering_text",
            CompilePhase::CollectingBindings => "collecting_bindings",
            CompilePhase::Done => "done",
        };
        f.write_str(s)
    }
}

struct Phases {
    operation: &'static str,
    current: CompilePhase,
}

impl Phases {
    fn start(operation: &'static str) -> Self {
        Self {
            operation,
            current: CompilePhase::Idle,
        }
    }

    fn advance(&mut self, next: CompilePhase) {
        tracing::trace!(
            target: "sqlexpr.compile",
            operation = self.operation,
            from = %self.current,
            to = %next,
            "compile phase"
        );
        self.current = next;
    }
}

/// Resolve every grammar-backed expression against `ctx`.
///
/// Returns the number of grammar expressions resolved. Resolution only reads the
/// expressions (and fills their caches), so running it twice changes nothing.
pub fn configure<'a>(
    expressions: impl IntoIterator<Item = &'a Expression>,
    ctx: &RenderContext,
) -> ExprResult<usize> {
    let mut configured = 0;
    for expr in expressions {
        if expr.is_grammar() {
            expr.to_sql_string(ctx)?;
            configured += 1;
        }
    }
    Ok(configured)
}

/// A compiled statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: String,
    pub bindings: Vec<Value>,
}

impl CompiledQuery {
    pub fn new(sql: impl Into<String>, bindings: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
        }
    }

    /// Bindings as tokio-postgres parameters.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.bindings.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    /// The SQL with `?` rewritten as `$1, $2, ...`.
    pub fn to_numbered(&self) -> String {
        collect::to_numbered(&self.sql)
    }

    /// Number of `?` placeholders in the SQL.
    pub fn placeholder_count(&self) -> usize {
        collect::count_placeholders(&self.sql)
    }
}

/// Compiles queries for one driver and server version.
///
/// # Example
///
/// ```ignore
/// use sqlexpr::{Compiler, Expression, Grammar, StaticConnection, qb};
///
/// let price = Expression::grammar_with_bindings(
///     Grammar::new().mysql("IF(state = 'TX', ?, ?)"),
///     [200, 100],
/// );
/// let compiled = Compiler::new(&StaticConnection::mysql())?
///     .select(&qb::table("orders").where_("price", ">", price))?;
///
/// assert_eq!(compiled.sql, "select * from `orders` where `price` > IF(state = 'TX', ?, ?)");
/// ```
#[derive(Debug, Clone)]
pub struct Compiler {
    ctx: RenderContext,
    dialect: &'static dyn Dialect,
    config: CompileConfig,
}

impl Compiler {
    /// Create a compiler for a connection's driver and server version.
    pub fn new(conn: &dyn Connection) -> ExprResult<Self> {
        Self::for_context(conn.render_context())
    }

    /// Create a compiler for an explicit rendering context.
    pub fn for_context(ctx: RenderContext) -> ExprResult<Self> {
        let Some(driver) = &ctx.driver else {
            return Err(ExprError::validation("render context has no driver"));
        };
        let dialect = dialect::for_driver(driver)?;
        Ok(Self {
            ctx,
            dialect,
            config: CompileConfig::default(),
        })
    }

    pub fn with_config(mut self, config: CompileConfig) -> Self {
        self.config = config;
        self
    }

    pub fn context(&self) -> &RenderContext {
        &self.ctx
    }

    pub fn dialect(&self) -> &'static dyn Dialect {
        self.dialect
    }

    pub fn config(&self) -> &CompileConfig {
        &self.config
    }

    fn renderer(&self) -> Renderer<'_> {
        Renderer::new(self.dialect, &self.ctx)
    }

    fn run<'q>(
        &self,
        operation: &'static str,
        queries: &[&Query],
        extra: Vec<&'q Expression>,
        render: impl FnOnce(Renderer<'_>) -> ExprResult<String>,
        collect: impl FnOnce() -> Vec<Value>,
    ) -> ExprResult<CompiledQuery> {
        let mut phases = Phases::start(operation);
        let driver = self.dialect.driver();

        phases.advance(CompilePhase::ConfiguringExpressions);
        for query in queries {
            if let Some(err) = query.build_error() {
                return Err(ExprError::validation(err));
            }
        }
        let expressions = queries
            .iter()
            .flat_map(|q| q.expressions().iter())
            .chain(extra);
        let configured = configure(expressions, &self.ctx).inspect_err(|e| {
            tracing::warn!(target: "sqlexpr.compile", operation, %driver, error = %e, "expression configuration failed");
        })?;

        phases.advance(CompilePhase::RenderingText);
        let sql = render(self.renderer()).inspect_err(|e| {
            tracing::warn!(target: "sqlexpr.compile", operation, %driver, error = %e, "rendering failed");
        })?;

        phases.advance(CompilePhase::CollectingBindings);
        let bindings = collect();
        if self.config.verify_placeholders {
            let placeholders = collect::count_placeholders_for(&sql, self.dialect.backslash_escapes());
            if placeholders != bindings.len() {
                tracing::warn!(
                    target: "sqlexpr.compile",
                    operation,
                    placeholders,
                    bindings = bindings.len(),
                    sql = %sql,
                    "placeholder mismatch"
                );
                return Err(ExprError::PlaceholderMismatch {
                    placeholders,
                    bindings: bindings.len(),
                    sql,
                });
            }
        }

        phases.advance(CompilePhase::Done);
        let sql = match self.config.placeholder_style {
            PlaceholderStyle::Question => sql,
            PlaceholderStyle::Numbered => collect::to_numbered(&sql),
        };
        tracing::debug!(
            target: "sqlexpr.compile",
            operation,
            %driver,
            grammar_expressions = configured,
            bindings = bindings.len(),
            sql = %sql,
            "compiled"
        );
        Ok(CompiledQuery { sql, bindings })
    }

    // ==================== SELECT ====================

    pub fn select(&self, query: &Query) -> ExprResult<CompiledQuery> {
        self.run(
            "select",
            &[query],
            Vec::new(),
            |r| r.select(query),
            || collect::select_bindings(query),
        )
    }

    /// Alias of [`Compiler::select`].
    pub fn get(&self, query: &Query) -> ExprResult<CompiledQuery> {
        self.select(query)
    }

    pub fn exists(&self, query: &Query) -> ExprResult<CompiledQuery> {
        self.run(
            "exists",
            &[query],
            Vec::new(),
            |r| r.exists(query),
            || collect::select_bindings(query),
        )
    }

    /// Compile `select function(columns) as aggregate`.
    pub fn aggregate(&self, query: &Query, function: &str, columns: &[&str]) -> ExprResult<CompiledQuery> {
        let columns: Vec<Ident> = columns.iter().map(|c| Ident::from(*c)).collect();
        let query = query.clone().with_aggregate(function, columns);
        self.run(
            "aggregate",
            &[&query],
            Vec::new(),
            |r| r.select(&query),
            || collect::select_bindings(&query),
        )
    }

    pub fn count(&self, query: &Query) -> ExprResult<CompiledQuery> {
        self.aggregate(query, "count", &["*"])
    }

    pub fn max(&self, query: &Query, column: &str) -> ExprResult<CompiledQuery> {
        self.aggregate(query, "max", &[column])
    }

    pub fn min(&self, query: &Query, column: &str) -> ExprResult<CompiledQuery> {
        self.aggregate(query, "min", &[column])
    }

    pub fn sum(&self, query: &Query, column: &str) -> ExprResult<CompiledQuery> {
        self.aggregate(query, "sum", &[column])
    }

    pub fn avg(&self, query: &Query, column: &str) -> ExprResult<CompiledQuery> {
        self.aggregate(query, "avg", &[column])
    }

    // ==================== INSERT ====================

    pub fn insert(&self, query: &Query, rows: &[Values]) -> ExprResult<CompiledQuery> {
        let rows = normalize_rows(rows)?;
        self.run(
            "insert",
            &[query],
            row_expressions(&rows),
            |r| r.insert(query, &rows),
            || collect::insert_bindings(query, &rows),
        )
    }

    pub fn insert_or_ignore(&self, query: &Query, rows: &[Values]) -> ExprResult<CompiledQuery> {
        let rows = normalize_rows(rows)?;
        self.run(
            "insert_or_ignore",
            &[query],
            row_expressions(&rows),
            |r| r.insert_or_ignore(query, &rows),
            || collect::insert_bindings(query, &rows),
        )
    }

    /// Compile a single-row insert that reports the new key (`returning` on Postgres).
    pub fn insert_get_id(&self, query: &Query, row: &Values, sequence: Option<&str>) -> ExprResult<CompiledQuery> {
        let sequence = sequence.unwrap_or("id");
        self.run(
            "insert_get_id",
            &[query],
            row_expressions(std::slice::from_ref(row)),
            |r| r.insert_get_id(query, row, sequence),
            || collect::insert_bindings(query, std::slice::from_ref(row)),
        )
    }

    /// Compile `insert into table (columns) select ...`.
    pub fn insert_using(&self, query: &Query, columns: &[&str], source: &Query) -> ExprResult<CompiledQuery> {
        self.run(
            "insert_using",
            &[query, source],
            Vec::new(),
            |r| r.insert_using(query, columns, source),
            || collect::insert_using_bindings(query, source),
        )
    }

    // ==================== UPDATE / UPSERT ====================

    pub fn update(&self, query: &Query, values: &Values) -> ExprResult<CompiledQuery> {
        let mut extra = Vec::new();
        values.expressions(&mut extra);
        self.run(
            "update",
            &[query],
            extra,
            |r| r.update(query, values),
            || collect::update_bindings(query, values),
        )
    }

    /// Compile `update ... set column = column + amount`, plus any extra assignments.
    pub fn increment(&self, query: &Query, column: &str, amount: i64, extra: &Values) -> ExprResult<CompiledQuery> {
        self.step(query, column, "+", amount, extra)
    }

    /// Compile `update ... set column = column - amount`, plus any extra assignments.
    pub fn decrement(&self, query: &Query, column: &str, amount: i64, extra: &Values) -> ExprResult<CompiledQuery> {
        self.step(query, column, "-", amount, extra)
    }

    fn step(&self, query: &Query, column: &str, op: &str, amount: i64, extra: &Values) -> ExprResult<CompiledQuery> {
        let wrapped = self.renderer().wrap(column);
        let mut values = extra.clone();
        values.prepend(
            column.to_string(),
            SqlValue::Expr(Expression::raw(format!("{wrapped} {op} {amount}"))),
        );
        self.update(query, &values)
    }

    /// Insert rows, updating `update` columns from the new row on conflict.
    ///
    /// An empty `update` list compiles to an insert-or-ignore.
    pub fn upsert(&self, query: &Query, rows: &[Values], unique_by: &[&str], update: &[&str]) -> ExprResult<CompiledQuery> {
        self.upsert_with(query, rows, unique_by, update, &Values::new())
    }

    /// Like [`Compiler::upsert`], with explicit `column = value` assignments on conflict.
    ///
    /// Assignment bindings follow the inserted rows' bindings.
    pub fn upsert_with(
        &self,
        query: &Query,
        rows: &[Values],
        unique_by: &[&str],
        update: &[&str],
        assignments: &Values,
    ) -> ExprResult<CompiledQuery> {
        if update.is_empty() && assignments.is_empty() {
            return self.insert_or_ignore(query, rows);
        }
        let rows = normalize_rows(rows)?;
        let mut extra = row_expressions(&rows);
        assignments.expressions(&mut extra);
        self.run(
            "upsert",
            &[query],
            extra,
            |r| r.upsert(query, &rows, unique_by, update, assignments),
            || collect::upsert_bindings(query, &rows, assignments),
        )
    }

    // ==================== DELETE / TRUNCATE ====================

    pub fn delete(&self, query: &Query) -> ExprResult<CompiledQuery> {
        self.run(
            "delete",
            &[query],
            Vec::new(),
            |r| r.delete(query),
            || collect::delete_bindings(query),
        )
    }

    /// Compile the statements emptying the query's table.
    pub fn truncate(&self, query: &Query) -> ExprResult<Vec<CompiledQuery>> {
        let mut phases = Phases::start("truncate");
        phases.advance(CompilePhase::ConfiguringExpressions);
        phases.advance(CompilePhase::RenderingText);
        let statements = self.renderer().truncate(query)?;
        phases.advance(CompilePhase::CollectingBindings);
        let compiled: Vec<CompiledQuery> = statements
            .into_iter()
            .map(|(sql, bindings)| CompiledQuery::new(sql, bindings))
            .collect();
        phases.advance(CompilePhase::Done);
        Ok(compiled)
    }
}

/// Reorder every row to the first row's columns; rows with other column sets fail.
fn normalize_rows(rows: &[Values]) -> ExprResult<Vec<Values>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let columns: Vec<&str> = first.columns().collect();
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != columns.len() {
                return Err(ExprError::validation(format!(
                    "insert row {i} has {} column(s), expected {}",
                    row.len(),
                    columns.len()
                )));
            }
            columns
                .iter()
                .map(|c| match row.get(c) {
                    Some(v) => Ok((c.to_string(), v.clone())),
                    None => Err(ExprError::validation(format!("insert row {i} is missing column {c}"))),
                })
                .collect::<ExprResult<Values>>()
        })
        .collect()
}

fn row_expressions(rows: &[Values]) -> Vec<&Expression> {
    let mut out = Vec::new();
    for row in rows {
        row.expressions(&mut out);
    }
    out
}
