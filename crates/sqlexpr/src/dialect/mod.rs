//! Per-driver SQL text rendering.
//!
//! [`Renderer`] owns the statement layout shared by every backend (clause order,
//! predicate syntax, column lists). A [`Dialect`] supplies what differs: identifier
//! quoting, pagination, locks, date predicates and the statements some drivers lack.
//!
//! Rendering never touches bindings. Every `?` it writes corresponds to exactly one
//! value produced by [`crate::collect`] for the same slot, in the same order.

mod mysql;
mod postgres;
mod sqlite;
mod sqlserver;

pub use mysql::MySqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;
pub use sqlserver::SqlServerDialect;

use crate::driver::{Driver, RenderContext};
use crate::error::{ExprError, ExprResult};
use crate::qb::{DatePart, Distinct, Ident, Join, JoinKind, Lock, Order, Query, SqlValue, Values, Where};
use crate::value::Value;
use std::fmt;

/// A statement and its bindings, used where a dialect expands one operation into
/// several statements (SQLite truncate).
pub type Statement = (String, Vec<Value>);

/// Driver-specific rendering hooks.
pub trait Dialect: Send + Sync + fmt::Debug {
    fn driver(&self) -> Driver;

    /// Quote one identifier segment.
    fn quote_identifier(&self, segment: &str) -> String;

    /// `date(col) = ?` style predicate. `column` and `value` are already rendered.
    fn date_where(&self, part: DatePart, column: &str, operator: &str, value: &str) -> String {
        format!("{}({}) {} {}", part.as_str(), column, operator, value)
    }

    /// Prefix emitted right after `select` (SQL Server `top n`).
    fn top(&self, _limit: Option<u64>, _offset: Option<u64>) -> Option<String> {
        None
    }

    /// Whether `\` escapes the next character inside string literals.
    fn backslash_escapes(&self) -> bool {
        false
    }

    /// Trailing pagination clause, including its leading space.
    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _has_orders: bool) -> String {
        let mut sql = String::new();
        if let Some(n) = limit {
            sql.push_str(&format!(" limit {n}"));
        }
        if let Some(n) = offset {
            sql.push_str(&format!(" offset {n}"));
        }
        sql
    }

    /// Trailing lock clause, including its leading space.
    fn lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::Update => " for update".to_string(),
            Lock::Shared => " for share".to_string(),
            Lock::Raw(s) => format!(" {s}"),
        }
    }

    /// Table hint placed after the FROM table (SQL Server).
    fn table_hint(&self, _lock: &Lock) -> Option<String> {
        None
    }

    /// Wrap one member of a UNION.
    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    fn exists(&self, select: &str) -> String {
        format!("select exists({select}) as {}", self.quote_identifier("exists"))
    }

    fn empty_insert(&self, table: &str) -> String {
        format!("insert into {table} default values")
    }

    fn insert_or_ignore(&self, _insert: &str) -> ExprResult<String> {
        Err(ExprError::unsupported(self.driver().name(), "insert or ignore"))
    }

    fn insert_get_id(&self, insert: &str, _sequence: &str) -> String {
        insert.to_string()
    }

    /// Append the conflict clause to a rendered INSERT.
    ///
    /// `update` are wrapped column names copied from the inserted row; `assignments`
    /// are wrapped `(column, value)` pairs.
    fn upsert(
        &self,
        _insert: &str,
        _unique_by: &[String],
        _update: &[String],
        _assignments: &[(String, String)],
    ) -> ExprResult<String> {
        Err(ExprError::unsupported(self.driver().name(), "upsert"))
    }

    /// Check if UPDATE/DELETE may carry joins, ordering and a limit.
    fn supports_mutation_joins(&self) -> bool {
        false
    }

    /// `column = json_set(...)` for an update of a JSON path (`column->path`).
    fn json_update(&self, _column: &str, _path: &[&str], _value: &str) -> ExprResult<String> {
        Err(ExprError::unsupported(self.driver().name(), "json column update"))
    }

    /// Statements emptying `table` (already wrapped); `name` is the unquoted table name.
    fn truncate(&self, table: &str, _name: &str) -> Vec<Statement> {
        vec![(format!("truncate table {table}"), Vec::new())]
    }
}

static MYSQL: MySqlDialect = MySqlDialect;
static POSTGRES: PostgresDialect = PostgresDialect;
static SQLITE: SqliteDialect = SqliteDialect;
static SQL_SERVER: SqlServerDialect = SqlServerDialect;

/// The built-in dialect for a driver.
pub fn for_driver(driver: &Driver) -> ExprResult<&'static dyn Dialect> {
    match driver {
        Driver::MySql => Ok(&MYSQL),
        Driver::Postgres => Ok(&POSTGRES),
        Driver::Sqlite => Ok(&SQLITE),
        Driver::SqlServer => Ok(&SQL_SERVER),
        Driver::Other(name) => Err(ExprError::unsupported(name.clone(), "query compilation")),
    }
}

/// Renders statements for one dialect and rendering context.
#[derive(Clone, Copy)]
pub struct Renderer<'a> {
    dialect: &'a dyn Dialect,
    ctx: &'a RenderContext,
}

impl<'a> Renderer<'a> {
    pub fn new(dialect: &'a dyn Dialect, ctx: &'a RenderContext) -> Self {
        Self { dialect, ctx }
    }

    pub fn dialect(&self) -> &'a dyn Dialect {
        self.dialect
    }

    fn unsupported(&self, feature: &str) -> ExprError {
        ExprError::unsupported(self.dialect.driver().name(), feature)
    }

    // ==================== Identifiers ====================

    /// Quote a possibly qualified and aliased name (`users.id as uid`, `orders.*`).
    pub fn wrap(&self, value: &str) -> String {
        if let Some(pos) = find_alias(value) {
            let (name, alias) = (&value[..pos], &value[pos + 4..]);
            return format!(
                "{} as {}",
                self.wrap(name.trim()),
                self.dialect.quote_identifier(alias.trim())
            );
        }
        value
            .split('.')
            .map(|segment| {
                if segment == "*" {
                    "*".to_string()
                } else {
                    self.dialect.quote_identifier(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn ident(&self, ident: &Ident) -> ExprResult<String> {
        match ident {
            Ident::Name(name) => Ok(self.wrap(name)),
            Ident::Raw(raw) => raw.render(self.ctx),
        }
    }

    fn columnize(&self, columns: &[Ident]) -> ExprResult<String> {
        let parts = columns
            .iter()
            .map(|c| self.ident(c))
            .collect::<ExprResult<Vec<_>>>()?;
        Ok(parts.join(", "))
    }

    fn value(&self, value: &SqlValue) -> ExprResult<String> {
        value.render(self.ctx)
    }

    fn table(&self, query: &Query) -> ExprResult<String> {
        match &query.slots().from {
            Some(from) => self.ident(from),
            None => Err(ExprError::validation("query has no table")),
        }
    }

    // ==================== SELECT ====================

    /// Render a SELECT, including unions.
    pub fn select(&self, query: &Query) -> ExprResult<String> {
        let s = query.slots();
        if s.unions.is_empty() {
            return self.select_components(query, true);
        }

        if let Some(agg) = &s.aggregate {
            let inner = self.select_with_unions(query)?;
            return Ok(format!(
                "select {} from ({}) as {}",
                self.aggregate_call(&agg.function, &agg.columns, &s.distinct)?,
                inner,
                self.dialect.quote_identifier("temp_table")
            ));
        }
        self.select_with_unions(query)
    }

    fn select_with_unions(&self, query: &Query) -> ExprResult<String> {
        let s = query.slots();
        let mut sql = self.dialect.wrap_union(&self.select_components(query, false)?);
        for union in &s.unions {
            sql.push_str(if union.all { " union all " } else { " union " });
            sql.push_str(&self.dialect.wrap_union(&self.select(&union.query)?));
        }
        if !s.union_orders.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&self.orders(&s.union_orders)?);
        }
        sql.push_str(&self.dialect.limit_offset(
            s.union_limit,
            s.union_offset,
            !s.union_orders.is_empty(),
        ));
        Ok(sql)
    }

    // `use_aggregate` is false for the inner select of an aggregated union.
    fn select_components(&self, query: &Query, use_aggregate: bool) -> ExprResult<String> {
        let s = query.slots();
        let mut sql = String::from("select ");
        let mut limit = s.limit;

        match (&s.aggregate, use_aggregate) {
            (Some(agg), true) => {
                sql.push_str(&self.aggregate_call(&agg.function, &agg.columns, &s.distinct)?);
            }
            _ => {
                if let Some(top) = self.dialect.top(s.limit, s.offset) {
                    sql.push_str(&top);
                    sql.push(' ');
                    limit = None;
                }
                match &s.distinct {
                    Distinct::None => {}
                    Distinct::All => sql.push_str("distinct "),
                    Distinct::On(cols) => {
                        if self.dialect.driver() != Driver::Postgres {
                            return Err(self.unsupported("distinct on"));
                        }
                        let cols: Vec<String> = cols.iter().map(|c| self.wrap(c)).collect();
                        sql.push_str(&format!("distinct on ({}) ", cols.join(", ")));
                    }
                }
                if s.columns.is_empty() {
                    sql.push('*');
                } else {
                    sql.push_str(&self.columnize(&s.columns)?);
                }
            }
        }

        if let Some(from) = &s.from {
            sql.push_str(" from ");
            sql.push_str(&self.ident(from)?);
            if let Some(hint) = s.lock.as_ref().and_then(|l| self.dialect.table_hint(l)) {
                sql.push(' ');
                sql.push_str(&hint);
            }
        }
        sql.push_str(&self.joins(&s.joins)?);
        if !s.wheres.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&self.predicates(&s.wheres)?);
        }
        if !s.groups.is_empty() {
            sql.push_str(" group by ");
            sql.push_str(&self.columnize(&s.groups)?);
        }
        if !s.havings.is_empty() {
            sql.push_str(" having ");
            sql.push_str(&self.predicates(&s.havings)?);
        }
        if !s.orders.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&self.orders(&s.orders)?);
        }
        sql.push_str(&self.dialect.limit_offset(limit, s.offset, !s.orders.is_empty()));
        if let Some(lock) = &s.lock {
            sql.push_str(&self.dialect.lock(lock));
        }
        Ok(sql)
    }

    fn aggregate_call(&self, function: &str, columns: &[Ident], distinct: &Distinct) -> ExprResult<String> {
        let mut cols = if columns.is_empty() {
            "*".to_string()
        } else {
            self.columnize(columns)?
        };
        if *distinct != Distinct::None && cols != "*" {
            cols = format!("distinct {cols}");
        }
        Ok(format!(
            "{}({}) as {}",
            function,
            cols,
            self.dialect.quote_identifier("aggregate")
        ))
    }

    fn joins(&self, joins: &[Join]) -> ExprResult<String> {
        let mut sql = String::new();
        for join in joins {
            sql.push(' ');
            sql.push_str(join.kind.as_str());
            sql.push_str(" join ");
            sql.push_str(&self.ident(&join.table)?);
            if join.kind != JoinKind::Cross || !join.clauses.is_empty() {
                sql.push_str(" on ");
                sql.push_str(&self.predicates(&join.clauses)?);
            }
        }
        Ok(sql)
    }

    /// Render predicates joined by their booleans (the first boolean is dropped).
    pub fn predicates(&self, wheres: &[Where]) -> ExprResult<String> {
        let mut sql = String::new();
        for (i, w) in wheres.iter().enumerate() {
            if i > 0 {
                sql.push(' ');
                sql.push_str(w.boolean().as_str());
                sql.push(' ');
            }
            sql.push_str(&self.predicate(w)?);
        }
        Ok(sql)
    }

    fn predicate(&self, w: &Where) -> ExprResult<String> {
        Ok(match w {
            Where::Basic {
                column,
                operator,
                value,
                ..
            } => format!("{} {} {}", self.ident(column)?, operator, self.value(value)?),
            Where::Raw { fragment, .. } => fragment.render(self.ctx)?,
            Where::In {
                column,
                values,
                negated,
                ..
            } => {
                if values.is_empty() {
                    return Ok(if *negated { "1 = 1" } else { "0 = 1" }.to_string());
                }
                let list = values
                    .iter()
                    .map(|v| self.value(v))
                    .collect::<ExprResult<Vec<_>>>()?;
                let op = if *negated { "not in" } else { "in" };
                format!("{} {} ({})", self.ident(column)?, op, list.join(", "))
            }
            Where::Null {
                column, negated, ..
            } => {
                let op = if *negated { "is not null" } else { "is null" };
                format!("{} {}", self.ident(column)?, op)
            }
            Where::Between {
                column,
                low,
                high,
                negated,
                ..
            } => {
                let op = if *negated { "not between" } else { "between" };
                format!(
                    "{} {} {} and {}",
                    self.ident(column)?,
                    op,
                    self.value(low)?,
                    self.value(high)?
                )
            }
            Where::Column {
                first,
                operator,
                second,
                ..
            } => format!("{} {} {}", self.ident(first)?, operator, self.ident(second)?),
            Where::Nested { query, .. } => format!("({})", self.predicates(&query.slots().wheres)?),
            Where::Date {
                part,
                column,
                operator,
                value,
                ..
            } => self
                .dialect
                .date_where(*part, &self.ident(column)?, operator, &self.value(value)?),
        })
    }

    fn orders(&self, orders: &[Order]) -> ExprResult<String> {
        let parts = orders
            .iter()
            .map(|o| match o {
                Order::Column { column, descending } => Ok(format!(
                    "{} {}",
                    self.ident(column)?,
                    if *descending { "desc" } else { "asc" }
                )),
                Order::Raw(raw) => raw.render(self.ctx),
            })
            .collect::<ExprResult<Vec<_>>>()?;
        Ok(parts.join(", "))
    }

    /// Render `select exists(...)`.
    pub fn exists(&self, query: &Query) -> ExprResult<String> {
        Ok(self.dialect.exists(&self.select(query)?))
    }

    // ==================== INSERT ====================

    /// Render an INSERT of rows that all share the first row's column order.
    pub fn insert(&self, query: &Query, rows: &[Values]) -> ExprResult<String> {
        let table = self.table(query)?;
        let Some(first) = rows.first().filter(|r| !r.is_empty()) else {
            return Ok(self.dialect.empty_insert(&table));
        };
        let columns: Vec<String> = first.columns().map(|c| self.wrap(c)).collect();
        let mut tuples = Vec::with_capacity(rows.len());
        for row in rows {
            let values = row
                .iter()
                .map(|(_, v)| self.value(v))
                .collect::<ExprResult<Vec<_>>>()?;
            tuples.push(format!("({})", values.join(", ")));
        }
        Ok(format!(
            "insert into {} ({}) values {}",
            table,
            columns.join(", "),
            tuples.join(", ")
        ))
    }

    pub fn insert_or_ignore(&self, query: &Query, rows: &[Values]) -> ExprResult<String> {
        self.dialect.insert_or_ignore(&self.insert(query, rows)?)
    }

    pub fn insert_get_id(&self, query: &Query, row: &Values, sequence: &str) -> ExprResult<String> {
        let insert = self.insert(query, std::slice::from_ref(row))?;
        Ok(self.dialect.insert_get_id(&insert, sequence))
    }

    /// `insert into t (cols) select ...`.
    pub fn insert_using(&self, query: &Query, columns: &[&str], source: &Query) -> ExprResult<String> {
        let table = self.table(query)?;
        let select = self.select(source)?;
        if columns.is_empty() {
            return Ok(format!("insert into {table} {select}"));
        }
        let columns: Vec<String> = columns.iter().map(|c| self.wrap(c)).collect();
        Ok(format!("insert into {} ({}) {}", table, columns.join(", "), select))
    }

    pub fn upsert(
        &self,
        query: &Query,
        rows: &[Values],
        unique_by: &[&str],
        update: &[&str],
        assignments: &Values,
    ) -> ExprResult<String> {
        let insert = self.insert(query, rows)?;
        let unique_by: Vec<String> = unique_by.iter().map(|c| self.wrap(c)).collect();
        let update: Vec<String> = update.iter().map(|c| self.wrap(c)).collect();
        let assignments = assignments
            .iter()
            .map(|(c, v)| Ok((self.wrap(c), self.value(v)?)))
            .collect::<ExprResult<Vec<_>>>()?;
        self.dialect.upsert(&insert, &unique_by, &update, &assignments)
    }

    // ==================== UPDATE / DELETE ====================

    fn check_mutation_shape(&self, query: &Query, statement: &str) -> ExprResult<()> {
        let s = query.slots();
        if self.dialect.supports_mutation_joins() {
            return Ok(());
        }
        if !s.joins.is_empty() {
            return Err(self.unsupported(&format!("{statement} with joins")));
        }
        if !s.orders.is_empty() || s.limit.is_some() {
            return Err(self.unsupported(&format!("{statement} with order by / limit")));
        }
        Ok(())
    }

    fn assignment(&self, column: &str, value: &SqlValue) -> ExprResult<String> {
        let value = self.value(value)?;
        if let Some((base, path)) = column.split_once("->") {
            let path: Vec<&str> = path.split("->").collect();
            return self.dialect.json_update(&self.wrap(base), &path, &value);
        }
        Ok(format!("{} = {}", self.wrap(column), value))
    }

    pub fn update(&self, query: &Query, values: &Values) -> ExprResult<String> {
        self.check_mutation_shape(query, "update")?;
        if values.is_empty() {
            return Err(ExprError::validation("update without values"));
        }
        let s = query.slots();
        let table = self.table(query)?;
        let assignments = values
            .iter()
            .map(|(c, v)| self.assignment(c, v))
            .collect::<ExprResult<Vec<_>>>()?;

        let mut sql = format!("update {}{} set {}", table, self.joins(&s.joins)?, assignments.join(", "));
        if !s.wheres.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&self.predicates(&s.wheres)?);
        }
        self.push_mutation_tail(query, &mut sql)?;
        Ok(sql)
    }

    pub fn delete(&self, query: &Query) -> ExprResult<String> {
        self.check_mutation_shape(query, "delete")?;
        let s = query.slots();
        let table = self.table(query)?;

        let mut sql = if s.joins.is_empty() {
            format!("delete from {table}")
        } else {
            let alias = match &s.from {
                Some(Ident::Name(name)) => match find_alias(name) {
                    Some(pos) => self.dialect.quote_identifier(name[pos + 4..].trim()),
                    None => self.wrap(name),
                },
                _ => table.clone(),
            };
            format!("delete {} from {}{}", alias, table, self.joins(&s.joins)?)
        };
        if !s.wheres.is_empty() {
            sql.push_str(" where ");
            sql.push_str(&self.predicates(&s.wheres)?);
        }
        self.push_mutation_tail(query, &mut sql)?;
        Ok(sql)
    }

    fn push_mutation_tail(&self, query: &Query, sql: &mut String) -> ExprResult<()> {
        let s = query.slots();
        if !s.orders.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&self.orders(&s.orders)?);
        }
        if let Some(n) = s.limit {
            sql.push_str(&format!(" limit {n}"));
        }
        Ok(())
    }

    pub fn truncate(&self, query: &Query) -> ExprResult<Vec<Statement>> {
        match &query.slots().from {
            Some(Ident::Name(name)) => Ok(self.dialect.truncate(&self.wrap(name), name)),
            Some(Ident::Raw(_)) => Err(ExprError::validation("cannot truncate a raw table expression")),
            None => Err(ExprError::validation("query has no table")),
        }
    }
}

/// Quote one JSON path key for use inside a SQL string literal.
///
/// Keys containing quotes or backslashes are rejected.
pub(crate) fn json_path_key(key: &str) -> ExprResult<String> {
    if key.is_empty() || key.contains(['\'', '"', '\\']) {
        return Err(ExprError::validation(format!("invalid json path key: {key:?}")));
    }
    Ok(format!("\"{key}\""))
}

/// Byte offset of a case-insensitive ` as ` alias separator.
fn find_alias(value: &str) -> Option<usize> {
    value.to_ascii_lowercase().find(" as ")
}

#[cfg(test)]
mod tests;
