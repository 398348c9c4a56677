//! Structural slot types of a [`Query`](super::Query).

use crate::binding::{Binding, evaluate_all};
use crate::driver::RenderContext;
use crate::error::ExprResult;
use crate::expr::{Expression, IntoExpression};
use crate::value::Value;

use super::Query;

/// A value placed in a query slot: either a bound parameter or an inline expression.
///
/// There is no third case, so a slot can never hold something the collector cannot
/// turn into bindings.
#[derive(Clone, Debug)]
pub enum SqlValue {
    Bind(Binding),
    Expr(Expression),
}

impl SqlValue {
    /// A bound value evaluated each time bindings are collected.
    pub fn deferred<F, T>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        SqlValue::Bind(Binding::deferred(f))
    }

    /// The expression, if this value is one.
    pub fn expression(&self) -> Option<&Expression> {
        match self {
            SqlValue::Expr(e) => Some(e),
            SqlValue::Bind(_) => None,
        }
    }

    /// Check if this is a literal `NULL` binding.
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Bind(Binding::Value(Value::Null)))
    }

    pub(crate) fn render(&self, ctx: &RenderContext) -> ExprResult<String> {
        match self {
            SqlValue::Bind(_) => Ok("?".to_string()),
            SqlValue::Expr(e) => e.to_sql_string(ctx),
        }
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        match self {
            SqlValue::Bind(b) => out.push(b.evaluate()),
            SqlValue::Expr(e) => out.extend(e.bindings()),
        }
    }
}

macro_rules! impl_sql_value_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for SqlValue {
                fn from(v: $t) -> Self {
                    SqlValue::Bind(Binding::from(v))
                }
            }
        )*
    };
}

impl_sql_value_from!(
    bool,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    &str,
    String,
    &String,
    chrono::NaiveDateTime,
    chrono::NaiveDate,
    Value,
    Binding
);

impl<T: Into<Value>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        SqlValue::Bind(Binding::from(v))
    }
}

impl From<Expression> for SqlValue {
    fn from(e: Expression) -> Self {
        SqlValue::Expr(e.into_expression())
    }
}

impl From<&Expression> for SqlValue {
    fn from(e: &Expression) -> Self {
        SqlValue::Expr(e.into_expression())
    }
}

/// A raw fragment plus caller-supplied bindings (`select_raw`, `where_raw`, ...).
///
/// The fragment's own bindings come first, then the caller's.
#[derive(Clone, Debug)]
pub struct RawFragment {
    pub expr: Expression,
    pub bindings: Vec<Binding>,
}

impl RawFragment {
    pub fn new(expr: impl IntoExpression) -> Self {
        Self {
            expr: expr.into_expression(),
            bindings: Vec::new(),
        }
    }

    pub fn with_bindings<B: Into<Binding>>(
        expr: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        Self {
            expr: expr.into_expression(),
            bindings: bindings.into_iter().map(Into::into).collect(),
        }
    }

    pub(crate) fn render(&self, ctx: &RenderContext) -> ExprResult<String> {
        self.expr.to_sql_string(ctx)
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        out.extend(self.expr.bindings());
        out.extend(evaluate_all(&self.bindings));
    }
}

/// A column or table reference.
#[derive(Clone, Debug)]
pub enum Ident {
    /// A name that gets quoted (`users.id`, `name as n`, `*`).
    Name(String),
    /// A fragment rendered verbatim.
    Raw(RawFragment),
}

impl Ident {
    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        if let Ident::Raw(raw) = self {
            raw.collect_into(out);
        }
    }

    pub(crate) fn expression(&self) -> Option<&Expression> {
        match self {
            Ident::Raw(raw) => Some(&raw.expr),
            Ident::Name(_) => None,
        }
    }
}

impl From<&str> for Ident {
    fn from(s: &str) -> Self {
        Ident::Name(s.to_string())
    }
}

impl From<String> for Ident {
    fn from(s: String) -> Self {
        Ident::Name(s)
    }
}

impl From<&String> for Ident {
    fn from(s: &String) -> Self {
        Ident::Name(s.clone())
    }
}

impl From<Expression> for Ident {
    fn from(e: Expression) -> Self {
        Ident::Raw(RawFragment::new(e))
    }
}

impl From<&Expression> for Ident {
    fn from(e: &Expression) -> Self {
        Ident::Raw(RawFragment::new(e))
    }
}

/// How a predicate joins the one before it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

impl Boolean {
    pub fn as_str(&self) -> &'static str {
        match self {
            Boolean::And => "and",
            Boolean::Or => "or",
        }
    }
}

/// The component compared by a date-based predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Time,
    Day,
    Month,
    Year,
}

impl DatePart {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Date => "date",
            DatePart::Time => "time",
            DatePart::Day => "day",
            DatePart::Month => "month",
            DatePart::Year => "year",
        }
    }
}

/// A WHERE / HAVING / JOIN ON predicate.
#[derive(Clone, Debug)]
pub enum Where {
    Basic {
        column: Ident,
        operator: String,
        value: SqlValue,
        boolean: Boolean,
    },
    Raw {
        fragment: RawFragment,
        boolean: Boolean,
    },
    In {
        column: Ident,
        values: Vec<SqlValue>,
        negated: bool,
        boolean: Boolean,
    },
    Null {
        column: Ident,
        negated: bool,
        boolean: Boolean,
    },
    Between {
        column: Ident,
        low: SqlValue,
        high: SqlValue,
        negated: bool,
        boolean: Boolean,
    },
    Column {
        first: Ident,
        operator: String,
        second: Ident,
        boolean: Boolean,
    },
    Nested {
        query: Box<Query>,
        boolean: Boolean,
    },
    Date {
        part: DatePart,
        column: Ident,
        operator: String,
        value: SqlValue,
        boolean: Boolean,
    },
}

impl Where {
    pub fn boolean(&self) -> Boolean {
        match self {
            Where::Basic { boolean, .. }
            | Where::Raw { boolean, .. }
            | Where::In { boolean, .. }
            | Where::Null { boolean, .. }
            | Where::Between { boolean, .. }
            | Where::Column { boolean, .. }
            | Where::Nested { boolean, .. }
            | Where::Date { boolean, .. } => *boolean,
        }
    }

    /// Append this predicate's bindings in render order.
    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        match self {
            Where::Basic { column, value, .. } | Where::Date { column, value, .. } => {
                column.collect_into(out);
                value.collect_into(out);
            }
            Where::Raw { fragment, .. } => fragment.collect_into(out),
            Where::In { column, values, .. } => {
                column.collect_into(out);
                for v in values {
                    v.collect_into(out);
                }
            }
            Where::Null { column, .. } => column.collect_into(out),
            Where::Between {
                column, low, high, ..
            } => {
                column.collect_into(out);
                low.collect_into(out);
                high.collect_into(out);
            }
            Where::Column { first, second, .. } => {
                first.collect_into(out);
                second.collect_into(out);
            }
            Where::Nested { query, .. } => {
                for w in &query.slots().wheres {
                    w.collect_into(out);
                }
            }
        }
    }

    pub(crate) fn expressions<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        fn value<'a>(v: &'a SqlValue, out: &mut Vec<&'a Expression>) {
            out.extend(v.expression());
        }
        match self {
            Where::Basic { column, value: v, .. } | Where::Date { column, value: v, .. } => {
                out.extend(column.expression());
                value(v, out);
            }
            Where::Raw { fragment, .. } => out.push(&fragment.expr),
            Where::In { column, values, .. } => {
                out.extend(column.expression());
                for v in values {
                    value(v, out);
                }
            }
            Where::Null { column, .. } => out.extend(column.expression()),
            Where::Between {
                column, low, high, ..
            } => {
                out.extend(column.expression());
                value(low, out);
                value(high, out);
            }
            Where::Column { first, second, .. } => {
                out.extend(first.expression());
                out.extend(second.expression());
            }
            Where::Nested { query, .. } => {
                for w in &query.slots().wheres {
                    w.expressions(out);
                }
            }
        }
    }
}

/// Join type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Cross => "cross",
        }
    }
}

/// A JOIN clause with its ON / WHERE constraints.
#[derive(Clone, Debug)]
pub struct Join {
    pub kind: JoinKind,
    pub table: Ident,
    pub clauses: Vec<Where>,
}

impl Join {
    pub fn new(kind: JoinKind, table: impl Into<Ident>) -> Self {
        Self {
            kind,
            table: table.into(),
            clauses: Vec::new(),
        }
    }

    /// Add `first op second` (column comparison).
    pub fn on(mut self, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.clauses.push(Where::Column {
            first: first.into(),
            operator: operator.to_string(),
            second: second.into(),
            boolean: Boolean::And,
        });
        self
    }

    /// Add `or first op second`.
    pub fn or_on(mut self, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.clauses.push(Where::Column {
            first: first.into(),
            operator: operator.to_string(),
            second: second.into(),
            boolean: Boolean::Or,
        });
        self
    }

    /// Add `column op value` (bound value or expression).
    pub fn where_(mut self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.clauses.push(Where::Basic {
            column: column.into(),
            operator: operator.to_string(),
            value: value.into(),
            boolean: Boolean::And,
        });
        self
    }

    /// Add `or column op value`.
    pub fn or_where(mut self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.clauses.push(Where::Basic {
            column: column.into(),
            operator: operator.to_string(),
            value: value.into(),
            boolean: Boolean::Or,
        });
        self
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        self.table.collect_into(out);
        for c in &self.clauses {
            c.collect_into(out);
        }
    }
}

/// ORDER BY entry.
#[derive(Clone, Debug)]
pub enum Order {
    Column { column: Ident, descending: bool },
    Raw(RawFragment),
}

impl Order {
    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        match self {
            Order::Column { column, .. } => column.collect_into(out),
            Order::Raw(raw) => raw.collect_into(out),
        }
    }
}

/// Row locking mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lock {
    Update,
    Shared,
    Raw(String),
}

/// Aggregate function applied by `count`/`max`/... compiles.
#[derive(Clone, Debug)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<Ident>,
}

/// DISTINCT mode.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Distinct {
    #[default]
    None,
    All,
    /// Postgres `distinct on (...)`.
    On(Vec<String>),
}

/// A UNION member.
#[derive(Clone, Debug)]
pub struct Union {
    pub query: Box<Query>,
    pub all: bool,
}

/// Ordered column/value pairs for INSERT, UPDATE and UPSERT.
#[derive(Clone, Debug, Default)]
pub struct Values {
    entries: Vec<(String, SqlValue)>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a column; setting it again replaces the value in place.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.insert(column, value);
        self
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        let column = column.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
    }

    /// Prepend a column (used for increment/decrement).
    pub(crate) fn prepend(&mut self, column: String, value: SqlValue) {
        self.entries.retain(|(c, _)| *c != column);
        self.entries.insert(0, (column, value));
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.entries.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(c, _)| c.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn collect_into(&self, out: &mut Vec<Value>) {
        for (_, v) in &self.entries {
            v.collect_into(out);
        }
    }

    pub(crate) fn expressions<'a>(&'a self, out: &mut Vec<&'a Expression>) {
        out.extend(self.entries.iter().filter_map(|(_, v)| v.expression()));
    }
}

impl<K: Into<String>, V: Into<SqlValue>> FromIterator<(K, V)> for Values {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut values = Values::new();
        for (k, v) in iter {
            values.insert(k, v);
        }
        values
    }
}
