//! The fluent query builder.

use super::clause::{
    Aggregate, Boolean, DatePart, Distinct, Ident, Join, JoinKind, Lock, Order, RawFragment,
    SqlValue, Union, Where,
};
use crate::binding::Binding;
use crate::driver::Connection;
use crate::error::ExprResult;
use crate::expr::{Expression, IntoExpression};
use std::sync::OnceLock;

const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>", "like", "not like", "ilike", "not ilike",
    "like binary", "rlike", "not rlike", "regexp", "not regexp", "similar to", "not similar to",
    "&", "|", "^", "<<", ">>", "~", "~*", "!~", "!~*", "@>", "<@", "&&",
];

/// The structural slots of a query, in the order they are rendered.
#[derive(Clone, Debug, Default)]
pub struct Slots {
    pub aggregate: Option<Aggregate>,
    pub columns: Vec<Ident>,
    pub distinct: Distinct,
    pub from: Option<Ident>,
    pub joins: Vec<Join>,
    pub wheres: Vec<Where>,
    pub groups: Vec<Ident>,
    pub havings: Vec<Where>,
    pub orders: Vec<Order>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub unions: Vec<Union>,
    pub union_limit: Option<u64>,
    pub union_offset: Option<u64>,
    pub union_orders: Vec<Order>,
    pub lock: Option<Lock>,
}

/// A query under construction.
///
/// Builder methods consume and return the query. The index of expressions reachable
/// from the slots is computed on first use and dropped by every mutation.
#[derive(Clone, Debug, Default)]
pub struct Query {
    slots: Slots,
    expressions: OnceLock<Vec<Expression>>,
    build_error: Option<String>,
}

impl Query {
    /// Create an empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a query selecting from `table`.
    pub fn table(table: impl Into<Ident>) -> Self {
        Self::new().from(table)
    }

    // ==================== Slot access ====================

    /// Read-only view of the structural slots.
    pub fn slots(&self) -> &Slots {
        &self.slots
    }

    fn slots_mut(&mut self) -> &mut Slots {
        self.expressions.take();
        &mut self.slots
    }

    /// The first invalid builder call, if any.
    pub fn build_error(&self) -> Option<&str> {
        self.build_error.as_deref()
    }

    fn fail(&mut self, message: String) {
        if self.build_error.is_none() {
            self.build_error = Some(message);
        }
    }

    fn check_operator(&mut self, operator: &str) -> String {
        let op = operator.trim().to_ascii_lowercase();
        if !OPERATORS.contains(&op.as_str()) {
            self.fail(format!("invalid operator: {operator}"));
        }
        op
    }

    // ==================== Expression index ====================

    /// Every expression reachable from the slots, in slot order.
    ///
    /// Memoized until the next mutation.
    pub fn expressions(&self) -> &[Expression] {
        self.expressions.get_or_init(|| self.scan_expressions())
    }

    /// Rebuild the expression index.
    pub fn refresh_expressions(&mut self) -> &[Expression] {
        self.expressions.take();
        self.expressions()
    }

    fn scan_expressions(&self) -> Vec<Expression> {
        let s = &self.slots;
        let mut out: Vec<&Expression> = Vec::new();

        if let Some(agg) = &s.aggregate {
            out.extend(agg.columns.iter().filter_map(Ident::expression));
        }
        out.extend(s.columns.iter().filter_map(Ident::expression));
        if let Some(from) = &s.from {
            out.extend(from.expression());
        }
        for join in &s.joins {
            out.extend(join.table.expression());
            for clause in &join.clauses {
                clause.expressions(&mut out);
            }
        }
        for w in &s.wheres {
            w.expressions(&mut out);
        }
        out.extend(s.groups.iter().filter_map(Ident::expression));
        for h in &s.havings {
            h.expressions(&mut out);
        }
        out.extend(s.orders.iter().filter_map(order_expression));

        let mut owned: Vec<Expression> = out.into_iter().cloned().collect();
        for union in &s.unions {
            owned.extend(union.query.expressions().iter().cloned());
        }
        owned.extend(s.union_orders.iter().filter_map(order_expression).cloned());
        owned
    }

    // ==================== SELECT ====================

    /// Replace the selected columns.
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        self.slots_mut().columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Append a column.
    pub fn add_select(mut self, column: impl Into<Ident>) -> Self {
        self.slots_mut().columns.push(column.into());
        self
    }

    /// Append a raw select fragment. The expression's bindings precede `bindings`.
    pub fn select_raw<B: Into<Binding>>(
        mut self,
        expression: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        let raw = RawFragment::with_bindings(expression, bindings);
        self.slots_mut().columns.push(Ident::Raw(raw));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.slots_mut().distinct = Distinct::All;
        self
    }

    /// Postgres `distinct on (columns)`.
    pub fn distinct_on<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.slots_mut().distinct = Distinct::On(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn from(mut self, table: impl Into<Ident>) -> Self {
        self.slots_mut().from = Some(table.into());
        self
    }

    /// Use a raw fragment as the FROM clause.
    pub fn from_raw<B: Into<Binding>>(
        mut self,
        expression: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        self.slots_mut().from = Some(Ident::Raw(RawFragment::with_bindings(expression, bindings)));
        self
    }

    // ==================== JOIN ====================

    /// Add a prepared join.
    pub fn join_with(mut self, join: Join) -> Self {
        self.slots_mut().joins.push(join);
        self
    }

    /// Inner join on a column comparison.
    pub fn join(self, table: impl Into<Ident>, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.join_with(Join::new(JoinKind::Inner, table).on(first, operator, second))
    }

    pub fn left_join(self, table: impl Into<Ident>, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.join_with(Join::new(JoinKind::Left, table).on(first, operator, second))
    }

    pub fn right_join(self, table: impl Into<Ident>, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        self.join_with(Join::new(JoinKind::Right, table).on(first, operator, second))
    }

    pub fn cross_join(self, table: impl Into<Ident>) -> Self {
        self.join_with(Join::new(JoinKind::Cross, table))
    }

    // ==================== WHERE ====================

    fn push_where(&mut self, w: Where) {
        self.slots_mut().wheres.push(w);
    }

    fn basic_where(&mut self, column: Ident, operator: &str, value: SqlValue, boolean: Boolean) {
        let operator = self.check_operator(operator);
        // `= NULL` / `<> NULL` never match; they mean IS [NOT] NULL.
        if value.is_null() && matches!(operator.as_str(), "=" | "!=" | "<>") {
            let negated = operator != "=";
            self.push_where(Where::Null {
                column,
                negated,
                boolean,
            });
            return;
        }
        self.push_where(Where::Basic {
            column,
            operator,
            value,
            boolean,
        });
    }

    /// Add `column op value`; the value may be a bound scalar or an expression.
    pub fn where_(mut self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.basic_where(column.into(), operator, value.into(), Boolean::And);
        self
    }

    pub fn or_where(mut self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.basic_where(column.into(), operator, value.into(), Boolean::Or);
        self
    }

    /// Add a raw predicate. The expression's bindings precede `bindings`.
    pub fn where_raw<B: Into<Binding>>(
        mut self,
        sql: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        self.push_where(Where::Raw {
            fragment: RawFragment::with_bindings(sql, bindings),
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_where_raw<B: Into<Binding>>(
        mut self,
        sql: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        self.push_where(Where::Raw {
            fragment: RawFragment::with_bindings(sql, bindings),
            boolean: Boolean::Or,
        });
        self
    }

    pub fn where_in<V: Into<SqlValue>>(mut self, column: impl Into<Ident>, values: impl IntoIterator<Item = V>) -> Self {
        self.push_where(Where::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_not_in<V: Into<SqlValue>>(mut self, column: impl Into<Ident>, values: impl IntoIterator<Item = V>) -> Self {
        self.push_where(Where::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_null(mut self, column: impl Into<Ident>) -> Self {
        self.push_where(Where::Null {
            column: column.into(),
            negated: false,
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_not_null(mut self, column: impl Into<Ident>) -> Self {
        self.push_where(Where::Null {
            column: column.into(),
            negated: true,
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_between(
        mut self,
        column: impl Into<Ident>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.push_where(Where::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_not_between(
        mut self,
        column: impl Into<Ident>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.push_where(Where::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: true,
            boolean: Boolean::And,
        });
        self
    }

    /// Compare two columns.
    pub fn where_column(mut self, first: impl Into<Ident>, operator: &str, second: impl Into<Ident>) -> Self {
        let operator = self.check_operator(operator);
        self.push_where(Where::Column {
            first: first.into(),
            operator,
            second: second.into(),
            boolean: Boolean::And,
        });
        self
    }

    /// Add a parenthesized group of predicates.
    ///
    /// ```ignore
    /// let q = Query::table("users")
    ///     .where_("active", "=", true)
    ///     .where_nested(|q| q.where_("votes", ">", 100).or_where("name", "=", "Abigail"));
    /// ```
    pub fn where_nested(mut self, f: impl FnOnce(Query) -> Query) -> Self {
        let nested = f(Query::new());
        if let Some(err) = nested.build_error {
            self.fail(err);
        }
        if !nested.slots.wheres.is_empty() {
            self.push_where(Where::Nested {
                query: Box::new(Query {
                    slots: nested.slots,
                    expressions: OnceLock::new(),
                    build_error: None,
                }),
                boolean: Boolean::And,
            });
        }
        self
    }

    fn date_where(mut self, part: DatePart, column: Ident, operator: &str, value: SqlValue) -> Self {
        let operator = self.check_operator(operator);
        self.push_where(Where::Date {
            part,
            column,
            operator,
            value,
            boolean: Boolean::And,
        });
        self
    }

    pub fn where_date(self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.date_where(DatePart::Date, column.into(), operator, value.into())
    }

    pub fn where_time(self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.date_where(DatePart::Time, column.into(), operator, value.into())
    }

    pub fn where_day(self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.date_where(DatePart::Day, column.into(), operator, value.into())
    }

    pub fn where_month(self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.date_where(DatePart::Month, column.into(), operator, value.into())
    }

    pub fn where_year(self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        self.date_where(DatePart::Year, column.into(), operator, value.into())
    }

    // ==================== GROUP BY / HAVING ====================

    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Ident>,
    {
        let columns: Vec<Ident> = columns.into_iter().map(Into::into).collect();
        self.slots_mut().groups.extend(columns);
        self
    }

    /// Add a raw GROUP BY fragment. The expression's bindings precede `bindings`.
    pub fn group_by_raw<B: Into<Binding>>(
        mut self,
        sql: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        let raw = RawFragment::with_bindings(sql, bindings);
        self.slots_mut().groups.push(Ident::Raw(raw));
        self
    }

    fn push_having(&mut self, h: Where) {
        self.slots_mut().havings.push(h);
    }

    pub fn having(mut self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        let operator = self.check_operator(operator);
        self.push_having(Where::Basic {
            column: column.into(),
            operator,
            value: value.into(),
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_having(mut self, column: impl Into<Ident>, operator: &str, value: impl Into<SqlValue>) -> Self {
        let operator = self.check_operator(operator);
        self.push_having(Where::Basic {
            column: column.into(),
            operator,
            value: value.into(),
            boolean: Boolean::Or,
        });
        self
    }

    /// Add a raw HAVING fragment. The expression's bindings precede `bindings`.
    pub fn having_raw<B: Into<Binding>>(
        mut self,
        sql: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        self.push_having(Where::Raw {
            fragment: RawFragment::with_bindings(sql, bindings),
            boolean: Boolean::And,
        });
        self
    }

    pub fn or_having_raw<B: Into<Binding>>(
        mut self,
        sql: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        self.push_having(Where::Raw {
            fragment: RawFragment::with_bindings(sql, bindings),
            boolean: Boolean::Or,
        });
        self
    }

    pub fn having_between(
        mut self,
        column: impl Into<Ident>,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.push_having(Where::Between {
            column: column.into(),
            low: low.into(),
            high: high.into(),
            negated: false,
            boolean: Boolean::And,
        });
        self
    }

    pub fn having_null(mut self, column: impl Into<Ident>) -> Self {
        self.push_having(Where::Null {
            column: column.into(),
            negated: false,
            boolean: Boolean::And,
        });
        self
    }

    pub fn having_not_null(mut self, column: impl Into<Ident>) -> Self {
        self.push_having(Where::Null {
            column: column.into(),
            negated: true,
            boolean: Boolean::And,
        });
        self
    }

    // ==================== ORDER BY / LIMIT / OFFSET ====================

    // After a union, ordering and pagination apply to the combined result.
    fn push_order(&mut self, order: Order) {
        let slots = self.slots_mut();
        if slots.unions.is_empty() {
            slots.orders.push(order);
        } else {
            slots.union_orders.push(order);
        }
    }

    pub fn order_by(mut self, column: impl Into<Ident>) -> Self {
        self.push_order(Order::Column {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<Ident>) -> Self {
        self.push_order(Order::Column {
            column: column.into(),
            descending: true,
        });
        self
    }

    /// Add a raw ORDER BY fragment. The expression's bindings precede `bindings`.
    pub fn order_by_raw<B: Into<Binding>>(
        mut self,
        sql: impl IntoExpression,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        self.push_order(Order::Raw(RawFragment::with_bindings(sql, bindings)));
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        let slots = self.slots_mut();
        if slots.unions.is_empty() {
            slots.limit = Some(n);
        } else {
            slots.union_limit = Some(n);
        }
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        let slots = self.slots_mut();
        if slots.unions.is_empty() {
            slots.offset = Some(n);
        } else {
            slots.union_offset = Some(n);
        }
        self
    }

    // ==================== UNION / LOCK ====================

    pub fn union(mut self, query: Query) -> Self {
        if let Some(err) = &query.build_error {
            self.fail(err.clone());
        }
        self.slots_mut().unions.push(Union {
            query: Box::new(query),
            all: false,
        });
        self
    }

    pub fn union_all(mut self, query: Query) -> Self {
        if let Some(err) = &query.build_error {
            self.fail(err.clone());
        }
        self.slots_mut().unions.push(Union {
            query: Box::new(query),
            all: true,
        });
        self
    }

    pub fn lock_for_update(mut self) -> Self {
        self.slots_mut().lock = Some(Lock::Update);
        self
    }

    pub fn shared_lock(mut self) -> Self {
        self.slots_mut().lock = Some(Lock::Shared);
        self
    }

    pub fn lock_raw(mut self, lock: impl Into<String>) -> Self {
        self.slots_mut().lock = Some(Lock::Raw(lock.into()));
        self
    }

    // ==================== Internal mutation for compiles ====================

    pub(crate) fn with_aggregate(mut self, function: &str, columns: Vec<Ident>) -> Self {
        self.slots_mut().aggregate = Some(Aggregate {
            function: function.to_string(),
            columns,
        });
        self
    }

    // ==================== Compile helpers ====================

    /// Compile as a SELECT for a connection.
    pub fn compile(&self, conn: &dyn Connection) -> ExprResult<crate::compile::CompiledQuery> {
        crate::compile::Compiler::new(conn)?.select(self)
    }

    /// SQL text of the SELECT for a connection.
    pub fn to_sql(&self, conn: &dyn Connection) -> ExprResult<String> {
        Ok(self.compile(conn)?.sql)
    }
}

fn order_expression(order: &Order) -> Option<&Expression> {
    match order {
        Order::Column { column, .. } => column.expression(),
        Order::Raw(raw) => Some(&raw.expr),
    }
}
