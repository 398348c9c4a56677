//! The query builder that carries expressions.
//!
//! A [`Query`] stores columns, predicates, groups, orders and unions in typed
//! [`Slots`]. Any value position accepts either a plain scalar (bound as `?`) or an
//! [`Expression`](crate::Expression), which is rendered inline and contributes its own
//! bindings in place.
//!
//! # Usage
//!
//! ```ignore
//! use sqlexpr::{Compiler, Expression, Grammar, StaticConnection, qb};
//!
//! let tax = Expression::with_bindings("price * ? as price_with_tax", [1.19]);
//!
//! let query = qb::table("orders")
//!     .select([tax])
//!     .where_("state", "=", "TX")
//!     .order_by_desc("created_at")
//!     .limit(10);
//!
//! let compiled = Compiler::new(&StaticConnection::mysql())?.select(&query)?;
//! // select price * ? as price_with_tax from `orders` where `state` = ? order by `created_at` desc limit 10
//! // bindings: [1.19, "TX"]
//!
//! // UPDATE with an expression value
//! let values = qb::Values::new()
//!     .set("email", "test@example.com")
//!     .set("updated_at", Expression::raw("now()"));
//! ```

mod builder;
mod clause;

pub use builder::{Query, Slots};
pub use clause::{
    Aggregate, Boolean, DatePart, Distinct, Ident, Join, JoinKind, Lock, Order, RawFragment,
    SqlValue, Union, Values, Where,
};

/// Create a query selecting from `table`.
///
/// # Example
/// ```ignore
/// let query = sqlexpr::qb::table("users").where_("id", "=", 1);
/// ```
pub fn table(table: impl Into<Ident>) -> Query {
    Query::table(table)
}

/// Create a query without a table (e.g. for nested predicate groups).
pub fn query() -> Query {
    Query::new()
}

#[cfg(test)]
mod tests;
