//! # sqlexpr
//!
//! SQL expressions that carry their own bindings and resolve per database driver,
//! plus the query builder plumbing that threads them through compilation.
//!
//! ## Features
//!
//! - **Expressions with bindings**: a fragment and its `?` values travel together
//! - **Per-driver grammar**: one logical expression, different SQL per driver and server version
//! - **Explicit rendering context**: resolution never mutates shared grammar state
//! - **Aligned bindings**: the flattened bindings always match the rendered placeholders
//! - **Four dialects**: MySQL, PostgreSQL, SQLite and SQL Server
//!
//! ## Example
//!
//! ```ignore
//! use sqlexpr::{Compiler, Expression, Grammar, StaticConnection, qb};
//!
//! let price = Expression::grammar_with_bindings(
//!     Grammar::new()
//!         .mysql("IF(state = 'TX', ?, ?)")
//!         .postgres("CASE WHEN state = 'TX' THEN ? ELSE ? END"),
//!     [200, 100],
//! );
//!
//! let query = qb::table("products").where_("price", ">", price);
//! let compiled = Compiler::new(&StaticConnection::mysql())?.select(&query)?;
//!
//! assert_eq!(
//!     compiled.sql,
//!     "select * from `products` where `price` > IF(state = 'TX', ?, ?)"
//! );
//! ```

pub mod binding;
pub mod collect;
pub mod compile;
pub mod dialect;
pub mod doctor;
pub mod driver;
pub mod error;
pub mod expr;
pub mod grammar;
pub mod qb;
pub mod value;
pub mod version;

pub use binding::{Binding, NO_BINDINGS};
pub use compile::{CompileConfig, CompilePhase, CompiledQuery, Compiler, PlaceholderStyle, configure};
pub use dialect::Dialect;
pub use doctor::{CheckOutcome, Doctor, DoctorCheck, DoctorReport};
pub use driver::{Connection, Driver, PgConnection, RenderContext, StaticConnection};
pub use error::{ExprError, ExprResult};
pub use expr::{
    Capabilities, Expression, FragmentRef, HasBindings, IntoExpression, IsExpression,
    ProvidesExpression,
};
pub use grammar::Grammar;
pub use qb::{Query, SqlValue, Values};
pub use value::Value;
pub use version::Version;
