//! SQL fragments that carry their own bindings.
//!
//! An [`Expression`] is the native fragment type the query builder accepts. It is
//! classified once, when it is built, along two capabilities:
//!
//! - **bindings**: it exposes an ordered list of bind values (possibly deferred)
//! - **grammar**: its text is a [`Grammar`] table resolved per driver at compile time
//!
//! Values defined outside this crate join the same model through the
//! [`IsExpression`] / [`HasBindings`] traits and the adapters in this module.
//!
//! # Example
//!
//! ```ignore
//! use sqlexpr::{Expression, Grammar};
//!
//! // Plain fragment with bindings
//! let price = Expression::with_bindings("IF(state = 'TX', ?, ?)", [200, 100]);
//!
//! // Driver-specific fragment with bindings
//! let geom = Expression::grammar_with_bindings(
//!     Grammar::new()
//!         .mysql("ST_GeomFromText(?, ?, 'axis-order=long-lat')")
//!         .postgres("ST_GeomFromText(?, ?)"),
//!     ["POINT(34 12)".into(), 4236.into()],
//! );
//! ```

mod adapter;

pub use adapter::{IntoExpression, ProvidesExpression};

use crate::binding::{Binding, evaluate_all};
use crate::driver::RenderContext;
use crate::error::ExprResult;
use crate::grammar::Grammar;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Borrowed view of an expression's payload.
///
/// A payload is plain text, a grammar table that still needs a driver, or (for the
/// native wrapper) another expression.
#[derive(Clone, Copy, Debug)]
pub enum FragmentRef<'a> {
    Text(&'a str),
    Grammar(&'a Grammar),
    Expression(&'a Expression),
}

impl FragmentRef<'_> {
    /// Resolve the payload to final SQL text.
    pub fn resolve(&self, ctx: &RenderContext) -> ExprResult<String> {
        match self {
            FragmentRef::Text(text) => Ok((*text).to_string()),
            FragmentRef::Grammar(grammar) => grammar.resolve_in(ctx),
            FragmentRef::Expression(expr) => expr.to_sql_string(ctx),
        }
    }

    /// Check if the payload needs a driver before it becomes text.
    pub fn is_grammar(&self) -> bool {
        match self {
            FragmentRef::Text(_) => false,
            FragmentRef::Grammar(_) => true,
            FragmentRef::Expression(expr) => expr.capabilities().grammar,
        }
    }
}

/// A value that can stand in for a raw SQL fragment.
pub trait IsExpression: Send + Sync {
    /// The fragment payload.
    fn fragment(&self) -> FragmentRef<'_>;

    /// Resolve the fragment to final SQL text.
    fn to_sql_string(&self, ctx: &RenderContext) -> ExprResult<String> {
        self.fragment().resolve(ctx)
    }
}

/// A value that supplies bind parameters for the placeholders in its fragment.
pub trait HasBindings: Send + Sync {
    /// Evaluate the bindings in placeholder order.
    fn bindings(&self) -> Vec<Value>;

    /// Check if there is at least one binding.
    fn has_bindings(&self) -> bool {
        !self.bindings().is_empty()
    }
}

/// The capability set of an expression, fixed at construction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The expression exposes bindings.
    pub bindings: bool,
    /// The expression's text is resolved per driver.
    pub grammar: bool,
}

#[derive(Clone)]
enum Fragment {
    Text(String),
    Grammar(Grammar),
    /// Native wrapper around another expression (`select_raw(expr)` style).
    Wrapped(Expression),
}

trait BindingSource: IsExpression + HasBindings {}

impl<T: IsExpression + HasBindings> BindingSource for T {}

enum Repr {
    Native {
        fragment: Fragment,
        bindings: Vec<Binding>,
    },
    Adapter(Arc<dyn IsExpression>),
    BindingsAdapter(Arc<dyn BindingSource>),
}

/// The native SQL fragment type.
///
/// Cloning is cheap; clones share the fragment (and its grammar resolution cache).
#[derive(Clone)]
pub struct Expression {
    repr: Arc<Repr>,
    caps: Capabilities,
}

impl Expression {
    fn native(fragment: Fragment, bindings: Vec<Binding>) -> Self {
        let caps = Capabilities {
            bindings: !bindings.is_empty()
                || matches!(&fragment, Fragment::Wrapped(inner) if inner.caps.bindings),
            grammar: match &fragment {
                Fragment::Text(_) => false,
                Fragment::Grammar(_) => true,
                Fragment::Wrapped(inner) => inner.caps.grammar,
            },
        };
        Self {
            repr: Arc::new(Repr::Native { fragment, bindings }),
            caps,
        }
    }

    /// A plain SQL fragment without bindings.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::native(Fragment::Text(text.into()), Vec::new())
    }

    /// A SQL fragment with bindings for its `?` placeholders.
    pub fn with_bindings<B: Into<Binding>>(
        text: impl Into<String>,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        Self::native(
            Fragment::Text(text.into()),
            bindings.into_iter().map(Into::into).collect(),
        )
    }

    /// A driver-resolved fragment without bindings.
    pub fn grammar(grammar: Grammar) -> Self {
        Self::native(Fragment::Grammar(grammar), Vec::new())
    }

    /// A driver-resolved fragment with bindings.
    pub fn grammar_with_bindings<B: Into<Binding>>(
        grammar: Grammar,
        bindings: impl IntoIterator<Item = B>,
    ) -> Self {
        Self::native(
            Fragment::Grammar(grammar),
            bindings.into_iter().map(Into::into).collect(),
        )
    }

    /// Wrap an expression in another native layer.
    ///
    /// Raw select/group-by entry points historically wrap whatever they are given,
    /// even when it already is an expression; see [`Expression::unwrap_double`].
    pub fn wrap(inner: Expression) -> Self {
        Self::native(Fragment::Wrapped(inner), Vec::new())
    }

    // ==================== Accessors ====================

    /// The fragment payload (text, grammar table or wrapped expression).
    pub fn value(&self) -> FragmentRef<'_> {
        match self.repr.as_ref() {
            Repr::Native { fragment, .. } => match fragment {
                Fragment::Text(text) => FragmentRef::Text(text),
                Fragment::Grammar(grammar) => FragmentRef::Grammar(grammar),
                Fragment::Wrapped(inner) => FragmentRef::Expression(inner),
            },
            Repr::Adapter(source) => source.fragment(),
            Repr::BindingsAdapter(source) => source.fragment(),
        }
    }

    /// The capability set decided at construction.
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Check if the text is resolved per driver.
    pub fn is_grammar(&self) -> bool {
        self.caps.grammar
    }

    /// Check if this expression adapts a foreign [`IsExpression`] value.
    pub fn is_adapter(&self) -> bool {
        !matches!(self.repr.as_ref(), Repr::Native { .. })
    }

    /// Resolve to final SQL text for a rendering context.
    ///
    /// Grammar-backed expressions fail when neither the context nor the grammar's own
    /// ambient settings name a driver with a registered fragment.
    pub fn to_sql_string(&self, ctx: &RenderContext) -> ExprResult<String> {
        self.value().resolve(ctx)
    }

    /// Resolve using only the grammar's ambient driver/version.
    pub fn resolve_ambient(&self) -> ExprResult<String> {
        self.to_sql_string(&RenderContext::unset())
    }

    /// Check if the expression supplies at least one binding.
    pub fn has_bindings(&self) -> bool {
        match self.repr.as_ref() {
            Repr::Native {
                fragment: Fragment::Wrapped(inner),
                bindings,
            } => inner.has_bindings() || !bindings.is_empty(),
            Repr::Native { bindings, .. } => !bindings.is_empty(),
            Repr::Adapter(_) => false,
            Repr::BindingsAdapter(source) => source.has_bindings(),
        }
    }

    /// Evaluate the bindings. Deferred bindings are invoked on every call.
    ///
    /// A native wrapper yields the wrapped expression's bindings before its own.
    pub fn bindings(&self) -> Vec<Value> {
        match self.repr.as_ref() {
            Repr::Native {
                fragment: Fragment::Wrapped(inner),
                bindings,
            } => {
                let mut out = inner.bindings();
                out.extend(evaluate_all(bindings));
                out
            }
            Repr::Native { bindings, .. } => evaluate_all(bindings),
            Repr::Adapter(_) => Vec::new(),
            Repr::BindingsAdapter(source) => source.bindings(),
        }
    }

    /// Collapse exactly one redundant native wrapper.
    ///
    /// A wrapper is redundant when it carries no bindings of its own; its inner
    /// expression then fully describes the fragment. Anything else is returned as is.
    pub fn unwrap_double(self) -> Self {
        match self.repr.as_ref() {
            Repr::Native {
                fragment: Fragment::Wrapped(inner),
                bindings,
            } if bindings.is_empty() => inner.clone(),
            _ => self,
        }
    }

    /// Check if this is a native wrapper around another expression.
    pub fn is_double_wrapped(&self) -> bool {
        matches!(
            self.repr.as_ref(),
            Repr::Native {
                fragment: Fragment::Wrapped(_),
                ..
            }
        )
    }

    /// Check if two handles share the same underlying fragment.
    pub fn ptr_eq(&self, other: &Expression) -> bool {
        Arc::ptr_eq(&self.repr, &other.repr)
    }
}

impl IsExpression for Expression {
    fn fragment(&self) -> FragmentRef<'_> {
        self.value()
    }

    fn to_sql_string(&self, ctx: &RenderContext) -> ExprResult<String> {
        Expression::to_sql_string(self, ctx)
    }
}

impl HasBindings for Expression {
    fn bindings(&self) -> Vec<Value> {
        Expression::bindings(self)
    }

    fn has_bindings(&self) -> bool {
        Expression::has_bindings(self)
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Expression");
        match self.repr.as_ref() {
            Repr::Native { fragment, bindings } => {
                match fragment {
                    Fragment::Text(text) => d.field("text", text),
                    Fragment::Grammar(grammar) => d.field("grammar", grammar),
                    Fragment::Wrapped(inner) => d.field("wrapped", inner),
                };
                d.field("bindings", bindings);
            }
            Repr::Adapter(_) => {
                d.field("adapter", &"IsExpression");
            }
            Repr::BindingsAdapter(_) => {
                d.field("adapter", &"IsExpression + HasBindings");
            }
        }
        d.field("capabilities", &self.caps).finish()
    }
}

impl fmt::Display for Expression {
    /// Resolves with the grammar's ambient context. An unresolvable grammar prints the
    /// resolution error instead of SQL; compiled queries always use
    /// [`Expression::to_sql_string`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve_ambient() {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<{e}>"),
        }
    }
}

impl Grammar {
    /// Resolve for a driver and return the text as a plain expression.
    pub fn expression(&self, driver: impl Into<crate::driver::Driver>) -> ExprResult<Expression> {
        Ok(Expression::raw(self.resolve_for(driver, None)?))
    }
}
