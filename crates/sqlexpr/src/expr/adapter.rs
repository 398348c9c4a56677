use super::{Capabilities, Expression, HasBindings, IsExpression, Repr};
use crate::grammar::Grammar;
use std::any::Any;
use std::sync::Arc;

impl Expression {
    /// Adapt a foreign expression so the builder can treat it as native.
    ///
    /// Adapting something that already is an [`Expression`] returns it unchanged, so
    /// calling this twice never nests adapters.
    pub fn adapt<E: IsExpression + 'static>(source: E) -> Self {
        if let Some(native) = (&source as &dyn Any).downcast_ref::<Expression>() {
            return native.clone();
        }
        let grammar = source.fragment().is_grammar();
        Self {
            repr: Arc::new(Repr::Adapter(Arc::new(source))),
            caps: Capabilities {
                bindings: false,
                grammar,
            },
        }
    }

    /// Adapt a foreign expression that also supplies bindings.
    ///
    /// The source's bindings are read each time the adapter's bindings are read.
    pub fn adapt_with_bindings<E: IsExpression + HasBindings + 'static>(source: E) -> Self {
        if let Some(native) = (&source as &dyn Any).downcast_ref::<Expression>() {
            return native.clone();
        }
        let grammar = source.fragment().is_grammar();
        Self {
            repr: Arc::new(Repr::BindingsAdapter(Arc::new(source))),
            caps: Capabilities {
                bindings: true,
                grammar,
            },
        }
    }
}

/// Conversion into the native expression type.
///
/// Every builder entry point that takes a raw fragment goes through this trait, so a
/// redundant native wrapper is collapsed before the fragment reaches a slot.
pub trait IntoExpression {
    fn into_expression(self) -> Expression;
}

impl IntoExpression for Expression {
    fn into_expression(self) -> Expression {
        self.unwrap_double()
    }
}

impl IntoExpression for &Expression {
    fn into_expression(self) -> Expression {
        self.clone().unwrap_double()
    }
}

impl IntoExpression for &str {
    fn into_expression(self) -> Expression {
        Expression::raw(self)
    }
}

impl IntoExpression for String {
    fn into_expression(self) -> Expression {
        Expression::raw(self)
    }
}

impl IntoExpression for &String {
    fn into_expression(self) -> Expression {
        Expression::raw(self.as_str())
    }
}

impl IntoExpression for Grammar {
    fn into_expression(self) -> Expression {
        Expression::grammar(self)
    }
}

/// A domain object that can describe itself as a SQL expression.
///
/// ```ignore
/// struct Point { lat: f64, lng: f64, srid: i32 }
///
/// impl ProvidesExpression for Point {
///     fn expression(&self) -> Expression {
///         Expression::with_bindings("ST_SRID(Point(?, ?), ?)", [
///             Binding::from(self.lng), self.lat.into(), self.srid.into(),
///         ])
///     }
/// }
/// ```
pub trait ProvidesExpression {
    fn expression(&self) -> Expression;
}
