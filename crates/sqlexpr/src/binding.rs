//! Literal and deferred ("late") bindings.

use crate::value::Value;
use std::fmt;
use std::sync::Arc;

type Thunk = Arc<dyn Fn() -> Value + Send + Sync>;

/// A binding attached to an expression.
///
/// `Deferred` bindings are evaluated each time bindings are collected, so an expression
/// built over mutable state reports the state as it is at compile time, not at
/// construction time.
#[derive(Clone)]
pub enum Binding {
    Value(Value),
    Deferred(Thunk),
}

impl Binding {
    /// Create a literal binding.
    pub fn value(value: impl Into<Value>) -> Self {
        Binding::Value(value.into())
    }

    /// Create a late binding from a zero-argument closure.
    ///
    /// # Example
    /// ```ignore
    /// let price = Arc::new(AtomicI64::new(100));
    /// let p = price.clone();
    /// let binding = Binding::deferred(move || p.load(Ordering::SeqCst));
    /// ```
    pub fn deferred<F, T>(f: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Value>,
    {
        Binding::Deferred(Arc::new(move || f().into()))
    }

    /// Evaluate the binding. Deferred bindings are re-invoked on every call.
    pub fn evaluate(&self) -> Value {
        match self {
            Binding::Value(v) => v.clone(),
            Binding::Deferred(f) => f(),
        }
    }

    /// Check if the binding is evaluated lazily.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Binding::Deferred(_))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Binding::Deferred(_) => f.debug_tuple("Deferred").field(&"<fn>").finish(),
        }
    }
}

macro_rules! impl_binding_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Binding {
                fn from(v: $t) -> Self {
                    Binding::Value(Value::from(v))
                }
            }
        )*
    };
}

impl_binding_from!(
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
    chrono::NaiveDate
);

impl From<Value> for Binding {
    fn from(v: Value) -> Self {
        Binding::Value(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Binding {
    fn from(v: Option<T>) -> Self {
        Binding::Value(Value::from(v))
    }
}

/// Empty binding list for raw entry points (`where_raw(sql, NO_BINDINGS)`).
pub const NO_BINDINGS: [Binding; 0] = [];

/// Evaluate a list of bindings in order.
pub fn evaluate_all(bindings: &[Binding]) -> Vec<Value> {
    bindings.iter().map(Binding::evaluate).collect()
}
