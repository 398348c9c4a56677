//! Builder-level tests for the qb module.

use crate::binding::NO_BINDINGS;
use crate::expr::Expression;
use crate::grammar::Grammar;
use crate::qb::{self, Distinct, Ident, Lock, Order, SqlValue, Values, Where};
use crate::value::Value;

#[test]
fn test_table_sets_from() {
    let q = qb::table("users");
    assert!(matches!(&q.slots().from, Some(Ident::Name(n)) if n == "users"));
    assert!(q.slots().columns.is_empty());
    assert!(q.build_error().is_none());
}

#[test]
fn test_where_null_value_becomes_is_null() {
    let q = qb::table("users")
        .where_("deleted_at", "=", Value::Null)
        .where_("email", "<>", Option::<String>::None);

    let wheres = &q.slots().wheres;
    assert!(matches!(wheres[0], Where::Null { negated: false, .. }));
    assert!(matches!(wheres[1], Where::Null { negated: true, .. }));
}

#[test]
fn test_invalid_operator_is_recorded() {
    let q = qb::table("users").where_("id", "= 1; drop table users; --", 1);
    let err = q.build_error().expect("invalid operator must be recorded");
    assert!(err.contains("invalid operator"));
}

#[test]
fn test_first_build_error_wins() {
    let q = qb::table("users")
        .where_("a", "nope", 1)
        .where_("b", "also-nope", 2);
    assert_eq!(q.build_error(), Some("invalid operator: nope"));
}

#[test]
fn test_nested_build_error_propagates() {
    let q = qb::table("users").where_nested(|q| q.where_("a", "bogus", 1));
    assert!(q.build_error().is_some());
}

#[test]
fn test_empty_nested_group_is_dropped() {
    let q = qb::table("users").where_nested(|q| q);
    assert!(q.slots().wheres.is_empty());
}

#[test]
fn test_orders_and_limits_after_union_target_union_slots() {
    let q = qb::table("a")
        .order_by("id")
        .limit(5)
        .union(qb::table("b"))
        .order_by_desc("created_at")
        .limit(10)
        .offset(20);

    let s = q.slots();
    assert_eq!(s.orders.len(), 1);
    assert_eq!(s.limit, Some(5));
    assert_eq!(s.union_orders.len(), 1);
    assert!(matches!(&s.union_orders[0], Order::Column { descending: true, .. }));
    assert_eq!(s.union_limit, Some(10));
    assert_eq!(s.union_offset, Some(20));
    assert_eq!(s.offset, None);
}

#[test]
fn test_lock_and_distinct() {
    let q = qb::table("users").distinct().lock_for_update();
    assert_eq!(q.slots().distinct, Distinct::All);
    assert_eq!(q.slots().lock, Some(Lock::Update));

    let q = qb::table("users").distinct_on(["email"]).shared_lock();
    assert_eq!(q.slots().distinct, Distinct::On(vec!["email".to_string()]));
    assert_eq!(q.slots().lock, Some(Lock::Shared));
}

#[test]
fn test_expression_index_in_slot_order() {
    let column = Expression::raw("price * 2 as doubled");
    let filter = Expression::grammar(Grammar::new().mysql("NOW()").postgres("now()"));
    let order = Expression::raw("rand()");

    let q = qb::table("orders")
        .order_by_raw(order.clone(), NO_BINDINGS)
        .where_("created_at", "<", filter.clone())
        .select([column.clone()]);

    let found = q.expressions();
    assert_eq!(found.len(), 3);
    assert!(found[0].ptr_eq(&column));
    assert!(found[1].ptr_eq(&filter));
    assert!(found[2].ptr_eq(&order));
}

#[test]
fn test_expression_index_covers_unions_and_nested() {
    let inner = Expression::raw("1");
    let nested = Expression::raw("2");
    let q = qb::table("a")
        .where_nested(|q| q.where_("x", "=", nested.clone()))
        .union(qb::table("b").where_("y", "=", inner.clone()));

    let found = q.expressions();
    assert_eq!(found.len(), 2);
    assert!(found[0].ptr_eq(&nested));
    assert!(found[1].ptr_eq(&inner));
}

#[test]
fn test_expression_index_is_memoized_until_mutation() {
    let q = qb::table("users").where_("a", "=", Expression::raw("1"));
    let first = q.expressions().as_ptr();
    assert_eq!(q.expressions().as_ptr(), first);

    let q = q.where_("b", "=", Expression::raw("2"));
    assert_eq!(q.expressions().len(), 2);
}

#[test]
fn test_refresh_expressions() {
    let mut q = qb::table("users").where_("a", "=", Expression::raw("1"));
    assert_eq!(q.refresh_expressions().len(), 1);
}

#[test]
fn test_raw_fragment_keeps_expression_and_caller_bindings() {
    let q = qb::table("orders").where_raw(
        Expression::with_bindings("price > ?", [100]),
        [Value::Int(5)],
    );
    let Where::Raw { fragment, .. } = &q.slots().wheres[0] else {
        panic!("expected a raw predicate");
    };
    assert_eq!(fragment.expr.bindings(), vec![Value::Int(100)]);
    assert_eq!(fragment.bindings.len(), 1);
}

#[test]
fn test_sql_value_from_expression_unwraps_wrapper() {
    let inner = Expression::with_bindings("? + 1", [1]);
    let value = SqlValue::from(Expression::wrap(inner.clone()));
    assert!(value.expression().is_some_and(|e| e.ptr_eq(&inner)));
}

#[test]
fn test_values_replace_in_place() {
    let values = Values::new()
        .set("email", "a@example.com")
        .set("name", "Ada")
        .set("email", "b@example.com");

    let columns: Vec<&str> = values.columns().collect();
    assert_eq!(columns, vec!["email", "name"]);
    assert!(matches!(
        values.get("email"),
        Some(SqlValue::Bind(b)) if b.evaluate() == Value::from("b@example.com")
    ));
}

#[test]
fn test_values_from_iterator() {
    let values: Values = [("a", 1), ("b", 2)].into_iter().collect();
    assert_eq!(values.len(), 2);
    assert!(!values.is_empty());
}
