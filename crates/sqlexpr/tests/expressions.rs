//! End-to-end behaviour of expressions compiled through the query builder.

use sqlexpr::qb::{self, Values};
use sqlexpr::{
    Compiler, ExprError, Expression, FragmentRef, Grammar, HasBindings, IsExpression,
    NO_BINDINGS, ProvidesExpression, RenderContext, StaticConnection, Value,
};
use std::sync::{Arc, Mutex};

fn price() -> Expression {
    Expression::grammar_with_bindings(
        Grammar::new()
            .mysql("IF(state = 'TX', ?, ?)")
            .postgres("CASE WHEN state = 'TX' THEN ? ELSE ? END"),
        [200, 100],
    )
}

#[test]
fn grammar_expression_compiles_per_driver() {
    let q = qb::table("products").where_("price", ">", price());

    let mysql = q.compile(&StaticConnection::mysql()).unwrap();
    assert_eq!(mysql.sql, "select * from `products` where `price` > IF(state = 'TX', ?, ?)");
    assert_eq!(mysql.bindings, vec![Value::Int(200), Value::Int(100)]);

    let pgsql = q.compile(&StaticConnection::postgres()).unwrap();
    assert_eq!(
        pgsql.sql,
        r#"select * from "products" where "price" > CASE WHEN state = 'TX' THEN ? ELSE ? END"#
    );
    assert_eq!(pgsql.bindings, mysql.bindings);
}

#[test]
fn unregistered_driver_fails_with_listing() {
    let q = qb::table("products").where_("price", ">", price());
    let err = q.compile(&StaticConnection::sqlite()).unwrap_err();

    let ExprError::GrammarNotDefinedForDriver { driver, registered } = &err else {
        panic!("unexpected error: {err:?}");
    };
    assert_eq!(driver, "sqlite");
    assert!(registered.contains("mysql"));
    assert!(registered.contains("pgsql"));
}

#[test]
fn compiles_for_different_drivers_do_not_leak() {
    let shared = price();
    let q = qb::table("products").where_("price", ">", &shared);

    let a = q.to_sql(&StaticConnection::postgres()).unwrap();
    let b = q.to_sql(&StaticConnection::mysql()).unwrap();
    let c = q.to_sql(&StaticConnection::postgres()).unwrap();

    assert_eq!(a, c);
    assert!(b.contains("IF("));
    assert!(!c.contains("IF("));
}

#[test]
fn versioned_fragments_follow_server_version() {
    let agg = Expression::grammar(
        Grammar::new()
            .mysql("GROUP_CONCAT(name)")
            .mysql_version("JSON_ARRAYAGG(name)", "5.7.22"),
    );
    let q = qb::table("users").select([agg]);

    let old = q.to_sql(&StaticConnection::mysql().with_version("5.6.51")).unwrap();
    let new = q.to_sql(&StaticConnection::mysql().with_version("8.0.35")).unwrap();
    let unknown = q.to_sql(&StaticConnection::mysql()).unwrap();

    assert_eq!(old, "select GROUP_CONCAT(name) from `users`");
    assert_eq!(new, "select JSON_ARRAYAGG(name) from `users`");
    assert_eq!(unknown, old);
}

#[test]
fn version_without_default_fragment_fails() {
    let e = Expression::grammar(Grammar::new().postgres_version("gen_random_uuid()", "13"));
    let q = qb::table("t").select([e]);

    let err = q
        .to_sql(&StaticConnection::postgres().with_version("12.4"))
        .unwrap_err();
    assert!(matches!(err, ExprError::GrammarNotDefinedForVersion { ref version, .. } if version == "12.4"));
    assert!(q.to_sql(&StaticConnection::postgres().with_version("13")).is_ok());
}

// ==================== Value objects ====================

struct Point {
    coords: Arc<Mutex<(f64, f64)>>,
}

impl ProvidesExpression for Point {
    fn expression(&self) -> Expression {
        let text = self.coords.clone();
        Expression::grammar_with_bindings(
            Grammar::new()
                .mysql("ST_GeomFromText(?, ?, 'axis-order=long-lat')")
                .postgres("ST_GeomFromText(?, ?)"),
            [
                sqlexpr::Binding::deferred(move || {
                    let (lat, lng) = *text.lock().unwrap();
                    format!("POINT({lng} {lat})")
                }),
                sqlexpr::Binding::from(4326),
            ],
        )
    }
}

#[test]
fn value_object_bindings_are_read_at_compile_time() {
    let coords = Arc::new(Mutex::new((30.2, -97.7)));
    let point = Point {
        coords: coords.clone(),
    };
    let values = Values::new().set("point", point.expression());
    let q = qb::table("points").where_("id", "=", 1);
    let compiler = Compiler::new(&StaticConnection::mysql()).unwrap();

    let first = compiler.update(&q, &values).unwrap();
    assert_eq!(first.bindings[0], Value::from("POINT(-97.7 30.2)"));

    *coords.lock().unwrap() = (52.5, 13.4);
    let second = compiler.update(&q, &values).unwrap();
    assert_eq!(second.bindings[0], Value::from("POINT(13.4 52.5)"));
    assert_eq!(second.sql, first.sql);
}

// ==================== Foreign expressions ====================

struct Now;

impl IsExpression for Now {
    fn fragment(&self) -> FragmentRef<'_> {
        FragmentRef::Text("now()")
    }
}

struct Between {
    low: i64,
    high: i64,
}

impl IsExpression for Between {
    fn fragment(&self) -> FragmentRef<'_> {
        FragmentRef::Text("score between ? and ?")
    }
}

impl HasBindings for Between {
    fn bindings(&self) -> Vec<Value> {
        vec![Value::Int(self.low), Value::Int(self.high)]
    }
}

#[test]
fn foreign_expressions_are_adapted() {
    let q = qb::table("events")
        .where_("created_at", "<", Expression::adapt(Now))
        .where_raw(Expression::adapt_with_bindings(Between { low: 1, high: 5 }), NO_BINDINGS);
    let compiled = q.compile(&StaticConnection::postgres()).unwrap();

    assert_eq!(
        compiled.sql,
        r#"select * from "events" where "created_at" < now() and score between ? and ?"#
    );
    assert_eq!(compiled.bindings, vec![Value::Int(1), Value::Int(5)]);
}

#[test]
fn raw_and_expression_bindings_keep_order() {
    let q = qb::table("orders").where_raw(
        Expression::with_bindings("price > ? and state = ?", [Value::Int(100), Value::from("TX")]),
        NO_BINDINGS,
    );
    let compiled = q.compile(&StaticConnection::mysql()).unwrap();
    assert_eq!(compiled.bindings, vec![Value::Int(100), Value::from("TX")]);

    let ctx = RenderContext::new("mysql");
    assert_eq!(
        Compiler::for_context(ctx).unwrap().select(&q).unwrap(),
        compiled
    );
}
