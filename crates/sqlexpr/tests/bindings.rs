//! Flattened bindings line up with rendered placeholders in every slot.

use sqlexpr::qb::{self, Join, JoinKind, Query, Values};
use sqlexpr::{Compiler, Driver, Expression, Grammar, RenderContext, Value};

fn compiler(driver: Driver) -> Compiler {
    Compiler::for_context(RenderContext::new(driver)).unwrap()
}

fn ints(range: std::ops::RangeInclusive<i64>) -> Vec<Value> {
    range.map(Value::Int).collect()
}

/// One binding in every slot that can carry one, numbered in render order.
fn every_slot() -> Query {
    qb::query()
        .select_raw("a + ? as x", [1])
        .from_raw("(select * from t where k = ?) as t", [2])
        .join_with(
            Join::new(JoinKind::Inner, "u")
                .on("u.id", "=", "t.uid")
                .where_("u.flag", "=", 3),
        )
        .where_("t.v", ">", Expression::with_bindings("? * ?", [4, 5]))
        .group_by_raw("bucket(?)", [6])
        .having("cnt", ">", 7)
        .order_by_raw("field(id, ?)", [8])
        .union(qb::table("w").where_("z", "=", 9))
        .order_by_raw("rank(?)", [10])
}

#[test]
fn select_bindings_follow_slot_order() {
    let compiled = compiler(Driver::MySql).select(&every_slot()).unwrap();

    assert_eq!(
        compiled.sql,
        "(select a + ? as x from (select * from t where k = ?) as t \
         inner join `u` on `u`.`id` = `t`.`uid` and `u`.`flag` = ? \
         where `t`.`v` > ? * ? group by bucket(?) having `cnt` > ? order by field(id, ?)) \
         union (select * from `w` where `z` = ?) order by rank(?)"
    );
    assert_eq!(compiled.bindings, ints(1..=10));
}

#[test]
fn placeholders_match_bindings_for_every_driver() {
    for driver in Driver::known() {
        let compiled = compiler(driver.clone()).select(&every_slot()).unwrap();
        assert_eq!(compiled.placeholder_count(), compiled.bindings.len(), "{driver}");
        assert_eq!(compiled.bindings, ints(1..=10), "{driver}");
    }
}

#[test]
fn grammar_expressions_in_every_slot() {
    let g = |mysql: &str, other: &str, value: i64| {
        Expression::grammar_with_bindings(
            Grammar::new()
                .mysql(mysql)
                .postgres(other)
                .sqlite(other)
                .sql_server(other),
            [value],
        )
    };
    let q = qb::table("t")
        .select([g("IFNULL(?, 0) as a", "COALESCE(?, 0) as a", 1)])
        .where_("b", "=", g("UPPER(?)", "upper(?)", 2))
        .group_by_raw(g("MOD(id, ?)", "id % ?", 3), sqlexpr::NO_BINDINGS)
        .order_by_raw(g("RAND(?)", "random() * ?", 4), sqlexpr::NO_BINDINGS);

    for driver in Driver::known() {
        let compiled = compiler(driver.clone()).select(&q).unwrap();
        assert_eq!(compiled.bindings, ints(1..=4), "{driver}");
    }
    assert_eq!(
        compiler(Driver::MySql).select(&q).unwrap().sql,
        "select IFNULL(?, 0) as a from `t` where `b` = UPPER(?) group by MOD(id, ?) order by RAND(?)"
    );
}

#[test]
fn aggregate_over_union_keeps_column_bindings() {
    let q = qb::table("a")
        .select_raw("? as tag", [1])
        .union(qb::table("b").select_raw("? as tag", [2]));
    let compiled = compiler(Driver::MySql).count(&q).unwrap();

    assert_eq!(
        compiled.sql,
        "select count(*) as `aggregate` from ((select ? as tag from `a`) union (select ? as tag from `b`)) as `temp_table`"
    );
    assert_eq!(compiled.bindings, ints(1..=2));
}

#[test]
fn insert_bindings_are_row_major() {
    let rows = [
        Values::new().set("a", 1).set("b", Expression::with_bindings("? + ?", [2, 3])),
        Values::new().set("b", Expression::with_bindings("? + ?", [5, 6])).set("a", 4),
    ];
    let compiled = compiler(Driver::Postgres)
        .insert(&qb::table("t"), &rows)
        .unwrap();

    assert_eq!(
        compiled.sql,
        r#"insert into "t" ("a", "b") values (?, ? + ?), (?, ? + ?)"#
    );
    assert_eq!(compiled.bindings, ints(1..=6));
}

#[test]
fn upsert_bindings_put_rows_before_assignments() {
    let rows = [Values::new().set("id", 1).set("hits", 2)];
    let assignments = Values::new().set("hits", Expression::with_bindings(r#""t"."hits" + ?"#, [3]));
    let compiled = compiler(Driver::Sqlite)
        .upsert_with(&qb::table("t"), &rows, &["id"], &[], &assignments)
        .unwrap();

    assert_eq!(
        compiled.sql,
        r#"insert into "t" ("id", "hits") values (?, ?) on conflict ("id") do update set "hits" = "t"."hits" + ?"#
    );
    assert_eq!(compiled.bindings, ints(1..=3));
}

#[test]
fn delete_bindings_follow_joins_wheres_orders() {
    let q = qb::table("posts")
        .join_with(
            Join::new(JoinKind::Inner, "users")
                .on("users.id", "=", "posts.user_id")
                .where_("users.banned", "=", 1),
        )
        .where_("posts.score", "<", 2)
        .order_by_raw("field(posts.id, ?)", [3])
        .limit(100);
    let compiled = compiler(Driver::MySql).delete(&q).unwrap();

    assert_eq!(
        compiled.sql,
        "delete `posts` from `posts` inner join `users` on `users`.`id` = `posts`.`user_id` and `users`.`banned` = ? \
         where `posts`.`score` < ? order by field(posts.id, ?) limit 100"
    );
    assert_eq!(compiled.bindings, ints(1..=3));
}

#[test]
fn deferred_bindings_are_evaluated_per_compile() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    let counter = Arc::new(AtomicI64::new(0));
    let c = counter.clone();
    let q = qb::table("t").where_(
        "n",
        "=",
        sqlexpr::SqlValue::deferred(move || c.fetch_add(1, Ordering::SeqCst)),
    );
    let compiler = compiler(Driver::MySql);

    assert_eq!(compiler.select(&q).unwrap().bindings, vec![Value::Int(0)]);
    assert_eq!(compiler.select(&q).unwrap().bindings, vec![Value::Int(1)]);
}

#[test]
fn raw_table_bindings_lead_every_statement() {
    let q = qb::query()
        .from_raw("`t` partition (?)", ["p0"])
        .where_("id", "=", 1);
    let c = compiler(Driver::MySql);
    let p0 = Value::from("p0");

    let select = c.select(&q).unwrap();
    assert_eq!(select.bindings, vec![p0.clone(), Value::Int(1)]);

    let update = c.update(&q, &Values::new().set("name", "x")).unwrap();
    assert_eq!(update.sql, "update `t` partition (?) set `name` = ? where `id` = ?");
    assert_eq!(update.bindings, vec![p0.clone(), Value::from("x"), Value::Int(1)]);

    let delete = c.delete(&q).unwrap();
    assert_eq!(delete.sql, "delete from `t` partition (?) where `id` = ?");
    assert_eq!(delete.bindings, vec![p0.clone(), Value::Int(1)]);

    let insert = c.insert(&q, &[Values::new().set("name", "x")]).unwrap();
    assert_eq!(insert.sql, "insert into `t` partition (?) (`name`) values (?)");
    assert_eq!(insert.bindings, vec![p0.clone(), Value::from("x")]);

    let source = qb::table("staging").select(["name"]).where_("batch", "=", 7);
    let insert_using = c.insert_using(&q, &["name"], &source).unwrap();
    assert_eq!(insert_using.bindings, vec![p0, Value::Int(7)]);
}

#[test]
fn wrapped_expressions_keep_inner_bindings() {
    let inner = Expression::with_bindings("price + ?", [5]);
    let q = qb::table("t").where_("x", "=", Expression::wrap(Expression::wrap(inner)));
    let compiled = compiler(Driver::MySql).select(&q).unwrap();

    assert_eq!(compiled.sql, "select * from `t` where `x` = price + ?");
    assert_eq!(compiled.bindings, vec![Value::Int(5)]);
}

#[test]
fn mysql_backslash_escaped_literals_are_not_miscounted() {
    let q = qb::table("users").where_raw(r"name <> 'it\'s' and id = ?", [1]);
    let compiled = compiler(Driver::MySql).select(&q).unwrap();

    assert_eq!(compiled.sql, r"select * from `users` where name <> 'it\'s' and id = ?");
    assert_eq!(compiled.bindings, vec![Value::Int(1)]);
}
