use crate::binding::NO_BINDINGS;
use crate::compile::{CompiledQuery, Compiler};
use crate::driver::{Driver, RenderContext};
use crate::error::ExprError;
use crate::expr::Expression;
use crate::grammar::Grammar;
use crate::qb::{self, Join, JoinKind, Query, Values};
use crate::value::Value;

fn compiler(driver: Driver) -> Compiler {
    Compiler::for_context(RenderContext::new(driver)).expect("built-in dialect")
}

fn select(driver: Driver, query: &Query) -> CompiledQuery {
    compiler(driver).select(query).expect("select compiles")
}

fn geometry() -> Expression {
    Expression::grammar_with_bindings(
        Grammar::new()
            .mysql("ST_GeomFromText(?, ?, 'axis-order=long-lat')")
            .postgres("ST_GeomFromText(?, ?)"),
        [Value::from("POINT(-97.7 30.2)"), Value::from(4326)],
    )
}

// ==================== Identifiers ====================

#[test]
fn test_wrap_qualified_and_aliased_names() {
    let q = qb::table("users as u").select(["u.id as uid", "orders.*"]);

    assert_eq!(
        select(Driver::MySql, &q).sql,
        "select `u`.`id` as `uid`, `orders`.* from `users` as `u`"
    );
    assert_eq!(
        select(Driver::Postgres, &q).sql,
        r#"select "u"."id" as "uid", "orders".* from "users" as "u""#
    );
    assert_eq!(
        select(Driver::SqlServer, &q).sql,
        "select [u].[id] as [uid], [orders].* from [users] as [u]"
    );
}

#[test]
fn test_quote_characters_are_escaped() {
    let q = qb::table("we`ird");
    assert_eq!(select(Driver::MySql, &q).sql, "select * from `we``ird`");
}

// ==================== MySQL ====================

#[test]
fn test_mysql_select_raw_with_expression_bindings() {
    let q = qb::table("orders").select_raw(
        Expression::with_bindings("price * ? as price_with_tax", [1.0825]),
        NO_BINDINGS,
    );
    let compiled = select(Driver::MySql, &q);

    assert_eq!(compiled.sql, "select price * ? as price_with_tax from `orders`");
    assert_eq!(compiled.bindings, vec![Value::Float(1.0825)]);
}

#[test]
fn test_mysql_group_by_raw_keeps_binding_order() {
    let q = qb::table("orders")
        .group_by_raw(Expression::with_bindings("price > ?", [100]), NO_BINDINGS)
        .group_by_raw("department > ?", [1560]);
    let compiled = select(Driver::MySql, &q);

    assert_eq!(compiled.sql, "select * from `orders` group by price > ?, department > ?");
    assert_eq!(compiled.bindings, vec![Value::Int(100), Value::Int(1560)]);
}

#[test]
fn test_mysql_where_date_with_expression_value() {
    let q = qb::table("audits").where_date(
        "created_at",
        "=",
        Expression::with_bindings("DATE_ADD(?, ?)", [Value::from("2021-01-01"), Value::from("INTERVAL 1 DAY")]),
    );
    let compiled = select(Driver::MySql, &q);

    assert_eq!(compiled.sql, "select * from `audits` where date(`created_at`) = DATE_ADD(?, ?)");
    assert_eq!(compiled.bindings.len(), 2);
}

#[test]
fn test_mysql_update_with_grammar_expression() {
    let q = qb::table("points").where_("id", "=", 1);
    let values = Values::new()
        .set("email", "test@example.com")
        .set("point", geometry());
    let compiled = compiler(Driver::MySql).update(&q, &values).unwrap();

    assert_eq!(
        compiled.sql,
        "update `points` set `email` = ?, `point` = ST_GeomFromText(?, ?, 'axis-order=long-lat') where `id` = ?"
    );
    assert_eq!(
        compiled.bindings,
        vec![
            Value::from("test@example.com"),
            Value::from("POINT(-97.7 30.2)"),
            Value::Int(4326),
            Value::Int(1),
        ]
    );
}

#[test]
fn test_mysql_upsert_copies_columns() {
    let row = Values::new()
        .set("email", "test@example.com")
        .set("point", geometry());
    let compiled = compiler(Driver::MySql)
        .upsert(&qb::table("points"), &[row], &["email"], &["point"])
        .unwrap();

    assert_eq!(
        compiled.sql,
        "insert into `points` (`email`, `point`) values (?, ST_GeomFromText(?, ?, 'axis-order=long-lat')) \
         on duplicate key update `point` = values(`point`)"
    );
    assert_eq!(compiled.bindings.len(), 3);
}

#[test]
fn test_mysql_offset_without_limit() {
    let q = qb::table("users").offset(5);
    assert_eq!(
        select(Driver::MySql, &q).sql,
        "select * from `users` limit 18446744073709551615 offset 5"
    );
}

#[test]
fn test_mysql_locks() {
    assert_eq!(
        select(Driver::MySql, &qb::table("users").lock_for_update()).sql,
        "select * from `users` for update"
    );
    assert_eq!(
        select(Driver::MySql, &qb::table("users").shared_lock()).sql,
        "select * from `users` lock in share mode"
    );
}

#[test]
fn test_mysql_delete_with_join() {
    let q = qb::table("users")
        .join("posts", "users.id", "=", "posts.user_id")
        .where_("posts.spam", "=", true);
    let compiled = compiler(Driver::MySql).delete(&q).unwrap();

    assert_eq!(
        compiled.sql,
        "delete `users` from `users` inner join `posts` on `users`.`id` = `posts`.`user_id` where `posts`.`spam` = ?"
    );
    assert_eq!(compiled.bindings, vec![Value::Bool(true)]);
}

#[test]
fn test_mysql_update_with_order_and_limit() {
    let q = qb::table("jobs").where_("state", "=", "queued").order_by("id").limit(10);
    let values = Values::new().set("state", "claimed");
    let compiled = compiler(Driver::MySql).update(&q, &values).unwrap();

    assert_eq!(
        compiled.sql,
        "update `jobs` set `state` = ? where `state` = ? order by `id` asc limit 10"
    );
}

#[test]
fn test_mysql_json_path_update() {
    let q = qb::table("users").where_("id", "=", 1);
    let values = Values::new().set("options->language", "en");
    let compiled = compiler(Driver::MySql).update(&q, &values).unwrap();

    assert_eq!(
        compiled.sql,
        r#"update `users` set `options` = json_set(`options`, '$."language"', ?) where `id` = ?"#
    );
}

#[test]
fn test_json_path_keys_with_quotes_are_rejected() {
    let q = qb::table("users").where_("id", "=", 1);
    for driver in [Driver::MySql, Driver::Postgres] {
        for column in ["options->it's", r#"options->a"b"#, r"options->a\b", "options->"] {
            let values = Values::new().set(column, "en");
            let err = compiler(driver.clone()).update(&q, &values).unwrap_err();
            assert!(matches!(err, ExprError::Validation(_)), "{driver} {column}: {err:?}");
        }
    }
    assert_eq!(
        compiler(Driver::Postgres)
            .update(&q, &Values::new().set("options->ui->theme", "dark"))
            .unwrap()
            .sql,
        r#"update "users" set "options" = jsonb_set("options"::jsonb, '{"ui","theme"}', ?) where "id" = ?"#
    );
}

#[test]
fn test_mysql_empty_insert_and_ignore() {
    let c = compiler(Driver::MySql);
    assert_eq!(
        c.insert(&qb::table("users"), &[]).unwrap().sql,
        "insert into `users` () values ()"
    );
    let row = Values::new().set("email", "a@example.com");
    assert_eq!(
        c.insert_or_ignore(&qb::table("users"), &[row]).unwrap().sql,
        "insert ignore into `users` (`email`) values (?)"
    );
}

// ==================== Predicates ====================

#[test]
fn test_nested_and_in_predicates() {
    let q = qb::table("users")
        .where_("active", "=", true)
        .where_nested(|q| q.where_("votes", ">", 100).or_where("name", "=", "Abigail"))
        .where_in("role", ["admin", "owner"])
        .where_not_null("email");
    let compiled = select(Driver::MySql, &q);

    assert_eq!(
        compiled.sql,
        "select * from `users` where `active` = ? and (`votes` > ? or `name` = ?) \
         and `role` in (?, ?) and `email` is not null"
    );
    assert_eq!(compiled.bindings.len(), 5);
}

#[test]
fn test_empty_in_lists() {
    let q = qb::table("users").where_in("id", Vec::<i64>::new());
    assert_eq!(select(Driver::MySql, &q).sql, "select * from `users` where 0 = 1");

    let q = qb::table("users").where_not_in("id", Vec::<i64>::new());
    assert_eq!(select(Driver::MySql, &q).sql, "select * from `users` where 1 = 1");
}

#[test]
fn test_between_and_column_predicates() {
    let q = qb::table("orders")
        .where_between("total", 10, Expression::with_bindings("? * 2", [50]))
        .where_column("updated_at", ">", "created_at");
    let compiled = select(Driver::Postgres, &q);

    assert_eq!(
        compiled.sql,
        r#"select * from "orders" where "total" between ? and ? * 2 and "updated_at" > "created_at""#
    );
    assert_eq!(compiled.bindings, vec![Value::Int(10), Value::Int(50)]);
}

#[test]
fn test_join_where_with_expression() {
    let join = Join::new(JoinKind::Left, "posts")
        .on("users.id", "=", "posts.user_id")
        .where_("posts.score", ">", Expression::with_bindings("? + ?", [1, 2]));
    let q = qb::table("users").join_with(join).where_("users.id", "=", 9);
    let compiled = select(Driver::Postgres, &q);

    assert_eq!(
        compiled.sql,
        r#"select * from "users" left join "posts" on "users"."id" = "posts"."user_id" and "posts"."score" > ? + ? where "users"."id" = ?"#
    );
    assert_eq!(compiled.bindings, vec![Value::Int(1), Value::Int(2), Value::Int(9)]);
}

#[test]
fn test_having_between_and_raw() {
    let q = qb::table("orders")
        .group_by(["account_id"])
        .having_between("total", 5, 10)
        .having_raw(Expression::with_bindings("count(*) > ?", [3]), NO_BINDINGS);
    let compiled = select(Driver::Sqlite, &q);

    assert_eq!(
        compiled.sql,
        r#"select * from "orders" group by "account_id" having "total" between ? and ? and count(*) > ?"#
    );
    assert_eq!(compiled.bindings, vec![Value::Int(5), Value::Int(10), Value::Int(3)]);
}

// ==================== Postgres ====================

#[test]
fn test_postgres_date_parts() {
    let q = qb::table("audits")
        .where_date("created_at", "=", "2024-01-01")
        .where_year("created_at", ">", 2020);
    assert_eq!(
        select(Driver::Postgres, &q).sql,
        r#"select * from "audits" where "created_at"::date = ? and extract(year from "created_at") > ?"#
    );
}

#[test]
fn test_postgres_distinct_on() {
    let q = qb::table("events").distinct_on(["user_id"]).order_by("user_id");
    assert_eq!(
        select(Driver::Postgres, &q).sql,
        r#"select distinct on ("user_id") * from "events" order by "user_id" asc"#
    );
    assert!(compiler(Driver::MySql).select(&q).unwrap_err().is_unsupported());
}

#[test]
fn test_postgres_insert_get_id_and_upsert() {
    let c = compiler(Driver::Postgres);
    let row = Values::new().set("email", "test@example.com").set("point", geometry());

    assert_eq!(
        c.insert_get_id(&qb::table("points"), &row, None).unwrap().sql,
        r#"insert into "points" ("email", "point") values (?, ST_GeomFromText(?, ?)) returning "id""#
    );
    assert_eq!(
        c.upsert(&qb::table("points"), &[row], &["email"], &["point"]).unwrap().sql,
        r#"insert into "points" ("email", "point") values (?, ST_GeomFromText(?, ?)) on conflict ("email") do update set "point" = "excluded"."point""#
    );
}

#[test]
fn test_postgres_aggregate_over_union() {
    let q = qb::table("a").union(qb::table("b"));
    let compiled = compiler(Driver::Postgres).count(&q).unwrap();
    assert_eq!(
        compiled.sql,
        r#"select count(*) as "aggregate" from ((select * from "a") union (select * from "b")) as "temp_table""#
    );
}

#[test]
fn test_postgres_insert_using() {
    let source = qb::table("users").select(["id", "name"]).where_("active", "=", true);
    let compiled = compiler(Driver::Postgres)
        .insert_using(&qb::table("archive"), &["id", "name"], &source)
        .unwrap();

    assert_eq!(
        compiled.sql,
        r#"insert into "archive" ("id", "name") select "id", "name" from "users" where "active" = ?"#
    );
    assert_eq!(compiled.bindings, vec![Value::Bool(true)]);
}

#[test]
fn test_postgres_rejects_mutation_joins() {
    let q = qb::table("users").join("posts", "users.id", "=", "posts.user_id");
    let err = compiler(Driver::Postgres).delete(&q).unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn test_postgres_truncate() {
    let statements = compiler(Driver::Postgres).truncate(&qb::table("users")).unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].sql, r#"truncate "users" restart identity cascade"#);
}

// ==================== SQLite ====================

#[test]
fn test_sqlite_union_and_pagination() {
    let q = qb::table("a").union_all(qb::table("b")).offset(5);
    assert_eq!(
        select(Driver::Sqlite, &q).sql,
        r#"select * from (select * from "a") union all select * from (select * from "b") limit -1 offset 5"#
    );
}

#[test]
fn test_sqlite_date_where_and_lock() {
    let q = qb::table("audits").where_date("created_at", "=", "2024-01-01").lock_for_update();
    assert_eq!(
        select(Driver::Sqlite, &q).sql,
        r#"select * from "audits" where strftime('%Y-%m-%d', "created_at") = cast(? as text)"#
    );
}

#[test]
fn test_sqlite_truncate_resets_sequence() {
    let statements = compiler(Driver::Sqlite).truncate(&qb::table("users")).unwrap();
    assert_eq!(statements.len(), 2);
    assert_eq!(statements[0].sql, "delete from sqlite_sequence where name = ?");
    assert_eq!(statements[0].bindings, vec![Value::from("users")]);
    assert_eq!(statements[1].sql, r#"delete from "users""#);
}

#[test]
fn test_sqlite_insert_or_ignore() {
    let row = Values::new().set("email", "a@example.com");
    assert_eq!(
        compiler(Driver::Sqlite)
            .insert_or_ignore(&qb::table("users"), &[row])
            .unwrap()
            .sql,
        r#"insert or ignore into "users" ("email") values (?)"#
    );
}

// ==================== SQL Server ====================

#[test]
fn test_sql_server_top_and_offset() {
    assert_eq!(
        select(Driver::SqlServer, &qb::table("users").limit(10)).sql,
        "select top 10 * from [users]"
    );
    assert_eq!(
        select(Driver::SqlServer, &qb::table("users").limit(10).offset(20)).sql,
        "select * from [users] order by (select 0) offset 20 rows fetch next 10 rows only"
    );
    assert_eq!(
        select(Driver::SqlServer, &qb::table("users").order_by("id").offset(20)).sql,
        "select * from [users] order by [id] asc offset 20 rows"
    );
}

#[test]
fn test_sql_server_union_limit_uses_fetch() {
    let q = qb::table("a").union(qb::table("b")).limit(5);
    assert_eq!(
        select(Driver::SqlServer, &q).sql,
        "select * from (select * from [a]) as [temp_table] union select * from (select * from [b]) as [temp_table] \
         order by (select 0) offset 0 rows fetch next 5 rows only"
    );

    let ordered = qb::table("a").union(qb::table("b")).order_by("id").limit(5);
    assert!(
        select(Driver::SqlServer, &ordered)
            .sql
            .ends_with("order by [id] asc offset 0 rows fetch next 5 rows only")
    );
}

#[test]
fn test_sql_server_lock_hint() {
    let q = qb::table("users").where_("id", "=", 1).lock_for_update();
    assert_eq!(
        select(Driver::SqlServer, &q).sql,
        "select * from [users] with(rowlock,updlock,holdlock) where [id] = ?"
    );
}

#[test]
fn test_sql_server_exists() {
    let q = qb::table("users").where_("id", "=", 1);
    assert_eq!(
        compiler(Driver::SqlServer).exists(&q).unwrap().sql,
        "select case when exists(select * from [users] where [id] = ?) then 1 else 0 end as [exists]"
    );
    assert_eq!(
        compiler(Driver::MySql).exists(&q).unwrap().sql,
        "select exists(select * from `users` where `id` = ?) as `exists`"
    );
}

#[test]
fn test_sql_server_unsupported_statements() {
    let c = compiler(Driver::SqlServer);
    let row = Values::new().set("email", "a@example.com");

    let err = c
        .upsert(&qb::table("users"), std::slice::from_ref(&row), &["email"], &["email"])
        .unwrap_err();
    assert!(err.is_unsupported());
    assert!(c.insert_or_ignore(&qb::table("users"), &[row]).unwrap_err().is_unsupported());
}

#[test]
fn test_unknown_driver_has_no_dialect() {
    let err = Compiler::for_context(RenderContext::new("oracle")).unwrap_err();
    assert!(err.is_unsupported());
}
