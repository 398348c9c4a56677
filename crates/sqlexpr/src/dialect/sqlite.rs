use super::postgres::conflict_update;
use super::{Dialect, Statement};
use crate::driver::Driver;
use crate::error::ExprResult;
use crate::qb::{DatePart, Lock};
use crate::value::Value;

/// SQLite.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn driver(&self) -> Driver {
        Driver::Sqlite
    }

    fn quote_identifier(&self, segment: &str) -> String {
        format!("\"{}\"", segment.replace('"', "\"\""))
    }

    fn date_where(&self, part: DatePart, column: &str, operator: &str, value: &str) -> String {
        let format = match part {
            DatePart::Date => "%Y-%m-%d",
            DatePart::Time => "%H:%M:%S",
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
        };
        format!("strftime('{format}', {column}) {operator} cast({value} as text)")
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _has_orders: bool) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" limit {l} offset {o}"),
            (Some(l), None) => format!(" limit {l}"),
            (None, Some(o)) => format!(" limit -1 offset {o}"),
            (None, None) => String::new(),
        }
    }

    // SQLite locks the whole database; row locks do not exist.
    fn lock(&self, _lock: &Lock) -> String {
        String::new()
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql})")
    }

    fn insert_or_ignore(&self, insert: &str) -> ExprResult<String> {
        Ok(insert.replacen("insert", "insert or ignore", 1))
    }

    fn upsert(
        &self,
        insert: &str,
        unique_by: &[String],
        update: &[String],
        assignments: &[(String, String)],
    ) -> ExprResult<String> {
        Ok(conflict_update(self, insert, unique_by, update, assignments))
    }

    fn truncate(&self, table: &str, name: &str) -> Vec<Statement> {
        vec![
            (
                "delete from sqlite_sequence where name = ?".to_string(),
                vec![Value::Text(name.to_string())],
            ),
            (format!("delete from {table}"), Vec::new()),
        ]
    }
}
