use super::Dialect;
use crate::driver::Driver;
use crate::qb::{DatePart, Lock};

/// Microsoft SQL Server.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn driver(&self) -> Driver {
        Driver::SqlServer
    }

    fn quote_identifier(&self, segment: &str) -> String {
        format!("[{}]", segment.replace(']', "]]"))
    }

    fn date_where(&self, part: DatePart, column: &str, operator: &str, value: &str) -> String {
        match part {
            DatePart::Date => format!("cast({column} as date) {operator} {value}"),
            DatePart::Time => format!("cast({column} as time) {operator} {value}"),
            _ => format!("{}({column}) {operator} {value}", part.as_str()),
        }
    }

    fn top(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(n), None) => Some(format!("top {n}")),
            _ => None,
        }
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, has_orders: bool) -> String {
        if limit.is_none() && offset.is_none() {
            return String::new();
        }
        let offset = offset.unwrap_or(0);
        // OFFSET ... FETCH requires an ORDER BY.
        let mut sql = if has_orders {
            String::new()
        } else {
            " order by (select 0)".to_string()
        };
        sql.push_str(&format!(" offset {offset} rows"));
        if let Some(n) = limit {
            sql.push_str(&format!(" fetch next {n} rows only"));
        }
        sql
    }

    fn lock(&self, _lock: &Lock) -> String {
        String::new()
    }

    fn table_hint(&self, lock: &Lock) -> Option<String> {
        Some(match lock {
            Lock::Update => "with(rowlock,updlock,holdlock)".to_string(),
            Lock::Shared => "with(rowlock,holdlock)".to_string(),
            Lock::Raw(s) => s.clone(),
        })
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("select * from ({sql}) as {}", self.quote_identifier("temp_table"))
    }

    fn exists(&self, select: &str) -> String {
        format!(
            "select case when exists({select}) then 1 else 0 end as {}",
            self.quote_identifier("exists")
        )
    }
}
