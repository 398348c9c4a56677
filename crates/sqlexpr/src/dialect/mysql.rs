use super::Dialect;
use crate::driver::Driver;
use crate::error::ExprResult;
use crate::qb::Lock;

/// MySQL / MariaDB.
#[derive(Clone, Copy, Debug, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn driver(&self) -> Driver {
        Driver::MySql
    }

    fn quote_identifier(&self, segment: &str) -> String {
        format!("`{}`", segment.replace('`', "``"))
    }

    fn backslash_escapes(&self) -> bool {
        true
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>, _has_orders: bool) -> String {
        match (limit, offset) {
            (Some(l), Some(o)) => format!(" limit {l} offset {o}"),
            (Some(l), None) => format!(" limit {l}"),
            // MySQL has no OFFSET without LIMIT.
            (None, Some(o)) => format!(" limit 18446744073709551615 offset {o}"),
            (None, None) => String::new(),
        }
    }

    fn lock(&self, lock: &Lock) -> String {
        match lock {
            Lock::Update => " for update".to_string(),
            Lock::Shared => " lock in share mode".to_string(),
            Lock::Raw(s) => format!(" {s}"),
        }
    }

    fn empty_insert(&self, table: &str) -> String {
        format!("insert into {table} () values ()")
    }

    fn insert_or_ignore(&self, insert: &str) -> ExprResult<String> {
        Ok(insert.replacen("insert", "insert ignore", 1))
    }

    fn upsert(
        &self,
        insert: &str,
        _unique_by: &[String],
        update: &[String],
        assignments: &[(String, String)],
    ) -> ExprResult<String> {
        let mut sets: Vec<String> = update.iter().map(|c| format!("{c} = values({c})")).collect();
        sets.extend(assignments.iter().map(|(c, v)| format!("{c} = {v}")));
        Ok(format!("{} on duplicate key update {}", insert, sets.join(", ")))
    }

    fn supports_mutation_joins(&self) -> bool {
        true
    }

    fn json_update(&self, column: &str, path: &[&str], value: &str) -> ExprResult<String> {
        let path = path
            .iter()
            .map(|key| super::json_path_key(key))
            .collect::<ExprResult<Vec<_>>>()?;
        Ok(format!(
            "{column} = json_set({column}, '$.{}', {value})",
            path.join(".")
        ))
    }
}
