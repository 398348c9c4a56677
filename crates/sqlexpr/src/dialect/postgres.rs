use super::{Dialect, Statement};
use crate::driver::Driver;
use crate::error::ExprResult;
use crate::qb::DatePart;

/// PostgreSQL.
#[derive(Clone, Copy, Debug, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn quote_identifier(&self, segment: &str) -> String {
        format!("\"{}\"", segment.replace('"', "\"\""))
    }

    fn date_where(&self, part: DatePart, column: &str, operator: &str, value: &str) -> String {
        match part {
            DatePart::Date => format!("{column}::date {operator} {value}"),
            DatePart::Time => format!("{column}::time {operator} {value}"),
            _ => format!("extract({} from {column}) {operator} {value}", part.as_str()),
        }
    }

    fn insert_or_ignore(&self, insert: &str) -> ExprResult<String> {
        Ok(format!("{insert} on conflict do nothing"))
    }

    fn insert_get_id(&self, insert: &str, sequence: &str) -> String {
        format!("{} returning {}", insert, self.quote_identifier(sequence))
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

    fn json_update(&self, column: &str, path: &[&str], value: &str) -> ExprResult<String> {
        let path = path
            .iter()
            .map(|key| super::json_path_key(key))
            .collect::<ExprResult<Vec<_>>>()?;
        Ok(format!(
            "{column} = jsonb_set({column}::jsonb, '{{{}}}', {value})",
            path.join(",")
        ))
    }

    fn truncate(&self, table: &str, _name: &str) -> Vec<Statement> {
        vec![(format!("truncate {table} restart identity cascade"), Vec::new())]
    }
}

/// `on conflict (...) do update set` shared by Postgres and SQLite.
pub(super) fn conflict_update(
    dialect: &dyn Dialect,
    insert: &str,
    unique_by: &[String],
    update: &[String],
    assignments: &[(String, String)],
) -> String {
    let excluded = dialect.quote_identifier("excluded");
    let mut sets: Vec<String> = update.iter().map(|c| format!("{c} = {excluded}.{c}")).collect();
    sets.extend(assignments.iter().map(|(c, v)| format!("{c} = {v}")));
    format!(
        "{} on conflict ({}) do update set {}",
        insert,
        unique_by.join(", "),
        sets.join(", ")
    )
}
