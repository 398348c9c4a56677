//! Binding collection.
//!
//! Each function walks the same slots the renderer walks, in the same order, and
//! returns one scalar per `?` the renderer writes. Expressions contribute their own
//! bindings in place; expressions without bindings contribute nothing.
//!
//! Slot order for SELECT: aggregate, columns, distinct, from, joins, wheres, groups,
//! havings, orders, limit, offset, unions, union limit, union offset, union orders,
//! lock. Distinct, limits and locks never carry bindings.

use crate::qb::{Ident, Query, Values};
use crate::value::Value;

/// Bindings of a SELECT (also used for EXISTS and aggregates).
pub fn select_bindings(query: &Query) -> Vec<Value> {
    let mut out = Vec::new();
    collect_select(query, &mut out);
    out
}

fn collect_select(query: &Query, out: &mut Vec<Value>) {
    let s = query.slots();

    if let Some(agg) = &s.aggregate {
        for c in &agg.columns {
            c.collect_into(out);
        }
    }
    // An aggregate replaces the column list, except when it wraps a union.
    if s.aggregate.is_none() || !s.unions.is_empty() {
        for c in &s.columns {
            c.collect_into(out);
        }
    }
    if let Some(from) = &s.from {
        from.collect_into(out);
    }
    for join in &s.joins {
        join.collect_into(out);
    }
    for w in &s.wheres {
        w.collect_into(out);
    }
    for g in &s.groups {
        g.collect_into(out);
    }
    for h in &s.havings {
        h.collect_into(out);
    }
    for o in &s.orders {
        o.collect_into(out);
    }
    for union in &s.unions {
        collect_select(&union.query, out);
    }
    for o in &s.union_orders {
        o.collect_into(out);
    }
}

/// Bindings of a multi-row INSERT: the target table, then row by row in column order.
pub fn insert_bindings(query: &Query, rows: &[Values]) -> Vec<Value> {
    let mut out = Vec::new();
    collect_table(query, &mut out);
    for row in rows {
        row.collect_into(&mut out);
    }
    out
}

/// Bindings of `insert into table select ...`.
pub fn insert_using_bindings(query: &Query, source: &Query) -> Vec<Value> {
    let mut out = Vec::new();
    collect_table(query, &mut out);
    collect_select(source, &mut out);
    out
}

/// Bindings of an UPDATE: table, joins, then the assigned values, then the predicates.
pub fn update_bindings(query: &Query, values: &Values) -> Vec<Value> {
    let s = query.slots();
    let mut out = Vec::new();
    collect_table(query, &mut out);
    for join in &s.joins {
        join.collect_into(&mut out);
    }
    values.collect_into(&mut out);
    for w in &s.wheres {
        w.collect_into(&mut out);
    }
    for o in &s.orders {
        o.collect_into(&mut out);
    }
    out
}

/// Bindings of an UPSERT: the inserted rows, then explicit update assignments.
pub fn upsert_bindings(query: &Query, rows: &[Values], assignments: &Values) -> Vec<Value> {
    let mut out = insert_bindings(query, rows);
    assignments.collect_into(&mut out);
    out
}

/// Bindings of a DELETE.
pub fn delete_bindings(query: &Query) -> Vec<Value> {
    let s = query.slots();
    let mut out = Vec::new();
    // `delete <target> from <table> join ...` names a raw table twice.
    if !s.joins.is_empty() && matches!(s.from, Some(Ident::Raw(_))) {
        collect_table(query, &mut out);
    }
    collect_table(query, &mut out);
    for join in &s.joins {
        join.collect_into(&mut out);
    }
    for w in &s.wheres {
        w.collect_into(&mut out);
    }
    for o in &s.orders {
        o.collect_into(&mut out);
    }
    out
}

fn collect_table(query: &Query, out: &mut Vec<Value>) {
    if let Some(from) = &query.slots().from {
        from.collect_into(out);
    }
}

/// Count `?` placeholders outside quoted literals and identifiers.
///
/// Recognizes `'...'`, `"..."`, `` `...` `` and `[...]`; doubled quotes inside a
/// literal are handled because they close and reopen it.
pub fn count_placeholders(sql: &str) -> usize {
    count_placeholders_for(sql, false)
}

/// Count placeholders, optionally treating `\` inside string literals as an escape
/// for the next character (MySQL's default `sql_mode`).
pub fn count_placeholders_for(sql: &str, backslash_escapes: bool) -> usize {
    let mut count = 0;
    scan_placeholders(sql, backslash_escapes, |_| count += 1);
    count
}

/// Rewrite `?` placeholders as `$1, $2, ...`.
pub fn to_numbered(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut idx = 0;
    let mut last = 0;
    scan_placeholders(sql, false, |pos| {
        idx += 1;
        out.push_str(&sql[last..pos]);
        out.push('$');
        out.push_str(&idx.to_string());
        last = pos + 1;
    });
    out.push_str(&sql[last..]);
    out
}

fn scan_placeholders(sql: &str, backslash_escapes: bool, mut on_placeholder: impl FnMut(usize)) {
    let mut close: Option<char> = None;
    let mut escaped = false;
    for (pos, ch) in sql.char_indices() {
        match close {
            Some(_) if escaped => escaped = false,
            Some(end) => {
                if ch == end {
                    close = None;
                } else if ch == '\\' && backslash_escapes && matches!(end, '\'' | '"') {
                    escaped = true;
                }
            }
            None => match ch {
                '\'' | '"' | '`' => close = Some(ch),
                '[' => close = Some(']'),
                '?' => on_placeholder(pos),
                _ => {}
            },
        }
    }
}
