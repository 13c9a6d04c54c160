//! Per-dialect SQL rendering.
//!
//! A [`Renderer`] turns the typed statements of [`crate::statement`] into SQL
//! text. Only placeholder syntax and identifier quoting differ between the
//! shipped dialects, so both are trait methods and every `render_*` method has
//! a default implementation built on them.
//!
//! Placeholders are positional and contiguous: value columns first, then
//! WHERE-clause arguments in predicate order.

use rowbind_core::quote_ident;
use serde::{Deserialize, Serialize};

use crate::statement::{Delete, Insert, Predicate, Projection, Select, Update, Upsert};

/// Renders statements for one SQL dialect.
pub trait Renderer {
    /// Placeholder for the 1-based parameter `index`.
    fn placeholder(&self, index: usize) -> String;

    /// Quote an identifier.
    fn quote(&self, ident: &str) -> String {
        quote_ident(ident)
    }

    fn render_insert(&self, stmt: &Insert) -> String {
        let mut sql = insert_head(self, stmt.table, &stmt.columns);
        push_returning(self, &mut sql, &stmt.returning);
        sql
    }

    fn render_update(&self, stmt: &Update) -> String {
        let mut next = 1;
        let set = stmt
            .set
            .iter()
            .map(|c| {
                let term = format!("{} = {}", self.quote(c), self.placeholder(next));
                next += 1;
                term
            })
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("UPDATE {} SET {set}", self.quote(stmt.table));
        push_where(self, &mut sql, &stmt.filter, &mut next);
        sql
    }

    fn render_delete(&self, stmt: &Delete) -> String {
        let mut sql = format!("DELETE FROM {}", self.quote(stmt.table));
        push_where(self, &mut sql, &stmt.filter, &mut 1);
        sql
    }

    fn render_upsert(&self, stmt: &Upsert) -> String {
        let mut sql = insert_head(self, stmt.table, &stmt.insert);
        sql.push_str(" ON CONFLICT ");
        if !stmt.update_on_conflict || stmt.update.is_empty() {
            sql.push_str("DO NOTHING");
        } else {
            sql.push('(');
            sql.push_str(&quote_list(self, &stmt.conflict));
            sql.push_str(") DO UPDATE SET ");
            let set = stmt
                .update
                .iter()
                .map(|c| {
                    let q = self.quote(c);
                    format!("{q} = EXCLUDED.{q}")
                })
                .collect::<Vec<_>>()
                .join(", ");
            sql.push_str(&set);
        }
        push_returning(self, &mut sql, &stmt.returning);
        sql
    }

    fn render_select(&self, stmt: &Select) -> String {
        let table = self.quote(stmt.table);
        let head = match &stmt.projection {
            Projection::All | Projection::Exists => format!("{table}.*"),
            Projection::Columns(cols) => quote_list(self, cols),
            Projection::Count => "COUNT(*)".to_string(),
        };
        let mut sql = match stmt.projection {
            Projection::Exists => format!("SELECT 1 FROM {table}"),
            _ => format!("SELECT {head} FROM {table}"),
        };
        push_where(self, &mut sql, &stmt.filter, &mut 1);

        if stmt.projection == Projection::Exists {
            sql.push_str(" LIMIT 1");
            return format!("SELECT EXISTS({sql})");
        }
        if let Some(limit) = stmt.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        sql
    }
}

/// The shipped dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `$1, $2, ...`
    #[default]
    Postgres,
    /// `?1, ?2, ...`
    Sqlite,
}

impl Dialect {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Dialect::Postgres => "postgres",
            Dialect::Sqlite => "sqlite",
        }
    }
}

impl Renderer for Dialect {
    fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }
}

fn quote_list<R: Renderer + ?Sized>(r: &R, cols: &[String]) -> String {
    cols.iter()
        .map(|c| r.quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders<R: Renderer + ?Sized>(r: &R, count: usize, next: &mut usize) -> String {
    let list = (*next..*next + count)
        .map(|i| r.placeholder(i))
        .collect::<Vec<_>>()
        .join(", ");
    *next += count;
    list
}

fn insert_head<R: Renderer + ?Sized>(r: &R, table: &str, columns: &[String]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} DEFAULT VALUES", r.quote(table));
    }
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        r.quote(table),
        quote_list(r, columns),
        placeholders(r, columns.len(), &mut 1)
    )
}

fn push_returning<R: Renderer + ?Sized>(r: &R, sql: &mut String, returning: &[String]) {
    if !returning.is_empty() {
        sql.push_str(" RETURNING ");
        sql.push_str(&quote_list(r, returning));
    }
}

fn push_where<R: Renderer + ?Sized>(r: &R, sql: &mut String, filter: &[Predicate], next: &mut usize) {
    if filter.is_empty() {
        return;
    }
    let grouped = filter.len() > 1;
    let terms = filter
        .iter()
        .map(|p| render_predicate(r, p, next, grouped))
        .collect::<Vec<_>>()
        .join(" AND ");
    sql.push_str(" WHERE ");
    sql.push_str(&terms);
}

fn render_predicate<R: Renderer + ?Sized>(
    r: &R,
    predicate: &Predicate,
    next: &mut usize,
    grouped: bool,
) -> String {
    match predicate {
        Predicate::Eq(c) => {
            let term = format!("{} = {}", r.quote(c), r.placeholder(*next));
            *next += 1;
            term
        }
        Predicate::IsNull(c) => format!("{} IS NULL", r.quote(c)),
        Predicate::In { len: 0, .. } | Predicate::KeyRows { rows: 0, .. } => "1 = 0".to_string(),
        Predicate::In { column, len } => {
            format!("{} IN ({})", r.quote(column), placeholders(r, *len, next))
        }
        Predicate::KeyRows { keys, rows } => {
            let groups = (0..*rows)
                .map(|_| {
                    let key = keys
                        .iter()
                        .map(|k| {
                            let term = format!("{} = {}", r.quote(k), r.placeholder(*next));
                            *next += 1;
                            term
                        })
                        .collect::<Vec<_>>()
                        .join(" AND ");
                    format!("({key})")
                })
                .collect::<Vec<_>>()
                .join(" OR ");
            if grouped && *rows > 1 {
                format!("({groups})")
            } else {
                groups
            }
        }
    }
}
