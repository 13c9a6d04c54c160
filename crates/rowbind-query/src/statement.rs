//! Typed statement representation.
//!
//! Statements describe *shape* only: table, column lists and predicates. They
//! carry no values. Placeholders are numbered when a [`Renderer`] turns a
//! statement into text, so one statement renders identically on every call and
//! can be cached together with its bind mapping.
//!
//! [`Renderer`]: crate::dialect::Renderer

use crate::dialect::Renderer;

/// A WHERE-clause term. Every term except [`Predicate::IsNull`] consumes
/// placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `"col" = $n`
    Eq(String),
    /// `"col" IN ($n, $n+1, ...)` with `len` placeholders.
    In { column: String, len: usize },
    /// `"col" IS NULL`
    IsNull(String),
    /// `("k1" = $n AND "k2" = $n+1) OR (...)`, one group per row.
    ///
    /// Used to address a batch of records by primary key.
    KeyRows { keys: Vec<String>, rows: usize },
}

impl Predicate {
    pub fn eq(column: impl Into<String>) -> Self {
        Predicate::Eq(column.into())
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Predicate::IsNull(column.into())
    }

    pub fn in_list(column: impl Into<String>, len: usize) -> Self {
        Predicate::In {
            column: column.into(),
            len,
        }
    }

    /// Equality on every column of a (possibly composite) key.
    pub fn key<S: AsRef<str>>(columns: &[S]) -> Vec<Predicate> {
        columns.iter().map(|c| Predicate::eq(c.as_ref())).collect()
    }

    /// Number of placeholders this term consumes.
    #[must_use]
    pub fn arity(&self) -> usize {
        match self {
            Predicate::Eq(_) => 1,
            Predicate::In { len, .. } => *len,
            Predicate::IsNull(_) => 0,
            Predicate::KeyRows { keys, rows } => keys.len() * rows,
        }
    }
}

/// `INSERT INTO t (...) VALUES (...) [RETURNING ...]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Insert {
    pub table: &'static str,
    pub columns: Vec<String>,
    pub returning: Vec<String>,
}

/// `UPDATE t SET ... WHERE ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
    pub table: &'static str,
    pub set: Vec<String>,
    pub filter: Vec<Predicate>,
}

/// `DELETE FROM t WHERE ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delete {
    pub table: &'static str,
    pub filter: Vec<Predicate>,
}

/// `INSERT ... ON CONFLICT ...`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upsert {
    pub table: &'static str,
    /// Columns inserted.
    pub insert: Vec<String>,
    /// Conflict target; callers default it to the primary key.
    pub conflict: Vec<String>,
    /// Columns overwritten from the proposed row on conflict.
    pub update: Vec<String>,
    pub returning: Vec<String>,
    /// `DO UPDATE` when true and `update` is non-empty, `DO NOTHING` otherwise.
    pub update_on_conflict: bool,
}

/// What a SELECT produces.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// `SELECT "t".*`
    #[default]
    All,
    /// `SELECT "a", "b"`
    Columns(Vec<String>),
    /// `SELECT COUNT(*)`
    Count,
    /// `SELECT EXISTS(SELECT 1 ...)`
    Exists,
}

/// `SELECT ... FROM t WHERE ... [LIMIT n]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Select {
    pub table: &'static str,
    pub projection: Projection,
    pub filter: Vec<Predicate>,
    pub limit: Option<u64>,
}

impl Select {
    #[must_use]
    pub fn from(table: &'static str) -> Self {
        Self {
            table,
            projection: Projection::All,
            filter: Vec::new(),
            limit: None,
        }
    }

    #[must_use]
    pub fn projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter.push(predicate);
        self
    }

    #[must_use]
    pub fn filters(mut self, predicates: impl IntoIterator<Item = Predicate>) -> Self {
        self.filter.extend(predicates);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Any renderable statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Insert(Insert),
    Update(Update),
    Delete(Delete),
    Upsert(Upsert),
    Select(Select),
}

impl Statement {
    pub fn render(&self, renderer: &(impl Renderer + ?Sized)) -> String {
        match self {
            Statement::Insert(s) => renderer.render_insert(s),
            Statement::Update(s) => renderer.render_update(s),
            Statement::Delete(s) => renderer.render_delete(s),
            Statement::Upsert(s) => renderer.render_upsert(s),
            Statement::Select(s) => renderer.render_select(s),
        }
    }

    /// Number of positional arguments the rendered statement expects.
    #[must_use]
    pub fn arity(&self) -> usize {
        let filter = |f: &[Predicate]| f.iter().map(Predicate::arity).sum::<usize>();
        match self {
            Statement::Insert(s) => s.columns.len(),
            Statement::Update(s) => s.set.len() + filter(&s.filter),
            Statement::Delete(s) => filter(&s.filter),
            Statement::Upsert(s) => s.insert.len(),
            Statement::Select(s) => filter(&s.filter),
        }
    }

    #[must_use]
    pub fn table(&self) -> &'static str {
        match self {
            Statement::Insert(s) => s.table,
            Statement::Update(s) => s.table,
            Statement::Delete(s) => s.table,
            Statement::Upsert(s) => s.table,
            Statement::Select(s) => s.table,
        }
    }
}

macro_rules! impl_from_statement {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for Statement {
                fn from(s: $variant) -> Self {
                    Statement::$variant(s)
                }
            }
        )*
    };
}

impl_from_statement!(Insert, Update, Delete, Upsert, Select);
