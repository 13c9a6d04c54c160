//! Batched relation loading.
//!
//! Loading a relation for N source records costs one query, not N. The
//! loader collects the distinct join keys of the sources, fetches every
//! related record with a single `IN (...)` query, and then wires both
//! directions in memory:
//!
//! - each source's slot receives the matching related record(s), shared as
//!   `Arc<Loaded<R>>` so two sources pointing at the same row hold the same
//!   instance;
//! - each [`Loaded`] record carries back-references to the sources that point
//!   at it, as indices into the slice that was loaded.
//!
//! Matching is a nested loop over sources and results; no index is built.
//!
//! [`Registry::set_related`] and [`Registry::add_related`] go the other way:
//! they write the join key for one source and wire the records in memory as
//! if the relation had been loaded for that source alone.

use std::ops::Deref;
use std::sync::Arc;

use rowbind_core::{
    Cardinality, ConfigErrorKind, Entity, Error, Executor, RelationDescriptor, Result, Value,
};
use rowbind_query::{ColumnSet, Predicate, Renderer, Select, Update};

use crate::ops::{check_column, soft_filter};
use crate::registry::Registry;

/// A related record together with the sources that reference it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Loaded<R> {
    pub record: R,
    back_refs: Vec<usize>,
}

impl<R> Loaded<R> {
    /// Indices, into the source slice passed to the loader, of every source
    /// wired to this record.
    #[must_use]
    pub fn back_refs(&self) -> &[usize] {
        &self.back_refs
    }

    #[must_use]
    pub fn into_inner(self) -> R {
        self.record
    }
}

impl<R> Deref for Loaded<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.record
    }
}

/// Where loaded records are stored on the source type.
pub enum Slot<S, R> {
    One(fn(&mut S) -> &mut Option<Arc<Loaded<R>>>),
    Many(fn(&mut S) -> &mut Vec<Arc<Loaded<R>>>),
}

// Manual impls: a derive would demand `S: Clone` and `R: Clone`.
impl<S, R> Clone for Slot<S, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, R> Copy for Slot<S, R> {}

/// A relation from `S` to `R`: its metadata plus the slot it fills.
pub struct Relation<S, R> {
    pub descriptor: RelationDescriptor,
    pub slot: Slot<S, R>,
}

impl<S, R> Relation<S, R> {
    /// A to-one relation filling an `Option` field.
    #[must_use]
    pub const fn one(
        descriptor: RelationDescriptor,
        slot: fn(&mut S) -> &mut Option<Arc<Loaded<R>>>,
    ) -> Self {
        Self {
            descriptor,
            slot: Slot::One(slot),
        }
    }

    /// A to-many relation filling a `Vec` field.
    #[must_use]
    pub const fn many(
        descriptor: RelationDescriptor,
        slot: fn(&mut S) -> &mut Vec<Arc<Loaded<R>>>,
    ) -> Self {
        Self {
            descriptor,
            slot: Slot::Many(slot),
        }
    }
}

impl<S, R> std::fmt::Debug for Relation<S, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relation")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl Registry {
    /// Load `relation` for every record in `sources` with one query.
    ///
    /// Sources whose join key is NULL get an empty slot. When no source has a
    /// key, no query is issued. `AfterSelect` hooks of `R` run on every loaded
    /// record. Returns the loaded records.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = relation.descriptor.name, sources = sources.len()))]
    pub fn load_relation<S: Entity, R: Entity, X: Executor>(
        &self,
        exec: &X,
        relation: &Relation<S, R>,
        sources: &mut [S],
    ) -> Result<Vec<Arc<Loaded<R>>>> {
        let rel = &relation.descriptor;
        check_relation(relation)?;

        let local: Vec<Value> = sources
            .iter()
            .map(|s| s.column_value(rel.local_key))
            .collect::<Result<_>>()?;
        let mut keys: Vec<Value> = Vec::new();
        for key in &local {
            if !key.is_null() && !keys.iter().any(|k| same_key(k, key)) {
                keys.push(key.clone());
            }
        }

        if keys.is_empty() {
            fill(relation, sources, &[]);
            return Ok(Vec::new());
        }

        let mut select =
            Select::from(R::table()).filter(Predicate::in_list(rel.remote_key, keys.len()));
        if rel.remote_soft_delete {
            select = select.filters(soft_filter(R::descriptor()));
        }
        let related: Vec<R> = self.select(exec, &select, &keys)?;

        let remote: Vec<Value> = related
            .iter()
            .map(|r| r.column_value(rel.remote_key))
            .collect::<Result<_>>()?;
        let loaded: Vec<Arc<Loaded<R>>> = related
            .into_iter()
            .zip(&remote)
            .map(|(record, rk)| {
                let back_refs = local
                    .iter()
                    .enumerate()
                    .filter(|(_, lk)| !lk.is_null() && same_key(lk, rk))
                    .map(|(i, _)| i)
                    .collect();
                Arc::new(Loaded { record, back_refs })
            })
            .collect();

        fill(relation, sources, &loaded);

        tracing::debug!(
            relation = rel.name,
            keys = keys.len(),
            loaded = loaded.len(),
            "relation loaded"
        );
        Ok(loaded)
    }
}

// ============================================================================
// Setters
// ============================================================================

impl Registry {
    /// Point `source` at `related` through a to-one relation.
    ///
    /// With `insert`, `related` is inserted first. The source's local key is
    /// then written with one UPDATE by primary key, copied onto the source in
    /// memory, and `related` is stored in the slot with the source as its only
    /// back-reference. No hooks run on the source.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = relation.descriptor.name, insert = insert))]
    pub fn set_related<S: Entity, R: Entity, X: Executor>(
        &self,
        exec: &X,
        relation: &Relation<S, R>,
        source: &mut S,
        mut related: R,
        insert: bool,
    ) -> Result<Arc<Loaded<R>>> {
        let rel = &relation.descriptor;
        check_relation(relation)?;
        let Slot::One(slot) = relation.slot else {
            return Err(wrong_setter::<S>(rel, "set_related"));
        };

        if insert {
            self.insert(exec, &mut related, &ColumnSet::Infer)?;
        }
        let key = related.column_value(rel.remote_key)?;
        self.write_key(exec, source, rel.local_key, key.clone())?;
        source.set_column_value(rel.local_key, key)?;

        let loaded = Arc::new(Loaded {
            record: related,
            back_refs: vec![0],
        });
        *slot(source) = Some(Arc::clone(&loaded));
        Ok(loaded)
    }

    /// Attach `related` to `source` through a to-many relation.
    ///
    /// Each record's remote key is set to the source's local key. With
    /// `insert` the records are inserted; otherwise each one gets an UPDATE of
    /// its remote key by primary key. The records are appended to the
    /// source's slot, each with the source as its only back-reference.
    #[tracing::instrument(level = "debug", skip_all, fields(relation = relation.descriptor.name, records = related.len(), insert = insert))]
    pub fn add_related<S: Entity, R: Entity, X: Executor>(
        &self,
        exec: &X,
        relation: &Relation<S, R>,
        source: &mut S,
        related: Vec<R>,
        insert: bool,
    ) -> Result<Vec<Arc<Loaded<R>>>> {
        let rel = &relation.descriptor;
        check_relation(relation)?;
        let Slot::Many(slot) = relation.slot else {
            return Err(wrong_setter::<S>(rel, "add_related"));
        };

        let key = source.column_value(rel.local_key)?;
        let mut added = Vec::with_capacity(related.len());
        for mut record in related {
            record.set_column_value(rel.remote_key, key.clone())?;
            if insert {
                self.insert(exec, &mut record, &ColumnSet::Infer)?;
            } else {
                self.write_key(exec, &record, rel.remote_key, key.clone())?;
            }
            added.push(Arc::new(Loaded {
                record,
                back_refs: vec![0],
            }));
        }

        slot(source).extend(added.iter().map(Arc::clone));
        tracing::debug!(relation = rel.name, added = added.len(), "relation extended");
        Ok(added)
    }

    /// `UPDATE <E> SET <column> = $1 WHERE <primary key>`.
    fn write_key<E: Entity, X: Executor>(
        &self,
        exec: &X,
        record: &E,
        column: &str,
        value: Value,
    ) -> Result<u64> {
        self.state::<E>()?;
        let desc = E::descriptor();
        let sql = self.dialect().render_update(&Update {
            table: desc.table,
            set: vec![column.to_string()],
            filter: Predicate::key(desc.primary_key_columns),
        });
        let args: Vec<Value> = std::iter::once(value)
            .chain(record.primary_key_values()?)
            .collect();
        self.execute(exec, "set relationship", desc.table, &sql, &args)
    }
}

fn wrong_setter<S: Entity>(rel: &RelationDescriptor, setter: &str) -> Error {
    Error::config(
        ConfigErrorKind::InvalidDescriptor,
        format!(
            "{setter} cannot write relation {} on {}: it is {:?}",
            rel.name,
            S::table(),
            rel.cardinality
        ),
    )
}

/// Assign every source its matches among `loaded`.
fn fill<S, R>(relation: &Relation<S, R>, sources: &mut [S], loaded: &[Arc<Loaded<R>>]) {
    for (i, source) in sources.iter_mut().enumerate() {
        let mut matches = loaded.iter().filter(|l| l.back_refs.contains(&i));
        match relation.slot {
            Slot::One(slot) => *slot(source) = matches.next().map(Arc::clone),
            Slot::Many(slot) => *slot(source) = matches.map(Arc::clone).collect(),
        }
    }
}

fn check_relation<S: Entity, R: Entity>(relation: &Relation<S, R>) -> Result<()> {
    let rel = &relation.descriptor;
    check_column(S::descriptor(), rel.local_key)?;
    check_column(R::descriptor(), rel.remote_key)?;
    let slot_fits = matches!(
        (rel.cardinality, relation.slot),
        (Cardinality::ToOne, Slot::One(_)) | (Cardinality::ToMany, Slot::Many(_))
    );
    if slot_fits {
        Ok(())
    } else {
        Err(Error::config(
            ConfigErrorKind::InvalidDescriptor,
            format!(
                "relation {} on {} is {:?} but its slot has the other cardinality",
                rel.name,
                S::table(),
                rel.cardinality
            ),
        ))
    }
}

/// Key equality that ignores integer width.
fn same_key(a: &Value, b: &Value) -> bool {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
