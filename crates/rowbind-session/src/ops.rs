//! Record operations.
//!
//! Every write follows the same pipeline:
//!
//! 1. automatic timestamps
//! 2. `Before*` hooks
//! 3. column resolution and rendering, memoized per call shape
//! 4. value binding and execution
//! 5. RETURNING columns scanned back into the record
//! 6. `After*` hooks
//!
//! Reads apply the soft-delete filter unless asked not to, and run
//! `AfterSelect` hooks on every record they produce.

use rowbind_core::{
    BindMapping, ConfigErrorKind, Entity, EntityDescriptor, Error, Executor, HookPoint, Result,
    Row, Value,
};
use rowbind_query::{
    ColumnSet, Delete, Insert, Predicate, Projection, Renderer, Select, Update, Upsert,
    non_zero_defaults,
};

use crate::cache::{CacheEntry, CacheKey, CacheKind};
use crate::registry::Registry;

/// How an upsert resolves conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    /// `DO UPDATE` on conflict; `DO NOTHING` when false.
    pub update_on_conflict: bool,
    /// Conflict target. Empty means the primary key.
    pub conflict: Vec<String>,
    /// Columns overwritten on conflict.
    pub update: ColumnSet,
    /// Columns inserted.
    pub insert: ColumnSet,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self::do_update()
    }
}

impl UpsertOptions {
    /// Update every non-key column on conflict, infer the insert columns.
    #[must_use]
    pub fn do_update() -> Self {
        Self {
            update_on_conflict: true,
            conflict: Vec::new(),
            update: ColumnSet::Infer,
            insert: ColumnSet::Infer,
        }
    }

    /// Leave the existing row untouched on conflict.
    #[must_use]
    pub fn do_nothing() -> Self {
        Self {
            update_on_conflict: false,
            ..Self::do_update()
        }
    }

    #[must_use]
    pub fn conflict<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conflict = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn update(mut self, columns: ColumnSet) -> Self {
        self.update = columns;
        self
    }

    #[must_use]
    pub fn insert(mut self, columns: ColumnSet) -> Self {
        self.insert = columns;
        self
    }
}

impl Registry {
    // ========================================================================
    // Writes
    // ========================================================================

    /// Insert `record`, then read back the default-bearing columns it did not
    /// write.
    #[tracing::instrument(level = "debug", skip(self, exec, record), fields(table = E::table()))]
    pub fn insert<E: Entity, X: Executor>(
        &self,
        exec: &X,
        record: &mut E,
        columns: &ColumnSet,
    ) -> Result<()> {
        let state = self.state::<E>()?;
        let desc = E::descriptor();

        self.stamp_created(record)?;
        state.hooks.run(HookPoint::BeforeInsert, exec, record)?;

        let key = CacheKey::insert(columns.clone(), non_zero_defaults(record)?);
        let entry = state.insert.get_or_build(CacheKind::Insert, &key, || {
            let resolved = columns.insert_columns(desc, &key.non_zero_defaults);
            let stmt = Insert {
                table: desc.table,
                columns: resolved.write,
                returning: resolved.returning,
            };
            self.entry::<E>(self.dialect().render_insert(&stmt), &stmt.columns, &stmt.returning)
        })?;

        let args = entry.value_binds.values(record);
        if entry.return_binds.is_empty() {
            self.execute(exec, "insert", desc.table, &entry.sql, &args)?;
        } else {
            let row = self
                .query(exec, "insert", desc.table, &entry.sql, &args)?
                .into_iter()
                .next()
                .ok_or_else(|| Error::execution("insert", desc.table, "no row returned".into()))?;
            entry.return_binds.assign(record, row_values(row))?;
        }

        state.hooks.run(HookPoint::AfterInsert, exec, record)
    }

    /// Update `record` by primary key; returns the number of affected rows.
    #[tracing::instrument(level = "debug", skip(self, exec, record), fields(table = E::table()))]
    pub fn update<E: Entity, X: Executor>(
        &self,
        exec: &X,
        record: &mut E,
        columns: &ColumnSet,
    ) -> Result<u64> {
        let state = self.state::<E>()?;
        let desc = E::descriptor();

        self.stamp_updated(record)?;
        state.hooks.run(HookPoint::BeforeUpdate, exec, record)?;

        let key = CacheKey::update(columns.clone());
        let entry = state.update.get_or_build(CacheKind::Update, &key, || {
            let set = columns.update_columns(desc)?;
            let stmt = Update {
                table: desc.table,
                filter: Predicate::key(desc.primary_key_columns),
                set,
            };
            let binds: Vec<&str> = stmt
                .set
                .iter()
                .map(String::as_str)
                .chain(desc.primary_key_columns.iter().copied())
                .collect();
            self.entry::<E>(self.dialect().render_update(&stmt), &binds, &[] as &[&str])
        })?;

        let args = entry.value_binds.values(record);
        let affected = self.execute(exec, "update", desc.table, &entry.sql, &args)?;

        state.hooks.run(HookPoint::AfterUpdate, exec, record)?;
        Ok(affected)
    }

    /// Insert `record`, or resolve a conflict as `options` says.
    ///
    /// Returns the number of affected rows. With RETURNING columns this is 1
    /// when a row came back and 0 when the conflict was left alone.
    #[tracing::instrument(level = "debug", skip(self, exec, record), fields(table = E::table()))]
    pub fn upsert<E: Entity, X: Executor>(
        &self,
        exec: &X,
        record: &mut E,
        options: &UpsertOptions,
    ) -> Result<u64> {
        let state = self.state::<E>()?;
        let desc = E::descriptor();

        self.stamp_created(record)?;
        state.hooks.run(HookPoint::BeforeUpsert, exec, record)?;

        let key = CacheKey {
            columns: options.insert.clone(),
            non_zero_defaults: non_zero_defaults(record)?,
            conflict: options.conflict.clone(),
            update: Some(options.update.clone()),
            update_on_conflict: options.update_on_conflict,
        };
        let entry = state.upsert.get_or_build(CacheKind::Upsert, &key, || {
            let resolved = options.insert.insert_columns(desc, &key.non_zero_defaults);
            let update = match options.update.update_columns(desc) {
                Ok(update) => update,
                Err(_) if !options.update_on_conflict => Vec::new(),
                Err(_) => {
                    return Err(Error::config(
                        ConfigErrorKind::EmptyWriteList,
                        format!("unable to upsert {}, could not build update column list", desc.table),
                    ));
                }
            };
            let conflict = if options.conflict.is_empty() {
                desc.primary_key_columns.iter().map(|c| (*c).to_string()).collect()
            } else {
                options.conflict.clone()
            };
            let stmt = Upsert {
                table: desc.table,
                insert: resolved.write,
                conflict,
                update,
                returning: resolved.returning,
                update_on_conflict: options.update_on_conflict,
            };
            self.entry::<E>(self.dialect().render_upsert(&stmt), &stmt.insert, &stmt.returning)
        })?;

        let args = entry.value_binds.values(record);
        let affected = if entry.return_binds.is_empty() {
            self.execute(exec, "upsert", desc.table, &entry.sql, &args)?
        } else {
            // DO NOTHING (or a no-op DO UPDATE) returns no row; that is not an error.
            match self
                .query(exec, "upsert", desc.table, &entry.sql, &args)?
                .into_iter()
                .next()
            {
                Some(row) => {
                    entry.return_binds.assign(record, row_values(row))?;
                    1
                }
                None => 0,
            }
        };

        state.hooks.run(HookPoint::AfterUpsert, exec, record)?;
        Ok(affected)
    }

    /// Delete `record`.
    ///
    /// On a soft-delete entity a non-`hard` delete stamps the deleted-at
    /// column (in the database and on `record`) instead of removing the row.
    #[tracing::instrument(level = "debug", skip(self, exec, record), fields(table = E::table()))]
    pub fn delete<E: Entity, X: Executor>(&self, exec: &X, record: &mut E, hard: bool) -> Result<u64> {
        let state = self.state::<E>()?;
        let desc = E::descriptor();

        state.hooks.run(HookPoint::BeforeDelete, exec, record)?;

        let filter = Predicate::key(desc.primary_key_columns);
        let pk = record.primary_key_values()?;
        let affected = match soft_column(desc, hard) {
            None => {
                let sql = self.dialect().render_delete(&Delete {
                    table: desc.table,
                    filter,
                });
                self.execute(exec, "delete", desc.table, &sql, &pk)?
            }
            Some(deleted_at) => {
                let now = Value::Timestamp(self.now());
                let sql = self.dialect().render_update(&Update {
                    table: desc.table,
                    set: vec![deleted_at.to_string()],
                    filter,
                });
                let args: Vec<Value> = std::iter::once(now.clone()).chain(pk).collect();
                let affected = self.execute(exec, "delete", desc.table, &sql, &args)?;
                record.set_column_value(deleted_at, now)?;
                affected
            }
        };

        state.hooks.run(HookPoint::AfterDelete, exec, record)?;
        Ok(affected)
    }

    /// Delete every record in one statement.
    ///
    /// A soft delete stamps all rows with one shared timestamp. Delete hooks
    /// run for every record; empty input issues nothing and returns 0.
    #[tracing::instrument(level = "debug", skip(self, exec, records), fields(table = E::table(), count = records.len()))]
    pub fn delete_all<E: Entity, X: Executor>(
        &self,
        exec: &X,
        records: &mut [E],
        hard: bool,
    ) -> Result<u64> {
        let state = self.state::<E>()?;
        let desc = E::descriptor();
        if records.is_empty() {
            return Ok(0);
        }

        state.hooks.run_all(HookPoint::BeforeDelete, exec, records)?;

        let filter = vec![key_rows(desc, records.len())];
        let pks = primary_keys(records)?;
        let affected = match soft_column(desc, hard) {
            None => {
                let sql = self.dialect().render_delete(&Delete {
                    table: desc.table,
                    filter,
                });
                self.execute(exec, "delete all", desc.table, &sql, &pks)?
            }
            Some(deleted_at) => {
                let now = Value::Timestamp(self.now());
                let sql = self.dialect().render_update(&Update {
                    table: desc.table,
                    set: vec![deleted_at.to_string()],
                    filter,
                });
                let args: Vec<Value> = std::iter::once(now.clone()).chain(pks).collect();
                let affected = self.execute(exec, "delete all", desc.table, &sql, &args)?;
                for record in records.iter_mut() {
                    record.set_column_value(deleted_at, now.clone())?;
                }
                affected
            }
        };

        state.hooks.run_all(HookPoint::AfterDelete, exec, records)?;
        Ok(affected)
    }

    /// Set `columns` to the given values on every record's row, in one
    /// statement. Records in memory are left unchanged and no hooks run.
    #[tracing::instrument(level = "debug", skip(self, exec, records, columns), fields(table = E::table(), count = records.len()))]
    pub fn update_all<E: Entity, X: Executor>(
        &self,
        exec: &X,
        records: &[E],
        columns: &[(&str, Value)],
    ) -> Result<u64> {
        self.state::<E>()?;
        let desc = E::descriptor();
        if records.is_empty() {
            return Ok(0);
        }
        if columns.is_empty() {
            return Err(Error::config(
                ConfigErrorKind::EmptyWriteList,
                format!("update all on {} requires at least one column", desc.table),
            ));
        }
        for (column, _) in columns {
            check_column(desc, column)?;
        }

        let sql = self.dialect().render_update(&Update {
            table: desc.table,
            set: columns.iter().map(|(c, _)| (*c).to_string()).collect(),
            filter: vec![key_rows(desc, records.len())],
        });
        let args: Vec<Value> = columns
            .iter()
            .map(|(_, v)| v.clone())
            .chain(primary_keys(records)?)
            .collect();
        self.execute(exec, "update all", desc.table, &sql, &args)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Fetch one record by primary key, skipping soft-deleted rows.
    pub fn find<E: Entity, X: Executor>(&self, exec: &X, pk: &[Value]) -> Result<E> {
        self.find_by_key(exec, pk, Projection::All, true)
    }

    /// Fetch one record by primary key, including soft-deleted rows.
    pub fn find_unfiltered<E: Entity, X: Executor>(&self, exec: &X, pk: &[Value]) -> Result<E> {
        self.find_by_key(exec, pk, Projection::All, false)
    }

    /// Fetch only `columns` of one record; other fields keep their defaults.
    pub fn find_columns<E: Entity, X: Executor>(
        &self,
        exec: &X,
        pk: &[Value],
        columns: &[&str],
    ) -> Result<E> {
        let projection = if columns.is_empty() {
            Projection::All
        } else {
            for column in columns {
                check_column(E::descriptor(), column)?;
            }
            Projection::Columns(columns.iter().map(|c| (*c).to_string()).collect())
        };
        self.find_by_key(exec, pk, projection, true)
    }

    /// Whether a live row with this primary key exists.
    pub fn exists<E: Entity, X: Executor>(&self, exec: &X, pk: &[Value]) -> Result<bool> {
        self.state::<E>()?;
        let desc = E::descriptor();
        check_key_width(desc, pk)?;
        let select = Select::from(desc.table)
            .projection(Projection::Exists)
            .filters(Predicate::key(desc.primary_key_columns))
            .filters(soft_filter(desc));
        let sql = self.dialect().render_select(&select);
        let row = self.query(exec, "check if exists", desc.table, &sql, pk)?;
        Ok(row.first().and_then(|r| r.get(0)).is_some_and(truthy))
    }

    /// Refresh `record` from its row.
    pub fn reload<E: Entity, X: Executor>(&self, exec: &X, record: &mut E) -> Result<()> {
        *record = self.find(exec, &record.primary_key_values()?)?;
        Ok(())
    }

    /// Refresh every record in one query.
    ///
    /// The collection is replaced by whatever the database returns, so rows
    /// deleted (or soft-deleted) in the meantime drop out.
    pub fn reload_all<E: Entity, X: Executor>(&self, exec: &X, records: &mut Vec<E>) -> Result<()> {
        self.state::<E>()?;
        let desc = E::descriptor();
        if records.is_empty() {
            return Ok(());
        }
        let select = Select::from(desc.table)
            .filter(key_rows(desc, records.len()))
            .filters(soft_filter(desc));
        let args = primary_keys(records)?;
        *records = self.select::<E, X>(exec, &select, &args)?;
        Ok(())
    }

    fn find_by_key<E: Entity, X: Executor>(
        &self,
        exec: &X,
        pk: &[Value],
        projection: Projection,
        filtered: bool,
    ) -> Result<E> {
        self.state::<E>()?;
        let desc = E::descriptor();
        check_key_width(desc, pk)?;
        let mut select = Select::from(desc.table)
            .projection(projection)
            .filters(Predicate::key(desc.primary_key_columns));
        if filtered {
            select = select.filters(soft_filter(desc));
        }
        self.select::<E, X>(exec, &select, pk)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(desc.table))
    }

    // ========================================================================
    // Plumbing shared with the finder and relation loader
    // ========================================================================

    /// Run a SELECT, scan rows into records and run `AfterSelect` hooks.
    pub(crate) fn select<E: Entity, X: Executor>(
        &self,
        exec: &X,
        select: &Select,
        args: &[Value],
    ) -> Result<Vec<E>> {
        let hooks = self.hooks::<E>()?;
        let sql = self.dialect().render_select(select);
        let mut records = self
            .query(exec, "select", select.table, &sql, args)?
            .into_iter()
            .map(E::from_row)
            .collect::<Result<Vec<_>>>()?;
        hooks.run_all(HookPoint::AfterSelect, exec, &mut records)?;
        Ok(records)
    }

    pub(crate) fn execute<X: Executor>(
        &self,
        exec: &X,
        operation: &'static str,
        table: &'static str,
        sql: &str,
        args: &[Value],
    ) -> Result<u64> {
        self.emit(sql, args);
        exec.execute(sql, args)
            .map_err(|e| Error::execution(operation, table, e))
    }

    pub(crate) fn query<X: Executor>(
        &self,
        exec: &X,
        operation: &'static str,
        table: &'static str,
        sql: &str,
        args: &[Value],
    ) -> Result<Vec<Row>> {
        self.emit(sql, args);
        exec.query(sql, args)
            .map_err(|e| Error::execution(operation, table, e))
    }

    fn entry<E: Entity>(
        &self,
        sql: String,
        values: &[impl AsRef<str>],
        returning: &[impl AsRef<str>],
    ) -> Result<CacheEntry> {
        Ok(CacheEntry {
            sql,
            value_binds: BindMapping::resolve::<E, _>(values)?,
            return_binds: BindMapping::resolve::<E, _>(returning)?,
        })
    }

    fn stamp_created<E: Entity>(&self, record: &mut E) -> Result<()> {
        let desc = E::descriptor();
        if desc.created_at.is_none() && desc.updated_at.is_none() {
            return Ok(());
        }
        let now = Value::Timestamp(self.now());
        if let Some(created_at) = desc.created_at {
            if record.column_value(created_at)?.is_zero() {
                record.set_column_value(created_at, now.clone())?;
            }
        }
        if let Some(updated_at) = desc.updated_at {
            record.set_column_value(updated_at, now)?;
        }
        Ok(())
    }

    fn stamp_updated<E: Entity>(&self, record: &mut E) -> Result<()> {
        match E::descriptor().updated_at {
            Some(updated_at) => record.set_column_value(updated_at, Value::Timestamp(self.now())),
            None => Ok(()),
        }
    }
}

/// The deleted-at column, if this delete should be soft.
fn soft_column(desc: &EntityDescriptor, hard: bool) -> Option<&'static str> {
    if hard { None } else { desc.deleted_at }
}

/// `deleted_at IS NULL` for soft-delete entities.
pub(crate) fn soft_filter(desc: &EntityDescriptor) -> Option<Predicate> {
    desc.deleted_at.map(Predicate::is_null)
}

fn key_rows(desc: &EntityDescriptor, rows: usize) -> Predicate {
    Predicate::KeyRows {
        keys: desc.primary_key_columns.iter().map(|c| (*c).to_string()).collect(),
        rows,
    }
}

fn primary_keys<E: Entity>(records: &[E]) -> Result<Vec<Value>> {
    let mut out = Vec::with_capacity(records.len() * E::descriptor().primary_key_columns.len());
    for record in records {
        out.extend(record.primary_key_values()?);
    }
    Ok(out)
}

pub(crate) fn check_column(desc: &EntityDescriptor, column: &str) -> Result<()> {
    if desc.has_column(column) {
        Ok(())
    } else {
        Err(Error::config(
            ConfigErrorKind::UnknownColumn,
            format!("{} has no column {column}", desc.table),
        ))
    }
}

fn check_key_width(desc: &EntityDescriptor, pk: &[Value]) -> Result<()> {
    if pk.len() == desc.primary_key_columns.len() {
        Ok(())
    } else {
        Err(Error::config(
            ConfigErrorKind::TypeMismatch,
            format!(
                "{} primary key has {} columns, got {} values",
                desc.table,
                desc.primary_key_columns.len(),
                pk.len()
            ),
        ))
    }
}

fn row_values(row: Row) -> Vec<Value> {
    row.into_pairs().map(|(_, v)| v).collect()
}

/// EXISTS and COUNT come back as booleans on some databases and integers on
/// others.
pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        other => other.as_i64().is_some_and(|i| i != 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Mech, Pilot, Recorder, fixed_clock, mech_row, registry, row, t0};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_insert_infers_and_reads_back_defaults() {
        let reg = registry();
        let db = Recorder::new().with_rows(vec![row(&[
            ("id", Value::BigInt(10)),
            ("hp", Value::Int(100)),
        ])]);
        let mut mech = Mech::new("Atlas");

        reg.insert(&db, &mut mech, &ColumnSet::Infer).unwrap();

        let calls = db.calls();
        assert_eq!(
            calls[0].0,
            r#"INSERT INTO "mechs" ("label", "owner_id", "created_at", "updated_at", "deleted_at") VALUES ($1, $2, $3, $4, $5) RETURNING "id", "hp""#
        );
        assert_eq!(calls[0].1[0], Value::Text("Atlas".into()));
        assert_eq!(mech.id, 10);
        assert_eq!(mech.hp, 100);
        assert_eq!(mech.created_at, Some(t0()));
        assert_eq!(mech.updated_at, Some(t0()));
    }

    #[test]
    fn test_insert_with_populated_default_writes_it() {
        let reg = registry();
        let db = Recorder::new().with_rows(vec![row(&[("id", Value::BigInt(11))])]);
        let mut mech = Mech::new("Atlas");
        mech.hp = 80;

        reg.insert(&db, &mut mech, &ColumnSet::Infer).unwrap();

        let sql = &db.calls()[0].0;
        assert!(sql.contains(r#""hp""#));
        assert!(sql.ends_with(r#"RETURNING "id""#));
        assert_eq!(mech.id, 11);
    }

    #[test]
    fn test_insert_cache_is_reused_per_shape() {
        let reg = registry();
        let db = Recorder::new()
            .with_rows(vec![row(&[("id", Value::BigInt(1)), ("hp", Value::Int(100))])])
            .with_rows(vec![row(&[("id", Value::BigInt(2)), ("hp", Value::Int(100))])])
            .with_rows(vec![row(&[("id", Value::BigInt(3))])]);

        reg.insert(&db, &mut Mech::new("a"), &ColumnSet::Infer).unwrap();
        reg.insert(&db, &mut Mech::new("b"), &ColumnSet::Infer).unwrap();
        assert_eq!(reg.cached_statements::<Mech>().unwrap(), 1);

        let mut populated = Mech::new("c");
        populated.hp = 50;
        reg.insert(&db, &mut populated, &ColumnSet::Infer).unwrap();
        assert_eq!(reg.cached_statements::<Mech>().unwrap(), 2);
    }

    #[test]
    fn test_insert_whitelist_without_returning_executes() {
        let reg = registry();
        let db = Recorder::new();
        let mut pilot = Pilot {
            id: 4,
            callsign: "Mad Cat".into(),
            ..Pilot::default()
        };
        reg.insert(&db, &mut pilot, &ColumnSet::whitelist(["id", "callsign"]))
            .unwrap();
        let calls = db.calls();
        assert_eq!(
            calls[0].0,
            r#"INSERT INTO "pilots" ("id", "callsign") VALUES ($1, $2)"#
        );
        assert_eq!(calls[0].1, vec![Value::BigInt(4), Value::Text("Mad Cat".into())]);
    }

    #[test]
    fn test_before_insert_hooks_short_circuit() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let hook = |name: &'static str, fail: bool| {
            let log = Arc::clone(&log);
            move |_: &dyn Executor, _: &mut Mech| -> std::result::Result<(), rowbind_core::BoxError> {
                log.lock().unwrap().push(name);
                if fail { Err(format!("{name} failed").into()) } else { Ok(()) }
            }
        };
        let reg = Registry::builder()
            .register::<Pilot>()
            .hook::<Mech, _>(HookPoint::BeforeInsert, hook("h1", false))
            .hook::<Mech, _>(HookPoint::BeforeInsert, hook("h2", true))
            .hook::<Mech, _>(HookPoint::BeforeInsert, hook("h3", false))
            .clock(fixed_clock())
            .build()
            .unwrap();
        let db = Recorder::new();

        let err = reg
            .insert(&db, &mut Mech::new("Atlas"), &ColumnSet::Infer)
            .unwrap_err();

        assert!(err.is_hook());
        assert!(err.to_string().contains("h2 failed"));
        assert_eq!(*log.lock().unwrap(), vec!["h1", "h2"]);
        assert!(db.calls().is_empty());
    }

    #[test]
    fn test_after_hook_failure_follows_write() {
        let reg = Registry::builder()
            .hook::<Pilot, _>(HookPoint::AfterUpdate, |_, _| Err("notify failed".into()))
            .build()
            .unwrap();
        let db = Recorder::new();
        let mut pilot = Pilot {
            id: 1,
            callsign: "Nova".into(),
            ..Pilot::default()
        };
        let err = reg.update(&db, &mut pilot, &ColumnSet::Infer).unwrap_err();
        assert!(err.is_hook());
        assert_eq!(db.calls().len(), 1);
    }

    #[test]
    fn test_update_sets_updated_at_and_skips_created_at() {
        let reg = registry();
        let db = Recorder::new();
        let mut mech = Mech::new("Atlas");
        mech.id = 3;

        let n = reg.update(&db, &mut mech, &ColumnSet::Infer).unwrap();

        assert_eq!(n, 1);
        let (sql, args) = &db.calls()[0];
        assert_eq!(
            sql,
            r#"UPDATE "mechs" SET "label" = $1, "owner_id" = $2, "hp" = $3, "updated_at" = $4, "deleted_at" = $5 WHERE "id" = $6"#
        );
        assert_eq!(args[3], Value::Timestamp(t0()));
        assert_eq!(args[5], Value::BigInt(3));
    }

    #[test]
    fn test_update_empty_whitelist_is_config_error() {
        let reg = registry();
        let db = Recorder::new();
        let err = reg
            .update(&db, &mut Mech::new("x"), &ColumnSet::whitelist(["id"]))
            .unwrap_err();
        assert!(err.is_config());
        assert!(db.calls().is_empty());
    }

    #[test]
    fn test_upsert_do_update_defaults_conflict_to_pk() {
        let reg = registry();
        let db = Recorder::new();
        let mut pilot = Pilot {
            id: 9,
            callsign: "Kerensky".into(),
            ..Pilot::default()
        };
        reg.upsert(&db, &mut pilot, &UpsertOptions::do_update().insert(ColumnSet::whitelist(["id", "callsign"])))
            .unwrap();
        assert_eq!(
            db.calls()[0].0,
            r#"INSERT INTO "pilots" ("id", "callsign") VALUES ($1, $2) ON CONFLICT ("id") DO UPDATE SET "callsign" = EXCLUDED."callsign""#
        );
    }

    #[test]
    fn test_upsert_returning_without_row_is_not_error() {
        let reg = registry();
        let db = Recorder::new();
        let mut mech = Mech::new("Atlas");
        let n = reg
            .upsert(&db, &mut mech, &UpsertOptions::do_nothing())
            .unwrap();
        assert_eq!(n, 0);
        assert!(db.calls()[0].0.contains("ON CONFLICT DO NOTHING RETURNING"));
    }

    #[test]
    fn test_upsert_update_requires_columns() {
        let reg = registry();
        let db = Recorder::new();
        let opts = UpsertOptions::do_update().update(ColumnSet::whitelist(["id"]));
        let err = reg.upsert(&db, &mut Mech::new("x"), &opts).unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("unable to upsert mechs"));
    }

    #[test]
    fn test_soft_delete_stamps_record() {
        let reg = registry();
        let db = Recorder::new();
        let mut mech = Mech::new("Atlas");
        mech.id = 5;

        reg.delete(&db, &mut mech, false).unwrap();

        let (sql, args) = &db.calls()[0];
        assert_eq!(sql, r#"UPDATE "mechs" SET "deleted_at" = $1 WHERE "id" = $2"#);
        assert_eq!(args, &vec![Value::Timestamp(t0()), Value::BigInt(5)]);
        assert_eq!(mech.deleted_at, Some(t0()));
    }

    #[test]
    fn test_hard_delete_removes_even_soft_entities() {
        let reg = registry();
        let db = Recorder::new();
        let mut mech = Mech::new("Atlas");
        mech.id = 5;
        reg.delete(&db, &mut mech, true).unwrap();
        assert_eq!(db.calls()[0].0, r#"DELETE FROM "mechs" WHERE "id" = $1"#);
        assert_eq!(mech.deleted_at, None);
    }

    #[test]
    fn test_soft_flag_ignored_without_deleted_at() {
        let reg = registry();
        let db = Recorder::new();
        let mut pilot = Pilot {
            id: 2,
            ..Pilot::default()
        };
        reg.delete(&db, &mut pilot, false).unwrap();
        assert!(db.calls()[0].0.starts_with("DELETE FROM"));
    }

    #[test]
    fn test_batch_soft_delete_shares_one_timestamp() {
        let ticks = Arc::new(Mutex::new(0i64));
        let clock_ticks = Arc::clone(&ticks);
        let reg = Registry::builder()
            .register::<Mech>()
            .clock(move || {
                let mut n = clock_ticks.lock().unwrap();
                *n += 1;
                t0() + chrono::Duration::seconds(*n)
            })
            .build()
            .unwrap();
        let db = Recorder::new();
        let mut mechs: Vec<Mech> = (1..=3)
            .map(|i| {
                let mut m = Mech::new("m");
                m.id = i;
                m
            })
            .collect();

        let n = reg.delete_all(&db, &mut mechs, false).unwrap();

        assert_eq!(n, 1);
        let (sql, args) = &db.calls()[0];
        assert_eq!(
            sql,
            r#"UPDATE "mechs" SET "deleted_at" = $1 WHERE ("id" = $2) OR ("id" = $3) OR ("id" = $4)"#
        );
        assert_eq!(args.len(), 4);
        let stamp = mechs[0].deleted_at;
        assert!(stamp.is_some());
        assert!(mechs.iter().all(|m| m.deleted_at == stamp));
        assert_eq!(*ticks.lock().unwrap(), 1);
    }

    #[test]
    fn test_delete_all_runs_hooks_per_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reg = Registry::builder()
            .hook::<Pilot, _>(HookPoint::AfterDelete, move |_, p| {
                sink.lock().unwrap().push(p.id);
                Ok(())
            })
            .build()
            .unwrap();
        let db = Recorder::new();
        let mut pilots = vec![
            Pilot {
                id: 1,
                ..Pilot::default()
            },
            Pilot {
                id: 2,
                ..Pilot::default()
            },
        ];
        reg.delete_all(&db, &mut pilots, true).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
        assert_eq!(
            db.calls()[0].0,
            r#"DELETE FROM "pilots" WHERE ("id" = $1) OR ("id" = $2)"#
        );
    }

    #[test]
    fn test_delete_all_empty_is_noop() {
        let reg = registry();
        let db = Recorder::new();
        assert_eq!(reg.delete_all::<Mech, _>(&db, &mut [], false).unwrap(), 0);
        assert!(db.calls().is_empty());
    }

    #[test]
    fn test_update_all() {
        let reg = registry();
        let db = Recorder::new().affecting(2);
        let pilots = vec![
            Pilot {
                id: 1,
                ..Pilot::default()
            },
            Pilot {
                id: 2,
                ..Pilot::default()
            },
        ];
        let n = reg
            .update_all(&db, &pilots, &[("callsign", Value::from("Ghost"))])
            .unwrap();
        assert_eq!(n, 2);
        let (sql, args) = &db.calls()[0];
        assert_eq!(
            sql,
            r#"UPDATE "pilots" SET "callsign" = $1 WHERE ("id" = $2) OR ("id" = $3)"#
        );
        assert_eq!(args[0], Value::Text("Ghost".into()));

        let err = reg
            .update_all(&db, &pilots, &[("rank", Value::Int(1))])
            .unwrap_err();
        assert!(err.is_config());
        assert!(reg.update_all::<Pilot, _>(&db, &pilots, &[]).unwrap_err().is_config());
    }

    #[test]
    fn test_find_applies_soft_filter_and_not_found() {
        let reg = registry();
        let db = Recorder::new();
        let err = reg.find::<Mech, _>(&db, &[Value::BigInt(1)]).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            db.calls()[0].0,
            r#"SELECT "mechs".* FROM "mechs" WHERE "id" = $1 AND "deleted_at" IS NULL"#
        );

        let _ = reg.find_unfiltered::<Mech, _>(&db, &[Value::BigInt(1)]);
        assert_eq!(
            db.calls()[1].0,
            r#"SELECT "mechs".* FROM "mechs" WHERE "id" = $1"#
        );
    }

    #[test]
    fn test_find_runs_after_select_hooks() {
        let reg = Registry::builder()
            .hook::<Mech, _>(HookPoint::AfterSelect, |_, m| {
                m.label = m.label.to_uppercase();
                Ok(())
            })
            .build()
            .unwrap();
        let db = Recorder::new().with_rows(vec![mech_row(1, "atlas", None, 100)]);
        let mech: Mech = reg.find(&db, &[Value::BigInt(1)]).unwrap();
        assert_eq!(mech.label, "ATLAS");
    }

    #[test]
    fn test_find_columns_projection() {
        let reg = registry();
        let db = Recorder::new().with_rows(vec![row(&[
            ("id", Value::BigInt(1)),
            ("label", Value::Text("Atlas".into())),
        ])]);
        let mech: Mech = reg
            .find_columns(&db, &[Value::BigInt(1)], &["id", "label"])
            .unwrap();
        assert_eq!(mech.label, "Atlas");
        assert_eq!(mech.hp, 0);
        assert!(db.calls()[0].0.starts_with(r#"SELECT "id", "label" FROM"#));

        let err = reg
            .find_columns::<Mech, _>(&db, &[Value::BigInt(1)], &["armor"])
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_exists() {
        let reg = registry();
        let db = Recorder::new().with_rows(vec![row(&[("exists", Value::Bool(true))])]);
        assert!(reg.exists::<Mech, _>(&db, &[Value::BigInt(1)]).unwrap());
        assert!(!reg.exists::<Mech, _>(&db, &[Value::BigInt(2)]).unwrap());
        assert!(db.calls()[0].0.starts_with("SELECT EXISTS("));
    }

    #[test]
    fn test_reload_all_replaces_collection() {
        let reg = registry();
        let db = Recorder::new().with_rows(vec![mech_row(1, "fresh", None, 90)]);
        let mut mechs = vec![Mech::new("stale"), Mech::new("gone")];
        mechs[0].id = 1;
        mechs[1].id = 2;

        reg.reload_all(&db, &mut mechs).unwrap();

        assert_eq!(mechs.len(), 1);
        assert_eq!(mechs[0].label, "fresh");
        assert_eq!(
            db.calls()[0].0,
            r#"SELECT "mechs".* FROM "mechs" WHERE (("id" = $1) OR ("id" = $2)) AND "deleted_at" IS NULL"#
        );
    }

    #[test]
    fn test_key_width_checked() {
        let reg = registry();
        let db = Recorder::new();
        let err = reg.find::<Mech, _>(&db, &[]).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_unregistered_entity() {
        let reg = Registry::builder().register::<Pilot>().build().unwrap();
        let db = Recorder::new();
        let err = reg
            .insert(&db, &mut Mech::new("x"), &ColumnSet::Infer)
            .unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("unregistered entity"));
    }

    #[test]
    fn test_executor_error_is_wrapped() {
        let reg = registry();
        let db = Recorder::new().failing("connection reset");
        let mut pilot = Pilot::default();
        let err = reg.delete(&db, &mut pilot, true).unwrap_err();
        assert!(err.is_execution());
        assert_eq!(
            err.to_string(),
            "rowbind: unable to delete pilots: connection reset"
        );
    }
}
