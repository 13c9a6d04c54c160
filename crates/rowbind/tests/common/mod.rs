//! Shared fixtures for the SQLite-backed integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rowbind::prelude::*;
use rusqlite::types::{Value as SqlValue, ValueRef};

// ============================================================================
// Executor
// ============================================================================

/// In-memory SQLite database driven through [`Executor`].
pub struct Sqlite {
    conn: rusqlite::Connection,
}

impl Sqlite {
    pub fn open() -> Self {
        let conn = rusqlite::Connection::open_in_memory().expect("open sqlite memory db");
        conn.execute_batch(SCHEMA).expect("create schema");
        Self { conn }
    }

    /// Run raw SQL outside of rowbind, for assertions.
    pub fn scalar_i64(&self, sql: &str) -> i64 {
        self.conn
            .query_row(sql, [], |row| row.get(0))
            .expect("scalar query")
    }

    pub fn texts(&self, sql: &str) -> Vec<Option<String>> {
        let mut stmt = self.conn.prepare(sql).expect("prepare");
        stmt.query_map([], |row| row.get(0))
            .expect("query")
            .collect::<rusqlite::Result<_>>()
            .expect("collect")
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::SmallInt(i) => SqlValue::Integer(i64::from(*i)),
        Value::Int(i) => SqlValue::Integer(i64::from(*i)),
        Value::BigInt(i) => SqlValue::Integer(*i),
        Value::Double(f) => SqlValue::Real(*f),
        Value::Decimal(s) | Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bytes(b) => SqlValue::Blob(b.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.to_rfc3339()),
        Value::Json(j) => SqlValue::Text(j.to_string()),
    }
}

fn from_sql(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::BigInt(i),
        ValueRef::Real(f) => Value::Double(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

impl Executor for Sqlite {
    fn execute(&self, sql: &str, args: &[Value]) -> std::result::Result<u64, BoxError> {
        let n = self
            .conn
            .execute(sql, rusqlite::params_from_iter(args.iter().map(to_sql)))?;
        Ok(n as u64)
    }

    fn query(&self, sql: &str, args: &[Value]) -> std::result::Result<Vec<Row>, BoxError> {
        let mut stmt = self.conn.prepare(sql)?;
        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut rows = stmt.query(rusqlite::params_from_iter(args.iter().map(to_sql)))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let values = (0..columns.len())
                .map(|i| row.get_ref(i).map(from_sql))
                .collect::<rusqlite::Result<Vec<_>>>()?;
            out.push(Row::new(Arc::clone(&columns), values));
        }
        Ok(out)
    }
}

const SCHEMA: &str = r#"
CREATE TABLE "pilots" (
    "id" INTEGER PRIMARY KEY,
    "callsign" TEXT NOT NULL
);
CREATE TABLE "mechs" (
    "id" INTEGER PRIMARY KEY,
    "label" TEXT NOT NULL,
    "owner_id" INTEGER REFERENCES "pilots" ("id"),
    "hp" INTEGER NOT NULL DEFAULT 100,
    "created_at" TEXT,
    "updated_at" TEXT,
    "deleted_at" TEXT
);
CREATE TABLE "audit" (
    "entry" TEXT NOT NULL
);
"#;

// ============================================================================
// Clocks
// ============================================================================

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

/// A clock that advances one second on every read.
pub fn ticking_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
    let ticks = AtomicI64::new(0);
    move || t0() + Duration::seconds(ticks.fetch_add(1, Ordering::SeqCst))
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}

/// Registry over SQLite with both fixture entities.
pub fn registry() -> Registry {
    init_tracing();
    Registry::builder()
        .dialect(Dialect::Sqlite)
        .register::<Pilot>()
        .register::<Mech>()
        .clock(t0)
        .build()
        .expect("registry")
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct Pilot {
    pub id: i64,
    pub callsign: String,
    pub mechs: Vec<Arc<Loaded<Mech>>>,
}

impl Pilot {
    pub fn new(id: i64, callsign: &str) -> Self {
        Self {
            id,
            callsign: callsign.to_string(),
            ..Self::default()
        }
    }
}

static PILOTS: EntityDescriptor = EntityDescriptor::new("pilots")
    .columns(&["id", "callsign"])
    .with_default(&["id"])
    .without_default(&["callsign"])
    .primary_key(&["id"]);

rowbind::accessors!(PILOT_ACCESSORS: Pilot {
    id => "id",
    callsign => "callsign",
});

impl Entity for Pilot {
    fn descriptor() -> &'static EntityDescriptor {
        &PILOTS
    }

    fn accessors() -> &'static [Accessor<Self>] {
        PILOT_ACCESSORS
    }
}

#[derive(Debug, Default, Clone)]
pub struct Mech {
    pub id: i64,
    pub label: String,
    pub owner_id: Option<i64>,
    pub hp: i32,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub pilot: Option<Arc<Loaded<Pilot>>>,
}

impl Mech {
    pub fn new(label: &str, owner_id: Option<i64>) -> Self {
        Self {
            label: label.to_string(),
            owner_id,
            ..Self::default()
        }
    }
}

static MECHS: EntityDescriptor = EntityDescriptor::new("mechs")
    .columns(&[
        "id",
        "label",
        "owner_id",
        "hp",
        "created_at",
        "updated_at",
        "deleted_at",
    ])
    .with_default(&["id", "hp"])
    .without_default(&["label", "owner_id", "created_at", "updated_at", "deleted_at"])
    .primary_key(&["id"])
    .created_at("created_at")
    .updated_at("updated_at")
    .soft_delete("deleted_at");

rowbind::accessors!(MECH_ACCESSORS: Mech {
    id => "id",
    label => "label",
    owner_id => "owner_id",
    hp => "hp",
    created_at => "created_at",
    updated_at => "updated_at",
    deleted_at => "deleted_at",
});

impl Entity for Mech {
    fn descriptor() -> &'static EntityDescriptor {
        &MECHS
    }

    fn accessors() -> &'static [Accessor<Self>] {
        MECH_ACCESSORS
    }
}

fn mech_pilot(m: &mut Mech) -> &mut Option<Arc<Loaded<Pilot>>> {
    &mut m.pilot
}

fn pilot_mechs(p: &mut Pilot) -> &mut Vec<Arc<Loaded<Mech>>> {
    &mut p.mechs
}

pub const MECH_PILOT: Relation<Mech, Pilot> =
    Relation::one(RelationDescriptor::to_one("pilot", "owner_id", "id"), mech_pilot);

pub const PILOT_MECHS: Relation<Pilot, Mech> = Relation::many(
    RelationDescriptor::to_many("mechs", "id", "owner_id").remote_soft_delete(true),
    pilot_mechs,
);

/// Insert two pilots and four mechs (the last one unowned).
pub fn seed(db: &Sqlite, registry: &Registry) -> (Vec<Pilot>, Vec<Mech>) {
    let mut pilots = vec![Pilot::new(1, "Natasha"), Pilot::new(2, "Aidan")];
    for p in &mut pilots {
        registry
            .insert(db, p, &ColumnSet::Infer)
            .expect("insert pilot");
    }
    let mut mechs = vec![
        Mech::new("Atlas", Some(1)),
        Mech::new("Hunchback", Some(1)),
        Mech::new("Locust", Some(2)),
        Mech::new("Urbanmech", None),
    ];
    for m in &mut mechs {
        registry
            .insert(db, m, &ColumnSet::Infer)
            .expect("insert mech");
    }
    (pilots, mechs)
}
