//! Fixtures shared by the unit tests of this crate.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use rowbind_core::{
    Accessor, BoxError, Entity, EntityDescriptor, Executor, RelationDescriptor, Row, Value,
};

use crate::loader::{Loaded, Relation};
use crate::registry::Registry;

pub(crate) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub(crate) fn fixed_clock() -> impl Fn() -> DateTime<Utc> + Send + Sync + 'static {
    t0
}

/// Registry with both fixture entities and a frozen clock.
pub(crate) fn registry() -> Registry {
    Registry::builder()
        .register::<Mech>()
        .register::<Pilot>()
        .clock(fixed_clock())
        .build()
        .unwrap()
}

pub(crate) fn row(pairs: &[(&str, Value)]) -> Row {
    Row::new(
        pairs.iter().map(|(c, _)| (*c).to_string()).collect::<Vec<_>>(),
        pairs.iter().map(|(_, v)| v.clone()).collect(),
    )
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Debug, Default, Clone)]
pub(crate) struct Mech {
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
    pub(crate) fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
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
    .with_default(&["id", "hp", "created_at", "updated_at"])
    .without_default(&["label", "owner_id", "deleted_at"])
    .primary_key(&["id"])
    .created_at("created_at")
    .updated_at("updated_at")
    .soft_delete("deleted_at");

rowbind_core::accessors!(MECH_ACCESSORS: Mech {
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

pub(crate) fn mech_row(id: i64, label: &str, owner_id: Option<i64>, hp: i32) -> Row {
    row(&[
        ("id", Value::BigInt(id)),
        ("label", Value::from(label)),
        ("owner_id", Value::from(owner_id)),
        ("hp", Value::Int(hp)),
        ("created_at", Value::Timestamp(t0())),
        ("updated_at", Value::Timestamp(t0())),
        ("deleted_at", Value::Null),
    ])
}

#[derive(Debug, Default, Clone)]
pub(crate) struct Pilot {
    pub id: i64,
    pub callsign: String,
    pub mechs: Vec<Arc<Loaded<Mech>>>,
}

static PILOTS: EntityDescriptor = EntityDescriptor::new("pilots")
    .columns(&["id", "callsign"])
    .with_default(&["id"])
    .without_default(&["callsign"])
    .primary_key(&["id"]);

rowbind_core::accessors!(PILOT_ACCESSORS: Pilot {
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

pub(crate) fn pilot_row(id: i64, callsign: &str) -> Row {
    row(&[("id", Value::BigInt(id)), ("callsign", Value::from(callsign))])
}

fn mech_pilot(m: &mut Mech) -> &mut Option<Arc<Loaded<Pilot>>> {
    &mut m.pilot
}

fn pilot_mechs(p: &mut Pilot) -> &mut Vec<Arc<Loaded<Mech>>> {
    &mut p.mechs
}

pub(crate) const MECH_PILOT: Relation<Mech, Pilot> =
    Relation::one(RelationDescriptor::to_one("pilot", "owner_id", "id"), mech_pilot);

pub(crate) const PILOT_MECHS: Relation<Pilot, Mech> = Relation::many(
    RelationDescriptor::to_many("mechs", "id", "owner_id").remote_soft_delete(true),
    pilot_mechs,
);

// ============================================================================
// Executor
// ============================================================================

/// Records every statement and answers queries from a script.
///
/// `query` pops the next scripted row set (empty once the script runs out);
/// `execute` reports a fixed affected-row count.
pub(crate) struct Recorder {
    calls: Mutex<Vec<(String, Vec<Value>)>>,
    rows: Mutex<VecDeque<Vec<Row>>>,
    affected: u64,
    fail: Option<String>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            rows: Mutex::new(VecDeque::new()),
            affected: 1,
            fail: None,
        }
    }

    pub(crate) fn with_rows(self, rows: Vec<Row>) -> Self {
        self.rows.lock().unwrap().push_back(rows);
        self
    }

    pub(crate) fn affecting(mut self, n: u64) -> Self {
        self.affected = n;
        self
    }

    pub(crate) fn failing(mut self, message: &str) -> Self {
        self.fail = Some(message.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, args: &[Value]) -> Result<(), BoxError> {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), args.to_vec()));
        match &self.fail {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

impl Executor for Recorder {
    fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, BoxError> {
        self.record(sql, args)?;
        Ok(self.affected)
    }

    fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, BoxError> {
        self.record(sql, args)?;
        Ok(self.rows.lock().unwrap().pop_front().unwrap_or_default())
    }
}
