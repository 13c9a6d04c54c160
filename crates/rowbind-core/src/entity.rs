//! Record types and their field accessors.
//!
//! Instead of reflecting over struct fields at runtime, each record type ships
//! a static table of [`Accessor`]s: one getter/setter pair per column. The
//! [`BindMapping`] resolves column names to positions in that table once, and
//! the cached positions are then used to pull values out of a record and to
//! write returned values back into it.

use std::fmt;

use crate::descriptor::EntityDescriptor;
use crate::error::{ConfigErrorKind, Error, Result};
use crate::row::Row;
use crate::value::Value;

/// Typed getter/setter pair for one column of `E`.
pub struct Accessor<E> {
    /// Column name.
    pub column: &'static str,
    /// Read the field as a [`Value`].
    pub get: fn(&E) -> Value,
    /// Assign a [`Value`] to the field.
    pub set: fn(&mut E, Value) -> Result<()>,
}

impl<E> Accessor<E> {
    pub const fn new(
        column: &'static str,
        get: fn(&E) -> Value,
        set: fn(&mut E, Value) -> Result<()>,
    ) -> Self {
        Self { column, get, set }
    }
}

impl<E> fmt::Debug for Accessor<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Accessor")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// A record type backed by one table.
///
/// Implementations are normally generated. `Default` provides the blank
/// record that query results are scanned into.
pub trait Entity: Default + Send + Sync + 'static {
    /// Static column metadata.
    fn descriptor() -> &'static EntityDescriptor;

    /// One accessor per column.
    fn accessors() -> &'static [Accessor<Self>];

    /// Table name, for convenience.
    fn table() -> &'static str {
        Self::descriptor().table
    }

    /// Read a single column by name.
    fn column_value(&self, column: &str) -> Result<Value> {
        let idx = accessor_index::<Self>(column)?;
        Ok((Self::accessors()[idx].get)(self))
    }

    /// Assign a single column by name.
    fn set_column_value(&mut self, column: &str, value: Value) -> Result<()> {
        let idx = accessor_index::<Self>(column)?;
        (Self::accessors()[idx].set)(self, value)
    }

    /// Primary key values in descriptor order.
    fn primary_key_values(&self) -> Result<Vec<Value>> {
        Self::descriptor()
            .primary_key_columns
            .iter()
            .map(|c| self.column_value(c))
            .collect()
    }

    /// Build a record from a result row.
    ///
    /// Columns missing from the row keep their `Default` value; a row column
    /// with no accessor, or a row whose value count differs from its column
    /// count, is a configuration error.
    fn from_row(row: Row) -> Result<Self> {
        if !row.is_well_formed() {
            return Err(Error::config(
                ConfigErrorKind::TypeMismatch,
                format!(
                    "{} row has {} columns but {} values",
                    Self::table(),
                    row.columns().len(),
                    row.values().len()
                ),
            ));
        }
        let mut record = Self::default();
        for (column, value) in row.into_pairs() {
            record.set_column_value(&column, value)?;
        }
        Ok(record)
    }
}

fn accessor_index<E: Entity>(column: &str) -> Result<usize> {
    E::accessors()
        .iter()
        .position(|a| a.column == column)
        .ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnknownColumn,
                format!("{} has no field for column {column}", E::table()),
            )
        })
}

/// Ordered correspondence between SQL parameters and record fields.
///
/// Position `i` of the mapping holds the accessor index backing the `i`-th
/// placeholder (or the `i`-th RETURNING column).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BindMapping(Vec<usize>);

impl BindMapping {
    /// Resolve `columns` against the accessors of `E`.
    ///
    /// Fails with [`ConfigErrorKind::UnknownColumn`] if any column has no field.
    pub fn resolve<E: Entity, S: AsRef<str>>(columns: &[S]) -> Result<Self> {
        columns
            .iter()
            .map(|c| accessor_index::<E>(c.as_ref()))
            .collect::<Result<Vec<_>>>()
            .map(Self)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Read the mapped fields of `record`, in placeholder order.
    pub fn values<E: Entity>(&self, record: &E) -> Vec<Value> {
        let accessors = E::accessors();
        self.0.iter().map(|&i| (accessors[i].get)(record)).collect()
    }

    /// Write `values` into the mapped fields of `record`, in mapping order.
    pub fn assign<E: Entity>(&self, record: &mut E, values: Vec<Value>) -> Result<()> {
        if values.len() != self.0.len() {
            return Err(Error::config(
                ConfigErrorKind::TypeMismatch,
                format!(
                    "{} expected {} returned values, got {}",
                    E::table(),
                    self.0.len(),
                    values.len()
                ),
            ));
        }
        let accessors = E::accessors();
        for (&i, value) in self.0.iter().zip(values) {
            (accessors[i].set)(record, value)?;
        }
        Ok(())
    }
}

/// Declare the accessor table of a record type.
///
/// ```
/// use rowbind_core::{accessors, Accessor, Value};
///
/// #[derive(Default)]
/// struct Pilot {
///     id: i64,
///     callsign: Option<String>,
/// }
///
/// accessors!(PILOT_ACCESSORS: Pilot {
///     id => "id",
///     callsign => "callsign",
/// });
///
/// let p = Pilot { id: 3, callsign: None };
/// assert_eq!((PILOT_ACCESSORS[0].get)(&p), Value::BigInt(3));
/// assert_eq!((PILOT_ACCESSORS[1].get)(&p), Value::Null);
/// ```
#[macro_export]
macro_rules! accessors {
    ($name:ident : $ty:ty { $($field:ident => $column:literal),* $(,)? }) => {
        static $name: &[$crate::Accessor<$ty>] = &[
            $(
                $crate::Accessor::new(
                    $column,
                    |e: &$ty| $crate::Value::from(::std::clone::Clone::clone(&e.$field)),
                    |e: &mut $ty, v: $crate::Value| {
                        e.$field = $crate::FromValue::from_value(v)?;
                        ::std::result::Result::Ok(())
                    },
                ),
            )*
        ];
    };
}
