//! The executor capability.
//!
//! This trait is the entire boundary to the database. Any connection or open
//! transaction that can run a statement with positional arguments can be
//! injected; rowbind never opens, commits or rolls back a transaction itself,
//! so multi-statement atomicity is exactly as strong as the executor supplied.

use crate::error::BoxError;
use crate::row::Row;
use crate::value::Value;

/// Something that can run SQL with bound parameters.
///
/// Calls are blocking. Errors are returned verbatim; rowbind wraps them with
/// the failing operation and table but never retries.
pub trait Executor {
    /// Run a statement that returns no rows; yields the number of affected rows.
    fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, BoxError>;

    /// Run a statement and collect every returned row.
    fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, BoxError>;

    /// Run a statement and return its first row, or `None` if it produced none.
    fn query_one(&self, sql: &str, args: &[Value]) -> Result<Option<Row>, BoxError> {
        Ok(self.query(sql, args)?.into_iter().next())
    }
}

impl<X: Executor + ?Sized> Executor for &X {
    fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, BoxError> {
        (**self).execute(sql, args)
    }

    fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, BoxError> {
        (**self).query(sql, args)
    }

    fn query_one(&self, sql: &str, args: &[Value]) -> Result<Option<Row>, BoxError> {
        (**self).query_one(sql, args)
    }
}
