//! Lifecycle hooks.
//!
//! Each entity has one ordered hook list per [`HookPoint`]. Lists are filled
//! while the registry is being built and are read-only afterwards.

use std::collections::HashMap;
use std::fmt;

use rowbind_core::{BoxError, Entity, Error, Executor, HookError, HookPoint, Result};

/// A lifecycle callback for records of type `E`.
///
/// Hooks receive the executor the operation runs on, so they can issue
/// statements of their own inside the caller's transaction.
pub type Hook<E> =
    Box<dyn Fn(&dyn Executor, &mut E) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Hook lists for one entity.
pub struct Hooks<E> {
    lists: HashMap<HookPoint, Vec<Hook<E>>>,
}

impl<E> Default for Hooks<E> {
    fn default() -> Self {
        Self {
            lists: HashMap::new(),
        }
    }
}

impl<E> fmt::Debug for Hooks<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut m = f.debug_map();
        for point in HookPoint::ALL {
            let n = self.count(point);
            if n > 0 {
                m.entry(&point.as_str(), &n);
            }
        }
        m.finish()
    }
}

impl<E> Hooks<E> {
    pub(crate) fn push(&mut self, point: HookPoint, hook: Hook<E>) {
        self.lists.entry(point).or_default().push(hook);
    }

    /// Number of hooks registered at `point`.
    #[must_use]
    pub fn count(&self, point: HookPoint) -> usize {
        self.lists.get(&point).map_or(0, Vec::len)
    }
}

impl<E: Entity> Hooks<E> {
    /// Run the hooks at `point` in registration order.
    ///
    /// Stops at the first failure and returns it as [`Error::Hook`].
    pub fn run(&self, point: HookPoint, exec: &dyn Executor, record: &mut E) -> Result<()> {
        let Some(list) = self.lists.get(&point) else {
            return Ok(());
        };
        for hook in list {
            if let Err(source) = hook(exec, record) {
                if point.is_after() {
                    tracing::warn!(
                        table = E::table(),
                        point = point.as_str(),
                        error = %source,
                        "after hook failed; the statement has already run"
                    );
                }
                return Err(Error::Hook(HookError {
                    point,
                    table: E::table(),
                    source,
                }));
            }
        }
        Ok(())
    }

    /// Run the hooks at `point` once per record, stopping at the first failure.
    pub fn run_all(&self, point: HookPoint, exec: &dyn Executor, records: &mut [E]) -> Result<()> {
        if self.count(point) == 0 {
            return Ok(());
        }
        records
            .iter_mut()
            .try_for_each(|record| self.run(point, exec, record))
    }
}
