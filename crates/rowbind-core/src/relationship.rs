//! Relationship metadata.
//!
//! Relations are declared statically alongside the entity descriptors. The
//! relation loader uses them to batch foreign-key lookups across many source
//! records into a single query.

/// Cardinality of a relation, seen from the source side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cardinality {
    /// Each source points at no more than one related record
    /// (`mechs.owner_id -> players.id`).
    #[default]
    ToOne,
    /// Each source is pointed at by any number of related records
    /// (`players.id <- mechs.owner_id`).
    ToMany,
}

/// Metadata about one relation between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Name of the relation, used in logs and errors.
    pub name: &'static str,
    /// Join column on the source table.
    pub local_key: &'static str,
    /// Join column on the related table.
    pub remote_key: &'static str,
    /// To-one or to-many.
    pub cardinality: Cardinality,
    /// Whether soft-deleted related rows are filtered out.
    pub remote_soft_delete: bool,
}

impl RelationDescriptor {
    /// A to-one relation joining `local_key` to `remote_key`.
    #[must_use]
    pub const fn to_one(
        name: &'static str,
        local_key: &'static str,
        remote_key: &'static str,
    ) -> Self {
        Self {
            name,
            local_key,
            remote_key,
            cardinality: Cardinality::ToOne,
            remote_soft_delete: false,
        }
    }

    /// A to-many relation joining `local_key` to `remote_key`.
    #[must_use]
    pub const fn to_many(
        name: &'static str,
        local_key: &'static str,
        remote_key: &'static str,
    ) -> Self {
        Self {
            name,
            local_key,
            remote_key,
            cardinality: Cardinality::ToMany,
            remote_soft_delete: false,
        }
    }

    /// Filter out soft-deleted related rows.
    #[must_use]
    pub const fn remote_soft_delete(mut self, value: bool) -> Self {
        self.remote_soft_delete = value;
        self
    }
}
