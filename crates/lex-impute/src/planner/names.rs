//! Collision-free temporary column names.
//!
//! Names are `<label>_<index>`; a name that is already taken gets a
//! `_<n>` suffix until it is free. Generation is deterministic for a given
//! schema and call sequence.

use crate::schema::SchemaView;
use std::collections::{HashMap, HashSet};

/// Label for raw missing-value indicator columns.
pub const INDICATOR_LABEL: &str = "__is_missing";

/// Label for replaced-value columns awaiting a merge.
pub const REPLACEMENT_LABEL: &str = "__replaced";

/// Produce `count` names derived from `base_label` that collide neither with
/// `existing` nor with each other.
///
/// Pure: two calls with the same arguments return the same names. Use a
/// [`TempNameAllocator`] when several batches must stay distinct.
pub fn allocate_temp_names<S: SchemaView + ?Sized>(
    base_label: &str,
    count: usize,
    existing: &S,
) -> Vec<String> {
    let mut allocator = TempNameAllocator::new(existing);
    allocator.allocate(base_label, count)
}

/// Stateful allocator scoped to one composition call.
///
/// Every name it hands out is reserved, so later batches (for any label)
/// never repeat it.
#[derive(Debug, Clone, Default)]
pub struct TempNameAllocator {
    taken: HashSet<String>,
    next_index: HashMap<String, usize>,
}

impl TempNameAllocator {
    /// Start from a snapshot of the existing column names.
    pub fn new<S: SchemaView + ?Sized>(schema: &S) -> Self {
        let taken = schema
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        Self {
            taken,
            next_index: HashMap::new(),
        }
    }

    /// Mark a name as unavailable (e.g. a requested output name).
    pub fn reserve(&mut self, name: impl Into<String>) {
        self.taken.insert(name.into());
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }

    /// Allocate `count` fresh names for `base_label`.
    pub fn allocate(&mut self, base_label: &str, count: usize) -> Vec<String> {
        let mut names = Vec::with_capacity(count);
        for _ in 0..count {
            let index = self.next_index.entry(base_label.to_string()).or_insert(0);
            let base = format!("{}_{}", base_label, index);
            *index += 1;

            let mut candidate = base.clone();
            let mut counter = 1;
            while self.taken.contains(&candidate) {
                candidate = format!("{}_{}", base, counter);
                counter += 1;
            }

            self.taken.insert(candidate.clone());
            names.push(candidate);
        }
        names
    }

    /// Allocate a single fresh name.
    pub fn allocate_one(&mut self, base_label: &str) -> String {
        // allocate(_, 1) always yields exactly one name
        self.allocate(base_label, 1).remove(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, SchemaColumn};
    use crate::types::{ColumnType, ItemKind};

    fn schema_with(names: &[&str]) -> ColumnSchema {
        ColumnSchema::new(
            names
                .iter()
                .map(|n| SchemaColumn::new(*n, ColumnType::scalar(ItemKind::Float64)))
                .collect(),
        )
    }

    #[test]
    fn test_allocate_plain_names() {
        let names = allocate_temp_names("tmp", 3, &schema_with(&["a", "b"]));
        assert_eq!(names, vec!["tmp_0", "tmp_1", "tmp_2"]);
    }

    #[test]
    fn test_allocate_avoids_existing_columns() {
        let schema = schema_with(&["tmp_0", "tmp_1", "tmp_1_1"]);
        let names = allocate_temp_names("tmp", 2, &schema);
        assert_eq!(names, vec!["tmp_0_1", "tmp_1_2"]);
    }

    #[test]
    fn test_pure_allocation_is_deterministic() {
        let schema = schema_with(&["x"]);
        assert_eq!(
            allocate_temp_names("tmp", 4, &schema),
            allocate_temp_names("tmp", 4, &schema)
        );
    }

    #[test]
    fn test_batches_never_repeat() {
        let schema = schema_with(&["age", "__is_missing_2"]);
        let mut allocator = TempNameAllocator::new(&schema);

        let mut seen = HashSet::new();
        for _ in 0..50 {
            for name in allocator.allocate(INDICATOR_LABEL, 2) {
                assert!(seen.insert(name.clone()), "duplicate name {name}");
                assert!(!schema.contains(&name));
            }
            let name = allocator.allocate_one(REPLACEMENT_LABEL);
            assert!(seen.insert(name));
        }
        assert_eq!(seen.len(), 150);
    }

    #[test]
    fn test_reserved_names_are_skipped() {
        let mut allocator = TempNameAllocator::new(&schema_with(&[]));
        allocator.reserve("__replaced_0");
        assert!(allocator.is_taken("__replaced_0"));
        assert_eq!(allocator.allocate_one(REPLACEMENT_LABEL), "__replaced_0_1");
    }

    #[test]
    fn test_zero_count() {
        assert!(allocate_temp_names("tmp", 0, &schema_with(&["a"])).is_empty());
    }
}
