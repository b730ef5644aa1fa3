//! Planning module.
//!
//! Resolves each requested column into a [`crate::types::ColumnPlan`] using
//! the type compatibility table and a shared temporary-name allocator.

mod column;
pub mod compatibility;
pub mod names;

pub use column::ColumnPlanner;
pub use compatibility::{Representability, TypeCompatibilityChecker};
pub use names::{INDICATOR_LABEL, REPLACEMENT_LABEL, TempNameAllocator, allocate_temp_names};
