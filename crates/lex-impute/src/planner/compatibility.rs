//! Standard conversions between item kinds.
//!
//! The composer only asks one question of this table: can a boolean
//! indicator be written as the value column's item kind, and is that a no-op?
//! The table itself is total so the coercer can validate any request.

use crate::types::{ItemKind, KindCategory};
use serde::Serialize;

/// Outcome of a conversion lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Representability {
    pub possible: bool,
    /// The conversion changes nothing; no coercion stage is needed.
    pub is_identity: bool,
}

impl Representability {
    const IDENTITY: Self = Self {
        possible: true,
        is_identity: true,
    };
    const CONVERTIBLE: Self = Self {
        possible: true,
        is_identity: false,
    };
    const IMPOSSIBLE: Self = Self {
        possible: false,
        is_identity: false,
    };
}

/// Decides which item kinds can be converted into which.
pub struct TypeCompatibilityChecker;

impl TypeCompatibilityChecker {
    /// Whether values of `source` can be represented as `target`.
    pub fn can_represent(source: ItemKind, target: ItemKind) -> Representability {
        use KindCategory::*;

        if source == ItemKind::Other || target == ItemKind::Other {
            return Representability::IMPOSSIBLE;
        }
        if source == target {
            return Representability::IDENTITY;
        }

        match (source.category(), target.category()) {
            (Boolean, Numeric | Text) => Representability::CONVERTIBLE,
            (Numeric, Numeric | Boolean | Text) => Representability::CONVERTIBLE,
            (TimeSpan, TimeSpan | Text) => Representability::CONVERTIBLE,
            (DateTime, DateTime | Text) => Representability::CONVERTIBLE,
            _ => Representability::IMPOSSIBLE,
        }
    }

    /// Whether a boolean indicator can be merged into a column of `target` items.
    pub fn can_represent_indicator(target: ItemKind) -> Representability {
        Self::can_represent(ItemKind::Boolean, target)
    }
}
