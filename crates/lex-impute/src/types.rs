//! Core value types shared by the planner, the assembler and the stages.

use crate::config::StrategyKind;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Column Types
// =============================================================================

/// Broad family of an item kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindCategory {
    Numeric,
    TimeSpan,
    DateTime,
    Text,
    Boolean,
    Other,
}

/// The type of a single value (or of each slot of a vector).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    /// Time span (polars `Duration`)
    Duration,
    /// Instant with a time of day (polars `Datetime`)
    Datetime,
    Date,
    Time,
    Text,
    Boolean,
    /// Anything the composer cannot reason about (categorical, struct, nested lists)
    Other,
}

impl ItemKind {
    /// Map a polars item dtype to its kind.
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Int8 => ItemKind::Int8,
            DataType::Int16 => ItemKind::Int16,
            DataType::Int32 => ItemKind::Int32,
            DataType::Int64 => ItemKind::Int64,
            DataType::UInt8 => ItemKind::UInt8,
            DataType::UInt16 => ItemKind::UInt16,
            DataType::UInt32 => ItemKind::UInt32,
            DataType::UInt64 => ItemKind::UInt64,
            DataType::Float32 => ItemKind::Float32,
            DataType::Float64 => ItemKind::Float64,
            DataType::Duration(_) => ItemKind::Duration,
            DataType::Datetime(_, _) => ItemKind::Datetime,
            DataType::Date => ItemKind::Date,
            DataType::Time => ItemKind::Time,
            DataType::String => ItemKind::Text,
            DataType::Boolean => ItemKind::Boolean,
            _ => ItemKind::Other,
        }
    }

    pub fn category(&self) -> KindCategory {
        match self {
            ItemKind::Int8
            | ItemKind::Int16
            | ItemKind::Int32
            | ItemKind::Int64
            | ItemKind::UInt8
            | ItemKind::UInt16
            | ItemKind::UInt32
            | ItemKind::UInt64
            | ItemKind::Float32
            | ItemKind::Float64 => KindCategory::Numeric,
            ItemKind::Duration => KindCategory::TimeSpan,
            ItemKind::Datetime | ItemKind::Date | ItemKind::Time => KindCategory::DateTime,
            ItemKind::Text => KindCategory::Text,
            ItemKind::Boolean => KindCategory::Boolean,
            ItemKind::Other => KindCategory::Other,
        }
    }

    /// Whether statistics over this kind must be rounded back to whole values.
    pub fn is_integral(&self) -> bool {
        !matches!(
            self,
            ItemKind::Float32 | ItemKind::Float64 | ItemKind::Text | ItemKind::Other
        )
    }

    /// The polars dtype a column is coerced to when targeting this kind.
    ///
    /// Time kinds have no canonical unit; microseconds are used.
    pub fn to_dtype(&self) -> DataType {
        match self {
            ItemKind::Int8 => DataType::Int8,
            ItemKind::Int16 => DataType::Int16,
            ItemKind::Int32 => DataType::Int32,
            ItemKind::Int64 => DataType::Int64,
            ItemKind::UInt8 => DataType::UInt8,
            ItemKind::UInt16 => DataType::UInt16,
            ItemKind::UInt32 => DataType::UInt32,
            ItemKind::UInt64 => DataType::UInt64,
            ItemKind::Float32 => DataType::Float32,
            ItemKind::Float64 => DataType::Float64,
            ItemKind::Duration => DataType::Duration(TimeUnit::Microseconds),
            ItemKind::Datetime => DataType::Datetime(TimeUnit::Microseconds, None),
            ItemKind::Date => DataType::Date,
            ItemKind::Time => DataType::Time,
            ItemKind::Text => DataType::String,
            ItemKind::Boolean => DataType::Boolean,
            ItemKind::Other => DataType::Null,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Whether a column holds one value per row or a vector of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnShape {
    Scalar,
    /// `len` is `None` for vectors of unknown or variable length.
    Vector { len: Option<usize> },
}

/// Resolved type of a column: item kind plus shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnType {
    pub item: ItemKind,
    pub shape: ColumnShape,
}

impl ColumnType {
    pub fn scalar(item: ItemKind) -> Self {
        Self {
            item,
            shape: ColumnShape::Scalar,
        }
    }

    pub fn vector(item: ItemKind, len: Option<usize>) -> Self {
        Self {
            item,
            shape: ColumnShape::Vector { len },
        }
    }

    /// Map a polars column dtype to its column type.
    ///
    /// `Array(inner, n)` is a vector of known length, `List(inner)` a vector
    /// of variable length. Nested vectors have item kind `Other`.
    pub fn from_dtype(dtype: &DataType) -> Self {
        match dtype {
            DataType::Array(inner, width) => Self::vector(vector_item(inner), Some(*width)),
            DataType::List(inner) => Self::vector(vector_item(inner), None),
            other => Self::scalar(ItemKind::from_dtype(other)),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(self.shape, ColumnShape::Vector { .. })
    }

    /// True for scalars and fixed-length vectors.
    pub fn has_known_length(&self) -> bool {
        !matches!(self.shape, ColumnShape::Vector { len: None })
    }

    /// Number of values per row, when fixed.
    pub fn value_count(&self) -> Option<usize> {
        match self.shape {
            ColumnShape::Scalar => Some(1),
            ColumnShape::Vector { len } => len,
        }
    }

    /// Same shape, different item kind.
    pub fn with_item(&self, item: ItemKind) -> Self {
        Self {
            item,
            shape: self.shape,
        }
    }
}

fn vector_item(inner: &DataType) -> ItemKind {
    match inner {
        DataType::List(_) | DataType::Array(_, _) => ItemKind::Other,
        other => ItemKind::from_dtype(other),
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            ColumnShape::Scalar => write!(f, "{}", self.item),
            ColumnShape::Vector { len: Some(n) } => write!(f, "Vector<{}, {}>", self.item, n),
            ColumnShape::Vector { len: None } => write!(f, "Vector<{}>", self.item),
        }
    }
}

// =============================================================================
// Column Plans
// =============================================================================

/// Temporaries and coercion decision for a column that emits an indicator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorPlan {
    /// Temporary column holding the raw boolean indicator.
    pub indicator_column: String,
    /// Temporary column holding the replaced values.
    pub value_column: String,
    /// Whether the indicator must be coerced to the value item kind before merging.
    pub needs_coercion: bool,
}

/// Fully resolved plan for one requested column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnPlan {
    pub output: String,
    pub source: String,
    pub source_type: ColumnType,
    pub strategy: StrategyKind,
    pub impute_by_slot: bool,
    /// Present only when an indicator is emitted.
    pub indicator: Option<IndicatorPlan>,
}

impl ColumnPlan {
    pub fn emits_indicator(&self) -> bool {
        self.indicator.is_some()
    }
}

// =============================================================================
// Summaries
// =============================================================================

/// Serializable overview of a composed pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    /// Stage kinds in execution order.
    pub stages: Vec<String>,
    /// Requested outputs in request order.
    pub outputs: Vec<String>,
    pub columns: Vec<ColumnPlan>,
    /// Columns of the final schema with their types.
    pub output_schema: Vec<(String, String)>,
}
