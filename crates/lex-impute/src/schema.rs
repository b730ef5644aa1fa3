//! Schema snapshots and the polars-backed dataset view.
//!
//! The composer only ever reads a schema. [`SchemaView`] is the minimal
//! interface it needs, and [`ColumnSchema`] is the in-memory snapshot used
//! throughout the crate. [`DatasetView`] pairs a `DataFrame` with the schema
//! describing it, so stages can carry metadata (slot names) that polars dtypes
//! cannot express.

use crate::error::{ImputeError, Result};
use crate::types::ColumnType;
use polars::prelude::*;
use serde::Serialize;

/// Read-only access to column names and types.
pub trait SchemaView {
    fn column_count(&self) -> usize;

    fn try_get_column_index(&self, name: &str) -> Option<usize>;

    fn column_name(&self, index: usize) -> Option<&str>;

    fn column_type(&self, index: usize) -> Option<ColumnType>;

    /// Whether a column with this name exists.
    fn contains(&self, name: &str) -> bool {
        self.try_get_column_index(name).is_some()
    }

    /// All column names in schema order.
    fn column_names(&self) -> Vec<&str> {
        (0..self.column_count())
            .filter_map(|i| self.column_name(i))
            .collect()
    }
}

/// A named, typed column of a [`ColumnSchema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaColumn {
    pub name: String,
    pub column_type: ColumnType,
    /// Per-slot names of a fixed-length vector, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot_names: Option<Vec<String>>,
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            slot_names: None,
        }
    }

    pub fn with_slot_names(mut self, slot_names: Vec<String>) -> Self {
        self.slot_names = Some(slot_names);
        self
    }
}

/// Ordered, immutable-by-convention snapshot of a dataset's columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnSchema {
    columns: Vec<SchemaColumn>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    /// Derive a schema from a frame's dtypes.
    pub fn from_frame(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|c| SchemaColumn::new(c.name().as_str(), ColumnType::from_dtype(c.dtype())))
            .collect();
        Self { columns }
    }

    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<&SchemaColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column or fail with [`ImputeError::ColumnNotFound`].
    pub fn require(&self, name: &str) -> Result<&SchemaColumn> {
        self.get(name)
            .ok_or_else(|| ImputeError::ColumnNotFound(name.to_string()))
    }

    /// Remove `column.name` if present, then append `column` at the end.
    pub fn put(&mut self, column: SchemaColumn) {
        self.remove(&column.name);
        self.columns.push(column);
    }

    /// Replace the type of an existing column without moving it.
    pub fn retype(&mut self, name: &str, column_type: ColumnType) -> Result<()> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ImputeError::ColumnNotFound(name.to_string()))?;
        column.column_type = column_type;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<SchemaColumn> {
        let index = self.try_get_column_index(name)?;
        Some(self.columns.remove(index))
    }

    /// Move the named columns to the end, in the given order.
    pub fn move_to_end(&mut self, names: &[String]) -> Result<()> {
        for name in names {
            let column = self
                .remove(name)
                .ok_or_else(|| ImputeError::ColumnNotFound(name.clone()))?;
            self.columns.push(column);
        }
        Ok(())
    }

    /// Only the named columns, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<ColumnSchema> {
        let columns = names
            .iter()
            .map(|name| self.require(name).cloned())
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { columns })
    }

    /// `(name, type)` pairs for display.
    pub fn describe(&self) -> Vec<(String, String)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.column_type.to_string()))
            .collect()
    }
}

impl SchemaView for ColumnSchema {
    fn column_count(&self) -> usize {
        self.columns.len()
    }

    fn try_get_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    fn column_name(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.name.as_str())
    }

    fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(|c| c.column_type)
    }
}

/// A `DataFrame` together with the schema that describes it.
#[derive(Debug, Clone)]
pub struct DatasetView {
    frame: DataFrame,
    schema: ColumnSchema,
}

impl DatasetView {
    /// Wrap a frame, deriving its schema from the dtypes.
    pub fn new(frame: DataFrame) -> Self {
        let schema = ColumnSchema::from_frame(&frame);
        Self { frame, schema }
    }

    /// Pair a transformed frame with the schema a stage computed for it.
    ///
    /// Fails when the names or types disagree.
    pub fn from_parts(frame: DataFrame, schema: ColumnSchema) -> Result<Self> {
        let derived = ColumnSchema::from_frame(&frame);
        let agrees = derived.columns().len() == schema.columns().len()
            && derived
                .columns()
                .iter()
                .zip(schema.columns())
                .all(|(a, b)| a.name == b.name && a.column_type == b.column_type);
        if !agrees {
            return Err(ImputeError::InternalInvariant(format!(
                "frame columns {:?} do not match schema {:?}",
                derived.describe(),
                schema.describe()
            )));
        }
        Ok(Self { frame, schema })
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

impl From<DataFrame> for DatasetView {
    fn from(frame: DataFrame) -> Self {
        Self::new(frame)
    }
}
