//! Shared polars helpers for the stage collaborators.

use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// The dtype of one value: the inner dtype for vectors, the dtype itself otherwise.
pub fn item_dtype(dtype: &DataType) -> DataType {
    match dtype {
        DataType::List(inner) | DataType::Array(inner, _) => inner.as_ref().clone(),
        other => other.clone(),
    }
}

/// Build a column dtype from an item dtype and a vector length.
///
/// `None` produces a scalar dtype, `Some(None)` a `List`, `Some(Some(n))` an `Array`.
pub fn shaped_dtype(item: DataType, vector_len: Option<Option<usize>>) -> DataType {
    match vector_len {
        None => item,
        Some(None) => DataType::List(Box::new(item)),
        Some(Some(n)) => DataType::Array(Box::new(item), n),
    }
}

/// Same shape as `dtype`, with `item` values.
pub fn with_item_dtype(dtype: &DataType, item: &DataType) -> DataType {
    match dtype {
        DataType::List(_) => shaped_dtype(item.clone(), Some(None)),
        DataType::Array(_, n) => shaped_dtype(item.clone(), Some(Some(*n))),
        _ => item.clone(),
    }
}

// =============================================================================
// Column Utilities
// =============================================================================

/// Remove a column with the same name (if any) and append `series` at the end.
pub fn put_column(df: &mut DataFrame, series: Series) -> PolarsResult<()> {
    let name = series.name().clone();
    if df.get_column_index(name.as_str()).is_some() {
        df.drop_in_place(name.as_str())?;
    }
    df.with_column(series)?;
    Ok(())
}

/// Fetch a column as a materialized series.
pub fn column_series(df: &DataFrame, name: &str) -> PolarsResult<Series> {
    Ok(df.column(name)?.as_materialized_series().clone())
}

// =============================================================================
// Null Filling
// =============================================================================

/// Replace the nulls of `series` with `fill`, leaving observed values untouched.
///
/// `fill` must have the dtype of `series` and either one row (broadcast) or
/// as many rows as `series`.
pub fn fill_nulls_with(series: &Series, fill: &Series) -> PolarsResult<Series> {
    if series.null_count() == 0 {
        return Ok(series.clone());
    }
    series.zip_with(&series.is_not_null(), fill)
}

/// Fill nulls with a value chosen by position: element `i` takes `fills[i % fills.len()]`.
///
/// Used on the flattened values of a fixed-length vector column, where the
/// position modulo the width is the slot.
pub fn fill_nulls_cyclic(series: &Series, fills: &[Series]) -> PolarsResult<Series> {
    let Some((first, rest)) = fills.split_first() else {
        return Ok(series.clone());
    };
    if rest.is_empty() {
        return fill_nulls_with(series, first);
    }
    if series.null_count() == 0 {
        return Ok(series.clone());
    }

    let mut slots = first.clone();
    for fill in rest {
        slots.append(fill)?;
    }
    let width = fills.len();
    let positions: Vec<IdxSize> = (0..series.len()).map(|i| (i % width) as IdxSize).collect();
    let broadcast = slots.take(&IdxCa::from_vec(PlSmallStr::EMPTY, positions))?;
    series.zip_with(&series.is_not_null(), &broadcast)
}

// =============================================================================
// Tests
// =============================================================================

/// Readers shared by the unit tests.
#[cfg(test)]
pub(crate) mod testing {
    use polars::prelude::*;

    /// A numeric, temporal or boolean column as `f64` physical values.
    pub fn f64_values(series: &Series) -> Vec<Option<f64>> {
        let physical = series.to_physical_repr().cast(&DataType::Float64).unwrap();
        physical.f64().unwrap().into_iter().collect()
    }

    /// Rows of a vector column as `f64` values; null rows are `None`.
    pub fn f64_rows(series: &Series) -> Vec<Option<Vec<Option<f64>>>> {
        let inner = super::item_dtype(series.dtype());
        let list = series
            .cast(&DataType::List(Box::new(inner)))
            .unwrap()
            .cast(&DataType::List(Box::new(DataType::Float64)))
            .unwrap();
        list.list()
            .unwrap()
            .into_iter()
            .map(|row| row.map(|r| r.f64().unwrap().into_iter().collect()))
            .collect()
    }

    /// Rows of a vector column as raw series; null rows are `None`.
    pub fn rows(series: &Series) -> Vec<Option<Series>> {
        let inner = super::item_dtype(series.dtype());
        let list = series.cast(&DataType::List(Box::new(inner))).unwrap();
        list.list().unwrap().into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_and_shaped_dtype() {
        let array = DataType::Array(Box::new(DataType::Float32), 3);
        assert_eq!(item_dtype(&array), DataType::Float32);
        assert_eq!(item_dtype(&DataType::Int8), DataType::Int8);
        assert_eq!(shaped_dtype(DataType::Float32, Some(Some(3))), array);
        assert_eq!(
            shaped_dtype(DataType::Boolean, Some(None)),
            DataType::List(Box::new(DataType::Boolean))
        );
        assert_eq!(shaped_dtype(DataType::Boolean, None), DataType::Boolean);
        assert_eq!(
            with_item_dtype(&array, &DataType::Boolean),
            DataType::Array(Box::new(DataType::Boolean), 3)
        );
    }

    #[test]
    fn test_put_column_appends_at_end() {
        let mut df = df![
            "a" => [1, 2],
            "b" => [3, 4],
        ]
        .unwrap();

        put_column(&mut df, Series::new("a".into(), &[5, 6])).unwrap();

        let names: Vec<&str> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(df.column("a").unwrap().get(0).unwrap().try_extract::<i32>().unwrap(), 5);
    }

    #[test]
    fn test_fill_nulls_with_broadcasts() {
        let series = Series::new("s".into(), &[Some("a"), None]);
        let filled = fill_nulls_with(&series, &Series::new("".into(), [""])).unwrap();
        assert_eq!(filled.null_count(), 0);
        assert_eq!(filled.str().unwrap().get(0), Some("a"));
        assert_eq!(filled.str().unwrap().get(1), Some(""));
    }

    #[test]
    fn test_fill_nulls_cyclic_by_position() {
        let series = Series::new("v".into(), &[None, Some(2i64), Some(3), None]);
        let fills = [Series::new("".into(), [10i64]), Series::new("".into(), [20i64])];

        let filled = fill_nulls_cyclic(&series, &fills).unwrap();

        let values: Vec<Option<i64>> = filled.i64().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some(10), Some(2), Some(3), Some(20)]);
    }
}
