//! Arrow column extraction into `SoA` event batches.
//!
//! Scalar numeric columns of any width are cast to `f64`. Branch fields read
//! element `n` of a list-valued column; rows whose list is null or too short,
//! and null scalars, read as NaN so they fail every quality cut.

use crate::{Error, Result};
use arrow::array::{Array, AsArray, GenericListArray, OffsetSizeTrait};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type};
use arrow::record_batch::RecordBatch;
use cbspec_core::schema::{resolve_schema, ColumnRef, Element, FieldMap};
use cbspec_core::soa::EventBatch;

/// Column names of a batch, in schema order.
#[must_use]
pub fn column_names(batch: &RecordBatch) -> Vec<String> {
    batch
        .schema()
        .fields()
        .iter()
        .map(|field| field.name().clone())
        .collect()
}

/// Resolve the layout of `batch` and extract its logical fields.
///
/// `mcenergy` is read when present; whether it is required is decided by the
/// caller from the file role.
///
/// # Errors
/// Returns an error if the layout is unknown, a mapped column is missing, or
/// a column is not numeric.
pub fn extract_events(batch: &RecordBatch) -> Result<EventBatch> {
    let variant = resolve_schema(&column_names(batch))?;
    let map = FieldMap::for_variant(variant);
    for column in map.required() {
        if batch.column_by_name(column.name).is_none() {
            return Err(cbspec_core::Error::MissingColumn(column.name.to_string()).into());
        }
    }

    let mc_energy = if batch.column_by_name(map.mc_energy.name).is_some() {
        Some(read_column(batch, &map.mc_energy)?)
    } else {
        None
    };

    let events = EventBatch {
        variant,
        energy: read_column(batch, &map.energy)?,
        mc_energy,
        sc: read_column(batch, &map.sc)?,
        dsc: read_column(batch, &map.dsc)?,
        good_sd_count: read_column(batch, &map.good_sd_count)?,
        border_dist_m: read_column(batch, &map.border_dist)?,
        ldf_chi2: read_column(batch, &map.ldf_chi2)?,
        geom_chi2: read_column(batch, &map.geom_chi2)?,
        ped_err: read_column(batch, &map.ped_err)?,
        zenith_deg: read_column(batch, &map.zenith)?,
    };
    events.validate()?;
    Ok(events)
}

/// Read one logical field as `f64` values, one per row.
///
/// # Errors
/// Returns an error if the column is missing or has an unsupported type.
pub fn read_column(batch: &RecordBatch, column: &ColumnRef) -> Result<Vec<f64>> {
    let array = batch
        .column_by_name(column.name)
        .ok_or_else(|| cbspec_core::Error::MissingColumn(column.name.to_string()))?;

    let mut values = match column.element {
        Element::Scalar => scalar_values(array.as_ref(), column.name)?,
        Element::Branch(index) => branch_values(array.as_ref(), index, column.name)?,
    };
    if (column.scale - 1.0).abs() > f64::EPSILON {
        for value in &mut values {
            *value *= column.scale;
        }
    }
    Ok(values)
}

fn scalar_values(array: &dyn Array, name: &str) -> Result<Vec<f64>> {
    let floats = to_f64(array, name)?;
    let floats = floats.as_primitive::<Float64Type>();
    Ok(floats.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn branch_values(array: &dyn Array, index: usize, name: &str) -> Result<Vec<f64>> {
    match array.data_type() {
        DataType::List(_) => list_element(array.as_list::<i32>(), index, name),
        DataType::LargeList(_) => list_element(array.as_list::<i64>(), index, name),
        DataType::FixedSizeList(_, _) => {
            let list = array.as_fixed_size_list();
            let width = usize::try_from(list.value_length()).unwrap_or(0);
            let floats = to_f64(list.values().as_ref(), name)?;
            let floats = floats.as_primitive::<Float64Type>();
            Ok((0..list.len())
                .map(|row| {
                    if list.is_null(row) || index >= width {
                        return f64::NAN;
                    }
                    let start = usize::try_from(list.value_offset(row)).unwrap_or(0);
                    element_or_nan(floats, start + index)
                })
                .collect())
        }
        other => Err(Error::InvalidColumnType {
            name: name.to_string(),
            datatype: format!("{other} (expected a list for branch element {index})"),
        }),
    }
}

fn list_element<O: OffsetSizeTrait>(
    list: &GenericListArray<O>,
    index: usize,
    name: &str,
) -> Result<Vec<f64>> {
    let floats = to_f64(list.values().as_ref(), name)?;
    let floats = floats.as_primitive::<Float64Type>();
    let offsets = list.value_offsets();
    Ok((0..list.len())
        .map(|row| {
            if list.is_null(row) {
                return f64::NAN;
            }
            let start = offsets[row].as_usize();
            let end = offsets[row + 1].as_usize();
            if start + index < end {
                element_or_nan(floats, start + index)
            } else {
                f64::NAN
            }
        })
        .collect())
}

fn element_or_nan(values: &arrow::array::Float64Array, position: usize) -> f64 {
    if position < values.len() && values.is_valid(position) {
        values.value(position)
    } else {
        f64::NAN
    }
}

fn to_f64(array: &dyn Array, name: &str) -> Result<arrow::array::ArrayRef> {
    if !array.data_type().is_numeric() {
        return Err(Error::InvalidColumnType {
            name: name.to_string(),
            datatype: array.data_type().to_string(),
        });
    }
    Ok(cast(array, &DataType::Float64)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{ArrayRef, Float32Array, Float64Array, Int32Array, ListArray, StringArray};
    use cbspec_core::schema::SchemaVariant;
    use std::sync::Arc;

    fn list(rows: Vec<Option<Vec<Option<f64>>>>) -> ArrayRef {
        Arc::new(ListArray::from_iter_primitive::<Float64Type, _, _>(rows))
    }

    #[test]
    fn test_scalar_columns_cast_to_f64() {
        let batch = RecordBatch::try_from_iter(vec![
            ("a", Arc::new(Int32Array::from(vec![Some(3), None])) as ArrayRef),
            ("b", Arc::new(Float32Array::from(vec![1.5, 2.5])) as ArrayRef),
        ])
        .unwrap();
        let a = read_column(
            &batch,
            &ColumnRef {
                name: "a",
                element: Element::Scalar,
                scale: 1000.0,
            },
        )
        .unwrap();
        assert_eq!(a[0], 3000.0);
        assert!(a[1].is_nan());
        let b = scalar_values(batch.column(1).as_ref(), "b").unwrap();
        assert_eq!(b, vec![1.5, 2.5]);
    }

    #[test]
    fn test_branch_element_with_short_and_null_rows() {
        let array = list(vec![
            Some(vec![Some(1.0), Some(2.0), Some(3.0)]),
            Some(vec![Some(4.0)]),
            None,
            Some(vec![Some(5.0), None, Some(6.0)]),
        ]);
        let values = branch_values(array.as_ref(), 2, "theta").unwrap();
        assert_eq!(values[0], 3.0);
        assert!(values[1].is_nan());
        assert!(values[2].is_nan());
        assert_eq!(values[3], 6.0);

        let middle = branch_values(array.as_ref(), 1, "theta").unwrap();
        assert!(middle[3].is_nan());
    }

    #[test]
    fn test_branch_on_scalar_column_is_type_error() {
        let array = Float64Array::from(vec![1.0]);
        let err = branch_values(&array, 0, "energy").unwrap_err();
        assert!(matches!(err, Error::InvalidColumnType { .. }));
    }

    #[test]
    fn test_non_numeric_column_rejected() {
        let array = StringArray::from(vec!["x"]);
        assert!(scalar_values(&array, "label").is_err());
    }

    #[test]
    fn test_extract_tl_fit_batch() {
        let batch = RecordBatch::try_from_iter(vec![
            ("energy_s800_p", Arc::new(Float64Array::from(vec![12.7])) as ArrayRef),
            ("mcenergy", Arc::new(Float64Array::from(vec![12.7])) as ArrayRef),
            ("sc", Arc::new(Float64Array::from(vec![10.0])) as ArrayRef),
            ("dsc", Arc::new(Float64Array::from(vec![1.0])) as ArrayRef),
            ("ngsd", Arc::new(Int32Array::from(vec![7])) as ArrayRef),
            ("bdist", Arc::new(Float64Array::from(vec![1500.0])) as ArrayRef),
            ("ldfchi2pdof", Arc::new(Float64Array::from(vec![1.0])) as ArrayRef),
            ("gfchi2pdof", list(vec![Some(vec![Some(9.0), Some(1.5)])])),
            ("pderr", list(vec![Some(vec![Some(9.0), Some(2.0)])])),
            ("theta", list(vec![Some(vec![Some(80.0), Some(30.0)])])),
        ])
        .unwrap();
        let events = extract_events(&batch).unwrap();
        assert_eq!(events.variant, SchemaVariant::TlFit);
        assert_eq!(events.energy, vec![12.7]);
        assert_eq!(events.good_sd_count, vec![7.0]);
        assert_eq!(events.geom_chi2, vec![1.5]);
        assert_eq!(events.zenith_deg, vec![30.0]);
        assert!(events.mc_energy.is_some());
    }

    #[test]
    fn test_extract_missing_mapped_column() {
        let batch = RecordBatch::try_from_iter(vec![(
            "energy",
            list(vec![Some(vec![Some(1.0)])]),
        )])
        .unwrap();
        let err = extract_events(&batch).unwrap_err();
        assert!(matches!(
            err,
            Error::Core(cbspec_core::Error::MissingColumn(ref name)) if name == "sc"
        ));
    }

    #[test]
    fn test_extract_unknown_schema() {
        let batch = RecordBatch::try_from_iter(vec![(
            "sc",
            Arc::new(Float64Array::from(vec![1.0])) as ArrayRef,
        )])
        .unwrap();
        let err = extract_events(&batch).unwrap_err();
        assert!(matches!(
            err,
            Error::Core(cbspec_core::Error::UnknownSchema { .. })
        ));
    }
}
