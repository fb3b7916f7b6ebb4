// src/pipeline/value.rs

use arrow::{
    array::{Array, ArrayRef, Float64Array, Int64Array, StringArray},
    compute::cast,
    datatypes::DataType,
    record_batch::RecordBatch,
};
use std::{cmp::Ordering, fmt, sync::Arc};

use crate::error::{PulseError, Result};

/// A single cell, as seen by filters and group keys.
///
/// Ordering is total: nulls first, then numbers by value, then text lexically.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
}

impl Value {
    fn rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Str(_) => 2,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Convert to the representation used by a column of `data_type`.
    pub fn coerce(&self, column: &str, data_type: &DataType) -> Result<Value> {
        let target = value_type(data_type).ok_or_else(|| PulseError::UnsupportedType {
            column: column.to_string(),
            data_type: data_type.clone(),
        })?;
        let mismatch = || PulseError::TypeMismatch {
            column: column.to_string(),
            value: self.to_string(),
            data_type: data_type.clone(),
        };
        let v = match (self, &target) {
            (Value::Null, _) => Value::Null,
            (Value::Int(_), DataType::Int64)
            | (Value::Float(_), DataType::Float64)
            | (Value::Str(_), DataType::Utf8) => self.clone(),
            (Value::Int(i), DataType::Float64) => Value::Float(*i as f64),
            (Value::Float(f), DataType::Int64) if f.fract() == 0.0 => Value::Int(*f as i64),
            (Value::Int(_) | Value::Float(_), DataType::Utf8) => Value::Str(self.to_string()),
            (Value::Str(s), DataType::Int64) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Value::Int(i),
                    Err(_) => match s.parse::<f64>() {
                        Ok(f) if f.fract() == 0.0 => Value::Int(f as i64),
                        _ => return Err(mismatch()),
                    },
                }
            }
            (Value::Str(s), DataType::Float64) => {
                Value::Float(s.trim().parse::<f64>().map_err(|_| mismatch())?)
            }
            _ => return Err(mismatch()),
        };
        Ok(v)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).total_cmp(b).then(Ordering::Less),
            (Value::Float(a), Value::Int(b)) => a.total_cmp(&(*b as f64)).then(Ordering::Greater),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// The type a column is read as: Utf8, Int64 or Float64.
pub fn value_type(data_type: &DataType) -> Option<DataType> {
    match data_type {
        DataType::Utf8 | DataType::LargeUtf8 => Some(DataType::Utf8),
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32
        | DataType::UInt64 => Some(DataType::Int64),
        DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(DataType::Float64),
        _ => None,
    }
}

/// Look a column up by exact name.
pub fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PulseError::missing(name))
}

fn unsupported(column: &str, array: &ArrayRef) -> PulseError {
    PulseError::UnsupportedType {
        column: column.to_string(),
        data_type: array.data_type().clone(),
    }
}

fn normalised(array: &ArrayRef, column: &str) -> Result<(ArrayRef, DataType)> {
    let target = value_type(array.data_type()).ok_or_else(|| unsupported(column, array))?;
    let array = if array.data_type() == &target {
        array.clone()
    } else {
        cast(array, &target)?
    };
    Ok((array, target))
}

/// Every cell of a column as a `Value`.
pub fn values(array: &ArrayRef, column: &str) -> Result<Vec<Value>> {
    let (array, target) = normalised(array, column)?;
    let out = match target {
        DataType::Utf8 => array
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| unsupported(column, &array))?
            .iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Str(s.to_string())))
            .collect(),
        DataType::Int64 => array
            .as_any()
            .downcast_ref::<Int64Array>()
            .ok_or_else(|| unsupported(column, &array))?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Int))
            .collect(),
        _ => array
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| unsupported(column, &array))?
            .iter()
            .map(|v| v.map_or(Value::Null, Value::Float))
            .collect(),
    };
    Ok(out)
}

/// A numeric column as optional floats; text columns are rejected.
pub fn numbers(array: &ArrayRef, column: &str) -> Result<Vec<Option<f64>>> {
    let (array, target) = normalised(array, column)?;
    if target == DataType::Utf8 {
        return Err(unsupported(column, &array));
    }
    let floats = cast(&array, &DataType::Float64)?;
    let floats = floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| unsupported(column, &floats))?;
    Ok(floats.iter().collect())
}

/// Build an array of `data_type` (one of the `value_type` targets) from values.
pub fn to_array(values: &[Value], column: &str, data_type: &DataType) -> Result<ArrayRef> {
    let array: ArrayRef = match data_type {
        DataType::Utf8 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::Str(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
        DataType::Int64 => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Int64Array>(),
        ),
        DataType::Float64 => Arc::new(values.iter().map(Value::as_f64).collect::<Float64Array>()),
        other => {
            return Err(PulseError::UnsupportedType {
                column: column.to_string(),
                data_type: other.clone(),
            })
        }
    };
    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::Int32Array;

    #[test]
    fn ordering_is_total_and_typed() {
        let mut vals = vec![
            Value::from("b"),
            Value::Int(3),
            Value::Null,
            Value::Float(1.5),
            Value::from("a"),
            Value::Int(-2),
        ];
        vals.sort();
        assert_eq!(
            vals,
            vec![
                Value::Null,
                Value::Int(-2),
                Value::Float(1.5),
                Value::Int(3),
                Value::from("a"),
                Value::from("b"),
            ]
        );
    }

    #[test]
    fn coerces_text_to_column_type() -> anyhow::Result<()> {
        assert_eq!(Value::from("2022").coerce("Year", &DataType::Int64)?, Value::Int(2022));
        assert_eq!(Value::Int(2).coerce("x", &DataType::Float64)?, Value::Float(2.0));
        assert_eq!(Value::Int(7).coerce("x", &DataType::Utf8)?, Value::from("7"));
        assert!(matches!(
            Value::from("Q1").coerce("Quarter", &DataType::Int64),
            Err(PulseError::TypeMismatch { .. })
        ));
        assert!(matches!(
            Value::Int(1).coerce("b", &DataType::Boolean),
            Err(PulseError::UnsupportedType { .. })
        ));
        Ok(())
    }

    #[test]
    fn reads_narrow_integers_as_int64() -> anyhow::Result<()> {
        let array: ArrayRef = Arc::new(Int32Array::from(vec![Some(1), None]));
        assert_eq!(values(&array, "q")?, vec![Value::Int(1), Value::Null]);
        assert_eq!(numbers(&array, "q")?, vec![Some(1.0), None]);
        let text: ArrayRef = Arc::new(StringArray::from(vec!["a"]));
        assert!(numbers(&text, "t").is_err());
        Ok(())
    }
}
