// src/geo/points.rs

use arrow::{array::BooleanArray, compute::filter_record_batch, record_batch::RecordBatch};
use tracing::{debug, warn};

use crate::error::Result;
use crate::pipeline::value::numbers;
use crate::pipeline::{Notice, Outcome, QueryResult};
use crate::schema::{LATITUDE, LONGITUDE};

/// Rows that can be placed on a map: both coordinates present and in range.
///
/// Rows without usable coordinates are dropped, not fatal. A table with no
/// coordinate columns at all gives an empty result and a notice.
pub fn map_points(batch: &RecordBatch) -> Result<QueryResult> {
    let (Some(lat), Some(lon)) = (
        batch.column_by_name(LATITUDE.name),
        batch.column_by_name(LONGITUDE.name),
    ) else {
        warn!("table has no coordinate columns, nothing to place");
        return Ok(QueryResult {
            outcome: Outcome::Empty(batch.schema()),
            notices: vec![Notice::MissingOptionalColumns {
                columns: vec![LATITUDE.name.to_string(), LONGITUDE.name.to_string()],
            }],
        });
    };

    let lat = numbers(lat, LATITUDE.name)?;
    let lon = numbers(lon, LONGITUDE.name)?;
    let mask: BooleanArray = lat
        .iter()
        .zip(&lon)
        .map(|(la, lo)| {
            Some(matches!(
                (la, lo),
                (Some(la), Some(lo)) if (-90.0..=90.0).contains(la) && (-180.0..=180.0).contains(lo)
            ))
        })
        .collect();
    let dropped = mask.false_count();
    if dropped > 0 {
        debug!(dropped, "rows without usable coordinates left off the map");
    }
    Ok(QueryResult::new(Outcome::from_batch(filter_record_batch(batch, &mask)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::{
        array::{Float64Array, StringArray},
        datatypes::{DataType, Field, Schema},
    };
    use std::sync::Arc;

    #[test]
    fn drops_rows_without_usable_coordinates() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![
            Field::new("District", DataType::Utf8, true),
            Field::new("Latitude", DataType::Float64, true),
            Field::new("Longitude", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec!["a", "b", "c", "d"])),
                Arc::new(Float64Array::from(vec![Some(15.3), None, Some(95.0), Some(12.9)])),
                Arc::new(Float64Array::from(vec![Some(74.1), Some(75.0), Some(70.0), Some(77.6)])),
            ],
        )?;
        let result = map_points(&batch)?;
        assert!(result.notices.is_empty());
        assert_eq!(result.outcome.num_rows(), 2);
        Ok(())
    }

    #[test]
    fn table_without_coordinates_is_empty_with_notice() -> anyhow::Result<()> {
        let schema = Arc::new(Schema::new(vec![Field::new("District", DataType::Utf8, true)]));
        let batch = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["a"]))])?;
        let result = map_points(&batch)?;
        assert!(result.outcome.is_empty());
        assert_eq!(result.notices.len(), 1);
        Ok(())
    }
}
