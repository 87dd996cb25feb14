use super::snapshot::{SnapshotColumn, SnapshotTable, SnapshotWriter};
use crate::{
    error::{SomaError, SomaResult},
    types::AsOfDate,
};
use arrow::array::{ArrayRef, Date32Array, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Mirrors a table into one Parquet file, one row group.
pub struct ParquetSnapshotWriter;

/// Days since 1970-01-01, the Date32 encoding.
fn epoch_days(date: AsOfDate) -> SomaResult<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
    i32::try_from((date - epoch).num_days())
        .map_err(|_| SomaError::Config(format!("date {date} outside the Date32 range")))
}

impl SnapshotWriter for ParquetSnapshotWriter {
    fn name(&self) -> &'static str { "parquet" }

    fn extension(&self) -> &'static str { "parquet" }

    fn write(&self, table: &SnapshotTable, path: &Path) -> SomaResult<()> {
        let mut fields = Vec::with_capacity(table.columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(table.columns.len());
        for (name, col) in &table.columns {
            match col {
                SnapshotColumn::Date(v) => {
                    let days = v.iter().map(|d| epoch_days(*d)).collect::<SomaResult<Vec<i32>>>()?;
                    fields.push(Field::new(name.as_str(), DataType::Date32, false));
                    arrays.push(Arc::new(Date32Array::from(days)));
                }
                SnapshotColumn::Text(v) => {
                    fields.push(Field::new(name.as_str(), DataType::Utf8, false));
                    arrays.push(Arc::new(StringArray::from(v.clone())));
                }
                SnapshotColumn::Number(v) => {
                    fields.push(Field::new(name.as_str(), DataType::Float64, false));
                    arrays.push(Arc::new(Float64Array::from(v.clone())));
                }
            }
        }
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays)?;

        let file = File::create(path)?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }
}
