use crate::error::{ProcessingError, Result};
use crate::models::{
    ColumnSpec, ColumnType, KeyColumn, MergedRecord, PartitionKey, TableColumn, TableRow,
    TableSchema, Value,
};
use crate::utils::constants::{
    COL_DATE, COL_ISLAND, COL_LATITUDE, COL_LOCATION, COL_LOCATION_NAME, COL_LONGITUDE, COL_MONTH,
    COL_YEAR, COMPRESSION_GZIP, COMPRESSION_LZ4, COMPRESSION_NONE, COMPRESSION_SNAPPY,
    COMPRESSION_ZSTD, DEFAULT_ROW_GROUP_SIZE,
};
use arrow::array::*;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Days between 0001-01-01 and 1970-01-01; Arrow dates count from the epoch
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Converts table rows to and from Parquet files laid out by a `TableSchema`.
#[derive(Debug, Clone)]
pub struct ParquetWriter {
    compression: Compression,
    row_group_size: usize,
}

impl ParquetWriter {
    pub fn new() -> Self {
        Self {
            compression: Compression::SNAPPY,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: &str) -> Result<Self> {
        self.compression = match compression.to_lowercase().as_str() {
            COMPRESSION_SNAPPY => Compression::SNAPPY,
            COMPRESSION_GZIP => Compression::GZIP(GzipLevel::default()),
            COMPRESSION_LZ4 => Compression::LZ4,
            COMPRESSION_ZSTD => Compression::ZSTD(ZstdLevel::default()),
            COMPRESSION_NONE => Compression::UNCOMPRESSED,
            _ => {
                return Err(ProcessingError::Config(format!(
                    "Unsupported compression: {}",
                    compression
                )))
            }
        };
        Ok(self)
    }

    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Write rows (possibly none) to any sink. A zero-row write still
    /// produces a valid file carrying the full schema.
    pub fn write_rows<W: Write + Send>(
        &self,
        sink: W,
        schema: &TableSchema,
        rows: &[TableRow],
    ) -> Result<()> {
        let arrow_schema = self.create_schema(schema);
        let props = WriterProperties::builder()
            .set_compression(self.compression)
            .set_max_row_group_size(self.row_group_size)
            .build();

        let mut writer = ArrowWriter::try_new(sink, arrow_schema.clone(), Some(props))?;
        for chunk in rows.chunks(self.row_group_size.max(1)) {
            let batch = self.rows_to_batch(chunk, schema, arrow_schema.clone())?;
            writer.write(&batch)?;
        }
        writer.close()?;

        Ok(())
    }

    /// Arrow schema for the table; partition columns are stored in the file
    /// as well as in the directory path.
    pub fn create_schema(&self, schema: &TableSchema) -> Arc<Schema> {
        let fields: Vec<Field> = schema
            .columns()
            .iter()
            .map(|column| match column {
                TableColumn::Key(key) => {
                    let data_type = match key {
                        KeyColumn::Location | KeyColumn::Island | KeyColumn::LocationName => {
                            DataType::Utf8
                        }
                        KeyColumn::Date => DataType::Date32,
                        KeyColumn::Latitude | KeyColumn::Longitude => DataType::Float64,
                        KeyColumn::Year | KeyColumn::Month => DataType::Int32,
                    };
                    Field::new(column.name(), data_type, false)
                }
                TableColumn::Attribute(spec) => {
                    Field::new(&spec.name, arrow_type(spec.column_type), true)
                }
            })
            .collect();

        Arc::new(Schema::new(fields))
    }

    fn rows_to_batch(
        &self,
        rows: &[TableRow],
        schema: &TableSchema,
        arrow_schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(schema.columns().len());

        for column in schema.columns() {
            let array: ArrayRef = match column {
                TableColumn::Key(KeyColumn::Location) => Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.record.location.as_str()),
                )),
                TableColumn::Key(KeyColumn::Date) => Arc::new(Date32Array::from(
                    rows.iter()
                        .map(|r| date_to_epoch_days(r.record.date))
                        .collect::<Vec<i32>>(),
                )),
                TableColumn::Key(KeyColumn::Latitude) => Arc::new(Float64Array::from(
                    rows.iter().map(|r| r.record.latitude).collect::<Vec<f64>>(),
                )),
                TableColumn::Key(KeyColumn::Longitude) => Arc::new(Float64Array::from(
                    rows.iter().map(|r| r.record.longitude).collect::<Vec<f64>>(),
                )),
                TableColumn::Key(KeyColumn::Island) => Arc::new(StringArray::from_iter_values(
                    rows.iter().map(|r| r.partition.island.as_str()),
                )),
                TableColumn::Key(KeyColumn::LocationName) => {
                    Arc::new(StringArray::from_iter_values(
                        rows.iter().map(|r| r.partition.location_name.as_str()),
                    ))
                }
                TableColumn::Key(KeyColumn::Year) => Arc::new(Int32Array::from(
                    rows.iter().map(|r| r.partition.year).collect::<Vec<i32>>(),
                )),
                TableColumn::Key(KeyColumn::Month) => Arc::new(Int32Array::from(
                    rows.iter()
                        .map(|r| r.partition.month as i32)
                        .collect::<Vec<i32>>(),
                )),
                TableColumn::Attribute(spec) => attribute_array(spec, rows)?,
            };
            arrays.push(array);
        }

        Ok(RecordBatch::try_new(arrow_schema, arrays)?)
    }

    /// Read every row of a file. Attribute columns the file lacks read as
    /// null, so files written before a schema change stay readable.
    pub fn read_rows(&self, path: &Path, schema: &TableSchema) -> Result<Vec<TableRow>> {
        let file = File::open(path)?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

        let mut rows = Vec::new();
        for batch_result in reader {
            let batch = batch_result?;
            rows.extend(self.batch_to_rows(&batch, schema)?);
        }

        Ok(rows)
    }

    fn batch_to_rows(&self, batch: &RecordBatch, schema: &TableSchema) -> Result<Vec<TableRow>> {
        let locations = key_column::<StringArray>(batch, COL_LOCATION)?;
        let dates = key_column::<Date32Array>(batch, COL_DATE)?;
        let latitudes = key_column::<Float64Array>(batch, COL_LATITUDE)?;
        let longitudes = key_column::<Float64Array>(batch, COL_LONGITUDE)?;
        let islands = key_column::<StringArray>(batch, COL_ISLAND)?;
        let location_names = key_column::<StringArray>(batch, COL_LOCATION_NAME)?;
        let years = key_column::<Int32Array>(batch, COL_YEAR)?;
        let months = key_column::<Int32Array>(batch, COL_MONTH)?;

        let attributes: Vec<(&ColumnSpec, Option<&ArrayRef>)> = schema
            .attributes()
            .map(|spec| (spec, batch.column_by_name(&spec.name)))
            .collect();

        let mut rows = Vec::with_capacity(batch.num_rows());
        for i in 0..batch.num_rows() {
            let date = epoch_days_to_date(dates.value(i)).ok_or_else(|| {
                ProcessingError::InvalidFormat(format!(
                    "Invalid date value {} in Parquet file",
                    dates.value(i)
                ))
            })?;

            let mut values = BTreeMap::new();
            for (spec, array) in &attributes {
                let value = match array {
                    Some(array) => read_value(spec, array, i)?,
                    None => Value::Null,
                };
                values.insert(spec.name.clone(), value);
            }

            rows.push(TableRow {
                record: MergedRecord {
                    location: locations.value(i).to_string(),
                    date,
                    latitude: latitudes.value(i),
                    longitude: longitudes.value(i),
                    attributes: values,
                },
                partition: PartitionKey {
                    island: islands.value(i).to_string(),
                    location_name: location_names.value(i).to_string(),
                    year: years.value(i),
                    month: months.value(i) as u32,
                },
            });
        }

        Ok(rows)
    }

    /// Get file statistics
    pub fn get_file_info(&self, path: &Path) -> Result<ParquetFileInfo> {
        use parquet::file::reader::{FileReader, SerializedFileReader};

        let file = File::open(path)?;
        let reader = SerializedFileReader::new(file)?;
        let metadata = reader.metadata();

        let row_groups = metadata.num_row_groups();
        let row_group_sizes = (0..row_groups)
            .map(|i| metadata.row_group(i).num_rows())
            .collect();

        Ok(ParquetFileInfo {
            total_rows: metadata.file_metadata().num_rows(),
            row_groups,
            row_group_sizes,
            file_size: std::fs::metadata(path)?.len(),
        })
    }
}

impl Default for ParquetWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn arrow_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Int64 => DataType::Int64,
        ColumnType::Float64 => DataType::Float64,
        ColumnType::Utf8 => DataType::Utf8,
    }
}

pub(crate) fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub(crate) fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

fn type_mismatch(spec: &ColumnSpec, value: &Value) -> ProcessingError {
    ProcessingError::SchemaMismatch {
        column: spec.name.clone(),
        expected: spec.column_type.to_string(),
        found: format!("{:?}", value),
    }
}

fn attribute_array(spec: &ColumnSpec, rows: &[TableRow]) -> Result<ArrayRef> {
    let values = rows
        .iter()
        .map(|r| r.record.attributes.get(&spec.name).unwrap_or(&Value::Null));

    let array: ArrayRef = match spec.column_type {
        ColumnType::Float64 => Arc::new(Float64Array::from(
            values
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Float(f) => Ok(Some(*f)),
                    Value::Int(i) => Ok(Some(*i as f64)),
                    other => Err(type_mismatch(spec, other)),
                })
                .collect::<Result<Vec<Option<f64>>>>()?,
        )),
        ColumnType::Int64 => Arc::new(Int64Array::from(
            values
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Int(i) => Ok(Some(*i)),
                    other => Err(type_mismatch(spec, other)),
                })
                .collect::<Result<Vec<Option<i64>>>>()?,
        )),
        ColumnType::Utf8 => Arc::new(StringArray::from(
            values
                .map(|v| match v {
                    Value::Null => Ok(None),
                    Value::Text(s) => Ok(Some(s.as_str())),
                    other => Err(type_mismatch(spec, other)),
                })
                .collect::<Result<Vec<Option<&str>>>>()?,
        )),
    };

    Ok(array)
}

fn key_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid {} column type", name)))
}

fn read_value(spec: &ColumnSpec, array: &ArrayRef, i: usize) -> Result<Value> {
    if array.is_null(i) {
        return Ok(Value::Null);
    }

    let invalid = || ProcessingError::SchemaMismatch {
        column: spec.name.clone(),
        expected: spec.column_type.to_string(),
        found: array.data_type().to_string(),
    };

    let value = match spec.column_type {
        ColumnType::Float64 => Value::Float(
            array
                .as_any()
                .downcast_ref::<Float64Array>()
                .ok_or_else(invalid)?
                .value(i),
        ),
        ColumnType::Int64 => Value::Int(
            array
                .as_any()
                .downcast_ref::<Int64Array>()
                .ok_or_else(invalid)?
                .value(i),
        ),
        ColumnType::Utf8 => Value::Text(
            array
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(invalid)?
                .value(i)
                .to_string(),
        ),
    };

    Ok(value)
}

#[derive(Debug)]
pub struct ParquetFileInfo {
    pub total_rows: i64,
    pub row_groups: usize,
    pub row_group_sizes: Vec<i64>,
    pub file_size: u64,
}

impl ParquetFileInfo {
    pub fn summary(&self) -> String {
        format!(
            "{} rows in {} row group(s), {:.1} KB",
            self.total_rows,
            self.row_groups,
            self.file_size as f64 / 1024.0
        )
    }
}
