//! Tabular datasets (Arrow columnar format)
//!
//! Stage files are comma-separated with a header row and no index column.
//! A [`Dataset`] keeps the columns exactly as parsed so that a load/save
//! cycle does not change their types; conversion to `f64` happens only when
//! a stage extracts features and target through a [`DatasetSchema`].

pub mod reference;
pub mod split;

pub use split::{split_indices, split_sizes, train_test_split, SplitSpec};

use crate::{Error, Result};
use arrow::array::{Array, ArrayRef, Float64Array, UInt32Array};
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use std::sync::Arc;

/// Ordered feature names plus the target name, checked at every stage
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatasetSchema {
    features: Vec<String>,
    target: String,
}

impl DatasetSchema {
    /// Create a schema from explicit feature names and target.
    #[must_use]
    pub fn new(features: Vec<String>, target: impl Into<String>) -> Self {
        Self {
            features,
            target: target.into(),
        }
    }

    /// Derive the schema of `dataset`: every column except `target` is a
    /// feature, in file order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the target column is absent or
    /// there are no feature columns.
    pub fn infer(dataset: &Dataset, target: &str) -> Result<Self> {
        let names = dataset.column_names();
        if !names.iter().any(|name| name == target) {
            return Err(Error::SchemaMismatch(format!(
                "target column '{target}' not found (columns: {})",
                names.join(", ")
            )));
        }

        let features: Vec<String> = names.into_iter().filter(|name| name != target).collect();
        if features.is_empty() {
            return Err(Error::SchemaMismatch(
                "dataset has no feature columns".to_string(),
            ));
        }

        Ok(Self::new(features, target))
    }

    /// Feature column names, in model order.
    #[must_use]
    pub fn features(&self) -> &[String] {
        &self.features
    }

    /// Target column name.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Check that `dataset` carries the same feature set and target.
    /// Column order is not significant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] naming the missing and unexpected columns.
    pub fn check(&self, dataset: &Dataset) -> Result<()> {
        let actual = Self::infer(dataset, &self.target)?;

        let missing: Vec<&str> = self
            .features
            .iter()
            .filter(|name| !actual.features.contains(name))
            .map(String::as_str)
            .collect();
        let unexpected: Vec<&str> = actual
            .features
            .iter()
            .filter(|name| !self.features.contains(name))
            .map(String::as_str)
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            Ok(())
        } else {
            Err(Error::SchemaMismatch(format!(
                "feature columns differ (missing: [{}], unexpected: [{}])",
                missing.join(", "),
                unexpected.join(", ")
            )))
        }
    }
}

/// Row-major `f64` feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Build from row-major values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] if `values.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, values: Vec<f64>) -> Result<Self> {
        if values.len() != rows * cols {
            return Err(Error::Other(format!(
                "feature matrix shape {rows}x{cols} does not match {} values",
                values.len()
            )));
        }
        Ok(Self { rows, cols, values })
    }

    /// Build from a slice of equally long rows.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Other`] on ragged rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return Err(Error::Other("ragged feature rows".to_string()));
        }
        Self::new(rows.len(), cols, rows.concat())
    }

    /// Number of rows.
    #[must_use]
    pub const fn n_rows(&self) -> usize {
        self.rows
    }

    /// Number of feature columns.
    #[must_use]
    pub const fn n_cols(&self) -> usize {
        self.cols
    }

    /// Borrow row `i`.
    #[must_use]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.cols..(i + 1) * self.cols]
    }

    /// Value at row `i`, column `j`.
    #[must_use]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.cols + j]
    }
}

/// In-memory tabular dataset backed by a single Arrow record batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// Wrap an existing record batch.
    #[must_use]
    pub const fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Read a CSV file with a header row.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or parsed
    pub fn read_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            Error::Parse(format!("Failed to open CSV file {}: {e}", path.display()))
        })?;
        Self::read_csv_from(file)
    }

    /// Parse CSV content held in memory.
    ///
    /// # Errors
    ///
    /// Returns error if the content is not valid CSV
    pub fn from_csv_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read_csv_from(Cursor::new(bytes))
    }

    /// Parse CSV from any seekable reader. Column types are inferred from
    /// the full content.
    ///
    /// # Errors
    ///
    /// Returns error if the header is missing or rows are malformed
    pub fn read_csv_from<R: Read + Seek>(mut reader: R) -> Result<Self> {
        let format = Format::default().with_header(true);
        let (schema, _) = format
            .infer_schema(&mut reader, None)
            .map_err(|e| Error::Parse(format!("Failed to infer CSV schema: {e}")))?;
        if schema.fields().is_empty() {
            return Err(Error::Parse("CSV content has no header row".to_string()));
        }
        reader.rewind()?;

        let schema: SchemaRef = Arc::new(schema);
        let csv = ReaderBuilder::new(Arc::clone(&schema))
            .with_format(format)
            .build(reader)
            .map_err(|e| Error::Parse(format!("Failed to create CSV reader: {e}")))?;

        let mut batches = Vec::new();
        for batch in csv {
            let batch =
                batch.map_err(|e| Error::Parse(format!("Failed to read CSV record: {e}")))?;
            batches.push(batch);
        }

        Self::from_batches(&schema, &batches)
    }

    /// Read a Parquet file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn read_parquet<P: AsRef<Path>>(path: P) -> Result<Self> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path.as_ref())
            .map_err(|e| Error::Parse(format!("Failed to open Parquet file: {e}")))?;

        let builder = ParquetRecordBatchReaderBuilder::try_new(file)
            .map_err(|e| Error::Parse(format!("Failed to parse Parquet file: {e}")))?;
        let schema = Arc::clone(builder.schema());

        let reader = builder
            .build()
            .map_err(|e| Error::Parse(format!("Failed to create Parquet reader: {e}")))?;

        // Read all batches into memory
        let mut batches = Vec::new();
        for batch in reader {
            let batch = batch
                .map_err(|e| Error::Parse(format!("Failed to read record batch: {e}")))?;
            batches.push(batch);
        }

        Self::from_batches(&schema, &batches)
    }

    fn from_batches(schema: &SchemaRef, batches: &[RecordBatch]) -> Result<Self> {
        let batch = arrow::compute::concat_batches(schema, batches)?;
        Ok(Self { batch })
    }

    /// Serialize as CSV (header row, no index column).
    ///
    /// # Errors
    ///
    /// Returns error if a column cannot be formatted
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        {
            let mut writer = WriterBuilder::new().with_header(true).build(&mut buffer);
            writer.write(&self.batch)?;
        }
        Ok(buffer)
    }

    /// Write as CSV, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_csv_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }

    /// Underlying record batch.
    #[must_use]
    pub const fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    /// Arrow schema of the dataset.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    /// Number of rows.
    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    /// Number of columns, target included.
    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    /// `(rows, columns)`
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.num_rows(), self.num_columns())
    }

    /// Column names in file order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect()
    }

    /// Select rows by position, in the given order.
    ///
    /// # Errors
    ///
    /// Returns error if an index is out of bounds
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let rows = self.num_rows();
        let indices = indices
            .iter()
            .map(|&i| {
                if i < rows {
                    u32::try_from(i).map_err(|_| Error::Other(format!("row index {i} too large")))
                } else {
                    Err(Error::Other(format!("row index {i} out of bounds ({rows} rows)")))
                }
            })
            .collect::<Result<Vec<u32>>>()?;
        let indices = UInt32Array::from(indices);
        let batch = arrow::compute::take_record_batch(&self.batch, &indices)?;
        Ok(Self { batch })
    }

    /// Values of a numeric column as `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SchemaMismatch`] if the column is absent or not
    /// numeric, [`Error::Parse`] if it contains missing values.
    pub fn column_f64(&self, name: &str) -> Result<Vec<f64>> {
        let column = self.batch.column_by_name(name).ok_or_else(|| {
            Error::SchemaMismatch(format!("column '{name}' not found"))
        })?;
        let values = numeric_column(name, column)?;
        Ok(values.values().to_vec())
    }

    /// Extract features (in schema order) and target.
    ///
    /// # Errors
    ///
    /// Returns error if the dataset does not satisfy `schema` or a column
    /// is not numeric.
    pub fn features_and_target(&self, schema: &DatasetSchema) -> Result<(FeatureMatrix, Vec<f64>)> {
        schema.check(self)?;

        let columns = schema
            .features()
            .iter()
            .map(|name| self.column_f64(name))
            .collect::<Result<Vec<_>>>()?;
        let target = self.column_f64(schema.target())?;

        let rows = self.num_rows();
        let cols = columns.len();
        let mut values = Vec::with_capacity(rows * cols);
        for i in 0..rows {
            values.extend(columns.iter().map(|column| column[i]));
        }

        Ok((FeatureMatrix::new(rows, cols, values)?, target))
    }

    /// Build a dataset from named `f64` columns.
    ///
    /// # Errors
    ///
    /// Returns error if columns differ in length
    pub fn from_f64_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let fields: Vec<arrow::datatypes::Field> = columns
            .iter()
            .map(|(name, _)| arrow::datatypes::Field::new(name, DataType::Float64, false))
            .collect();
        let arrays: Vec<ArrayRef> = columns
            .into_iter()
            .map(|(_, values)| Arc::new(Float64Array::from(values)) as ArrayRef)
            .collect();
        let batch = RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?;
        Ok(Self { batch })
    }
}

fn numeric_column(name: &str, column: &ArrayRef) -> Result<Float64Array> {
    let data_type = column.data_type();
    let castable = data_type.is_numeric()
        || matches!(data_type, DataType::Null)
        || (matches!(data_type, DataType::Utf8) && column.is_empty());
    if !castable {
        return Err(Error::SchemaMismatch(format!(
            "column '{name}' is not numeric ({data_type})"
        )));
    }

    let cast = arrow::compute::cast(column.as_ref(), &DataType::Float64)?;
    if cast.null_count() > 0 {
        return Err(Error::Parse(format!(
            "column '{name}' has {} missing value(s)",
            cast.null_count()
        )));
    }

    cast.as_any()
        .downcast_ref::<Float64Array>()
        .cloned()
        .ok_or_else(|| Error::Other(format!("column '{name}' did not cast to Float64")))
}
