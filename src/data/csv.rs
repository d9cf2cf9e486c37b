// CSV data source and sink implementation
// Author: Gabriel Demetrios Lafis

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{info, warn};

use super::{
    infer_schema, parse_cell, DataError, DataSink, DataSource, Field, MalformedPolicy, SaveMode,
    Schema, SinkType, SourceType, Table,
};

/// CSV data source
pub struct CsvSource {
    path: String,
    has_header: bool,
    delimiter: char,
    schema: Option<Schema>,
    infer_types: bool,
    sample_size: Option<usize>,
    malformed_policy: MalformedPolicy,
}

impl CsvSource {
    /// Create a new CSV data source with inferred schema
    pub fn new<P: AsRef<Path>>(path: P, has_header: bool, delimiter: char) -> Self {
        CsvSource {
            path: path.as_ref().to_string_lossy().to_string(),
            has_header,
            delimiter,
            schema: None,
            infer_types: true,
            sample_size: None,
            malformed_policy: MalformedPolicy::Fail,
        }
    }

    /// Set an explicit schema; its names and types take precedence over the header
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Enable or disable type inference; when disabled every column is a string
    pub fn with_type_inference(mut self, infer_types: bool) -> Self {
        self.infer_types = infer_types;
        self
    }

    /// Limit type inference to the first `n` rows
    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = Some(n);
        self
    }

    /// Set the policy for rows that cannot be parsed into the schema
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    fn read_raw(&self) -> Result<(Vec<String>, Vec<Vec<String>>), DataError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter as u8)
            .has_headers(self.has_header)
            .flexible(true)
            .from_reader(reader);

        let mut rows: Vec<Vec<String>> = Vec::new();

        for result in csv_reader.records() {
            let record = result.map_err(|e| DataError::Parse(e.to_string()))?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }

        let names: Vec<String> = if self.has_header {
            // Headers are buffered by the reader even after records were read
            let file = File::open(&self.path)?;
            let mut header_reader = csv::ReaderBuilder::new()
                .delimiter(self.delimiter as u8)
                .has_headers(true)
                .from_reader(BufReader::new(file));

            header_reader
                .headers()
                .map_err(|e| DataError::Parse(e.to_string()))?
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            let width = rows.first().map_or(0, |r| r.len());
            (0..width).map(|i| format!("column_{}", i)).collect()
        };

        Ok((names, rows))
    }

    fn resolve_schema(
        &self,
        names: &[String],
        rows: &[Vec<String>],
    ) -> Result<Schema, DataError> {
        if let Some(schema) = &self.schema {
            if !names.is_empty() && schema.fields.len() != names.len() {
                return Err(DataError::SchemaConflict(format!(
                    "explicit schema has {} columns, source has {}",
                    schema.fields.len(),
                    names.len()
                )));
            }
            return Ok(schema.clone());
        }

        if self.infer_types {
            let sample = match self.sample_size {
                Some(n) if n < rows.len() => &rows[..n],
                _ => rows,
            };
            Ok(infer_schema(names, sample))
        } else {
            let fields = names
                .iter()
                .map(|name| Field::new(name.clone(), super::DataType::String, true))
                .collect();
            Ok(Schema::new(fields))
        }
    }
}

impl DataSource for CsvSource {
    fn read(&self) -> Result<Table, DataError> {
        let (names, rows) = self.read_raw()?;
        let schema = self.resolve_schema(&names, &rows)?;

        let mut table = Table::new(schema)?;
        let mut skipped = 0usize;

        'rows: for (row_index, raw) in rows.iter().enumerate() {
            if raw.len() != table.schema.fields.len() {
                let error = DataError::MalformedRecord {
                    row: row_index,
                    message: format!(
                        "expected {} fields, got {}",
                        table.schema.fields.len(),
                        raw.len()
                    ),
                };
                match self.malformed_policy {
                    MalformedPolicy::Fail => return Err(error),
                    MalformedPolicy::Skip => {
                        warn!("Skipping row {}: {}", row_index, error);
                        skipped += 1;
                        continue;
                    }
                }
            }

            let mut values = Vec::with_capacity(raw.len());
            for (cell, field) in raw.iter().zip(&table.schema.fields) {
                match parse_cell(cell, &field.data_type) {
                    Ok(value) => values.push(value),
                    Err(err) => {
                        let error = DataError::MalformedRecord {
                            row: row_index,
                            message: err.to_string(),
                        };
                        match self.malformed_policy {
                            MalformedPolicy::Fail => return Err(error),
                            MalformedPolicy::Skip => {
                                warn!("Skipping row {}: {}", row_index, error);
                                skipped += 1;
                                continue 'rows;
                            }
                        }
                    }
                }
            }

            table.add_row(values)?;
        }

        table.metadata.add("source".to_string(), "csv".to_string());
        table.metadata.add("path".to_string(), self.path.clone());

        info!(
            "Loaded {} rows x {} columns from {} ({} skipped)",
            table.len(),
            table.num_columns(),
            self.path,
            skipped
        );

        Ok(table)
    }

    fn name(&self) -> &str {
        &self.path
    }

    fn source_type(&self) -> SourceType {
        SourceType::File
    }
}

/// CSV data sink
pub struct CsvSink {
    path: String,
    delimiter: char,
    mode: SaveMode,
}

impl CsvSink {
    /// Create a new CSV data sink that overwrites its target
    pub fn new<P: AsRef<Path>>(path: P, delimiter: char) -> Self {
        CsvSink {
            path: path.as_ref().to_string_lossy().to_string(),
            delimiter,
            mode: SaveMode::Overwrite,
        }
    }

    /// Set the save mode
    pub fn with_mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }
}

impl DataSink for CsvSink {
    fn write(&self, data: &Table) -> Result<(), DataError> {
        let exists = Path::new(&self.path).exists();

        let append = match (self.mode, exists) {
            (SaveMode::ErrorIfExists, true) => {
                return Err(DataError::TargetExists(self.path.clone()))
            }
            (SaveMode::Ignore, true) => {
                info!("Target {} exists, ignoring write", self.path);
                return Ok(());
            }
            (SaveMode::Append, true) => true,
            _ => false,
        };

        let file = if append {
            OpenOptions::new().append(true).open(&self.path)?
        } else {
            File::create(&self.path)?
        };
        let writer = BufWriter::new(file);

        let mut csv_writer = csv::WriterBuilder::new()
            .delimiter(self.delimiter as u8)
            .from_writer(writer);

        // Appending adds rows under the existing header
        if !append {
            let headers: Vec<&str> = data
                .schema
                .fields
                .iter()
                .map(|field| field.name.as_str())
                .collect();

            csv_writer
                .write_record(&headers)
                .map_err(|e| DataError::Parse(e.to_string()))?;
        }

        for row_index in 0..data.len() {
            let record: Vec<String> = data
                .columns
                .iter()
                .map(|column| column.values[row_index].to_display_string())
                .collect();

            csv_writer
                .write_record(&record)
                .map_err(|e| DataError::Parse(e.to_string()))?;
        }

        csv_writer.flush()?;

        info!("Wrote {} rows to {}", data.len(), self.path);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.path
    }

    fn sink_type(&self) -> SinkType {
        SinkType::File
    }
}
