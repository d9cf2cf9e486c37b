// Line-delimited JSON data source and sink implementation
// Author: Gabriel Demetrios Lafis

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use serde_json::{Map, Value as JsonValue};

use super::{
    widen_types, DataError, DataSink, DataSource, DataType, Field, MalformedPolicy, SaveMode,
    Schema, SinkType, SourceType, Table, Value,
};

/// Line-delimited JSON data source (one record object per line)
pub struct JsonSource {
    path: String,
    schema: Option<Schema>,
    sample_size: Option<usize>,
    malformed_policy: MalformedPolicy,
}

impl JsonSource {
    /// Create a new JSON data source with inferred schema
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonSource {
            path: path.as_ref().to_string_lossy().to_string(),
            schema: None,
            sample_size: None,
            malformed_policy: MalformedPolicy::Fail,
        }
    }

    /// Set an explicit schema; its names and types take precedence over inference
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Limit schema inference to the first `n` records
    pub fn with_sample_size(mut self, n: usize) -> Self {
        self.sample_size = Some(n);
        self
    }

    /// Set the policy for records that cannot be parsed into the schema
    pub fn with_malformed_policy(mut self, policy: MalformedPolicy) -> Self {
        self.malformed_policy = policy;
        self
    }

    /// Infer a schema from a sample of record objects.
    ///
    /// Keys are collected in first-appearance order; conflicting value
    /// types widen (integer to float, anything else to string).
    fn infer_schema(records: &[Map<String, JsonValue>]) -> Schema {
        let mut names: Vec<String> = Vec::new();
        let mut types: Vec<Option<DataType>> = Vec::new();

        for record in records {
            for (key, value) in record {
                let index = match names.iter().position(|n| n == key) {
                    Some(i) => i,
                    None => {
                        names.push(key.clone());
                        types.push(None);
                        names.len() - 1
                    }
                };

                if let Some(value_type) = Self::json_type(value) {
                    types[index] = Some(match types[index].take() {
                        None => value_type,
                        Some(current) => widen_types(current, value_type),
                    });
                }
            }
        }

        let fields = names
            .into_iter()
            .zip(types)
            .map(|(name, data_type)| {
                Field::new(name, data_type.unwrap_or(DataType::String), true)
            })
            .collect();

        Schema::new(fields)
    }

    fn json_type(value: &JsonValue) -> Option<DataType> {
        match value {
            JsonValue::Null => None,
            JsonValue::Bool(_) => Some(DataType::Boolean),
            JsonValue::Number(n) => {
                if n.is_i64() {
                    Some(DataType::Integer)
                } else {
                    Some(DataType::Float)
                }
            }
            JsonValue::String(_) => Some(DataType::String),
            JsonValue::Array(_) => Some(DataType::Array(Box::new(DataType::String))),
            JsonValue::Object(_) => Some(DataType::String),
        }
    }

    /// Convert a JSON value into a cell of the declared type
    fn json_to_value(json: &JsonValue, data_type: &DataType) -> Result<Value, DataError> {
        match (json, data_type) {
            (JsonValue::Null, _) => Ok(Value::Null),
            (JsonValue::Bool(b), DataType::Boolean) => Ok(Value::Boolean(*b)),
            (JsonValue::Number(n), DataType::Integer) if n.is_i64() => {
                Ok(Value::Integer(n.as_i64().unwrap_or_default()))
            }
            (JsonValue::Number(n), DataType::Float) => {
                Ok(Value::Float(n.as_f64().unwrap_or_default()))
            }
            (JsonValue::String(s), DataType::String) => Ok(Value::String(s.clone())),
            (JsonValue::String(s), DataType::Date) => {
                chrono::NaiveDate::parse_from_str(s, super::DATE_FORMAT)
                    .map(Value::Date)
                    .map_err(|_| DataError::Parse(format!("Cannot parse '{}' as date", s)))
            }
            (JsonValue::Array(items), DataType::Array(element_type)) => {
                let values = items
                    .iter()
                    .map(|item| Self::json_to_value(item, element_type))
                    .collect::<Result<Vec<Value>, DataError>>()?;
                Ok(Value::Array(values))
            }
            (other, DataType::String) => Ok(Value::String(other.to_string())),
            (other, expected) => Err(DataError::Parse(format!(
                "Value {} does not match declared type {:?}",
                other, expected
            ))),
        }
    }
}

impl DataSource for JsonSource {
    fn read(&self) -> Result<Table, DataError> {
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records: Vec<Map<String, JsonValue>> = Vec::new();

        for (line_index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let json: JsonValue = serde_json::from_str(&line)
                .map_err(|e| DataError::Parse(format!("line {}: {}", line_index, e)))?;

            match json {
                JsonValue::Object(obj) => records.push(obj),
                _ => {
                    return Err(DataError::Parse(format!(
                        "line {} is not a JSON object",
                        line_index
                    )))
                }
            }
        }

        let schema = match &self.schema {
            Some(schema) => schema.clone(),
            None => {
                let sample = match self.sample_size {
                    Some(n) if n < records.len() => &records[..n],
                    _ => &records[..],
                };
                Self::infer_schema(sample)
            }
        };

        let mut table = Table::new(schema)?;
        let mut skipped = 0usize;

        'records: for (row_index, record) in records.iter().enumerate() {
            let mut values = Vec::with_capacity(table.schema.fields.len());

            for field in &table.schema.fields {
                let json = record.get(&field.name).unwrap_or(&JsonValue::Null);
                match Self::json_to_value(json, &field.data_type) {
                    Ok(value) => values.push(value),
                    Err(err) => {
                        let error = DataError::MalformedRecord {
                            row: row_index,
                            message: err.to_string(),
                        };
                        match self.malformed_policy {
                            MalformedPolicy::Fail => return Err(error),
                            MalformedPolicy::Skip => {
                                warn!("Skipping record {}: {}", row_index, error);
                                skipped += 1;
                                continue 'records;
                            }
                        }
                    }
                }
            }

            table.add_row(values)?;
        }

        table.metadata.add("source".to_string(), "json".to_string());
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

/// Line-delimited JSON data sink
pub struct JsonSink {
    path: String,
    mode: SaveMode,
}

impl JsonSink {
    /// Create a new JSON data sink that overwrites its target
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        JsonSink {
            path: path.as_ref().to_string_lossy().to_string(),
            mode: SaveMode::Overwrite,
        }
    }

    /// Set the save mode
    pub fn with_mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Convert a cell into a JSON value
    fn value_to_json(value: &Value) -> JsonValue {
        match value {
            Value::Null => JsonValue::Null,
            Value::Boolean(b) => JsonValue::Bool(*b),
            Value::Integer(i) => JsonValue::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Date(d) => JsonValue::String(d.format(super::DATE_FORMAT).to_string()),
            Value::Array(values) => {
                JsonValue::Array(values.iter().map(Self::value_to_json).collect())
            }
        }
    }
}

impl DataSink for JsonSink {
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
        let mut writer = BufWriter::new(file);

        for row_index in 0..data.len() {
            let mut record = Map::new();

            for (field, column) in data.schema.fields.iter().zip(&data.columns) {
                record.insert(
                    field.name.clone(),
                    Self::value_to_json(&column.values[row_index]),
                );
            }

            let line = serde_json::to_string(&JsonValue::Object(record))
                .map_err(|e| DataError::Parse(e.to_string()))?;
            writeln!(writer, "{}", line)?;
        }

        writer.flush()?;

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
