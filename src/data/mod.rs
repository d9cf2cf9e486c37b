// Data module for tables, columns and formats
// Author: Gabriel Demetrios Lafis

mod csv;
mod json;
mod pretty;
mod schema;

pub use self::csv::*;
pub use self::json::*;
pub use self::pretty::*;
pub use self::schema::*;

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use thiserror::Error;

/// Represents a generic data source
pub trait DataSource {
    /// Read data from the source
    fn read(&self) -> Result<Table, DataError>;

    /// Get the source name
    fn name(&self) -> &str;

    /// Get the source type
    fn source_type(&self) -> SourceType;
}

/// Represents a generic data sink
pub trait DataSink {
    /// Write data to the sink
    fn write(&self, data: &Table) -> Result<(), DataError>;

    /// Get the sink name
    fn name(&self) -> &str;

    /// Get the sink type
    fn sink_type(&self) -> SinkType;
}

/// Write behaviour when the target already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Add rows to the existing target
    Append,
    /// Replace the target
    Overwrite,
    /// Fail if the target exists
    ErrorIfExists,
    /// Do nothing if the target exists
    Ignore,
}

impl SaveMode {
    /// Parse a save mode from a string
    pub fn parse(s: &str) -> Result<Self, DataError> {
        match s.to_lowercase().as_str() {
            "append" => Ok(SaveMode::Append),
            "overwrite" => Ok(SaveMode::Overwrite),
            "error" | "errorifexists" => Ok(SaveMode::ErrorIfExists),
            "ignore" => Ok(SaveMode::Ignore),
            _ => Err(DataError::Parse(format!("Unknown save mode: {}", s))),
        }
    }
}

/// Policy for source rows that cannot be parsed into the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Abort the whole load on the first bad row
    #[default]
    Fail,
    /// Skip the bad row and continue
    Skip,
}

/// An immutable columnar table: named, typed columns of equal length
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub schema: Schema,
    pub columns: Vec<Column>,
    pub metadata: Metadata,
}

impl Table {
    /// Create a new empty table for the given schema
    pub fn new(schema: Schema) -> Result<Self, DataError> {
        let mut seen = HashSet::new();
        for field in &schema.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(DataError::DuplicateColumn(field.name.clone()));
            }
        }

        let columns = schema
            .fields
            .iter()
            .map(|f| Column::new(f.data_type.clone(), Vec::new()))
            .collect();

        Ok(Table {
            schema,
            columns,
            metadata: Metadata::new(),
        })
    }

    /// Create a table from a schema and prebuilt columns
    pub fn from_columns(schema: Schema, columns: Vec<Column>) -> Result<Self, DataError> {
        if schema.fields.len() != columns.len() {
            return Err(DataError::SchemaConflict(format!(
                "schema has {} fields but {} columns were given",
                schema.fields.len(),
                columns.len()
            )));
        }

        let mut table = Table::new(schema)?;

        if let Some(first) = columns.first() {
            for column in &columns {
                if column.len() != first.len() {
                    return Err(DataError::LengthMismatch {
                        expected: first.len(),
                        actual: column.len(),
                    });
                }
            }
        }

        table.columns = columns;
        Ok(table)
    }

    /// Append a row of values, one per column
    pub fn add_row(&mut self, values: Vec<Value>) -> Result<(), DataError> {
        if values.len() != self.schema.fields.len() {
            return Err(DataError::LengthMismatch {
                expected: self.schema.fields.len(),
                actual: values.len(),
            });
        }

        for (column, value) in self.columns.iter_mut().zip(values) {
            column.values.push(value);
        }

        Ok(())
    }

    /// Get the number of rows in the table
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.len())
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the number of columns in the table
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Find the ordinal position of a column by name
    pub fn column_index(&self, name: &str) -> Result<usize, DataError> {
        self.schema
            .fields
            .iter()
            .position(|f| f.name == name)
            .ok_or_else(|| DataError::UnknownColumn(name.to_string()))
    }

    /// Get a reference to a column by name
    pub fn column(&self, name: &str) -> Result<&Column, DataError> {
        let index = self.column_index(name)?;
        Ok(&self.columns[index])
    }

    /// Materialize one row as a vector of values
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns
            .iter()
            .map(|c| c.values[index].clone())
            .collect()
    }

    /// Build a new table containing the given rows, in the given order
    pub fn take(&self, indices: &[usize]) -> Result<Table, DataError> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let values = indices.iter().map(|&i| c.values[i].clone()).collect();
                Column::new(c.data_type.clone(), values)
            })
            .collect();

        let mut result = Table::from_columns(self.schema.clone(), columns)?;
        result.metadata = self.metadata.clone();
        Ok(result)
    }

    /// Build a new table with only the named columns, in the given order
    pub fn project(&self, names: &[String]) -> Result<Table, DataError> {
        let mut fields = Vec::new();
        let mut columns = Vec::new();

        for name in names {
            let index = self.column_index(name)?;
            fields.push(self.schema.fields[index].clone());
            columns.push(self.columns[index].clone());
        }

        let mut result = Table::from_columns(Schema::new(fields), columns)?;
        result.metadata = self.metadata.clone();
        Ok(result)
    }

    /// Build a new table with the given column set or replaced.
    ///
    /// An existing column of the same name is overwritten in place, keeping
    /// its ordinal position; a new name is appended at the end.
    pub fn with_column(&self, name: &str, column: Column) -> Result<Table, DataError> {
        if !self.columns.is_empty() && column.len() != self.len() {
            return Err(DataError::LengthMismatch {
                expected: self.len(),
                actual: column.len(),
            });
        }

        let mut fields = self.schema.fields.clone();
        let mut columns = self.columns.clone();

        match self.schema.fields.iter().position(|f| f.name == name) {
            Some(index) => {
                fields[index] = Field::new(name.to_string(), column.data_type.clone(), true);
                columns[index] = column;
            }
            None => {
                fields.push(Field::new(name.to_string(), column.data_type.clone(), true));
                columns.push(column);
            }
        }

        let mut result = Table::from_columns(Schema::new(fields), columns)?;
        result.metadata = self.metadata.clone();
        Ok(result)
    }

    /// Copy metadata properties from another table
    pub fn copy_metadata_from(&mut self, other: &Table) {
        for (key, value) in &other.metadata.properties {
            self.metadata.add(key.clone(), value.clone());
        }
    }
}

/// A typed column of values; `Value::Null` marks missing entries
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub data_type: DataType,
    pub values: Vec<Value>,
}

impl Column {
    /// Create a new column
    pub fn new(data_type: DataType, values: Vec<Value>) -> Self {
        Column { data_type, values }
    }

    /// Get the number of values in the column
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the column is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Represents a single cell value
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    Date(NaiveDate),
    Array(Vec<Value>),
}

impl Value {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the data type of the value, if it has one
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::String(_) => Some(DataType::String),
            Value::Date(_) => Some(DataType::Date),
            Value::Array(values) => {
                let element = values
                    .iter()
                    .find_map(|v| v.data_type())
                    .unwrap_or(DataType::String);
                Some(DataType::Array(Box::new(element)))
            }
        }
    }

    /// Get the numeric value as a float, if the value is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Total ordering used by sort and window stages.
    ///
    /// Nulls sort first; integers and floats compare numerically.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Null, _) => Ordering::Less,
            (_, Value::Null) => Ordering::Greater,
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        }
    }

    /// Render the value for display and CSV output
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Array(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_display_string()).collect();
                format!("[{}]", parts.join(", "))
            }
        }
    }
}

/// Normalized bit pattern for float keys: signed zero collapses and every
/// NaN maps to one canonical pattern, keeping equality reflexive
fn float_key(f: f64) -> u64 {
    if f == 0.0 {
        0
    } else if f.is_nan() {
        f64::NAN.to_bits()
    } else {
        f.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => float_key(*a) == float_key(*b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => float_key(*f).hash(state),
            Value::String(s) => s.hash(state),
            Value::Date(d) => d.hash(state),
            Value::Array(values) => values.hash(state),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

/// Represents a schema for a table
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema with the given fields
    pub fn new(fields: Vec<Field>) -> Self {
        Schema { fields }
    }

    /// Get a reference to a field by name
    pub fn get_field_by_name(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a reference to a field by index
    pub fn get_field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Get the field names in schema order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}

/// Represents a field in a schema
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl Field {
    /// Create a new field
    pub fn new(name: String, data_type: DataType, nullable: bool) -> Self {
        Field {
            name,
            data_type,
            nullable,
        }
    }
}

/// Represents a data type for a field
#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Boolean,
    Integer,
    Float,
    String,
    Date,
    Array(Box<DataType>),
}

/// Represents metadata for a table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub properties: HashMap<String, String>,
}

impl Metadata {
    /// Create new empty metadata
    pub fn new() -> Self {
        Metadata {
            properties: HashMap::new(),
        }
    }

    /// Add a property to the metadata
    pub fn add(&mut self, key: String, value: String) {
        self.properties.insert(key, value);
    }

    /// Get a property from the metadata
    pub fn get(&self, key: &str) -> Option<&String> {
        self.properties.get(key)
    }
}

/// Represents a source type
#[derive(Debug, Clone, PartialEq)]
pub enum SourceType {
    File,
    Memory,
    Custom(String),
}

/// Represents a sink type
#[derive(Debug, Clone, PartialEq)]
pub enum SinkType {
    File,
    Memory,
    Custom(String),
}

/// Represents an error in the data module
#[derive(Debug, Error)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Duplicate column '{0}'")]
    DuplicateColumn(String),
    #[error("Schema conflict: {0}")]
    SchemaConflict(String),
    #[error("Malformed record at row {row}: {message}")]
    MalformedRecord { row: usize, message: String },
    #[error("Length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Target '{0}' already exists")]
    TargetExists(String),
}
