// Schema building, inference and validation
// Author: Gabriel Demetrios Lafis

use chrono::NaiveDate;

use super::{Column, DataError, DataType, Field, Schema, Table, Value};

/// Schema validator for ensuring data conforms to a schema
pub struct SchemaValidator;

impl SchemaValidator {
    /// Validate a value against a data type
    pub fn validate_value(value: &Value, data_type: &DataType) -> Result<(), DataError> {
        match (value, data_type) {
            (Value::Null, _) => Ok(()), // Null is valid for any type
            (Value::Boolean(_), DataType::Boolean) => Ok(()),
            (Value::Integer(_), DataType::Integer) => Ok(()),
            (Value::Float(_), DataType::Float) => Ok(()),
            (Value::String(_), DataType::String) => Ok(()),
            (Value::Date(_), DataType::Date) => Ok(()),
            (Value::Array(values), DataType::Array(element_type)) => {
                for value in values {
                    Self::validate_value(value, element_type)?;
                }
                Ok(())
            }
            _ => Err(DataError::Validation(format!(
                "Value type mismatch: expected {:?}",
                data_type
            ))),
        }
    }

    /// Validate a column against its field declaration
    pub fn validate_column(column: &Column, field: &Field) -> Result<(), DataError> {
        for value in &column.values {
            if !field.nullable && value.is_null() {
                return Err(DataError::Validation(format!(
                    "Field '{}' cannot be null",
                    field.name
                )));
            }

            Self::validate_value(value, &field.data_type)?;
        }

        Ok(())
    }

    /// Validate every column of a table against its schema
    pub fn validate_table(table: &Table) -> Result<(), DataError> {
        for (field, column) in table.schema.fields.iter().zip(&table.columns) {
            Self::validate_column(column, field)?;
        }

        Ok(())
    }
}

/// Schema builder for creating explicit schemas
pub struct SchemaBuilder {
    fields: Vec<Field>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        SchemaBuilder { fields: Vec::new() }
    }

    /// Add a field to the schema
    pub fn add_field(mut self, name: &str, data_type: DataType, nullable: bool) -> Self {
        self.fields
            .push(Field::new(name.to_string(), data_type, nullable));
        self
    }

    /// Add a boolean field
    pub fn add_boolean(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Boolean, nullable)
    }

    /// Add an integer field
    pub fn add_integer(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Integer, nullable)
    }

    /// Add a float field
    pub fn add_float(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Float, nullable)
    }

    /// Add a string field
    pub fn add_string(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::String, nullable)
    }

    /// Add a date field
    pub fn add_date(self, name: &str, nullable: bool) -> Self {
        self.add_field(name, DataType::Date, nullable)
    }

    /// Add an array field
    pub fn add_array(self, name: &str, element_type: DataType, nullable: bool) -> Self {
        self.add_field(name, DataType::Array(Box::new(element_type)), nullable)
    }

    /// Build the schema
    pub fn build(self) -> Schema {
        Schema::new(self.fields)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Date format accepted by inference and strict parsing
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Infer the narrowest type that accepts every raw cell in the sample.
///
/// Empty cells are treated as null and carry no type information; a sample
/// with no informative cells falls back to string.
pub fn infer_field_type(sample: &[&str]) -> DataType {
    let mut inferred: Option<DataType> = None;

    for raw in sample {
        if raw.is_empty() {
            continue;
        }

        let cell_type = detect_cell_type(raw);
        inferred = Some(match inferred.take() {
            None => cell_type,
            Some(current) => widen_types(current, cell_type),
        });
    }

    inferred.unwrap_or(DataType::String)
}

/// Infer a schema from column names and a sample of raw rows
pub fn infer_schema(names: &[String], sample: &[Vec<String>]) -> Schema {
    let fields = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let cells: Vec<&str> = sample
                .iter()
                .filter_map(|row| row.get(i).map(|s| s.as_str()))
                .collect();

            Field::new(name.clone(), infer_field_type(&cells), true)
        })
        .collect();

    Schema::new(fields)
}

/// Parse a raw cell into a value of the declared type.
///
/// An empty cell is null; anything unparsable is a parse error so the
/// caller can apply its malformed-record policy.
pub fn parse_cell(raw: &str, data_type: &DataType) -> Result<Value, DataError> {
    if raw.is_empty() {
        return Ok(Value::Null);
    }

    match data_type {
        DataType::Boolean => match raw.to_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Value::Boolean(true)),
            "false" | "no" | "0" => Ok(Value::Boolean(false)),
            _ => Err(DataError::Parse(format!("Cannot parse '{}' as boolean", raw))),
        },
        DataType::Integer => raw
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| DataError::Parse(format!("Cannot parse '{}' as integer", raw))),
        DataType::Float => raw
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| DataError::Parse(format!("Cannot parse '{}' as float", raw))),
        DataType::Date => NaiveDate::parse_from_str(raw, DATE_FORMAT)
            .map(Value::Date)
            .map_err(|_| DataError::Parse(format!("Cannot parse '{}' as date", raw))),
        DataType::String => Ok(Value::String(raw.to_string())),
        DataType::Array(_) => Err(DataError::Parse(
            "Array columns cannot be parsed from delimited text".to_string(),
        )),
    }
}

fn detect_cell_type(raw: &str) -> DataType {
    let lower = raw.to_lowercase();
    if lower == "true" || lower == "false" {
        return DataType::Boolean;
    }
    if raw.parse::<i64>().is_ok() {
        return DataType::Integer;
    }
    if raw.parse::<f64>().is_ok() {
        return DataType::Float;
    }
    if NaiveDate::parse_from_str(raw, DATE_FORMAT).is_ok() {
        return DataType::Date;
    }
    DataType::String
}

pub(crate) fn widen_types(a: DataType, b: DataType) -> DataType {
    if a == b {
        return a;
    }

    match (&a, &b) {
        (DataType::Integer, DataType::Float) | (DataType::Float, DataType::Integer) => {
            DataType::Float
        }
        _ => DataType::String,
    }
}
