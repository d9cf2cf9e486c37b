// Transform stages: select, derive, rename, drop, cast, distinct, explode
// Author: Gabriel Demetrios Lafis

use std::collections::HashSet;

use super::{Stage, StageError, StageType};
use crate::data::{DataError, DataType, Field, Schema, Table, Value};
use crate::expr::{col, Expr, ExprError};

/// Select a list of expressions as the output columns
pub struct SelectStage {
    exprs: Vec<Expr>,
}

impl SelectStage {
    /// Create a new select stage from expressions
    pub fn new(exprs: Vec<Expr>) -> Self {
        SelectStage { exprs }
    }

    /// Create a new select stage from plain column names
    pub fn columns(names: Vec<&str>) -> Self {
        SelectStage {
            exprs: names.into_iter().map(col).collect(),
        }
    }
}

impl Stage for SelectStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let mut fields = Vec::with_capacity(self.exprs.len());
        let mut columns = Vec::with_capacity(self.exprs.len());

        for expr in &self.exprs {
            let column = expr.evaluate(input)?;

            // Plain references keep their declared field, everything else
            // gets a generated nullable field
            let field = match expr {
                Expr::Column(name) => input
                    .schema
                    .get_field_by_name(name)
                    .cloned()
                    .ok_or_else(|| ExprError::UnknownColumn(name.clone()))?,
                _ => Field::new(expr.output_name(), column.data_type.clone(), true),
            };

            fields.push(field);
            columns.push(column);
        }

        let mut result = Table::from_columns(Schema::new(fields), columns)?;
        result.copy_metadata_from(input);
        Ok(result)
    }

    fn name(&self) -> &str {
        "select"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}

/// Derive a column from an expression.
///
/// An existing column of the same name is replaced at its ordinal
/// position; a new name is appended at the end.
pub struct WithColumnStage {
    column: String,
    expr: Expr,
}

impl WithColumnStage {
    /// Create a new derive-column stage
    pub fn new(column: &str, expr: Expr) -> Self {
        WithColumnStage {
            column: column.to_string(),
            expr,
        }
    }
}

impl Stage for WithColumnStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let column = self.expr.evaluate(input)?;
        Ok(input.with_column(&self.column, column)?)
    }

    fn name(&self) -> &str {
        "with_column"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}

/// Rename columns in a table
pub struct RenameStage {
    renames: Vec<(String, String)>, // (old_name, new_name)
}

impl RenameStage {
    /// Create a new rename stage with the given column renames
    pub fn new(renames: Vec<(&str, &str)>) -> Self {
        RenameStage {
            renames: renames
                .into_iter()
                .map(|(old, new)| (old.to_string(), new.to_string()))
                .collect(),
        }
    }
}

impl Stage for RenameStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let mut fields = input.schema.fields.clone();

        for (old_name, new_name) in &self.renames {
            let field = fields
                .iter_mut()
                .find(|f| &f.name == old_name)
                .ok_or_else(|| DataError::UnknownColumn(old_name.clone()))?;
            field.name = new_name.clone();
        }

        let mut result = Table::from_columns(Schema::new(fields), input.columns.clone())?;
        result.copy_metadata_from(input);
        Ok(result)
    }

    fn name(&self) -> &str {
        "rename"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}

/// Drop columns from a table
pub struct DropStage {
    columns: Vec<String>,
}

impl DropStage {
    /// Create a new drop stage
    pub fn new(columns: Vec<&str>) -> Self {
        DropStage {
            columns: columns.into_iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Stage for DropStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        for column in &self.columns {
            input.column_index(column)?;
        }

        let keep: Vec<String> = input
            .schema
            .fields
            .iter()
            .filter(|f| !self.columns.contains(&f.name))
            .map(|f| f.name.clone())
            .collect();

        Ok(input.project(&keep)?)
    }

    fn name(&self) -> &str {
        "drop"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}

/// Cast a column to a different type.
///
/// The cast is lenient: values that cannot be converted become null
/// instead of failing the stage.
pub struct CastStage {
    column: String,
    target_type: DataType,
}

impl CastStage {
    /// Create a new cast stage
    pub fn new(column: &str, target_type: DataType) -> Self {
        CastStage {
            column: column.to_string(),
            target_type,
        }
    }
}

impl Stage for CastStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let expr = col(&self.column).cast(self.target_type.clone());
        let column = expr.evaluate(input)?;
        Ok(input.with_column(&self.column, column)?)
    }

    fn name(&self) -> &str {
        "cast"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}

/// Drop duplicate rows, keeping the first occurrence.
///
/// Duplicates are judged over the subset columns if given, otherwise over
/// all columns. Idempotent: applying it twice changes nothing more.
pub struct DistinctStage {
    subset: Option<Vec<String>>,
}

impl DistinctStage {
    /// Create a stage deduplicating over all columns
    pub fn new() -> Self {
        DistinctStage { subset: None }
    }

    /// Create a stage deduplicating over a subset of columns
    pub fn with_subset(subset: Vec<&str>) -> Self {
        DistinctStage {
            subset: Some(subset.into_iter().map(|c| c.to_string()).collect()),
        }
    }

    fn key_indices(&self, input: &Table) -> Result<Vec<usize>, StageError> {
        match &self.subset {
            Some(names) => names
                .iter()
                .map(|name| input.column_index(name).map_err(StageError::from))
                .collect(),
            None => Ok((0..input.num_columns()).collect()),
        }
    }
}

impl Default for DistinctStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for DistinctStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let key_indices = self.key_indices(input)?;

        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        let mut keep = Vec::new();

        for row_index in 0..input.len() {
            let key: Vec<Value> = key_indices
                .iter()
                .map(|&i| input.columns[i].values[row_index].clone())
                .collect();

            if seen.insert(key) {
                keep.push(row_index);
            }
        }

        Ok(input.take(&keep)?)
    }

    fn name(&self) -> &str {
        "distinct"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}

/// Expand an array column into one row per element.
///
/// Rows whose array is null or empty are dropped; all other columns are
/// repeated for each element.
pub struct ExplodeStage {
    column: String,
}

impl ExplodeStage {
    /// Create a new explode stage
    pub fn new(column: &str) -> Self {
        ExplodeStage {
            column: column.to_string(),
        }
    }
}

impl Stage for ExplodeStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let column_index = input.column_index(&self.column)?;

        let element_type = match &input.schema.fields[column_index].data_type {
            DataType::Array(element_type) => element_type.as_ref().clone(),
            other => {
                return Err(StageError::Expr(ExprError::TypeMismatch(format!(
                    "explode requires an array column, got {:?}",
                    other
                ))))
            }
        };

        let mut fields = input.schema.fields.clone();
        fields[column_index] = Field::new(self.column.clone(), element_type.clone(), true);

        let mut result = Table::new(Schema::new(fields))?;

        for row_index in 0..input.len() {
            let elements = match &input.columns[column_index].values[row_index] {
                Value::Array(items) => items.clone(),
                _ => continue,
            };

            for element in elements {
                let mut row = input.row(row_index);
                row[column_index] = element;
                result.add_row(row)?;
            }
        }

        result.copy_metadata_from(input);
        Ok(result)
    }

    fn name(&self) -> &str {
        "explode"
    }

    fn stage_type(&self) -> StageType {
        StageType::Transform
    }
}
