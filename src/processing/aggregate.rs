// Grouped aggregation and pivot stages
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;

use super::{Stage, StageError, StageType};
use crate::data::{Column, DataType, Field, Schema, Table, Value};
use crate::expr::{col, Expr};

/// Represents a reduction over the values of one group
pub trait Reducer: Send + Sync {
    /// Get the name of the reducer
    fn name(&self) -> &str;

    /// Get the output data type of the reducer
    fn output_type(&self, input_type: &DataType) -> DataType;

    /// Reduce the group's values, in row order, to a single value
    fn reduce(&self, values: &[Value]) -> Value;
}

/// Count of non-null values
pub struct CountReducer;

impl Reducer for CountReducer {
    fn name(&self) -> &str {
        "count"
    }

    fn output_type(&self, _input_type: &DataType) -> DataType {
        DataType::Integer
    }

    fn reduce(&self, values: &[Value]) -> Value {
        Value::Integer(values.iter().filter(|v| !v.is_null()).count() as i64)
    }
}

/// Sum of numeric values; all-null groups yield null
pub struct SumReducer;

impl Reducer for SumReducer {
    fn name(&self) -> &str {
        "sum"
    }

    fn output_type(&self, input_type: &DataType) -> DataType {
        match input_type {
            DataType::Integer => DataType::Integer,
            _ => DataType::Float,
        }
    }

    fn reduce(&self, values: &[Value]) -> Value {
        let mut int_sum = 0i64;
        let mut float_sum = 0.0f64;
        let mut is_float = false;
        let mut seen = false;

        for value in values {
            match value {
                Value::Integer(i) => {
                    seen = true;
                    if is_float {
                        float_sum += *i as f64;
                    } else {
                        // Overflow yields null, matching arithmetic expressions
                        match int_sum.checked_add(*i) {
                            Some(total) => int_sum = total,
                            None => return Value::Null,
                        }
                    }
                }
                Value::Float(f) => {
                    seen = true;
                    if !is_float {
                        float_sum = int_sum as f64;
                        is_float = true;
                    }
                    float_sum += *f;
                }
                _ => {}
            }
        }

        if !seen {
            Value::Null
        } else if is_float {
            Value::Float(float_sum)
        } else {
            Value::Integer(int_sum)
        }
    }
}

/// Arithmetic mean of numeric values; all-null groups yield null
pub struct AvgReducer;

impl Reducer for AvgReducer {
    fn name(&self) -> &str {
        "avg"
    }

    fn output_type(&self, _input_type: &DataType) -> DataType {
        DataType::Float
    }

    fn reduce(&self, values: &[Value]) -> Value {
        let mut sum = 0.0f64;
        let mut count = 0i64;

        for value in values {
            if let Some(f) = value.as_f64() {
                sum += f;
                count += 1;
            }
        }

        if count > 0 {
            Value::Float(sum / count as f64)
        } else {
            Value::Null
        }
    }
}

/// Smallest non-null value
pub struct MinReducer;

impl Reducer for MinReducer {
    fn name(&self) -> &str {
        "min"
    }

    fn output_type(&self, input_type: &DataType) -> DataType {
        input_type.clone()
    }

    fn reduce(&self, values: &[Value]) -> Value {
        values
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .reduce(|a, b| {
                if b.compare(&a) == std::cmp::Ordering::Less {
                    b
                } else {
                    a
                }
            })
            .unwrap_or(Value::Null)
    }
}

/// Largest non-null value
pub struct MaxReducer;

impl Reducer for MaxReducer {
    fn name(&self) -> &str {
        "max"
    }

    fn output_type(&self, input_type: &DataType) -> DataType {
        input_type.clone()
    }

    fn reduce(&self, values: &[Value]) -> Value {
        values
            .iter()
            .filter(|v| !v.is_null())
            .cloned()
            .reduce(|a, b| {
                if b.compare(&a) == std::cmp::Ordering::Greater {
                    b
                } else {
                    a
                }
            })
            .unwrap_or(Value::Null)
    }
}

/// Non-null values gathered into an array, preserving row order
pub struct CollectListReducer;

impl Reducer for CollectListReducer {
    fn name(&self) -> &str {
        "collect_list"
    }

    fn output_type(&self, input_type: &DataType) -> DataType {
        DataType::Array(Box::new(input_type.clone()))
    }

    fn reduce(&self, values: &[Value]) -> Value {
        Value::Array(values.iter().filter(|v| !v.is_null()).cloned().collect())
    }
}

/// Group rows by key columns and aggregate each group to one output row.
///
/// Groups are emitted in first-appearance order of the key tuple, keeping
/// the output reproducible. With a pivot column, the column's distinct
/// values (also in first-appearance order) become output columns.
pub struct GroupByStage {
    keys: Vec<String>,
    aggregations: Vec<(String, Expr, Box<dyn Reducer>)>,
    pivot: Option<String>,
}

impl GroupByStage {
    /// Create a new group-by stage
    pub fn new() -> Self {
        GroupByStage {
            keys: Vec::new(),
            aggregations: Vec::new(),
            pivot: None,
        }
    }

    /// Add a key column to group by
    pub fn group_by(mut self, column: &str) -> Self {
        self.keys.push(column.to_string());
        self
    }

    /// Turn the distinct values of a column into output columns
    pub fn pivot(mut self, column: &str) -> Self {
        self.pivot = Some(column.to_string());
        self
    }

    /// Add an aggregation over an expression
    pub fn aggregate<R: Reducer + 'static>(
        mut self,
        output_name: &str,
        input: Expr,
        reducer: R,
    ) -> Self {
        self.aggregations
            .push((output_name.to_string(), input, Box::new(reducer)));
        self
    }

    /// Add a count aggregation over a column
    pub fn count(self, output_name: &str, column: &str) -> Self {
        self.aggregate(output_name, col(column), CountReducer)
    }

    /// Add a sum aggregation over a column
    pub fn sum(self, output_name: &str, column: &str) -> Self {
        self.aggregate(output_name, col(column), SumReducer)
    }

    /// Add an average aggregation over a column
    pub fn avg(self, output_name: &str, column: &str) -> Self {
        self.aggregate(output_name, col(column), AvgReducer)
    }

    /// Add a min aggregation over a column
    pub fn min(self, output_name: &str, column: &str) -> Self {
        self.aggregate(output_name, col(column), MinReducer)
    }

    /// Add a max aggregation over a column
    pub fn max(self, output_name: &str, column: &str) -> Self {
        self.aggregate(output_name, col(column), MaxReducer)
    }

    /// Add a collect-list aggregation over a column
    pub fn collect_list(self, output_name: &str, column: &str) -> Self {
        self.aggregate(output_name, col(column), CollectListReducer)
    }

    /// Partition row indices by key tuple, in first-appearance order
    fn group_rows(
        input: &Table,
        key_indices: &[usize],
    ) -> (Vec<Vec<Value>>, Vec<Vec<usize>>) {
        let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut group_keys: Vec<Vec<Value>> = Vec::new();
        let mut group_rows: Vec<Vec<usize>> = Vec::new();

        for row_index in 0..input.len() {
            let key: Vec<Value> = key_indices
                .iter()
                .map(|&i| input.columns[i].values[row_index].clone())
                .collect();

            let group = *lookup.entry(key.clone()).or_insert_with(|| {
                group_keys.push(key);
                group_rows.push(Vec::new());
                group_rows.len() - 1
            });

            group_rows[group].push(row_index);
        }

        (group_keys, group_rows)
    }

    fn gather(column: &Column, rows: &[usize]) -> Vec<Value> {
        rows.iter().map(|&i| column.values[i].clone()).collect()
    }
}

impl Default for GroupByStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for GroupByStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        if self.keys.is_empty() && self.aggregations.is_empty() {
            return Err(StageError::InvalidArgument(
                "group by needs at least one key column or aggregation".to_string(),
            ));
        }

        let mut key_indices = Vec::with_capacity(self.keys.len());
        let mut key_fields = Vec::with_capacity(self.keys.len());
        for key in &self.keys {
            let index = input.column_index(key)?;
            key_indices.push(index);
            key_fields.push(input.schema.fields[index].clone());
        }

        // Aggregation inputs are evaluated once over the whole table and
        // gathered per group afterwards
        let mut agg_columns = Vec::with_capacity(self.aggregations.len());
        for (_, expr, _) in &self.aggregations {
            agg_columns.push(expr.evaluate(input)?);
        }

        let (group_keys, group_rows) = Self::group_rows(input, &key_indices);

        let mut result = match &self.pivot {
            None => {
                let mut fields = key_fields;
                for ((output_name, _, reducer), column) in
                    self.aggregations.iter().zip(&agg_columns)
                {
                    fields.push(Field::new(
                        output_name.clone(),
                        reducer.output_type(&column.data_type),
                        true,
                    ));
                }

                let mut result = Table::new(Schema::new(fields))?;

                for (key, rows) in group_keys.iter().zip(&group_rows) {
                    let mut row = key.clone();
                    for ((_, _, reducer), column) in
                        self.aggregations.iter().zip(&agg_columns)
                    {
                        row.push(reducer.reduce(&Self::gather(column, rows)));
                    }
                    result.add_row(row)?;
                }

                result
            }
            Some(pivot) => {
                let pivot_index = input.column_index(pivot)?;
                let pivot_column = &input.columns[pivot_index];

                // First pass: the pivot column's distinct values decide the
                // output column set
                let mut pivot_values: Vec<Value> = Vec::new();
                for value in &pivot_column.values {
                    if !pivot_values.contains(value) {
                        pivot_values.push(value.clone());
                    }
                }

                let mut fields = key_fields;
                for pivot_value in &pivot_values {
                    let label = match pivot_value {
                        Value::Null => "null".to_string(),
                        value => value.to_display_string(),
                    };

                    for ((output_name, _, reducer), column) in
                        self.aggregations.iter().zip(&agg_columns)
                    {
                        let name = if self.aggregations.len() == 1 {
                            label.clone()
                        } else {
                            format!("{}_{}", label, output_name)
                        };
                        fields.push(Field::new(
                            name,
                            reducer.output_type(&column.data_type),
                            true,
                        ));
                    }
                }

                let mut result = Table::new(Schema::new(fields))?;

                for (key, rows) in group_keys.iter().zip(&group_rows) {
                    let mut row = key.clone();

                    for pivot_value in &pivot_values {
                        let subset: Vec<usize> = rows
                            .iter()
                            .copied()
                            .filter(|&i| &pivot_column.values[i] == pivot_value)
                            .collect();

                        for ((_, _, reducer), column) in
                            self.aggregations.iter().zip(&agg_columns)
                        {
                            // A group without this pivot value gets null
                            if subset.is_empty() {
                                row.push(Value::Null);
                            } else {
                                row.push(reducer.reduce(&Self::gather(column, &subset)));
                            }
                        }
                    }

                    result.add_row(row)?;
                }

                result
            }
        };

        result.copy_metadata_from(input);
        Ok(result)
    }

    fn name(&self) -> &str {
        "group_by"
    }

    fn stage_type(&self) -> StageType {
        StageType::Aggregate
    }
}
