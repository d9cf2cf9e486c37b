// Equi-join stage for combining two tables
// Author: Gabriel Demetrios Lafis

use std::collections::HashMap;

use super::{Stage, StageError, StageType};
use crate::data::{Field, Schema, Table, Value};

/// Join type for combining tables
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
}

/// Hash equi-join of the piped table against a fixed right table.
///
/// The right table's key columns are dropped from the output; other right
/// columns that clash with a left name get a numeric suffix. Unmatched
/// sides are padded with nulls for left and right joins.
pub struct JoinStage {
    right: Table,
    join_type: JoinType,
    left_keys: Vec<String>,
    right_keys: Vec<String>,
}

impl JoinStage {
    /// Create a new join stage
    pub fn new(
        right: Table,
        join_type: JoinType,
        left_keys: Vec<&str>,
        right_keys: Vec<&str>,
    ) -> Self {
        JoinStage {
            right,
            join_type,
            left_keys: left_keys.into_iter().map(|c| c.to_string()).collect(),
            right_keys: right_keys.into_iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Create a new inner join stage on shared key names
    pub fn inner(right: Table, keys: Vec<&str>) -> Self {
        Self::new(right, JoinType::Inner, keys.clone(), keys)
    }

    /// Create a new left join stage on shared key names
    pub fn left(right: Table, keys: Vec<&str>) -> Self {
        Self::new(right, JoinType::Left, keys.clone(), keys)
    }

    /// Create a new right join stage on shared key names
    pub fn right(right: Table, keys: Vec<&str>) -> Self {
        Self::new(right, JoinType::Right, keys.clone(), keys)
    }

    fn key_of(table: &Table, indices: &[usize], row: usize) -> Vec<Value> {
        indices
            .iter()
            .map(|&i| table.columns[i].values[row].clone())
            .collect()
    }
}

impl Stage for JoinStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        if self.left_keys.len() != self.right_keys.len() {
            return Err(StageError::InvalidArgument(format!(
                "left join columns ({}) must match right join columns ({})",
                self.left_keys.len(),
                self.right_keys.len()
            )));
        }
        if self.left_keys.is_empty() {
            return Err(StageError::InvalidArgument(
                "join requires at least one key column".to_string(),
            ));
        }

        let mut left_indices = Vec::with_capacity(self.left_keys.len());
        for key in &self.left_keys {
            left_indices.push(input.column_index(key)?);
        }

        let mut right_indices = Vec::with_capacity(self.right_keys.len());
        for key in &self.right_keys {
            right_indices.push(self.right.column_index(key)?);
        }

        // Left fields first, then right fields minus the join keys
        let mut fields = input.schema.fields.clone();
        let mut carried: Vec<usize> = Vec::new();
        for (i, field) in self.right.schema.fields.iter().enumerate() {
            if right_indices.contains(&i) {
                continue;
            }
            carried.push(i);

            let mut name = field.name.clone();
            let mut counter = 1;
            while fields.iter().any(|f| f.name == name) {
                name = format!("{}_{}", field.name, counter);
                counter += 1;
            }
            fields.push(Field::new(name, field.data_type.clone(), true));
        }

        let mut result = Table::new(Schema::new(fields))?;

        // Hash the right side by key tuple
        let mut right_map: HashMap<Vec<Value>, Vec<usize>> = HashMap::new();
        for row in 0..self.right.len() {
            let key = Self::key_of(&self.right, &right_indices, row);
            right_map.entry(key).or_default().push(row);
        }

        let mut right_matched = vec![false; self.right.len()];

        for left_row in 0..input.len() {
            let key = Self::key_of(input, &left_indices, left_row);

            match right_map.get(&key) {
                Some(right_rows) => {
                    for &right_row in right_rows {
                        right_matched[right_row] = true;

                        let mut values = input.row(left_row);
                        for &i in &carried {
                            values.push(self.right.columns[i].values[right_row].clone());
                        }
                        result.add_row(values)?;
                    }
                }
                None if self.join_type == JoinType::Left => {
                    let mut values = input.row(left_row);
                    values.extend(std::iter::repeat(Value::Null).take(carried.len()));
                    result.add_row(values)?;
                }
                None => {}
            }
        }

        // Unmatched right rows are padded with nulls on the left, with the
        // key values carried into the left key columns
        if self.join_type == JoinType::Right {
            for right_row in 0..self.right.len() {
                if right_matched[right_row] {
                    continue;
                }

                let mut values = vec![Value::Null; input.num_columns()];
                for (position, &left_index) in left_indices.iter().enumerate() {
                    values[left_index] =
                        self.right.columns[right_indices[position]].values[right_row].clone();
                }
                for &i in &carried {
                    values.push(self.right.columns[i].values[right_row].clone());
                }
                result.add_row(values)?;
            }
        }

        result.copy_metadata_from(input);
        Ok(result)
    }

    fn name(&self) -> &str {
        match self.join_type {
            JoinType::Inner => "inner_join",
            JoinType::Left => "left_join",
            JoinType::Right => "right_join",
        }
    }

    fn stage_type(&self) -> StageType {
        StageType::Join
    }
}
