// Row filtering, ordering and null handling stages
// Author: Gabriel Demetrios Lafis

use std::cmp::Ordering;

use super::{Stage, StageError, StageType};
use crate::data::{DataType, Table, Value};
use crate::expr::{Expr, ExprError};

/// Keep rows where a boolean expression is true.
///
/// Rows where the predicate evaluates to null are dropped, matching the
/// null-as-false rule for predicates.
pub struct FilterStage {
    predicate: Expr,
}

impl FilterStage {
    /// Create a new filter stage from a predicate expression
    pub fn new(predicate: Expr) -> Self {
        FilterStage { predicate }
    }
}

impl Stage for FilterStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let column = self.predicate.evaluate(input)?;

        if column.data_type != DataType::Boolean {
            return Err(StageError::Expr(ExprError::TypeMismatch(format!(
                "filter predicate must be boolean, got {:?}",
                column.data_type
            ))));
        }

        let keep: Vec<usize> = column
            .values
            .iter()
            .enumerate()
            .filter(|(_, v)| **v == Value::Boolean(true))
            .map(|(i, _)| i)
            .collect();

        Ok(input.take(&keep)?)
    }

    fn name(&self) -> &str {
        "filter"
    }

    fn stage_type(&self) -> StageType {
        StageType::Filter
    }
}

/// Limit the number of rows in a table
pub struct LimitStage {
    limit: usize,
}

impl LimitStage {
    /// Create a new limit stage
    pub fn new(limit: usize) -> Self {
        LimitStage { limit }
    }
}

impl Stage for LimitStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let keep: Vec<usize> = (0..input.len().min(self.limit)).collect();
        Ok(input.take(&keep)?)
    }

    fn name(&self) -> &str {
        "limit"
    }

    fn stage_type(&self) -> StageType {
        StageType::Filter
    }
}

/// Skip a number of rows at the start of a table
pub struct SkipStage {
    skip: usize,
}

impl SkipStage {
    /// Create a new skip stage
    pub fn new(skip: usize) -> Self {
        SkipStage { skip }
    }
}

impl Stage for SkipStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let keep: Vec<usize> = (self.skip.min(input.len())..input.len()).collect();
        Ok(input.take(&keep)?)
    }

    fn name(&self) -> &str {
        "skip"
    }

    fn stage_type(&self) -> StageType {
        StageType::Filter
    }
}

/// Sort rows by one or more key columns.
///
/// The sort is stable: rows with equal keys keep their input order, which
/// also makes sorting idempotent. Nulls sort first ascending.
pub struct SortStage {
    keys: Vec<(String, bool)>, // (column, ascending)
}

impl SortStage {
    /// Create a new sort stage with (column, ascending) keys
    pub fn new(keys: Vec<(&str, bool)>) -> Self {
        SortStage {
            keys: keys
                .into_iter()
                .map(|(name, ascending)| (name.to_string(), ascending))
                .collect(),
        }
    }
}

impl Stage for SortStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let mut key_indices = Vec::with_capacity(self.keys.len());
        for (name, ascending) in &self.keys {
            key_indices.push((input.column_index(name)?, *ascending));
        }

        let mut order: Vec<usize> = (0..input.len()).collect();
        order.sort_by(|&a, &b| {
            for (column_index, ascending) in &key_indices {
                let column = &input.columns[*column_index];
                let cmp = column.values[a].compare(&column.values[b]);
                let cmp = if *ascending { cmp } else { cmp.reverse() };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            Ordering::Equal
        });

        Ok(input.take(&order)?)
    }

    fn name(&self) -> &str {
        "sort"
    }

    fn stage_type(&self) -> StageType {
        StageType::Filter
    }
}

/// Drop rows that hold null in any of the checked columns
pub struct DropNaStage {
    subset: Option<Vec<String>>,
}

impl DropNaStage {
    /// Create a stage checking all columns
    pub fn new() -> Self {
        DropNaStage { subset: None }
    }

    /// Create a stage checking a subset of columns
    pub fn with_subset(subset: Vec<&str>) -> Self {
        DropNaStage {
            subset: Some(subset.into_iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl Default for DropNaStage {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for DropNaStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let checked: Vec<usize> = match &self.subset {
            Some(names) => names
                .iter()
                .map(|name| input.column_index(name).map_err(StageError::from))
                .collect::<Result<Vec<usize>, StageError>>()?,
            None => (0..input.num_columns()).collect(),
        };

        let keep: Vec<usize> = (0..input.len())
            .filter(|&row| {
                checked
                    .iter()
                    .all(|&i| !input.columns[i].values[row].is_null())
            })
            .collect();

        Ok(input.take(&keep)?)
    }

    fn name(&self) -> &str {
        "drop_na"
    }

    fn stage_type(&self) -> StageType {
        StageType::Filter
    }
}

/// Replace nulls with a constant value.
///
/// Only null entries change, only in the subset columns (or in every
/// column whose type matches the replacement when no subset is given).
pub struct FillNaStage {
    value: Value,
    subset: Option<Vec<String>>,
}

impl FillNaStage {
    /// Create a stage filling every type-compatible column
    pub fn new<V: Into<Value>>(value: V) -> Self {
        FillNaStage {
            value: value.into(),
            subset: None,
        }
    }

    /// Create a stage filling a subset of columns
    pub fn with_subset<V: Into<Value>>(value: V, subset: Vec<&str>) -> Self {
        FillNaStage {
            value: value.into(),
            subset: Some(subset.into_iter().map(|c| c.to_string()).collect()),
        }
    }
}

impl Stage for FillNaStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let targets: Vec<usize> = match &self.subset {
            Some(names) => names
                .iter()
                .map(|name| input.column_index(name).map_err(StageError::from))
                .collect::<Result<Vec<usize>, StageError>>()?,
            None => (0..input.num_columns()).collect(),
        };

        let value_type = self.value.data_type();

        let mut result = input.clone();
        for index in targets {
            let column = &mut result.columns[index];

            // Columns of another type are left untouched
            if value_type.as_ref() != Some(&column.data_type) {
                continue;
            }

            for value in &mut column.values {
                if value.is_null() {
                    *value = self.value.clone();
                }
            }
        }

        Ok(result)
    }

    fn name(&self) -> &str {
        "fill_na"
    }

    fn stage_type(&self) -> StageType {
        StageType::Filter
    }
}
