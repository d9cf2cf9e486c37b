// Window function stage: ranking and framed aggregates over partitions
// Author: Gabriel Demetrios Lafis

use std::cmp::Ordering;
use std::collections::HashMap;

use super::aggregate::Reducer;
use super::{Stage, StageError, StageType};
use crate::data::{Column, DataType, Table, Value};

/// Represents a window function
pub enum WindowFunction {
    /// Sequential position within the partition, starting at 1
    RowNumber,
    /// Rank with gaps after ties
    Rank,
    /// Rank without gaps after ties
    DenseRank,
    /// A reducer applied over the window frame of an input column
    Aggregate {
        column: String,
        reducer: Box<dyn Reducer>,
    },
}

/// Represents the rows a framed aggregate sees at each position
#[derive(Debug, Clone, PartialEq)]
pub enum WindowFrame {
    /// From the partition start through the current row
    RunningTotal,
    /// Every row of the partition, at every position
    EntirePartition,
}

/// Compute a per-row value from each row's partition and append it as a
/// new column.
///
/// Output rows stay in input order and the output column has exactly one
/// value per input row; only the new column distinguishes the result from
/// its input.
pub struct WindowStage {
    output_column: String,
    function: WindowFunction,
    partition_by: Vec<String>,
    order_by: Vec<(String, bool)>, // (column, ascending)
    frame: Option<WindowFrame>,
}

impl WindowStage {
    fn with_function(output_column: &str, function: WindowFunction) -> Self {
        WindowStage {
            output_column: output_column.to_string(),
            function,
            partition_by: Vec::new(),
            order_by: Vec::new(),
            frame: None,
        }
    }

    /// Create a row-number window stage
    pub fn row_number(output_column: &str) -> Self {
        Self::with_function(output_column, WindowFunction::RowNumber)
    }

    /// Create a rank window stage
    pub fn rank(output_column: &str) -> Self {
        Self::with_function(output_column, WindowFunction::Rank)
    }

    /// Create a dense-rank window stage
    pub fn dense_rank(output_column: &str) -> Self {
        Self::with_function(output_column, WindowFunction::DenseRank)
    }

    /// Create an aggregate window stage over an input column
    pub fn aggregate<R: Reducer + 'static>(
        output_column: &str,
        column: &str,
        reducer: R,
    ) -> Self {
        Self::with_function(
            output_column,
            WindowFunction::Aggregate {
                column: column.to_string(),
                reducer: Box::new(reducer),
            },
        )
    }

    /// Set the partition key columns
    pub fn partition_by(mut self, columns: Vec<&str>) -> Self {
        self.partition_by = columns.into_iter().map(|c| c.to_string()).collect();
        self
    }

    /// Set the ordering within each partition as (column, ascending) keys
    pub fn order_by(mut self, keys: Vec<(&str, bool)>) -> Self {
        self.order_by = keys
            .into_iter()
            .map(|(name, ascending)| (name.to_string(), ascending))
            .collect();
        self
    }

    /// Set the frame for aggregate functions
    pub fn frame(mut self, frame: WindowFrame) -> Self {
        self.frame = Some(frame);
        self
    }

    /// Partition row indices by key tuple, in first-appearance order
    fn partition_rows(input: &Table, key_indices: &[usize]) -> Vec<Vec<usize>> {
        if key_indices.is_empty() {
            return vec![(0..input.len()).collect()];
        }

        let mut lookup: HashMap<Vec<Value>, usize> = HashMap::new();
        let mut partitions: Vec<Vec<usize>> = Vec::new();

        for row_index in 0..input.len() {
            let key: Vec<Value> = key_indices
                .iter()
                .map(|&i| input.columns[i].values[row_index].clone())
                .collect();

            let partition = *lookup.entry(key).or_insert_with(|| {
                partitions.push(Vec::new());
                partitions.len() - 1
            });

            partitions[partition].push(row_index);
        }

        partitions
    }

    fn compare_rows(
        input: &Table,
        order_indices: &[(usize, bool)],
        a: usize,
        b: usize,
    ) -> Ordering {
        for (column_index, ascending) in order_indices {
            let column = &input.columns[*column_index];
            let cmp = column.values[a].compare(&column.values[b]);
            let cmp = if *ascending { cmp } else { cmp.reverse() };
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    }

    /// True when two rows tie on every ordering key
    fn rows_tie(input: &Table, order_indices: &[(usize, bool)], a: usize, b: usize) -> bool {
        Self::compare_rows(input, order_indices, a, b) == Ordering::Equal
    }
}

impl Stage for WindowStage {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        let ranking = !matches!(self.function, WindowFunction::Aggregate { .. });
        if ranking && self.order_by.is_empty() {
            return Err(StageError::InvalidArgument(
                "ranking window functions require an ordering".to_string(),
            ));
        }
        if self.frame == Some(WindowFrame::RunningTotal) && self.order_by.is_empty() {
            return Err(StageError::InvalidArgument(
                "a running frame requires an ordering".to_string(),
            ));
        }

        let mut partition_indices = Vec::with_capacity(self.partition_by.len());
        for name in &self.partition_by {
            partition_indices.push(input.column_index(name)?);
        }

        let mut order_indices = Vec::with_capacity(self.order_by.len());
        for (name, ascending) in &self.order_by {
            order_indices.push((input.column_index(name)?, *ascending));
        }

        let output_type = match &self.function {
            WindowFunction::Aggregate { column, reducer } => {
                let index = input.column_index(column)?;
                reducer.output_type(&input.columns[index].data_type)
            }
            _ => DataType::Integer,
        };

        let mut output = vec![Value::Null; input.len()];

        for mut partition in Self::partition_rows(input, &partition_indices) {
            // Stable sort keeps input order among ties, making the result
            // deterministic
            partition.sort_by(|&a, &b| Self::compare_rows(input, &order_indices, a, b));

            match &self.function {
                WindowFunction::RowNumber => {
                    for (position, &row) in partition.iter().enumerate() {
                        output[row] = Value::Integer(position as i64 + 1);
                    }
                }
                WindowFunction::Rank => {
                    let mut rank = 1i64;
                    for (position, &row) in partition.iter().enumerate() {
                        if position > 0
                            && !Self::rows_tie(
                                input,
                                &order_indices,
                                partition[position - 1],
                                row,
                            )
                        {
                            rank = position as i64 + 1;
                        }
                        output[row] = Value::Integer(rank);
                    }
                }
                WindowFunction::DenseRank => {
                    let mut rank = 1i64;
                    for (position, &row) in partition.iter().enumerate() {
                        if position > 0
                            && !Self::rows_tie(
                                input,
                                &order_indices,
                                partition[position - 1],
                                row,
                            )
                        {
                            rank += 1;
                        }
                        output[row] = Value::Integer(rank);
                    }
                }
                WindowFunction::Aggregate { column, reducer } => {
                    let index = input.column_index(column)?;
                    let values: Vec<Value> = partition
                        .iter()
                        .map(|&row| input.columns[index].values[row].clone())
                        .collect();

                    // Without an explicit frame, an ordered window runs
                    // through the current row and an unordered one spans
                    // the whole partition
                    let frame = self.frame.clone().unwrap_or(if self.order_by.is_empty() {
                        WindowFrame::EntirePartition
                    } else {
                        WindowFrame::RunningTotal
                    });

                    match frame {
                        WindowFrame::RunningTotal => {
                            for (position, &row) in partition.iter().enumerate() {
                                output[row] = reducer.reduce(&values[..=position]);
                            }
                        }
                        WindowFrame::EntirePartition => {
                            let result = reducer.reduce(&values);
                            for &row in &partition {
                                output[row] = result.clone();
                            }
                        }
                    }
                }
            }
        }

        let column = Column::new(output_type, output);
        Ok(input.with_column(&self.output_column, column)?)
    }

    fn name(&self) -> &str {
        "window"
    }

    fn stage_type(&self) -> StageType {
        StageType::Window
    }
}
