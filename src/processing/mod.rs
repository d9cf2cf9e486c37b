// Processing module for pipeline stages
// Author: Gabriel Demetrios Lafis

mod aggregate;
mod filter;
mod join;
mod transform;
mod window;

pub use aggregate::*;
pub use filter::*;
pub use join::*;
pub use transform::*;
pub use window::*;

use log::debug;
use thiserror::Error;

use crate::data::{DataError, Table};
use crate::expr::ExprError;

/// One transformation step producing a new table from an old one.
///
/// Stages never mutate their input; a failing stage returns no partial
/// table.
pub trait Stage {
    /// Apply the stage to a table and return a new table
    fn process(&self, input: &Table) -> Result<Table, StageError>;

    /// Get the stage name
    fn name(&self) -> &str;

    /// Get the stage type
    fn stage_type(&self) -> StageType;
}

/// Represents a stage type
#[derive(Debug, Clone, PartialEq)]
pub enum StageType {
    Transform,
    Filter,
    Aggregate,
    Join,
    Window,
    Custom(String),
}

/// Represents an error in the processing module
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Pipeline for chaining multiple stages
pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create a new pipeline with the given name
    pub fn new(name: &str) -> Self {
        Pipeline {
            name: name.to_string(),
            stages: Vec::new(),
        }
    }

    /// Add a stage to the pipeline
    pub fn add<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Execute the stages left to right on a table
    pub fn execute(&self, input: &Table) -> Result<Table, StageError> {
        let mut current = input.clone();

        for stage in &self.stages {
            debug!(
                "Pipeline '{}': running stage '{}' on {} rows",
                self.name,
                stage.name(),
                current.len()
            );
            current = stage.process(&current)?;
        }

        Ok(current)
    }
}

impl Stage for Pipeline {
    fn process(&self, input: &Table) -> Result<Table, StageError> {
        self.execute(input)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stage_type(&self) -> StageType {
        StageType::Custom("Pipeline".to_string())
    }
}
