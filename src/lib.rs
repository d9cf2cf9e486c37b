// Rust Tabular Pipeline
// Author: Gabriel Demetrios Lafis

//! # Rust Tabular Pipeline
//!
//! A columnar table transformation engine written in Rust.
//!
//! ## Features
//!
//! - Loading and saving tables as CSV and line-delimited JSON
//! - Expression-driven selection, filtering and derived columns
//! - Grouped aggregation with pivoting
//! - Window functions over ordered partitions
//! - Joining tables
//!
//! ## Example
//!
//! ```rust
//! use rust_tabular_pipeline::{
//!     data::{DataType, Field, Schema, Table, Value},
//!     expr::{col, lit},
//!     processing::{FilterStage, Pipeline, SelectStage},
//! };
//!
//! // Create a schema
//! let schema = Schema::new(vec![
//!     Field::new("id".to_string(), DataType::Integer, false),
//!     Field::new("name".to_string(), DataType::String, false),
//!     Field::new("age".to_string(), DataType::Integer, true),
//! ]);
//!
//! // Create a table
//! let mut table = Table::new(schema).unwrap();
//!
//! // Add rows
//! table.add_row(vec![
//!     Value::Integer(1),
//!     Value::String("Alice".to_string()),
//!     Value::Integer(30),
//! ]).unwrap();
//!
//! table.add_row(vec![
//!     Value::Integer(2),
//!     Value::String("Bob".to_string()),
//!     Value::Integer(25),
//! ]).unwrap();
//!
//! // Create a pipeline
//! let pipeline = Pipeline::new("example")
//!     .add(FilterStage::new(col("age").gt(lit(20i64))))
//!     .add(SelectStage::columns(vec!["name", "age"]));
//!
//! // Run the pipeline
//! let result = pipeline.execute(&table).unwrap();
//! assert_eq!(result.len(), 2);
//! ```

pub mod data;
pub mod expr;
pub mod processing;
pub mod storage;
pub mod utils;

// Re-export main types
pub use data::{DataType, Field, Schema, Table, Value};
pub use expr::{col, lit, when, Expr};
pub use processing::Pipeline;
pub use storage::FileStorage;
pub use utils::Config;
