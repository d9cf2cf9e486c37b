// Storage module for table persistence
// Author: Gabriel Demetrios Lafis

mod file;

pub use file::*;

use thiserror::Error;

use crate::data::{DataError, Table};

/// Represents a named table store
pub trait TableStorage {
    /// Store a table under a name
    fn store(&self, name: &str, data: &Table) -> Result<(), StorageError>;

    /// Load a table by name
    fn load(&self, name: &str) -> Result<Table, StorageError>;

    /// Check if a table exists
    fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Delete a table
    fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// List all stored tables
    fn list(&self) -> Result<Vec<String>, StorageError>;
}

/// Represents an error in the storage module
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Table '{0}' not found")]
    NotFound(String),
    #[error("Table '{0}' already exists")]
    TargetExists(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}
