// Error handling utilities
// Author: Gabriel Demetrios Lafis

use thiserror::Error;

use crate::data::DataError;
use crate::expr::ExprError;
use crate::processing::StageError;
use crate::storage::StorageError;

/// Application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),
    #[error("Expression error: {0}")]
    Expr(#[from] ExprError),
    #[error("Stage error: {0}")]
    Stage(#[from] StageError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for AppError
pub type AppResult<T> = Result<T, AppError>;
