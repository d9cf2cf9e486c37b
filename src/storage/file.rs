// File storage implementation
// Author: Gabriel Demetrios Lafis

use std::fs;
use std::path::{Path, PathBuf};

use super::{StorageError, TableStorage};
use crate::data::{
    CsvSink, CsvSource, DataError, DataSink, DataSource, JsonSink, JsonSource, SaveMode, Table,
};

/// File format for storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    /// Get the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }

    /// Parse a file format from a string
    pub fn parse(s: &str) -> Result<Self, StorageError> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            _ => Err(StorageError::InvalidFormat(format!(
                "Unknown file format: {}",
                s
            ))),
        }
    }
}

/// File storage for tables, one file per table under a base directory
pub struct FileStorage {
    base_dir: PathBuf,
    format: FileFormat,
    mode: SaveMode,
}

impl FileStorage {
    /// Create a new file storage, creating the base directory if needed
    pub fn new<P: AsRef<Path>>(base_dir: P, format: FileFormat) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        if !base_dir.exists() {
            fs::create_dir_all(&base_dir)?;
        }

        Ok(FileStorage {
            base_dir,
            format,
            mode: SaveMode::Overwrite,
        })
    }

    /// Set the save mode applied when storing tables
    pub fn with_mode(mut self, mode: SaveMode) -> Self {
        self.mode = mode;
        self
    }

    /// Get the path for a table
    fn table_path(&self, name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.{}", name, self.format.extension()))
    }
}

impl TableStorage for FileStorage {
    fn store(&self, name: &str, data: &Table) -> Result<(), StorageError> {
        let path = self.table_path(name);

        let result = match self.format {
            FileFormat::Csv => CsvSink::new(&path, ',').with_mode(self.mode).write(data),
            FileFormat::Json => JsonSink::new(&path).with_mode(self.mode).write(data),
        };

        result.map_err(|err| match err {
            DataError::TargetExists(_) => StorageError::TargetExists(name.to_string()),
            other => StorageError::Data(other),
        })
    }

    fn load(&self, name: &str) -> Result<Table, StorageError> {
        let path = self.table_path(name);

        if !path.exists() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        match self.format {
            FileFormat::Csv => {
                let source = CsvSource::new(&path, true, ',');
                source.read().map_err(StorageError::from)
            }
            FileFormat::Json => {
                let source = JsonSource::new(&path);
                source.read().map_err(StorageError::from)
            }
        }
    }

    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.table_path(name).exists())
    }

    fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.table_path(name);

        if !path.exists() {
            return Err(StorageError::NotFound(name.to_string()));
        }

        fs::remove_file(path)?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<String>, StorageError> {
        let mut names = Vec::new();

        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();

            if path.extension().and_then(|e| e.to_str()) == Some(self.format.extension()) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }
}
