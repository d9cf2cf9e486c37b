// Configuration utilities
// Author: Gabriel Demetrios Lafis

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::{DataError, MalformedPolicy, SaveMode};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub load: LoadConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Input loading configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub delimiter: char,
    pub has_header: bool,
    pub infer_schema: bool,
    pub sample_size: usize,
    pub on_malformed: String,
}

/// Output writing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub format: String,
    pub mode: String,
    pub delimiter: char,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            load: LoadConfig {
                delimiter: ',',
                has_header: true,
                infer_schema: true,
                sample_size: 100,
                on_malformed: "fail".to_string(),
            },
            output: OutputConfig {
                format: "csv".to_string(),
                mode: "overwrite".to_string(),
                delimiter: ',',
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from a JSON or YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config = if path.as_ref().extension().map_or(false, |ext| ext == "json") {
            serde_json::from_str(&contents)?
        } else if path
            .as_ref()
            .extension()
            .map_or(false, |ext| ext == "yaml" || ext == "yml")
        {
            serde_yaml::from_str(&contents)?
        } else {
            return Err("Unsupported config file format".into());
        };

        Ok(config)
    }

    /// Get the log level filter
    pub fn log_level_filter(&self) -> log::LevelFilter {
        match self.logging.level.to_lowercase().as_str() {
            "off" => log::LevelFilter::Off,
            "error" => log::LevelFilter::Error,
            "warn" => log::LevelFilter::Warn,
            "info" => log::LevelFilter::Info,
            "debug" => log::LevelFilter::Debug,
            "trace" => log::LevelFilter::Trace,
            _ => log::LevelFilter::Info,
        }
    }

    /// Get the malformed record policy for loading
    pub fn malformed_policy(&self) -> MalformedPolicy {
        match self.load.on_malformed.to_lowercase().as_str() {
            "skip" => MalformedPolicy::Skip,
            _ => MalformedPolicy::Fail,
        }
    }

    /// Get the save mode for output
    pub fn save_mode(&self) -> Result<SaveMode, DataError> {
        SaveMode::parse(&self.output.mode)
    }
}
