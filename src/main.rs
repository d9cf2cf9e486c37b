// Rust Tabular Pipeline - Main executable
// Author: Gabriel Demetrios Lafis

use std::path::Path;

use anyhow::{bail, Context};
use clap::{Arg, ArgMatches, Command};
use log::info;

use rust_tabular_pipeline::{
    data::{CsvSink, CsvSource, DataSink, DataSource, JsonSink, JsonSource, SaveMode, Table},
    utils::{init_logging, Config},
};

fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let matches = Command::new("Rust Tabular Pipeline")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gabriel Demetrios Lafis")
        .about("A columnar table transformation engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file")
                .takes_value(true),
        )
        .subcommand(
            Command::new("show")
                .about("Print the first rows of a table")
                .arg(Arg::new("input").required(true).help("Input file"))
                .arg(
                    Arg::new("rows")
                        .short('n')
                        .long("rows")
                        .value_name("N")
                        .help("Number of rows to print")
                        .takes_value(true),
                ),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a table between formats")
                .arg(Arg::new("input").required(true).help("Input file"))
                .arg(Arg::new("output").required(true).help("Output file"))
                .arg(
                    Arg::new("mode")
                        .short('m')
                        .long("mode")
                        .value_name("MODE")
                        .help("Save mode: append, overwrite, error, ignore")
                        .takes_value(true),
                ),
        )
        .get_matches();

    // Load configuration
    let config = if let Some(config_path) = matches.get_one::<String>("config") {
        Config::from_file(config_path)
            .map_err(|err| anyhow::anyhow!("Error loading config file: {}", err))?
    } else {
        Config::default()
    };

    // Initialize logging
    if let Err(err) = init_logging(config.log_level_filter()) {
        eprintln!("Error initializing logger: {}", err);
    }

    match matches.subcommand() {
        Some(("show", sub)) => run_show(sub, &config),
        Some(("convert", sub)) => run_convert(sub, &config),
        _ => {
            println!("No subcommand specified. Use --help for usage information.");
            Ok(())
        }
    }
}

fn run_show(matches: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("missing input file")?;
    let rows = matches
        .get_one::<String>("rows")
        .map(|n| n.parse::<usize>())
        .transpose()
        .context("invalid row count")?
        .unwrap_or(20);

    let table = load_table(input, config)?;
    info!("Loaded {} rows from {}", table.len(), input);
    table.show(rows);
    Ok(())
}

fn run_convert(matches: &ArgMatches, config: &Config) -> anyhow::Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("missing input file")?;
    let output = matches
        .get_one::<String>("output")
        .context("missing output file")?;
    let mode = match matches.get_one::<String>("mode") {
        Some(mode) => SaveMode::parse(mode)?,
        None => config.save_mode()?,
    };

    let table = load_table(input, config)?;
    info!("Loaded {} rows from {}", table.len(), input);

    match extension(output)?.as_str() {
        "csv" => {
            let sink = CsvSink::new(output, config.output.delimiter).with_mode(mode);
            sink.write(&table)?;
        }
        "json" | "ndjson" | "jsonl" => {
            let sink = JsonSink::new(output).with_mode(mode);
            sink.write(&table)?;
        }
        other => bail!("Unsupported output format: {}", other),
    }

    info!("Wrote {} rows to {}", table.len(), output);
    Ok(())
}

fn load_table(path: &str, config: &Config) -> anyhow::Result<Table> {
    let table = match extension(path)?.as_str() {
        "csv" => CsvSource::new(path, config.load.has_header, config.load.delimiter)
            .with_type_inference(config.load.infer_schema)
            .with_sample_size(config.load.sample_size)
            .with_malformed_policy(config.malformed_policy())
            .read()?,
        "json" | "ndjson" | "jsonl" => JsonSource::new(path).read()?,
        other => bail!("Unsupported input format: {}", other),
    };
    Ok(table)
}

fn extension(path: &str) -> anyhow::Result<String> {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .context("file has no extension")
}
