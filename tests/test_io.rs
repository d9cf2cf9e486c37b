// CSV and JSON source/sink tests
// Author: Gabriel Demetrios Lafis

use std::fs;

use chrono::NaiveDate;
use tempfile::tempdir;

use rust_tabular_pipeline::{
    data::{
        CsvSink, CsvSource, DataError, DataSink, DataSource, DataType, Field, JsonSink,
        JsonSource, MalformedPolicy, SaveMode, Schema, Table, Value,
    },
    storage::{FileFormat, FileStorage, StorageError, TableStorage},
};

fn people_table() -> Table {
    let schema = Schema::new(vec![
        Field::new("id".to_string(), DataType::Integer, false),
        Field::new("name".to_string(), DataType::String, false),
        Field::new("score".to_string(), DataType::Float, true),
    ]);
    let mut table = Table::new(schema).unwrap();
    table
        .add_row(vec![
            Value::Integer(1),
            Value::String("Alice".to_string()),
            Value::Float(91.5),
        ])
        .unwrap();
    table
        .add_row(vec![
            Value::Integer(2),
            Value::String("Bob".to_string()),
            Value::Null,
        ])
        .unwrap();
    table
}

#[test]
fn test_csv_round_trip_with_inference() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.csv");

    CsvSink::new(&path, ',').write(&people_table()).unwrap();

    let loaded = CsvSource::new(&path, true, ',').read().unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.schema.fields[0].data_type, DataType::Integer);
    assert_eq!(loaded.schema.fields[1].data_type, DataType::String);
    assert_eq!(loaded.schema.fields[2].data_type, DataType::Float);
    assert_eq!(loaded.columns[0].values[0], Value::Integer(1));
    assert_eq!(loaded.columns[1].values[1], Value::String("Bob".to_string()));
    // The empty cell comes back as null
    assert_eq!(loaded.columns[2].values[1], Value::Null);
}

#[test]
fn test_csv_date_inference() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dates.csv");
    fs::write(&path, "day,amount\n2024-03-10,5\n2024-03-11,7\n").unwrap();

    let loaded = CsvSource::new(&path, true, ',').read().unwrap();

    assert_eq!(loaded.schema.fields[0].data_type, DataType::Date);
    assert_eq!(
        loaded.columns[0].values[0],
        Value::Date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
    );
}

#[test]
fn test_csv_without_header_generates_names() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.csv");
    fs::write(&path, "1,x\n2,y\n").unwrap();

    let loaded = CsvSource::new(&path, false, ',').read().unwrap();

    assert_eq!(loaded.schema.fields[0].name, "column_0");
    assert_eq!(loaded.schema.fields[1].name, "column_1");
    assert_eq!(loaded.len(), 2);
}

#[test]
fn test_csv_explicit_schema_takes_precedence() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("typed.csv");
    fs::write(&path, "a,b\n1,2\n3,4\n").unwrap();

    let schema = Schema::new(vec![
        Field::new("first".to_string(), DataType::String, true),
        Field::new("second".to_string(), DataType::Integer, true),
    ]);

    let loaded = CsvSource::new(&path, true, ',')
        .with_schema(schema)
        .read()
        .unwrap();

    // Declared names and types win over the header and inference
    assert_eq!(loaded.schema.fields[0].name, "first");
    assert_eq!(loaded.columns[0].values[0], Value::String("1".to_string()));
    assert_eq!(loaded.columns[1].values[0], Value::Integer(2));
}

#[test]
fn test_csv_explicit_schema_column_count_conflict() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("conflict.csv");
    fs::write(&path, "a,b\n1,2\n").unwrap();

    let schema = Schema::new(vec![Field::new("only".to_string(), DataType::String, true)]);

    let result = CsvSource::new(&path, true, ',').with_schema(schema).read();

    assert!(matches!(result, Err(DataError::SchemaConflict(_))));
}

#[test]
fn test_csv_malformed_row_fails_by_default() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "a,b\n1,2\n3\n5,6\n").unwrap();

    let result = CsvSource::new(&path, true, ',').read();

    assert!(matches!(
        result,
        Err(DataError::MalformedRecord { row: 1, .. })
    ));
}

#[test]
fn test_csv_malformed_row_skipped_on_request() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    fs::write(&path, "a,b\n1,2\nnot-a-number,4\n5,6\n").unwrap();

    let schema = Schema::new(vec![
        Field::new("a".to_string(), DataType::Integer, true),
        Field::new("b".to_string(), DataType::Integer, true),
    ]);

    let loaded = CsvSource::new(&path, true, ',')
        .with_schema(schema)
        .with_malformed_policy(MalformedPolicy::Skip)
        .read()
        .unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.columns[0].values, vec![Value::Integer(1), Value::Integer(5)]);
}

#[test]
fn test_save_mode_error_if_exists() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let table = people_table();

    CsvSink::new(&path, ',').write(&table).unwrap();

    let result = CsvSink::new(&path, ',')
        .with_mode(SaveMode::ErrorIfExists)
        .write(&table);

    assert!(matches!(result, Err(DataError::TargetExists(_))));
}

#[test]
fn test_save_mode_ignore_keeps_existing_content() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let table = people_table();

    CsvSink::new(&path, ',').write(&table).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    let mut other = people_table();
    other
        .add_row(vec![
            Value::Integer(3),
            Value::String("Carol".to_string()),
            Value::Float(50.0),
        ])
        .unwrap();
    CsvSink::new(&path, ',')
        .with_mode(SaveMode::Ignore)
        .write(&other)
        .unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_save_mode_append_adds_rows_without_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("out.csv");
    let table = people_table();

    CsvSink::new(&path, ',').write(&table).unwrap();
    CsvSink::new(&path, ',')
        .with_mode(SaveMode::Append)
        .write(&table)
        .unwrap();

    let loaded = CsvSource::new(&path, true, ',').read().unwrap();
    assert_eq!(loaded.len(), 4);
}

#[test]
fn test_json_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("people.ndjson");
    let table = people_table();

    JsonSink::new(&path).write(&table).unwrap();

    let loaded = JsonSource::new(&path).read().unwrap();

    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.schema.fields[0].data_type, DataType::Integer);
    assert_eq!(loaded.columns[0].values, vec![Value::Integer(1), Value::Integer(2)]);
    assert_eq!(loaded.columns[2].values[1], Value::Null);
}

#[test]
fn test_json_infers_keys_in_first_appearance_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.ndjson");
    fs::write(
        &path,
        "{\"a\":1,\"b\":\"x\"}\n{\"b\":\"y\",\"c\":2.5}\n",
    )
    .unwrap();

    let loaded = JsonSource::new(&path).read().unwrap();

    let names: Vec<&str> = loaded
        .schema
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    // Keys absent from a record read as null
    assert_eq!(loaded.columns[0].values[1], Value::Null);
    assert_eq!(loaded.columns[2].values[0], Value::Null);
}

#[test]
fn test_json_widens_integer_to_float() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("widen.ndjson");
    fs::write(&path, "{\"v\":1}\n{\"v\":2.5}\n").unwrap();

    let loaded = JsonSource::new(&path).read().unwrap();

    assert_eq!(loaded.schema.fields[0].data_type, DataType::Float);
    assert_eq!(loaded.columns[0].values[0], Value::Float(1.0));
}

#[test]
fn test_json_explicit_schema_reads_dates() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dates.ndjson");
    fs::write(&path, "{\"day\":\"2024-03-10\"}\n").unwrap();

    let schema = Schema::new(vec![Field::new("day".to_string(), DataType::Date, true)]);
    let loaded = JsonSource::new(&path).with_schema(schema).read().unwrap();

    assert_eq!(
        loaded.columns[0].values[0],
        Value::Date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
    );
}

#[test]
fn test_json_malformed_record_policies() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.ndjson");
    fs::write(&path, "{\"v\":1}\n{\"v\":\"oops\"}\n{\"v\":3}\n").unwrap();

    let schema = Schema::new(vec![Field::new("v".to_string(), DataType::Integer, true)]);

    let failed = JsonSource::new(&path)
        .with_schema(schema.clone())
        .read();
    assert!(matches!(
        failed,
        Err(DataError::MalformedRecord { row: 1, .. })
    ));

    let loaded = JsonSource::new(&path)
        .with_schema(schema)
        .with_malformed_policy(MalformedPolicy::Skip)
        .read()
        .unwrap();
    assert_eq!(loaded.len(), 2);
}

#[test]
fn test_file_storage_store_load_list_delete() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::new(dir.path(), FileFormat::Csv).unwrap();
    let table = people_table();

    storage.store("people", &table).unwrap();
    assert!(storage.exists("people").unwrap());

    let loaded = storage.load("people").unwrap();
    assert_eq!(loaded.len(), 2);

    assert_eq!(storage.list().unwrap(), vec!["people".to_string()]);

    storage.delete("people").unwrap();
    assert!(!storage.exists("people").unwrap());
    assert!(matches!(
        storage.load("people"),
        Err(StorageError::NotFound(_))
    ));
}

#[test]
fn test_file_storage_error_if_exists() {
    let dir = tempdir().unwrap();
    let storage = FileStorage::new(dir.path(), FileFormat::Json)
        .unwrap()
        .with_mode(SaveMode::ErrorIfExists);
    let table = people_table();

    storage.store("people", &table).unwrap();
    let result = storage.store("people", &table);

    assert!(matches!(result, Err(StorageError::TargetExists(_))));
}

#[test]
fn test_json_array_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tags.ndjson");

    let schema = Schema::new(vec![Field::new(
        "tags".to_string(),
        DataType::Array(Box::new(DataType::String)),
        true,
    )]);
    let mut table = Table::new(schema.clone()).unwrap();
    table
        .add_row(vec![Value::Array(vec![
            Value::String("a".to_string()),
            Value::String("b".to_string()),
        ])])
        .unwrap();

    JsonSink::new(&path).write(&table).unwrap();

    let loaded = JsonSource::new(&path).with_schema(schema).read().unwrap();
    assert_eq!(
        loaded.columns[0].values[0],
        Value::Array(vec![
            Value::String("a".to_string()),
            Value::String("b".to_string()),
        ])
    );
}
