// Pipeline tests
// Author: Gabriel Demetrios Lafis

use rust_tabular_pipeline::{
    data::{DataType, Field, Schema, Table, Value},
    expr::{col, lit, when},
    processing::{
        CastStage, DistinctStage, DropNaStage, DropStage, ExplodeStage, FillNaStage, FilterStage,
        GroupByStage, JoinStage, LimitStage, Pipeline, RenameStage, SelectStage, SortStage, Stage,
        StageError, WithColumnStage,
    },
};

fn sales_table() -> Table {
    let schema = Schema::new(vec![
        Field::new("Item_Identifier".to_string(), DataType::String, false),
        Field::new("Item_Type".to_string(), DataType::String, false),
        Field::new("Item_Fat_Content".to_string(), DataType::String, true),
        Field::new("Item_MRP".to_string(), DataType::Float, true),
        Field::new("Outlet_Size".to_string(), DataType::String, true),
    ]);

    let mut table = Table::new(schema).unwrap();
    let rows = vec![
        ("FDA15", "Dairy", "Low Fat", 249.81, Some("Medium")),
        ("DRC01", "Soft Drinks", "Regular", 48.27, Some("Medium")),
        ("FDN15", "Meat", "Low Fat", 141.62, None),
        ("FDX07", "Fruits", "Regular", 182.10, Some("Small")),
        ("NCD19", "Household", "Low Fat", 53.86, None),
    ];
    for (id, item_type, fat, mrp, size) in rows {
        table
            .add_row(vec![
                Value::String(id.to_string()),
                Value::String(item_type.to_string()),
                Value::String(fat.to_string()),
                Value::Float(mrp),
                size.map(|s| Value::String(s.to_string()))
                    .unwrap_or(Value::Null),
            ])
            .unwrap();
    }
    table
}

#[test]
fn test_filter_pipeline() {
    let table = sales_table();

    let pipeline = Pipeline::new("test")
        .add(FilterStage::new(col("Item_MRP").gt(lit(100.0))))
        .add(SelectStage::columns(vec!["Item_Identifier", "Item_MRP"]));

    let result = pipeline.execute(&table).unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.num_columns(), 2);
    assert_eq!(
        result.columns[0].values[0],
        Value::String("FDA15".to_string())
    );
    assert_eq!(
        result.columns[0].values[1],
        Value::String("FDN15".to_string())
    );
    assert_eq!(
        result.columns[0].values[2],
        Value::String("FDX07".to_string())
    );
}

#[test]
fn test_filter_rejects_non_boolean_predicate() {
    let table = sales_table();

    let result = FilterStage::new(col("Item_MRP") + lit(1.0)).process(&table);

    assert!(matches!(result, Err(StageError::Expr(_))));
}

#[test]
fn test_with_column_replaces_in_place() {
    let table = sales_table();

    // Recoding a column keeps its ordinal position
    let recoded = WithColumnStage::new(
        "Item_Fat_Content",
        when(
            col("Item_Fat_Content").eq(lit("Low Fat")),
            lit("LF"),
        )
        .when(col("Item_Fat_Content").eq(lit("Regular")), lit("Reg"))
        .otherwise(col("Item_Fat_Content")),
    )
    .process(&table)
    .unwrap();

    assert_eq!(recoded.schema.fields[2].name, "Item_Fat_Content");
    assert_eq!(recoded.columns[2].values[0], Value::String("LF".to_string()));
    assert_eq!(
        recoded.columns[2].values[1],
        Value::String("Reg".to_string())
    );
}

#[test]
fn test_with_column_appends_new_name() {
    let table = sales_table();

    let result = WithColumnStage::new("Item_MRP_Half", col("Item_MRP") / lit(2.0))
        .process(&table)
        .unwrap();

    assert_eq!(result.num_columns(), 6);
    assert_eq!(result.schema.fields[5].name, "Item_MRP_Half");
    assert_eq!(result.columns[5].values[1], Value::Float(48.27 / 2.0));
}

#[test]
fn test_rename_and_drop() {
    let table = sales_table();

    let pipeline = Pipeline::new("test")
        .add(RenameStage::new(vec![("Item_MRP", "price")]))
        .add(DropStage::new(vec!["Outlet_Size", "Item_Fat_Content"]));

    let result = pipeline.execute(&table).unwrap();

    assert_eq!(result.num_columns(), 3);
    assert!(result.schema.get_field_by_name("price").is_some());
    assert!(result.schema.get_field_by_name("Item_MRP").is_none());
    assert!(result.schema.get_field_by_name("Outlet_Size").is_none());
}

#[test]
fn test_drop_unknown_column_fails() {
    let table = sales_table();

    let result = DropStage::new(vec!["no_such_column"]).process(&table);

    assert!(result.is_err());
}

#[test]
fn test_cast_stage_is_lenient() {
    let schema = Schema::new(vec![Field::new("raw".to_string(), DataType::String, true)]);
    let mut table = Table::new(schema).unwrap();
    table.add_row(vec![Value::String("12".to_string())]).unwrap();
    table
        .add_row(vec![Value::String("not a number".to_string())])
        .unwrap();

    let result = CastStage::new("raw", DataType::Integer)
        .process(&table)
        .unwrap();

    assert_eq!(result.schema.fields[0].data_type, DataType::Integer);
    assert_eq!(result.columns[0].values[0], Value::Integer(12));
    assert_eq!(result.columns[0].values[1], Value::Null);
}

#[test]
fn test_distinct_keeps_first_occurrence() {
    let schema = Schema::new(vec![
        Field::new("k".to_string(), DataType::String, false),
        Field::new("v".to_string(), DataType::Integer, false),
    ]);
    let mut table = Table::new(schema).unwrap();
    for (k, v) in [("a", 1), ("b", 2), ("a", 3), ("b", 2)] {
        table
            .add_row(vec![Value::String(k.to_string()), Value::Integer(v)])
            .unwrap();
    }

    let full = DistinctStage::new().process(&table).unwrap();
    assert_eq!(full.len(), 3);

    let by_key = DistinctStage::with_subset(vec!["k"]).process(&table).unwrap();
    assert_eq!(by_key.len(), 2);
    assert_eq!(by_key.columns[1].values[0], Value::Integer(1));
    assert_eq!(by_key.columns[1].values[1], Value::Integer(2));

    // Idempotent
    let again = DistinctStage::new().process(&full).unwrap();
    assert_eq!(again.len(), full.len());
}

#[test]
fn test_sort_is_stable_and_idempotent() {
    let schema = Schema::new(vec![
        Field::new("k".to_string(), DataType::Integer, true),
        Field::new("tag".to_string(), DataType::String, false),
    ]);
    let mut table = Table::new(schema).unwrap();
    for (k, tag) in [
        (Value::Integer(2), "first-two"),
        (Value::Integer(1), "one"),
        (Value::Null, "null"),
        (Value::Integer(2), "second-two"),
    ] {
        table.add_row(vec![k, Value::String(tag.to_string())]).unwrap();
    }

    let sorted = SortStage::new(vec![("k", true)]).process(&table).unwrap();

    // Nulls first ascending, ties in input order
    assert_eq!(sorted.columns[1].values[0], Value::String("null".to_string()));
    assert_eq!(sorted.columns[1].values[1], Value::String("one".to_string()));
    assert_eq!(
        sorted.columns[1].values[2],
        Value::String("first-two".to_string())
    );
    assert_eq!(
        sorted.columns[1].values[3],
        Value::String("second-two".to_string())
    );

    let twice = SortStage::new(vec![("k", true)]).process(&sorted).unwrap();
    for i in 0..sorted.num_columns() {
        assert_eq!(twice.columns[i].values, sorted.columns[i].values);
    }
}

#[test]
fn test_limit() {
    let table = sales_table();

    let result = LimitStage::new(2).process(&table).unwrap();
    assert_eq!(result.len(), 2);

    // A limit past the end is a no-op
    let all = LimitStage::new(100).process(&table).unwrap();
    assert_eq!(all.len(), table.len());
}

#[test]
fn test_drop_na_with_subset() {
    let table = sales_table();

    let result = DropNaStage::with_subset(vec!["Outlet_Size"])
        .process(&table)
        .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.columns[4].values.iter().all(|v| !v.is_null()));
}

#[test]
fn test_fill_na_with_subset() {
    let table = sales_table();

    let result = FillNaStage::with_subset("NotAvailable", vec!["Outlet_Size"])
        .process(&table)
        .unwrap();

    assert_eq!(
        result.columns[4].values[2],
        Value::String("NotAvailable".to_string())
    );
    // Existing values are untouched
    assert_eq!(
        result.columns[4].values[0],
        Value::String("Medium".to_string())
    );
}

#[test]
fn test_fill_na_skips_other_types() {
    let schema = Schema::new(vec![
        Field::new("n".to_string(), DataType::Integer, true),
        Field::new("s".to_string(), DataType::String, true),
    ]);
    let mut table = Table::new(schema).unwrap();
    table.add_row(vec![Value::Null, Value::Null]).unwrap();

    let result = FillNaStage::new("missing").process(&table).unwrap();

    assert_eq!(result.columns[0].values[0], Value::Null);
    assert_eq!(result.columns[1].values[0], Value::String("missing".to_string()));
}

#[test]
fn test_explode_array_column() {
    let schema = Schema::new(vec![
        Field::new("id".to_string(), DataType::Integer, false),
        Field::new(
            "tags".to_string(),
            DataType::Array(Box::new(DataType::String)),
            true,
        ),
    ]);
    let mut table = Table::new(schema).unwrap();
    table
        .add_row(vec![
            Value::Integer(1),
            Value::Array(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string()),
            ]),
        ])
        .unwrap();
    table.add_row(vec![Value::Integer(2), Value::Null]).unwrap();
    table
        .add_row(vec![Value::Integer(3), Value::Array(vec![])])
        .unwrap();

    let result = ExplodeStage::new("tags").process(&table).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.schema.fields[1].data_type, DataType::String);
    assert_eq!(result.columns[0].values, vec![Value::Integer(1), Value::Integer(1)]);
    assert_eq!(
        result.columns[1].values,
        vec![Value::String("a".to_string()), Value::String("b".to_string())]
    );
}

#[test]
fn test_group_by_first_appearance_order() {
    let schema = Schema::new(vec![
        Field::new("Item_Type".to_string(), DataType::String, false),
        Field::new("amount".to_string(), DataType::Integer, false),
    ]);
    let mut table = Table::new(schema).unwrap();
    for (t, a) in [("A", 10), ("B", 20), ("A", 5)] {
        table
            .add_row(vec![Value::String(t.to_string()), Value::Integer(a)])
            .unwrap();
    }

    let result = GroupByStage::new()
        .group_by("Item_Type")
        .sum("total", "amount")
        .process(&table)
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.columns[0].values[0], Value::String("A".to_string()));
    assert_eq!(result.columns[1].values[0], Value::Integer(15));
    assert_eq!(result.columns[0].values[1], Value::String("B".to_string()));
    assert_eq!(result.columns[1].values[1], Value::Integer(20));
}

#[test]
fn test_group_by_multiple_aggregations() {
    let table = sales_table();

    let result = GroupByStage::new()
        .group_by("Item_Fat_Content")
        .count("n", "Item_Identifier")
        .avg("avg_mrp", "Item_MRP")
        .min("min_mrp", "Item_MRP")
        .max("max_mrp", "Item_MRP")
        .process(&table)
        .unwrap();

    assert_eq!(result.len(), 2);
    // Low Fat appears first in the input
    assert_eq!(
        result.columns[0].values[0],
        Value::String("Low Fat".to_string())
    );
    assert_eq!(result.columns[1].values[0], Value::Integer(3));
    let expected = (249.81 + 141.62 + 53.86) / 3.0;
    assert_eq!(result.columns[2].values[0], Value::Float(expected));
    assert_eq!(result.columns[3].values[0], Value::Float(53.86));
    assert_eq!(result.columns[4].values[0], Value::Float(249.81));
}

#[test]
fn test_group_by_sum_ignores_nulls() {
    let schema = Schema::new(vec![
        Field::new("k".to_string(), DataType::String, false),
        Field::new("v".to_string(), DataType::Integer, true),
    ]);
    let mut table = Table::new(schema).unwrap();
    table
        .add_row(vec![Value::String("a".to_string()), Value::Integer(1)])
        .unwrap();
    table
        .add_row(vec![Value::String("a".to_string()), Value::Null])
        .unwrap();
    table
        .add_row(vec![Value::String("b".to_string()), Value::Null])
        .unwrap();

    let result = GroupByStage::new()
        .group_by("k")
        .sum("total", "v")
        .count("n", "v")
        .process(&table)
        .unwrap();

    assert_eq!(result.columns[1].values[0], Value::Integer(1));
    assert_eq!(result.columns[2].values[0], Value::Integer(1));
    // All-null group sums to null but counts zero
    assert_eq!(result.columns[1].values[1], Value::Null);
    assert_eq!(result.columns[2].values[1], Value::Integer(0));
}

#[test]
fn test_group_by_collect_list() {
    let schema = Schema::new(vec![
        Field::new("k".to_string(), DataType::String, false),
        Field::new("v".to_string(), DataType::Integer, true),
    ]);
    let mut table = Table::new(schema).unwrap();
    for (k, v) in [("a", Value::Integer(1)), ("a", Value::Null), ("a", Value::Integer(3))] {
        table.add_row(vec![Value::String(k.to_string()), v]).unwrap();
    }

    let result = GroupByStage::new()
        .group_by("k")
        .collect_list("vs", "v")
        .process(&table)
        .unwrap();

    assert_eq!(
        result.columns[1].values[0],
        Value::Array(vec![Value::Integer(1), Value::Integer(3)])
    );
    assert_eq!(
        result.schema.fields[1].data_type,
        DataType::Array(Box::new(DataType::Integer))
    );
}

#[test]
fn test_pivot() {
    let schema = Schema::new(vec![
        Field::new("outlet".to_string(), DataType::String, false),
        Field::new("fat".to_string(), DataType::String, false),
        Field::new("sales".to_string(), DataType::Integer, false),
    ]);
    let mut table = Table::new(schema).unwrap();
    for (o, f, s) in [
        ("O1", "Low Fat", 10),
        ("O1", "Regular", 20),
        ("O2", "Low Fat", 30),
    ] {
        table
            .add_row(vec![
                Value::String(o.to_string()),
                Value::String(f.to_string()),
                Value::Integer(s),
            ])
            .unwrap();
    }

    let result = GroupByStage::new()
        .group_by("outlet")
        .pivot("fat")
        .sum("total", "sales")
        .process(&table)
        .unwrap();

    assert_eq!(result.num_columns(), 3);
    assert_eq!(result.schema.fields[1].name, "Low Fat");
    assert_eq!(result.schema.fields[2].name, "Regular");

    assert_eq!(result.columns[1].values[0], Value::Integer(10));
    assert_eq!(result.columns[2].values[0], Value::Integer(20));
    assert_eq!(result.columns[1].values[1], Value::Integer(30));
    // O2 has no Regular rows
    assert_eq!(result.columns[2].values[1], Value::Null);
}

#[test]
fn test_inner_join() {
    let left_schema = Schema::new(vec![
        Field::new("id".to_string(), DataType::Integer, false),
        Field::new("name".to_string(), DataType::String, false),
    ]);
    let mut left = Table::new(left_schema).unwrap();
    for (id, name) in [(1, "Alice"), (2, "Bob"), (3, "Carol")] {
        left.add_row(vec![Value::Integer(id), Value::String(name.to_string())])
            .unwrap();
    }

    let right_schema = Schema::new(vec![
        Field::new("id".to_string(), DataType::Integer, false),
        Field::new("city".to_string(), DataType::String, false),
    ]);
    let mut right = Table::new(right_schema).unwrap();
    for (id, city) in [(1, "Lisbon"), (3, "Porto"), (4, "Braga")] {
        right
            .add_row(vec![Value::Integer(id), Value::String(city.to_string())])
            .unwrap();
    }

    let result = JoinStage::inner(right.clone(), vec!["id"]).process(&left).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.num_columns(), 3);
    assert_eq!(result.columns[2].values[0], Value::String("Lisbon".to_string()));
    assert_eq!(result.columns[2].values[1], Value::String("Porto".to_string()));

    let left_join = JoinStage::left(right, vec!["id"]).process(&left).unwrap();
    assert_eq!(left_join.len(), 3);
    assert_eq!(left_join.columns[2].values[1], Value::Null);
}

#[test]
fn test_right_join_pads_left_side() {
    let left_schema = Schema::new(vec![
        Field::new("id".to_string(), DataType::Integer, false),
        Field::new("name".to_string(), DataType::String, false),
    ]);
    let mut left = Table::new(left_schema).unwrap();
    left.add_row(vec![Value::Integer(1), Value::String("Alice".to_string())])
        .unwrap();

    let right_schema = Schema::new(vec![
        Field::new("id".to_string(), DataType::Integer, false),
        Field::new("city".to_string(), DataType::String, false),
    ]);
    let mut right = Table::new(right_schema).unwrap();
    for (id, city) in [(1, "Lisbon"), (2, "Porto")] {
        right
            .add_row(vec![Value::Integer(id), Value::String(city.to_string())])
            .unwrap();
    }

    let result = JoinStage::right(right, vec!["id"]).process(&left).unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(result.columns[0].values[1], Value::Integer(2));
    assert_eq!(result.columns[1].values[1], Value::Null);
    assert_eq!(result.columns[2].values[1], Value::String("Porto".to_string()));
}

#[test]
fn test_pipeline_stops_on_error() {
    let table = sales_table();

    let pipeline = Pipeline::new("test")
        .add(SelectStage::columns(vec!["Item_Identifier"]))
        .add(FilterStage::new(col("Item_MRP").gt(lit(0.0))));

    // Item_MRP was projected away by the first stage
    assert!(pipeline.execute(&table).is_err());
}

#[test]
fn test_nan_keys_group_and_dedupe_together() {
    let schema = Schema::new(vec![
        Field::new("k".to_string(), DataType::Float, true),
        Field::new("v".to_string(), DataType::Integer, false),
    ]);
    let mut table = Table::new(schema).unwrap();
    for (k, v) in [(f64::NAN, 1), (1.0, 2), (f64::NAN, 3)] {
        table
            .add_row(vec![Value::Float(k), Value::Integer(v)])
            .unwrap();
    }

    // Both NaN rows land in one group
    let grouped = GroupByStage::new()
        .group_by("k")
        .sum("total", "v")
        .process(&table)
        .unwrap();
    assert_eq!(grouped.len(), 2);
    assert_eq!(grouped.columns[1].values[0], Value::Integer(4));
    assert_eq!(grouped.columns[1].values[1], Value::Integer(2));

    // Distinct treats NaN keys as equal too
    let distinct = DistinctStage::with_subset(vec!["k"]).process(&table).unwrap();
    assert_eq!(distinct.len(), 2);
    assert_eq!(distinct.columns[1].values[0], Value::Integer(1));
}

#[test]
fn test_group_by_sum_overflow_yields_null() {
    let schema = Schema::new(vec![
        Field::new("k".to_string(), DataType::String, false),
        Field::new("v".to_string(), DataType::Integer, false),
    ]);
    let mut table = Table::new(schema).unwrap();
    for v in [i64::MAX, 1] {
        table
            .add_row(vec![Value::String("a".to_string()), Value::Integer(v)])
            .unwrap();
    }

    let result = GroupByStage::new()
        .group_by("k")
        .sum("total", "v")
        .process(&table)
        .unwrap();

    assert_eq!(result.columns[1].values[0], Value::Null);
}
