// Scalar functions over column values
// Author: Gabriel Demetrios Lafis

use chrono::{Duration, Local, NaiveDate};
use regex::Regex;

use super::{Expr, ExprError};
use crate::data::{DataType, Schema, Table, Value, DATE_FORMAT};

/// A scalar function applied element-wise by the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunction {
    Upper,
    Lower,
    InitCap,
    RegexpReplace,
    Split,
    ArrayContains,
    IsIn,
    CurrentDate,
    DateAdd,
    DateSub,
    DateDiff,
    DateFormat,
}

impl ScalarFunction {
    /// Get the function name used in generated column names
    pub fn name(&self) -> &'static str {
        match self {
            ScalarFunction::Upper => "upper",
            ScalarFunction::Lower => "lower",
            ScalarFunction::InitCap => "initcap",
            ScalarFunction::RegexpReplace => "regexp_replace",
            ScalarFunction::Split => "split",
            ScalarFunction::ArrayContains => "array_contains",
            ScalarFunction::IsIn => "in",
            ScalarFunction::CurrentDate => "current_date",
            ScalarFunction::DateAdd => "date_add",
            ScalarFunction::DateSub => "date_sub",
            ScalarFunction::DateDiff => "datediff",
            ScalarFunction::DateFormat => "date_format",
        }
    }

    /// The output type of the function against the given schema
    pub(super) fn result_type(
        &self,
        args: &[Expr],
        schema: &Schema,
    ) -> Result<DataType, ExprError> {
        match self {
            ScalarFunction::Upper | ScalarFunction::Lower | ScalarFunction::InitCap => {
                self.expect_args(args, 1)?;
                self.expect_type(&args[0], schema, DataType::String)?;
                Ok(DataType::String)
            }
            ScalarFunction::RegexpReplace => {
                self.expect_args(args, 3)?;
                self.expect_type(&args[0], schema, DataType::String)?;
                Ok(DataType::String)
            }
            ScalarFunction::Split => {
                self.expect_args(args, 2)?;
                self.expect_type(&args[0], schema, DataType::String)?;
                Ok(DataType::Array(Box::new(DataType::String)))
            }
            ScalarFunction::ArrayContains => {
                self.expect_args(args, 2)?;
                match args[0].result_type(schema)? {
                    DataType::Array(_) => Ok(DataType::Boolean),
                    other => Err(ExprError::TypeMismatch(format!(
                        "array_contains requires an array operand, got {:?}",
                        other
                    ))),
                }
            }
            ScalarFunction::IsIn => {
                if args.is_empty() {
                    return Err(ExprError::InvalidArgument(
                        "in() needs an operand".to_string(),
                    ));
                }
                args[0].result_type(schema)?;
                Ok(DataType::Boolean)
            }
            ScalarFunction::CurrentDate => {
                self.expect_args(args, 0)?;
                Ok(DataType::Date)
            }
            ScalarFunction::DateAdd | ScalarFunction::DateSub => {
                self.expect_args(args, 2)?;
                self.expect_type(&args[0], schema, DataType::Date)?;
                Ok(DataType::Date)
            }
            ScalarFunction::DateDiff => {
                self.expect_args(args, 2)?;
                self.expect_type(&args[0], schema, DataType::Date)?;
                self.expect_type(&args[1], schema, DataType::Date)?;
                Ok(DataType::Integer)
            }
            ScalarFunction::DateFormat => {
                self.expect_args(args, 2)?;
                self.expect_type(&args[0], schema, DataType::Date)?;
                Ok(DataType::String)
            }
        }
    }

    /// Evaluate the function, producing one value per row
    pub(super) fn evaluate(
        &self,
        args: &[Expr],
        table: &Table,
    ) -> Result<Vec<Value>, ExprError> {
        match self {
            ScalarFunction::Upper => {
                let values = args[0].evaluate(table)?.values;
                Ok(map_strings(values, |s| s.to_uppercase()))
            }
            ScalarFunction::Lower => {
                let values = args[0].evaluate(table)?.values;
                Ok(map_strings(values, |s| s.to_lowercase()))
            }
            ScalarFunction::InitCap => {
                let values = args[0].evaluate(table)?.values;
                Ok(map_strings(values, initcap_string))
            }
            ScalarFunction::RegexpReplace => {
                let pattern = literal_string(&args[1], "regexp_replace pattern")?;
                let replacement = literal_string(&args[2], "regexp_replace replacement")?;
                let regex = compile_regex(&pattern)?;

                let values = args[0].evaluate(table)?.values;
                Ok(map_strings(values, |s| {
                    regex.replace_all(s, replacement.as_str()).into_owned()
                }))
            }
            ScalarFunction::Split => {
                let pattern = literal_string(&args[1], "split pattern")?;
                let regex = compile_regex(&pattern)?;

                let values = args[0].evaluate(table)?.values;
                Ok(values
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => Value::Array(
                            regex
                                .split(&s)
                                .map(|part| Value::String(part.to_string()))
                                .collect(),
                        ),
                        _ => Value::Null,
                    })
                    .collect())
            }
            ScalarFunction::ArrayContains => {
                let needle = literal_value(&args[1], "array_contains value")?;

                let values = args[0].evaluate(table)?.values;
                Ok(values
                    .into_iter()
                    .map(|v| match v {
                        Value::Array(items) => {
                            Value::Boolean(items.iter().any(|item| values_equal(item, &needle)))
                        }
                        _ => Value::Null,
                    })
                    .collect())
            }
            ScalarFunction::IsIn => {
                let needles = args[1..]
                    .iter()
                    .map(|arg| literal_value(arg, "in() value"))
                    .collect::<Result<Vec<Value>, ExprError>>()?;

                let values = args[0].evaluate(table)?.values;
                Ok(values
                    .into_iter()
                    .map(|v| {
                        if v.is_null() {
                            Value::Null
                        } else {
                            Value::Boolean(needles.iter().any(|n| values_equal(&v, n)))
                        }
                    })
                    .collect())
            }
            ScalarFunction::CurrentDate => {
                let today = Local::now().date_naive();
                Ok(vec![Value::Date(today); table.len()])
            }
            ScalarFunction::DateAdd | ScalarFunction::DateSub => {
                let days = literal_integer(&args[1], "day count")?;
                let offset = if *self == ScalarFunction::DateSub {
                    -days
                } else {
                    days
                };

                let values = args[0].evaluate(table)?.values;
                Ok(values
                    .into_iter()
                    .map(|v| match v {
                        Value::Date(d) => Value::Date(d + Duration::days(offset)),
                        _ => Value::Null,
                    })
                    .collect())
            }
            ScalarFunction::DateDiff => {
                let end_values = args[0].evaluate(table)?.values;
                let start_values = args[1].evaluate(table)?.values;

                Ok(end_values
                    .into_iter()
                    .zip(start_values)
                    .map(|(end, start)| match (end, start) {
                        (Value::Date(end), Value::Date(start)) => {
                            Value::Integer(end.signed_duration_since(start).num_days())
                        }
                        _ => Value::Null,
                    })
                    .collect())
            }
            ScalarFunction::DateFormat => {
                let format = literal_string(&args[1], "date format")?;

                let values = args[0].evaluate(table)?.values;
                Ok(values
                    .into_iter()
                    .map(|v| match v {
                        Value::Date(d) => Value::String(d.format(&format).to_string()),
                        _ => Value::Null,
                    })
                    .collect())
            }
        }
    }

    fn expect_args(&self, args: &[Expr], count: usize) -> Result<(), ExprError> {
        if args.len() != count {
            return Err(ExprError::InvalidArgument(format!(
                "{} takes {} arguments, got {}",
                self.name(),
                count,
                args.len()
            )));
        }
        Ok(())
    }

    fn expect_type(
        &self,
        arg: &Expr,
        schema: &Schema,
        expected: DataType,
    ) -> Result<(), ExprError> {
        let actual = arg.result_type(schema)?;
        if actual != expected {
            return Err(ExprError::TypeMismatch(format!(
                "{} requires a {:?} operand, got {:?}",
                self.name(),
                expected,
                actual
            )));
        }
        Ok(())
    }
}

/// Uppercase every character
pub fn upper(operand: Expr) -> Expr {
    Expr::Function {
        function: ScalarFunction::Upper,
        args: vec![operand],
    }
}

/// Lowercase every character
pub fn lower(operand: Expr) -> Expr {
    Expr::Function {
        function: ScalarFunction::Lower,
        args: vec![operand],
    }
}

/// Capitalize the first letter of each word
pub fn initcap(operand: Expr) -> Expr {
    Expr::Function {
        function: ScalarFunction::InitCap,
        args: vec![operand],
    }
}

/// Replace every match of a regex pattern
pub fn regexp_replace(operand: Expr, pattern: &str, replacement: &str) -> Expr {
    Expr::Function {
        function: ScalarFunction::RegexpReplace,
        args: vec![operand, super::lit(pattern), super::lit(replacement)],
    }
}

/// Split a string into an array on a regex pattern
pub fn split(operand: Expr, pattern: &str) -> Expr {
    Expr::Function {
        function: ScalarFunction::Split,
        args: vec![operand, super::lit(pattern)],
    }
}

/// True where an array column contains the given value
pub fn array_contains<V: Into<Value>>(operand: Expr, value: V) -> Expr {
    Expr::Function {
        function: ScalarFunction::ArrayContains,
        args: vec![operand, Expr::Literal(value.into())],
    }
}

/// Today's date, repeated for every row
pub fn current_date() -> Expr {
    Expr::Function {
        function: ScalarFunction::CurrentDate,
        args: Vec::new(),
    }
}

/// Add a number of days to a date column
pub fn date_add(operand: Expr, days: i64) -> Expr {
    Expr::Function {
        function: ScalarFunction::DateAdd,
        args: vec![operand, super::lit(days)],
    }
}

/// Subtract a number of days from a date column
pub fn date_sub(operand: Expr, days: i64) -> Expr {
    Expr::Function {
        function: ScalarFunction::DateSub,
        args: vec![operand, super::lit(days)],
    }
}

/// Day count between two dates, later minus earlier
pub fn date_diff(end: Expr, start: Expr) -> Expr {
    Expr::Function {
        function: ScalarFunction::DateDiff,
        args: vec![end, start],
    }
}

/// Format a date column with a chrono format string
pub fn date_format(operand: Expr, format: &str) -> Expr {
    Expr::Function {
        function: ScalarFunction::DateFormat,
        args: vec![operand, super::lit(format)],
    }
}

/// Cast one value, yielding null on anything unparsable
pub fn cast_value_lenient(value: &Value, to: &DataType) -> Value {
    match (value, to) {
        (Value::Null, _) => Value::Null,

        (Value::Boolean(b), DataType::Boolean) => Value::Boolean(*b),
        (Value::Boolean(b), DataType::Integer) => Value::Integer(i64::from(*b)),
        (Value::Boolean(b), DataType::Float) => Value::Float(if *b { 1.0 } else { 0.0 }),

        (Value::Integer(i), DataType::Boolean) => Value::Boolean(*i != 0),
        (Value::Integer(i), DataType::Integer) => Value::Integer(*i),
        (Value::Integer(i), DataType::Float) => Value::Float(*i as f64),

        (Value::Float(f), DataType::Boolean) => Value::Boolean(*f != 0.0),
        (Value::Float(f), DataType::Integer) => Value::Integer(*f as i64),
        (Value::Float(f), DataType::Float) => Value::Float(*f),

        (Value::String(s), DataType::Boolean) => match s.to_lowercase().as_str() {
            "true" | "yes" | "1" => Value::Boolean(true),
            "false" | "no" | "0" => Value::Boolean(false),
            _ => Value::Null,
        },
        (Value::String(s), DataType::Integer) => {
            s.parse::<i64>().map(Value::Integer).unwrap_or(Value::Null)
        }
        (Value::String(s), DataType::Float) => {
            s.parse::<f64>().map(Value::Float).unwrap_or(Value::Null)
        }
        (Value::String(s), DataType::String) => Value::String(s.clone()),
        (Value::String(s), DataType::Date) => NaiveDate::parse_from_str(s, DATE_FORMAT)
            .map(Value::Date)
            .unwrap_or(Value::Null),

        (Value::Date(d), DataType::Date) => Value::Date(*d),

        (Value::Array(items), DataType::Array(element_type)) => Value::Array(
            items
                .iter()
                .map(|item| cast_value_lenient(item, element_type))
                .collect(),
        ),

        (other, DataType::String) => Value::String(other.to_display_string()),

        _ => Value::Null,
    }
}

fn map_strings<F: Fn(&str) -> String>(values: Vec<Value>, f: F) -> Vec<Value> {
    values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => Value::String(f(&s)),
            _ => Value::Null,
        })
        .collect()
}

fn initcap_string(s: &str) -> String {
    s.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

fn compile_regex(pattern: &str) -> Result<Regex, ExprError> {
    Regex::new(pattern)
        .map_err(|e| ExprError::InvalidArgument(format!("invalid pattern '{}': {}", pattern, e)))
}

fn literal_string(expr: &Expr, what: &str) -> Result<String, ExprError> {
    match expr {
        Expr::Literal(Value::String(s)) => Ok(s.clone()),
        _ => Err(ExprError::InvalidArgument(format!(
            "{} must be a string literal",
            what
        ))),
    }
}

fn literal_integer(expr: &Expr, what: &str) -> Result<i64, ExprError> {
    match expr {
        Expr::Literal(Value::Integer(i)) => Ok(*i),
        _ => Err(ExprError::InvalidArgument(format!(
            "{} must be an integer literal",
            what
        ))),
    }
}

fn literal_value(expr: &Expr, what: &str) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        _ => Err(ExprError::InvalidArgument(format!(
            "{} must be a literal",
            what
        ))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}
