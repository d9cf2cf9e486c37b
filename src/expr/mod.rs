// Column expression trees and their evaluator
// Author: Gabriel Demetrios Lafis

mod functions;

pub use functions::*;

use thiserror::Error;

use crate::data::{Column, DataType, Schema, Table, Value};

/// Binary operator over two expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
}

impl BinaryOperator {
    fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Eq => "=",
            BinaryOperator::NotEq => "!=",
            BinaryOperator::Lt => "<",
            BinaryOperator::LtEq => "<=",
            BinaryOperator::Gt => ">",
            BinaryOperator::GtEq => ">=",
            BinaryOperator::And => "AND",
            BinaryOperator::Or => "OR",
        }
    }

    fn is_arithmetic(&self) -> bool {
        matches!(
            self,
            BinaryOperator::Add
                | BinaryOperator::Subtract
                | BinaryOperator::Multiply
                | BinaryOperator::Divide
        )
    }

    fn is_logical(&self) -> bool {
        matches!(self, BinaryOperator::And | BinaryOperator::Or)
    }
}

/// Unary operator over one expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    IsNull,
    IsNotNull,
}

/// A computation over column values, evaluated to one column of results
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A constant value repeated for every row
    Literal(Value),
    /// A reference to a column by name
    Column(String),
    /// An inner expression renamed in the output
    Alias(Box<Expr>, String),
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// A scalar function applied per element
    Function {
        function: ScalarFunction,
        args: Vec<Expr>,
    },
    /// Ordered (predicate, result) branches with an optional default.
    ///
    /// Predicates treat null as false and fall through to the next branch.
    Conditional {
        branches: Vec<(Expr, Expr)>,
        otherwise: Option<Box<Expr>>,
    },
    /// Lenient cast: unparsable input becomes null instead of failing
    Cast {
        operand: Box<Expr>,
        to: DataType,
    },
}

/// Reference a column by name
pub fn col(name: &str) -> Expr {
    Expr::Column(name.to_string())
}

/// Wrap a constant value in an expression
pub fn lit<V: Into<Value>>(value: V) -> Expr {
    Expr::Literal(value.into())
}

/// Start a conditional expression with its first branch
pub fn when(condition: Expr, value: Expr) -> CaseBuilder {
    CaseBuilder {
        branches: vec![(condition, value)],
    }
}

/// Builder for chained when/otherwise conditionals
pub struct CaseBuilder {
    branches: Vec<(Expr, Expr)>,
}

impl CaseBuilder {
    /// Add another (predicate, result) branch
    pub fn when(mut self, condition: Expr, value: Expr) -> Self {
        self.branches.push((condition, value));
        self
    }

    /// Close the conditional with a default value
    pub fn otherwise(self, value: Expr) -> Expr {
        Expr::Conditional {
            branches: self.branches,
            otherwise: Some(Box::new(value)),
        }
    }

    /// Close the conditional without a default; unmatched rows become null
    pub fn end(self) -> Expr {
        Expr::Conditional {
            branches: self.branches,
            otherwise: None,
        }
    }
}

impl Expr {
    /// Rename the expression in the output schema
    pub fn alias(self, name: &str) -> Expr {
        Expr::Alias(Box::new(self), name.to_string())
    }

    fn binary(self, op: BinaryOperator, other: Expr) -> Expr {
        Expr::BinaryOp {
            op,
            left: Box::new(self),
            right: Box::new(other),
        }
    }

    /// Equality comparison
    pub fn eq(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    /// Inequality comparison
    pub fn not_eq(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::NotEq, other)
    }

    /// Less-than comparison
    pub fn lt(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Lt, other)
    }

    /// Less-than-or-equal comparison
    pub fn lt_eq(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::LtEq, other)
    }

    /// Greater-than comparison
    pub fn gt(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Gt, other)
    }

    /// Greater-than-or-equal comparison
    pub fn gt_eq(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::GtEq, other)
    }

    /// Logical conjunction
    pub fn and(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    /// Logical disjunction
    pub fn or(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Or, other)
    }

    /// Logical negation
    pub fn not(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Not,
            operand: Box::new(self),
        }
    }

    /// True where the value is null
    pub fn is_null(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::IsNull,
            operand: Box::new(self),
        }
    }

    /// True where the value is not null
    pub fn is_not_null(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::IsNotNull,
            operand: Box::new(self),
        }
    }

    /// True where the value equals one of the given constants
    pub fn is_in<V: Into<Value>>(self, values: Vec<V>) -> Expr {
        let mut args = vec![self];
        args.extend(values.into_iter().map(|v| Expr::Literal(v.into())));
        Expr::Function {
            function: ScalarFunction::IsIn,
            args,
        }
    }

    /// Lenient cast to the target type
    pub fn cast(self, to: DataType) -> Expr {
        Expr::Cast {
            operand: Box::new(self),
            to,
        }
    }

    /// The column name this expression produces when selected without alias
    pub fn output_name(&self) -> String {
        match self {
            Expr::Literal(value) => value.to_display_string(),
            Expr::Column(name) => name.clone(),
            Expr::Alias(_, name) => name.clone(),
            Expr::BinaryOp { op, left, right } => format!(
                "({} {} {})",
                left.output_name(),
                op.symbol(),
                right.output_name()
            ),
            Expr::UnaryOp { op, operand } => match op {
                UnaryOperator::Not => format!("(NOT {})", operand.output_name()),
                UnaryOperator::Negate => format!("(- {})", operand.output_name()),
                UnaryOperator::IsNull => format!("({} IS NULL)", operand.output_name()),
                UnaryOperator::IsNotNull => format!("({} IS NOT NULL)", operand.output_name()),
            },
            Expr::Function { function, args } => {
                let parts: Vec<String> = args.iter().map(|a| a.output_name()).collect();
                format!("{}({})", function.name(), parts.join(", "))
            }
            Expr::Conditional { .. } => "case_when".to_string(),
            Expr::Cast { operand, .. } => format!("cast({})", operand.output_name()),
        }
    }

    /// The type this expression produces against the given schema.
    ///
    /// Fails with `UnknownColumn` for unresolved references and
    /// `TypeMismatch` for operators over incompatible column types.
    pub fn result_type(&self, schema: &Schema) -> Result<DataType, ExprError> {
        match self {
            Expr::Literal(value) => Ok(value.data_type().unwrap_or(DataType::String)),
            Expr::Column(name) => schema
                .get_field_by_name(name)
                .map(|f| f.data_type.clone())
                .ok_or_else(|| ExprError::UnknownColumn(name.clone())),
            Expr::Alias(inner, _) => inner.result_type(schema),
            Expr::BinaryOp { op, left, right } => {
                let left_type = left.result_type(schema)?;
                let right_type = right.result_type(schema)?;

                if op.is_arithmetic() {
                    if !is_numeric(&left_type) || !is_numeric(&right_type) {
                        return Err(ExprError::TypeMismatch(format!(
                            "cannot apply '{}' to {:?} and {:?}",
                            op.symbol(),
                            left_type,
                            right_type
                        )));
                    }
                    if *op == BinaryOperator::Divide {
                        return Ok(DataType::Float);
                    }
                    if left_type == DataType::Float || right_type == DataType::Float {
                        return Ok(DataType::Float);
                    }
                    return Ok(DataType::Integer);
                }

                if op.is_logical() {
                    if left_type != DataType::Boolean || right_type != DataType::Boolean {
                        return Err(ExprError::TypeMismatch(format!(
                            "'{}' requires boolean operands, got {:?} and {:?}",
                            op.symbol(),
                            left_type,
                            right_type
                        )));
                    }
                    return Ok(DataType::Boolean);
                }

                // Comparison: equal types, or any numeric pair
                let comparable = left_type == right_type
                    || (is_numeric(&left_type) && is_numeric(&right_type));
                if !comparable {
                    return Err(ExprError::TypeMismatch(format!(
                        "cannot compare {:?} with {:?}",
                        left_type, right_type
                    )));
                }
                Ok(DataType::Boolean)
            }
            Expr::UnaryOp { op, operand } => {
                let operand_type = operand.result_type(schema)?;
                match op {
                    UnaryOperator::Not => {
                        if operand_type != DataType::Boolean {
                            return Err(ExprError::TypeMismatch(format!(
                                "NOT requires a boolean operand, got {:?}",
                                operand_type
                            )));
                        }
                        Ok(DataType::Boolean)
                    }
                    UnaryOperator::Negate => {
                        if !is_numeric(&operand_type) {
                            return Err(ExprError::TypeMismatch(format!(
                                "negation requires a numeric operand, got {:?}",
                                operand_type
                            )));
                        }
                        Ok(operand_type)
                    }
                    UnaryOperator::IsNull | UnaryOperator::IsNotNull => Ok(DataType::Boolean),
                }
            }
            Expr::Function { function, args } => function.result_type(args, schema),
            Expr::Conditional {
                branches,
                otherwise,
            } => {
                for (predicate, _) in branches {
                    let predicate_type = predicate.result_type(schema)?;
                    if predicate_type != DataType::Boolean {
                        return Err(ExprError::TypeMismatch(format!(
                            "conditional predicate must be boolean, got {:?}",
                            predicate_type
                        )));
                    }
                }

                // Every branch and the default must agree on one output type
                let mut result: Option<DataType> = None;
                for (_, value) in branches {
                    let value_type = value.result_type(schema)?;
                    result = Some(match result.take() {
                        None => value_type,
                        Some(current) => reconcile_branch_types(current, value_type)?,
                    });
                }

                if let Some(default) = otherwise {
                    let default_type = default.result_type(schema)?;
                    result = Some(match result.take() {
                        None => default_type,
                        Some(current) => reconcile_branch_types(current, default_type)?,
                    });
                }

                result.ok_or_else(|| {
                    ExprError::InvalidArgument(
                        "conditional needs at least one branch".to_string(),
                    )
                })
            }
            Expr::Cast { to, operand } => {
                operand.result_type(schema)?;
                Ok(to.clone())
            }
        }
    }

    /// Evaluate the expression against a table, producing one value per row.
    ///
    /// Null propagation: operators over a null operand yield null, except
    /// `IsNull`/`IsNotNull` and conditional predicates (null reads as false).
    pub fn evaluate(&self, table: &Table) -> Result<Column, ExprError> {
        let data_type = self.result_type(&table.schema)?;
        let num_rows = table.len();

        let values = match self {
            Expr::Literal(value) => vec![value.clone(); num_rows],
            Expr::Column(name) => {
                let index = table
                    .column_index(name)
                    .map_err(|_| ExprError::UnknownColumn(name.clone()))?;
                table.columns[index].values.clone()
            }
            Expr::Alias(inner, _) => inner.evaluate(table)?.values,
            Expr::BinaryOp { op, left, right } => {
                let left_values = left.evaluate(table)?.values;
                let right_values = right.evaluate(table)?.values;

                left_values
                    .into_iter()
                    .zip(right_values)
                    .map(|(a, b)| apply_binary(*op, &a, &b))
                    .collect()
            }
            Expr::UnaryOp { op, operand } => {
                let operand_values = operand.evaluate(table)?.values;
                operand_values
                    .into_iter()
                    .map(|v| apply_unary(*op, &v))
                    .collect()
            }
            Expr::Function { function, args } => function.evaluate(args, table)?,
            Expr::Conditional {
                branches,
                otherwise,
            } => {
                let mut predicate_columns = Vec::with_capacity(branches.len());
                let mut value_columns = Vec::with_capacity(branches.len());

                for (predicate, value) in branches {
                    predicate_columns.push(predicate.evaluate(table)?.values);
                    value_columns.push(value.evaluate(table)?.values);
                }

                let default_values = match otherwise {
                    Some(default) => Some(default.evaluate(table)?.values),
                    None => None,
                };

                (0..num_rows)
                    .map(|row| {
                        let mut picked = Value::Null;
                        let mut matched = false;
                        for (predicates, results) in
                            predicate_columns.iter().zip(&value_columns)
                        {
                            // Null predicates fall through to the next branch
                            if predicates[row] == Value::Boolean(true) {
                                picked = results[row].clone();
                                matched = true;
                                break;
                            }
                        }
                        if !matched {
                            if let Some(values) = &default_values {
                                picked = values[row].clone();
                            }
                        }
                        // Integer branches widen when the reconciled type is float
                        match (picked, &data_type) {
                            (Value::Integer(i), DataType::Float) => Value::Float(i as f64),
                            (value, _) => value,
                        }
                    })
                    .collect()
            }
            Expr::Cast { operand, to } => {
                let operand_values = operand.evaluate(table)?.values;
                operand_values
                    .iter()
                    .map(|v| cast_value_lenient(v, to))
                    .collect()
            }
        };

        Ok(Column::new(data_type, values))
    }
}

fn is_numeric(data_type: &DataType) -> bool {
    matches!(data_type, DataType::Integer | DataType::Float)
}

fn reconcile_branch_types(a: DataType, b: DataType) -> Result<DataType, ExprError> {
    if a == b {
        return Ok(a);
    }
    if is_numeric(&a) && is_numeric(&b) {
        return Ok(DataType::Float);
    }
    Err(ExprError::TypeMismatch(format!(
        "conditional branches produce incompatible types {:?} and {:?}",
        a, b
    )))
}

fn apply_binary(op: BinaryOperator, a: &Value, b: &Value) -> Value {
    if a.is_null() || b.is_null() {
        return Value::Null;
    }

    match op {
        BinaryOperator::Add
        | BinaryOperator::Subtract
        | BinaryOperator::Multiply
        | BinaryOperator::Divide => apply_arithmetic(op, a, b),
        BinaryOperator::And => match (a, b) {
            (Value::Boolean(x), Value::Boolean(y)) => Value::Boolean(*x && *y),
            _ => Value::Null,
        },
        BinaryOperator::Or => match (a, b) {
            (Value::Boolean(x), Value::Boolean(y)) => Value::Boolean(*x || *y),
            _ => Value::Null,
        },
        BinaryOperator::Eq => Value::Boolean(a.compare(b) == std::cmp::Ordering::Equal),
        BinaryOperator::NotEq => Value::Boolean(a.compare(b) != std::cmp::Ordering::Equal),
        BinaryOperator::Lt => Value::Boolean(a.compare(b) == std::cmp::Ordering::Less),
        BinaryOperator::LtEq => Value::Boolean(a.compare(b) != std::cmp::Ordering::Greater),
        BinaryOperator::Gt => Value::Boolean(a.compare(b) == std::cmp::Ordering::Greater),
        BinaryOperator::GtEq => Value::Boolean(a.compare(b) != std::cmp::Ordering::Less),
    }
}

fn apply_arithmetic(op: BinaryOperator, a: &Value, b: &Value) -> Value {
    if let (Value::Integer(x), Value::Integer(y)) = (a, b) {
        if op != BinaryOperator::Divide {
            // Overflow yields null, matching the divide-by-zero policy
            let result = match op {
                BinaryOperator::Add => x.checked_add(*y),
                BinaryOperator::Subtract => x.checked_sub(*y),
                BinaryOperator::Multiply => x.checked_mul(*y),
                _ => unreachable!(),
            };
            return result.map(Value::Integer).unwrap_or(Value::Null);
        }
    }

    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => match op {
            BinaryOperator::Add => Value::Float(x + y),
            BinaryOperator::Subtract => Value::Float(x - y),
            BinaryOperator::Multiply => Value::Float(x * y),
            BinaryOperator::Divide => {
                if y == 0.0 {
                    Value::Null
                } else {
                    Value::Float(x / y)
                }
            }
            _ => unreachable!(),
        },
        _ => Value::Null,
    }
}

fn apply_unary(op: UnaryOperator, v: &Value) -> Value {
    match op {
        UnaryOperator::IsNull => Value::Boolean(v.is_null()),
        UnaryOperator::IsNotNull => Value::Boolean(!v.is_null()),
        UnaryOperator::Not => match v {
            Value::Boolean(b) => Value::Boolean(!b),
            _ => Value::Null,
        },
        UnaryOperator::Negate => match v {
            Value::Integer(i) => i.checked_neg().map(Value::Integer).unwrap_or(Value::Null),
            Value::Float(f) => Value::Float(-f),
            _ => Value::Null,
        },
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;

    fn add(self, rhs: Expr) -> Expr {
        self.binary(BinaryOperator::Add, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;

    fn sub(self, rhs: Expr) -> Expr {
        self.binary(BinaryOperator::Subtract, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        self.binary(BinaryOperator::Multiply, rhs)
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;

    fn div(self, rhs: Expr) -> Expr {
        self.binary(BinaryOperator::Divide, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(self),
        }
    }
}

/// Represents an error during expression typing or evaluation
#[derive(Debug, Error)]
pub enum ExprError {
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
