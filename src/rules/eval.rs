//! Metric expression evaluation.
//!
//! Expressions see nothing but the [`Context`] they are evaluated against.
//! Arithmetic follows the usual scripting conventions: `/` always yields a
//! float, `//` floors, `%` takes the sign of the divisor and integer overflow
//! falls back to floating point.

use std::cmp::Ordering;

use serde_json::{Number, Value};
use thiserror::Error;

use crate::rules::expr::{BinaryOp, Builtin, CmpOp, Expr, UnaryOp};

/// Runtime evaluation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    UnknownName(String),

    #[error("key '{0}' not found")]
    MissingKey(String),

    #[error("index {0} out of range")]
    IndexOutOfRange(i64),

    #[error("unsupported operand types for {op}: {left} and {right}")]
    TypeMismatch {
        op: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("cannot convert {0} to a number")]
    NotNumeric(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("result is not a finite number")]
    NonFinite,

    #[error("{func}() got {got} arguments")]
    Arity { func: &'static str, got: usize },
}

/// Bindings visible to an expression. Only `r` is ever bound.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    result: &'a Value,
}

impl<'a> Context<'a> {
    /// Bind a data-source result as `r`.
    pub fn new(result: &'a Value) -> Self {
        Self { result }
    }

    fn lookup(&self, name: &str) -> Option<&'a Value> {
        match name {
            "r" => Some(self.result),
            _ => None,
        }
    }
}

/// Evaluate a parsed expression.
pub fn evaluate(expr: &Expr, ctx: &Context<'_>) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Name(name) => ctx
            .lookup(name)
            .cloned()
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Expr::Index(target, index) => {
            let target = evaluate(target, ctx)?;
            let index = evaluate(index, ctx)?;
            subscript(target, &index)
        }
        Expr::Attr(target, name) => match evaluate(target, ctx)? {
            Value::Object(mut map) => map
                .remove(name)
                .ok_or_else(|| EvalError::MissingKey(name.clone())),
            other => Err(EvalError::TypeMismatch {
                op: format!(".{}", name),
                left: type_name(&other),
                right: "attribute",
            }),
        },
        Expr::Unary(op, inner) => {
            let value = evaluate(inner, ctx)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&value))),
                UnaryOp::Pos => numeric(&value, "unary +").map(Num::into_value)?,
                UnaryOp::Neg => match numeric(&value, "unary -")? {
                    Num::Int(i) => match i.checked_neg() {
                        Some(n) => Ok(Value::from(n)),
                        None => Num::Float(-(i as f64)).into_value(),
                    },
                    Num::Float(x) => Num::Float(-x).into_value(),
                },
            }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            binary(*op, left, right)
        }
        Expr::Compare(op, left, right) => {
            let left = evaluate(left, ctx)?;
            let right = evaluate(right, ctx)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
        Expr::And(left, right) => {
            let left = evaluate(left, ctx)?;
            if truthy(&left) {
                evaluate(right, ctx)
            } else {
                Ok(left)
            }
        }
        Expr::Or(left, right) => {
            let left = evaluate(left, ctx)?;
            if truthy(&left) {
                Ok(left)
            } else {
                evaluate(right, ctx)
            }
        }
        Expr::Call(func, args) => {
            let args = args
                .iter()
                .map(|a| evaluate(a, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            call(*func, args)
        }
    }
}

/// Render a value the way rules see it as text.
///
/// Strings are used verbatim, booleans and null are spelled `True`, `False`
/// and `None`, everything else uses its JSON form.
pub fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

/// Convert a value into a float for threshold comparison.
pub fn to_number(value: &Value) -> Result<f64, EvalError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| EvalError::NotNumeric(n.to_string())),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| EvalError::NotNumeric(format!("'{}'", s))),
        other => Err(EvalError::NotNumeric(render(other))),
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|x| x != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(x) => x,
        }
    }

    fn into_value(self) -> Result<Value, EvalError> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(x) => Number::from_f64(x)
                .map(Value::Number)
                .ok_or(EvalError::NonFinite),
        }
    }
}

fn as_num(value: &Value) -> Option<Num> {
    match value {
        Value::Bool(b) => Some(Num::Int(*b as i64)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(Num::Int(i)),
            None => n.as_f64().map(Num::Float),
        },
        _ => None,
    }
}

fn numeric(value: &Value, op: &str) -> Result<Num, EvalError> {
    as_num(value).ok_or_else(|| EvalError::TypeMismatch {
        op: op.to_string(),
        left: type_name(value),
        right: "number",
    })
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> EvalError {
    let symbol = match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::FloorDiv => "//",
        BinaryOp::Rem => "%",
    };
    EvalError::TypeMismatch {
        op: symbol.to_string(),
        left: type_name(left),
        right: type_name(right),
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, EvalError> {
    if let (BinaryOp::Add, Value::String(l), Value::String(r)) = (op, &left, &right) {
        return Ok(Value::String(format!("{}{}", l, r)));
    }

    let (a, b) = match (as_num(&left), as_num(&right)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(mismatch(op, &left, &right)),
    };

    let result = match (op, a, b) {
        (BinaryOp::Div, _, _) => {
            if b.as_f64() == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            Num::Float(a.as_f64() / b.as_f64())
        }
        (BinaryOp::Add, Num::Int(x), Num::Int(y)) => int_or_float(x.checked_add(y), x as f64 + y as f64),
        (BinaryOp::Sub, Num::Int(x), Num::Int(y)) => int_or_float(x.checked_sub(y), x as f64 - y as f64),
        (BinaryOp::Mul, Num::Int(x), Num::Int(y)) => int_or_float(x.checked_mul(y), x as f64 * y as f64),
        (BinaryOp::FloorDiv, Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            match x.checked_div(y) {
                Some(q) if x % y != 0 && ((x < 0) != (y < 0)) => Num::Int(q - 1),
                Some(q) => Num::Int(q),
                None => Num::Float((x as f64 / y as f64).floor()),
            }
        }
        (BinaryOp::Rem, Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = x.wrapping_rem(y);
            if r != 0 && ((r < 0) != (y < 0)) {
                Num::Int(r + y)
            } else {
                Num::Int(r)
            }
        }
        (op, a, b) => {
            let (x, y) = (a.as_f64(), b.as_f64());
            match op {
                BinaryOp::Add => Num::Float(x + y),
                BinaryOp::Sub => Num::Float(x - y),
                BinaryOp::Mul => Num::Float(x * y),
                BinaryOp::FloorDiv | BinaryOp::Rem if y == 0.0 => {
                    return Err(EvalError::DivisionByZero)
                }
                BinaryOp::FloorDiv => Num::Float((x / y).floor()),
                BinaryOp::Rem => Num::Float(x - y * (x / y).floor()),
                BinaryOp::Div => Num::Float(x / y),
            }
        }
    };
    result.into_value()
}

fn int_or_float(checked: Option<i64>, fallback: f64) -> Num {
    checked.map(Num::Int).unwrap_or(Num::Float(fallback))
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, EvalError> {
    let ordering = match (left, right) {
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => match (as_num(left), as_num(right)) {
            (Some(a), Some(b)) => a.as_f64().partial_cmp(&b.as_f64()),
            _ => {
                return match op {
                    CmpOp::Eq => Ok(left == right),
                    CmpOp::Ne => Ok(left != right),
                    _ => Err(EvalError::TypeMismatch {
                        op: op.to_string(),
                        left: type_name(left),
                        right: type_name(right),
                    }),
                }
            }
        },
    };

    // NaN compares unequal to everything.
    let Some(ordering) = ordering else {
        return Ok(op == CmpOp::Ne);
    };

    Ok(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    })
}

fn subscript(target: Value, index: &Value) -> Result<Value, EvalError> {
    match (target, index) {
        (Value::Object(mut map), Value::String(key)) => map
            .remove(key)
            .ok_or_else(|| EvalError::MissingKey(key.clone())),
        (Value::Array(mut items), Value::Number(n)) => {
            let i = n
                .as_i64()
                .ok_or_else(|| EvalError::NotNumeric(n.to_string()))?;
            let len = items.len() as i64;
            let pos = if i < 0 { len + i } else { i };
            if pos < 0 || pos >= len {
                return Err(EvalError::IndexOutOfRange(i));
            }
            Ok(items.swap_remove(pos as usize))
        }
        (target, index) => Err(EvalError::TypeMismatch {
            op: "[]".to_string(),
            left: type_name(&target),
            right: type_name(index),
        }),
    }
}

fn call(func: Builtin, args: Vec<Value>) -> Result<Value, EvalError> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(EvalError::Arity {
                func: func.name(),
                got: args.len(),
            })
        }
    };

    match func {
        Builtin::Int => {
            arity(1)?;
            match &args[0] {
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| EvalError::NotNumeric(format!("'{}'", s))),
                other => match numeric(other, "int()")? {
                    Num::Int(i) => Ok(Value::from(i)),
                    Num::Float(x) if x.is_finite() => Ok(Value::from(x.trunc() as i64)),
                    Num::Float(_) => Err(EvalError::NonFinite),
                },
            }
        }
        Builtin::Float => {
            arity(1)?;
            Num::Float(to_number(&args[0])?).into_value()
        }
        Builtin::Str => {
            arity(1)?;
            Ok(Value::String(render(&args[0])))
        }
        Builtin::Len => {
            arity(1)?;
            let len = match &args[0] {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                other => {
                    return Err(EvalError::TypeMismatch {
                        op: "len()".to_string(),
                        left: type_name(other),
                        right: "sized",
                    })
                }
            };
            Ok(Value::from(len as u64))
        }
        Builtin::Abs => {
            arity(1)?;
            match numeric(&args[0], "abs()")? {
                Num::Int(i) => int_or_float(i.checked_abs(), (i as f64).abs()).into_value(),
                Num::Float(x) => Num::Float(x.abs()).into_value(),
            }
        }
        Builtin::Round => {
            arity(1)?;
            let x = numeric(&args[0], "round()")?.as_f64();
            if !x.is_finite() {
                return Err(EvalError::NonFinite);
            }
            Ok(Value::from(x.round_ties_even() as i64))
        }
        Builtin::Min | Builtin::Max => {
            if args.is_empty() {
                return Err(EvalError::Arity {
                    func: func.name(),
                    got: 0,
                });
            }
            let mut best = args[0].clone();
            for candidate in &args[1..] {
                let replace = match func {
                    Builtin::Min => compare(CmpOp::Lt, candidate, &best)?,
                    _ => compare(CmpOp::Gt, candidate, &best)?,
                };
                if replace {
                    best = candidate.clone();
                }
            }
            Ok(best)
        }
    }
}
