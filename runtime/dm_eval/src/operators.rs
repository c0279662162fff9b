//! Operator evaluation.
//!
//! Direct enum-based dispatch over value pairs; the variant set is fixed,
//! so pattern matching beats trait objects and keeps the combinations
//! exhaustively checked. Object operands defer to the metaobject table;
//! every combination not enumerated here fails `InvalidOperation`.

use crate::errors::{divide_by_zero, invalid_operation, invalid_unary_operation, RunResult};
use crate::runtime::Runtime;
use crate::value::Value;

/// Binary operations the interpreter evaluates through this module.
///
/// `Append`/`Remove`/`Combine`/`Mask` are the compound-assignment forms;
/// the interpreter reads the identifier, evaluates here, and writes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    BitAnd,
    BitOr,
    BitXor,
    BitShiftLeft,
    Append,
    Remove,
    Combine,
    Mask,
}

impl BinaryOp {
    /// Operator text for diagnostics.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Modulus => "%",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::BitShiftLeft => "<<",
            BinaryOp::Append => "+=",
            BinaryOp::Remove => "-=",
            BinaryOp::Combine => "|=",
            BinaryOp::Mask => "&=",
        }
    }
}

/// Evaluate a binary operation.
pub fn evaluate_binary(
    runtime: &Runtime,
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
) -> RunResult<Value> {
    // Live objects dispatch to their metaobject when one is registered;
    // the compound forms have their own hooks.
    if let Some(object) = lhs.as_object() {
        let definition = object.borrow().definition().clone();
        if let Some(meta) = runtime.metaobject_for(&definition) {
            return match op {
                BinaryOp::Add => meta.add(runtime, &lhs, &rhs),
                BinaryOp::Subtract => meta.subtract(runtime, &lhs, &rhs),
                BinaryOp::Append => meta.append(runtime, &lhs, &rhs),
                BinaryOp::Remove => meta.remove(runtime, &lhs, &rhs),
                BinaryOp::Combine => meta.combine(runtime, &lhs, &rhs),
                _ => Err(invalid_operation(op.symbol(), &lhs, &rhs)),
            };
        }
        return Err(invalid_operation(op.symbol(), &lhs, &rhs));
    }

    match op {
        BinaryOp::Add => add(lhs, rhs),
        BinaryOp::Subtract => subtract(lhs, rhs),
        BinaryOp::Multiply => multiply(lhs, rhs),
        BinaryOp::Divide => divide(lhs, rhs),
        BinaryOp::Modulus => modulus(lhs, rhs),
        BinaryOp::BitAnd => bitwise(op, lhs, rhs, |a, b| a & b),
        BinaryOp::BitOr => bitwise(op, lhs, rhs, |a, b| a | b),
        BinaryOp::BitXor => bitwise(op, lhs, rhs, |a, b| a ^ b),
        BinaryOp::BitShiftLeft => shift_left(lhs, rhs),
        // A null target accumulates from nothing.
        BinaryOp::Append => match lhs {
            Value::Null => Ok(rhs),
            lhs => add(lhs, rhs),
        },
        BinaryOp::Remove => subtract(lhs, rhs),
        BinaryOp::Combine => match lhs {
            Value::Null => Ok(rhs),
            lhs => bitwise(BinaryOp::Combine, lhs, rhs, |a, b| a | b),
        },
        BinaryOp::Mask => match lhs {
            Value::Null => Ok(Value::Null),
            lhs => bitwise(BinaryOp::Mask, lhs, rhs, |a, b| a & b),
        },
    }
}

fn add(lhs: Value, rhs: Value) -> RunResult<Value> {
    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_add(*b))),
        (Value::String(a), Value::String(b)) => Ok(Value::string(format!("{a}{b}"))),
        (Value::String(a), Value::Integer(_) | Value::Double(_)) => {
            Ok(Value::string(format!("{a}{}", rhs.stringify())))
        }
        _ => numeric(lhs, rhs, BinaryOp::Add, |a, b| a + b),
    }
}

fn subtract(lhs: Value, rhs: Value) -> RunResult<Value> {
    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_sub(*b))),
        _ => numeric(lhs, rhs, BinaryOp::Subtract, |a, b| a - b),
    }
}

fn multiply(lhs: Value, rhs: Value) -> RunResult<Value> {
    match (&lhs, &rhs) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a.wrapping_mul(*b))),
        _ => numeric(lhs, rhs, BinaryOp::Multiply, |a, b| a * b),
    }
}

/// One numeric path for every division: both sides coerce to double and
/// the result is a double, so integer/integer division does not truncate.
fn divide(lhs: Value, rhs: Value) -> RunResult<Value> {
    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(invalid_operation(BinaryOp::Divide.symbol(), &lhs, &rhs));
    };
    if b == 0.0 {
        return Err(divide_by_zero());
    }
    Ok(Value::Double(a / b))
}

fn modulus(lhs: Value, rhs: Value) -> RunResult<Value> {
    let (Some(a), Some(b)) = (lhs.as_integer(), rhs.as_integer()) else {
        return Err(invalid_operation(BinaryOp::Modulus.symbol(), &lhs, &rhs));
    };
    if b == 0 {
        return Err(divide_by_zero());
    }
    Ok(Value::Integer(a.wrapping_rem(b)))
}

/// Promote to the wider numeric type: integer op integer stays integral
/// at the call sites that care; everything else runs through f64.
fn numeric(
    lhs: Value,
    rhs: Value,
    op: BinaryOp,
    apply: impl FnOnce(f64, f64) -> f64,
) -> RunResult<Value> {
    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(invalid_operation(op.symbol(), &lhs, &rhs));
    };
    Ok(Value::Double(apply(a, b)))
}

fn bitwise(
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    apply: impl FnOnce(i32, i32) -> i32,
) -> RunResult<Value> {
    let (Some(a), Some(b)) = (lhs.as_integer(), rhs.as_integer()) else {
        return Err(invalid_operation(op.symbol(), &lhs, &rhs));
    };
    Ok(Value::Integer(apply(a, b)))
}

fn shift_left(lhs: Value, rhs: Value) -> RunResult<Value> {
    let (Some(a), Some(b)) = (lhs.as_integer(), rhs.as_integer()) else {
        return Err(invalid_operation(BinaryOp::BitShiftLeft.symbol(), &lhs, &rhs));
    };
    if !(0..32).contains(&b) {
        return Ok(Value::Integer(0));
    }
    Ok(Value::Integer(a.wrapping_shl(b as u32)))
}

/// Arithmetic negation.
pub fn negate(value: Value) -> RunResult<Value> {
    match value {
        Value::Integer(n) => Ok(Value::Integer(n.wrapping_neg())),
        Value::Double(d) => Ok(Value::Double(-d)),
        other => Err(invalid_unary_operation("-", &other)),
    }
}

/// Bitwise complement, truncated to 24 bits: `~0` is `0xFFFFFF`.
pub fn bit_not(value: Value) -> RunResult<Value> {
    match value.as_integer() {
        Some(n) => Ok(Value::Integer(!n & 0xFF_FFFF)),
        None => Err(invalid_unary_operation("~", &value)),
    }
}

/// Numeric less-than; non-numeric operands fail.
pub fn compare_less(lhs: &Value, rhs: &Value) -> RunResult<bool> {
    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(invalid_operation("<", lhs, rhs));
    };
    Ok(a < b)
}

/// Numeric greater-than; non-numeric operands fail.
pub fn compare_greater(lhs: &Value, rhs: &Value) -> RunResult<bool> {
    let (Some(a), Some(b)) = (lhs.as_number(), rhs.as_number()) else {
        return Err(invalid_operation(">", lhs, rhs));
    };
    Ok(a > b)
}
