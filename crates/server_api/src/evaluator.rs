//! Pure arithmetic over validated operands.
//!
//! Every check happens before the arithmetic: a zero divisor is rejected by
//! comparing the operand, not by inspecting an infinite quotient.

use shared::{
    domain::{canonical_number, Operation},
    error::EvalError,
};

/// A successful evaluation, carrying the parsed operands alongside the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub operation: Operation,
    pub a: f64,
    pub b: f64,
    pub result: f64,
}

/// Parses untrusted operand text. Missing, empty, non-numeric, NaN and
/// infinite inputs are all `InvalidOperand`.
pub fn parse_operand(name: &'static str, raw: Option<&str>) -> Result<f64, EvalError> {
    let raw = raw.unwrap_or_default();
    let invalid = || EvalError::InvalidOperand {
        name,
        raw: raw.to_string(),
    };
    let value: f64 = raw.trim().parse().map_err(|_| invalid())?;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(canonical_number(value))
}

pub fn evaluate(operation: Operation, a: f64, b: f64) -> Result<f64, EvalError> {
    for (name, value) in [("a", a), ("b", b)] {
        if !value.is_finite() {
            return Err(EvalError::InvalidOperand {
                name,
                raw: value.to_string(),
            });
        }
    }

    let result = match operation {
        Operation::Add => a + b,
        Operation::Subtract => a - b,
        Operation::Multiply => a * b,
        Operation::Divide => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
    };

    if !result.is_finite() {
        return Err(EvalError::NonFiniteResult {
            operation: operation.as_str(),
        });
    }
    Ok(canonical_number(result))
}

/// Resolves the operation token first, then both operands, then evaluates.
pub fn evaluate_raw(
    token: &str,
    a: Option<&str>,
    b: Option<&str>,
) -> Result<Evaluation, EvalError> {
    let operation: Operation = token.parse()?;
    let a = parse_operand("a", a)?;
    let b = parse_operand("b", b)?;
    let result = evaluate(operation, a, b)?;
    Ok(Evaluation {
        operation,
        a,
        b,
        result,
    })
}
