//! Start conditions.
//!
//! Expression languages live outside this crate. Correlation only needs a
//! predicate over the published variables, so conditions are consumed through
//! the [`Condition`] trait. [`VariableCondition`] is a minimal built-in
//! predicate (one variable against one literal) used by the in-memory
//! registry and by hosts that do not plug in a full expression engine.

use crate::types::VariableMap;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::fmt;

/// A boolean predicate attached to a conditional start event.
pub trait Condition: Send + Sync {
    /// Evaluate against the published variables.
    ///
    /// `Ok(false)` means "not satisfied". `Err` is reserved for faults such
    /// as type mismatches.
    fn evaluate(&self, variables: &VariableMap) -> Result<bool>;

    /// Human-readable form for logs and debug output.
    fn describe(&self) -> String;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    /// Variable is present and not null. The operand is ignored.
    Exists,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Exists => "exists",
        };
        f.write_str(s)
    }
}

/// `variable <op> operand`, e.g. `orderAmount > 100`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VariableCondition {
    pub variable: String,
    pub op: CompareOp,
    pub operand: Value,
}

impl VariableCondition {
    pub fn new(variable: impl Into<String>, op: CompareOp, operand: impl Into<Value>) -> Self {
        Self {
            variable: variable.into(),
            op,
            operand: operand.into(),
        }
    }

    pub fn exists(variable: impl Into<String>) -> Self {
        Self::new(variable, CompareOp::Exists, Value::Null)
    }
}

impl Condition for VariableCondition {
    fn evaluate(&self, variables: &VariableMap) -> Result<bool> {
        // An unbound variable never satisfies a start condition.
        let Some(actual) = variables.get(&self.variable) else {
            return Ok(false);
        };

        match self.op {
            CompareOp::Exists => Ok(!actual.is_null()),
            CompareOp::Eq => Ok(json_eq(actual, &self.operand)),
            CompareOp::Ne => Ok(!json_eq(actual, &self.operand)),
            CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le => {
                let ord = json_cmp(actual, &self.operand).ok_or_else(|| {
                    anyhow!(
                        "cannot compare '{}' ({}) with {} using {}",
                        self.variable,
                        actual,
                        self.operand,
                        self.op
                    )
                })?;
                Ok(match self.op {
                    CompareOp::Gt => ord == Ordering::Greater,
                    CompareOp::Ge => ord != Ordering::Less,
                    CompareOp::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                })
            }
        }
    }

    fn describe(&self) -> String {
        match self.op {
            CompareOp::Exists => format!("{} exists", self.variable),
            op => format!("{} {} {}", self.variable, op, self.operand),
        }
    }
}

/// Equality where `500` and `500.0` are the same number.
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => json_cmp(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

fn json_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number_cmp(x, y),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Integers compare exactly; `f64` is used only when one side is a float.
fn number_cmp(x: &Number, y: &Number) -> Option<Ordering> {
    match (x.as_i64(), x.as_u64(), y.as_i64(), y.as_u64()) {
        (Some(a), _, Some(b), _) => Some(a.cmp(&b)),
        (_, Some(a), _, Some(b)) => Some(a.cmp(&b)),
        // a negative integer against one above i64::MAX
        (Some(_), None, None, Some(_)) => Some(Ordering::Less),
        (None, Some(_), Some(_), None) => Some(Ordering::Greater),
        _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
    }
}
