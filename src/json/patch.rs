//! Patch operations and the reference application semantics.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::{ResourceError, ResourceResult};
use crate::json::JsonPointer;

/// Patch operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
    Increment,
}

impl fmt::Display for PatchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PatchOp::Add => "add",
            PatchOp::Remove => "remove",
            PatchOp::Replace => "replace",
            PatchOp::Increment => "increment",
        })
    }
}

/// One step of a patch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
    pub operation: PatchOp,
    pub field: JsonPointer,
    #[serde(default)]
    pub value: Value,
}

impl PatchOperation {
    pub fn add(field: impl Into<JsonPointer>, value: Value) -> Self {
        Self::new(PatchOp::Add, field, value)
    }

    /// Remove the whole field.
    pub fn remove(field: impl Into<JsonPointer>) -> Self {
        Self::new(PatchOp::Remove, field, Value::Null)
    }

    /// Remove matching values from the field.
    pub fn remove_value(field: impl Into<JsonPointer>, value: Value) -> Self {
        Self::new(PatchOp::Remove, field, value)
    }

    pub fn replace(field: impl Into<JsonPointer>, value: Value) -> Self {
        Self::new(PatchOp::Replace, field, value)
    }

    pub fn increment(field: impl Into<JsonPointer>, amount: impl Into<Number>) -> Self {
        Self::new(PatchOp::Increment, field, Value::Number(amount.into()))
    }

    fn new(operation: PatchOp, field: impl Into<JsonPointer>, value: Value) -> Self {
        Self {
            operation,
            field: field.into(),
            value,
        }
    }
}

/// Apply `operations` in order to `content`.
///
/// - add: set the field
/// - remove: null value drops the field; otherwise drop matching array
///   elements, or the field itself if its single value matches
/// - replace: remove, then set unless the value is null
/// - increment: add to a number, or to every element of an array of numbers
pub fn apply_patch(content: &mut Value, operations: &[PatchOperation]) -> ResourceResult<()> {
    for op in operations {
        match op.operation {
            PatchOp::Add => op.field.put(content, op.value.clone())?,
            PatchOp::Remove => remove(content, op),
            PatchOp::Replace => {
                op.field.remove(content);
                if !op.value.is_null() {
                    op.field.put(content, op.value.clone())?;
                }
            }
            PatchOp::Increment => increment(content, op)?,
        }
    }
    Ok(())
}

fn remove(content: &mut Value, op: &PatchOperation) {
    if op.value.is_null() {
        op.field.remove(content);
        return;
    }
    let single_match = match op.field.get_mut(content) {
        Some(Value::Array(items)) => {
            items.retain(|item| item != &op.value);
            false
        }
        Some(existing) => *existing == op.value,
        None => false,
    };
    if single_match {
        op.field.remove(content);
    }
}

fn increment(content: &mut Value, op: &PatchOperation) -> ResourceResult<()> {
    let Value::Number(amount) = &op.value else {
        return Err(ResourceError::BadRequest(format!(
            "The increment amount for field '{}' is not a number",
            op.field
        )));
    };
    let not_a_number = || ResourceError::BadRequest(format!("The field '{}' is not a number", op.field));

    match op.field.get_mut(content) {
        None => Err(ResourceError::BadRequest(format!(
            "The field '{}' does not exist",
            op.field
        ))),
        Some(Value::Array(items)) => {
            for item in items.iter_mut() {
                *item = add_numbers(item, amount).ok_or_else(not_a_number)?;
            }
            Ok(())
        }
        Some(existing) => {
            *existing = add_numbers(existing, amount).ok_or_else(not_a_number)?;
            Ok(())
        }
    }
}

/// Integer arithmetic when both sides are integers, float otherwise.
fn add_numbers(value: &Value, amount: &Number) -> Option<Value> {
    let Value::Number(n) = value else {
        return None;
    };
    if let (Some(a), Some(b)) = (n.as_i64(), amount.as_i64()) {
        return a.checked_add(b).map(Value::from);
    }
    let sum = n.as_f64()? + amount.as_f64()?;
    Number::from_f64(sum).map(Value::Number)
}
