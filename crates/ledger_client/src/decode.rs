//! Turns raw view results into typed snapshots.
//!
//! Every view result is a JSON array whose zeroth element is the payload. A
//! missing or `null` payload means "nothing there": an empty collection or
//! no entity. A payload of the wrong shape is a [`DecodeError`], never a
//! half-filled record.

use serde::de::DeserializeOwned;
use serde_json::Value;
use shared::{
    domain::{PaymentRecord, WorkItem},
    protocol::{JobResource, PaymentResource, ResourceError},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },
    #[error("malformed {entity}: {source}")]
    Malformed {
        entity: &'static str,
        source: serde_json::Error,
    },
    #[error("inconsistent {entity}: {source}")]
    Inconsistent {
        entity: &'static str,
        source: ResourceError,
    },
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn payload(mut results: Vec<Value>) -> Option<Value> {
    if results.is_empty() {
        return None;
    }
    match results.swap_remove(0) {
        Value::Null => None,
        value => Some(value),
    }
}

fn parse<R: DeserializeOwned>(entity: &'static str, value: Value) -> Result<R, DecodeError> {
    serde_json::from_value(value).map_err(|source| DecodeError::Malformed { entity, source })
}

fn collection<R: DeserializeOwned>(
    entity: &'static str,
    results: Vec<Value>,
) -> Result<Vec<R>, DecodeError> {
    match payload(results) {
        None => Ok(Vec::new()),
        Some(Value::Array(items)) => items.into_iter().map(|item| parse(entity, item)).collect(),
        Some(other) => Err(DecodeError::Shape {
            expected: "array",
            found: kind_of(&other),
        }),
    }
}

fn single<R: DeserializeOwned>(
    entity: &'static str,
    results: Vec<Value>,
) -> Result<Option<R>, DecodeError> {
    match payload(results) {
        None => Ok(None),
        // Views declared as returning `Option<T>` wrap the value in `vec`.
        Some(Value::Object(mut object)) if object.len() == 1 && object.contains_key("vec") => {
            match object.remove("vec") {
                Some(Value::Array(mut items)) if items.len() <= 1 => {
                    items.pop().map(|item| parse(entity, item)).transpose()
                }
                Some(other) => Err(DecodeError::Shape {
                    expected: "option with at most one value",
                    found: kind_of(&other),
                }),
                None => Ok(None),
            }
        }
        Some(value @ Value::Object(_)) => parse(entity, value).map(Some),
        Some(other) => Err(DecodeError::Shape {
            expected: "object",
            found: kind_of(&other),
        }),
    }
}

fn to_work_item(resource: JobResource) -> Result<WorkItem, DecodeError> {
    WorkItem::try_from(resource).map_err(|source| DecodeError::Inconsistent {
        entity: "job",
        source,
    })
}

pub fn jobs(results: Vec<Value>) -> Result<Vec<WorkItem>, DecodeError> {
    collection::<JobResource>("job", results)?
        .into_iter()
        .map(to_work_item)
        .collect()
}

pub fn job(results: Vec<Value>) -> Result<Option<WorkItem>, DecodeError> {
    single::<JobResource>("job", results)?
        .map(to_work_item)
        .transpose()
}

pub fn payments(results: Vec<Value>) -> Result<Vec<PaymentRecord>, DecodeError> {
    Ok(collection::<PaymentResource>("payment", results)?
        .into_iter()
        .map(PaymentRecord::from)
        .collect())
}

pub fn payment(results: Vec<Value>) -> Result<Option<PaymentRecord>, DecodeError> {
    Ok(single::<PaymentResource>("payment", results)?.map(PaymentRecord::from))
}

#[cfg(test)]
#[path = "tests/decode_tests.rs"]
mod tests;
