//! Wire types exchanged with the invocation service: the unit-of-work descriptor sent on
//! dispatch, the envelope every invocation starts from, and the response envelope.

use std::fmt;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Method run when the inbound envelope does not name one.
pub const DEFAULT_METHOD: &str = "main";

/// `statusCode` of every successful invocation response.
pub const STATUS_OK: u16 = 200;

/// Stable name of a registered task: the unit it is defined in and its method name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub module: String,
    pub method: String,
}

impl TaskRef {
    pub fn new(module: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            method: method.into(),
        }
    }

    /// Starts a descriptor calling this task with no arguments.
    pub fn call(&self) -> TaskDescriptor {
        TaskDescriptor {
            module: self.module.clone(),
            method: self.method.clone(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.method)
    }
}

/// A task plus the arguments to call it with. Arguments are encoded to JSON as they are
/// added, so a descriptor always holds a payload that can be sent as is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    module: String,
    method: String,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl TaskDescriptor {
    /// Appends a positional argument.
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    /// Sets a named argument, replacing an earlier one with the same name.
    pub fn kwarg<T: Serialize + ?Sized>(mut self, name: &str, value: &T) -> Result<Self> {
        self.kwargs
            .insert(name.to_string(), serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn task(&self) -> TaskRef {
        TaskRef::new(self.module.clone(), self.method.clone())
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    pub fn kwargs(&self) -> &Map<String, Value> {
        &self.kwargs
    }

    /// The dispatch request payload, `{"module", "method", "args", "kwargs"}`.
    pub fn to_payload(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// The event every invocation starts from. A worker receives a full descriptor, the first
/// externally triggered invocation usually an empty object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvocationEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
}

impl InvocationEvent {
    pub fn from_payload(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

impl From<TaskDescriptor> for InvocationEvent {
    fn from(value: TaskDescriptor) -> Self {
        Self {
            module: Some(value.module),
            method: Some(value.method),
            args: value.args,
            kwargs: value.kwargs,
        }
    }
}

/// `{"statusCode": 200, "body": "<json text>"}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn ok<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self {
            status_code: STATUS_OK,
            body: serde_json::to_string(value)?,
        })
    }

    /// Decodes the JSON text in `body`.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Positional and named arguments a task was invoked with, decoded on access.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    positional: Vec<Value>,
    named: Map<String, Value>,
}

impl Arguments {
    pub fn new(positional: Vec<Value>, named: Map<String, Value>) -> Self {
        Self { positional, named }
    }

    pub fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let value = self
            .positional
            .get(index)
            .ok_or_else(|| Error::Argument(format!("missing positional argument {index}")))?;
        serde_json::from_value(value.clone())
            .map_err(|e| Error::Argument(format!("positional argument {index}: {e}")))
    }

    pub fn kwarg<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        self.kwarg_opt(name)?
            .ok_or_else(|| Error::Argument(format!("missing named argument {name:?}")))
    }

    pub fn kwarg_opt<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.named
            .get(name)
            .map(|value| {
                serde_json::from_value(value.clone())
                    .map_err(|e| Error::Argument(format!("named argument {name:?}: {e}")))
            })
            .transpose()
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named(&self) -> &Map<String, Value> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }
}
