//! Arguments handed to a dispatched package.

use anyhow::{Context, Result};
use log::debug;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Error;

/// What the child receives as its single JSON argument.
///
/// `options` is flat: every value is a bool, number, string or null. An
/// absent optional positional keeps its slot as `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchPayload {
    pub command: String,
    pub args: Vec<Option<String>>,
    pub options: Map<String, Value>,
}

/// Keys that never reach the child.
fn is_private_key(key: &str) -> bool {
    key.starts_with('_') || key == "parent"
}

impl DispatchPayload {
    pub fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(Some(arg.into()));
        self
    }

    pub fn optional_arg<S: Into<String>>(mut self, arg: Option<S>) -> Self {
        self.args.push(arg.map(Into::into));
        self
    }

    /// Add one option. Private keys are dropped, nested values rejected.
    pub fn option(mut self, key: &str, value: impl Into<Value>) -> Result<Self> {
        self.insert_option(key, value.into())?;
        Ok(self)
    }

    /// Add every field of `options` as an option.
    pub fn with_options<T: Serialize>(mut self, options: &T) -> Result<Self> {
        let value = serde_json::to_value(options).context("Failed to serialize options")?;
        let Value::Object(fields) = value else {
            return Err(Error::Configuration("options must serialize to a map".into()).into());
        };
        for (key, value) in fields {
            self.insert_option(&key, value)?;
        }
        Ok(self)
    }

    fn insert_option(&mut self, key: &str, value: Value) -> Result<()> {
        if is_private_key(key) {
            debug!("Dropping private option '{}'", key);
            return Ok(());
        }
        if matches!(value, Value::Array(_) | Value::Object(_)) {
            return Err(Error::Configuration(format!(
                "option '{}' must be a bool, number, string or null",
                key
            ))
            .into());
        }
        self.options.insert(key.to_string(), value);
        Ok(())
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize dispatch payload")
    }
}
