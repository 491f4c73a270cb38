//! The tool contract shared by the four SQL tools.
//!
//! Every call path ends in a `String`: failures are rendered by
//! [`Messages`] instead of being returned to the caller.

use crate::error::DbError;
use crate::tools::ToolKind;
use crate::tools::messages::Messages;
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::future::Future;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Machine-readable description of a tool for an agent runtime.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema of the arguments object.
    pub input_schema: JsonValue,
}

pub trait SqlTool: Send + Sync {
    type Args: DeserializeOwned + JsonSchema + Send;

    const KIND: ToolKind;

    fn messages(&self) -> Messages;

    /// Runtime the blocking path drives the async path on.
    fn runtime(&self) -> &Handle;

    /// Run the tool. Never fails; errors come back as text.
    fn call(&self, args: Self::Args) -> impl Future<Output = String> + Send;

    fn name(&self) -> &'static str {
        Self::KIND.name()
    }

    fn description(&self) -> &'static str {
        self.messages().description(Self::KIND)
    }

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name(),
            description: self.description(),
            input_schema: schemars::schema_for!(Self::Args).to_value(),
        }
    }

    /// Decode JSON arguments, then [`SqlTool::call`].
    fn call_json(&self, arguments: JsonValue) -> impl Future<Output = String> + Send {
        async move {
            match parse_args::<Self::Args>(arguments) {
                Ok(args) => self.call(args).await,
                Err(detail) => self.messages().invalid_arguments(Self::KIND, &detail),
            }
        }
    }

    /// Same result as [`SqlTool::call`], for callers without an async context.
    ///
    /// Inside a multi-thread runtime the current worker is handed off with
    /// `block_in_place`; a current-thread runtime cannot be re-entered and
    /// gets an error string.
    fn call_blocking(&self, args: Self::Args) -> String {
        run_blocking(self.runtime(), self.call(args)).unwrap_or_else(|e| {
            self.messages().error(Self::KIND, &e)
        })
    }
}

/// Decode tool arguments. A missing (`null`) argument object means "no arguments".
pub fn parse_args<T: DeserializeOwned>(arguments: JsonValue) -> Result<T, String> {
    let arguments = match arguments {
        JsonValue::Null => JsonValue::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| e.to_string())
}

pub(crate) fn run_blocking<F: Future>(handle: &Handle, fut: F) -> Result<F::Output, DbError> {
    match Handle::try_current() {
        Ok(current) if current.runtime_flavor() == RuntimeFlavor::CurrentThread => Err(
            DbError::internal("blocking calls are not supported on a current-thread runtime"),
        ),
        Ok(_) => Ok(tokio::task::block_in_place(|| handle.block_on(fut))),
        Err(_) => Ok(handle.block_on(fut)),
    }
}
