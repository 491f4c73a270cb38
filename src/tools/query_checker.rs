//! `sql_db_query_checker`.

use crate::db::QueryValidator;
use crate::tools::messages::Messages;
use crate::tools::query::QueryArgs;
use crate::tools::{SqlTool, ToolKind};
use tokio::runtime::Handle;
use tracing::{debug, warn};

pub struct QueryCheckerTool {
    validator: QueryValidator,
    messages: Messages,
    handle: Handle,
}

impl QueryCheckerTool {
    pub fn new(validator: QueryValidator, messages: Messages, handle: Handle) -> Self {
        Self {
            validator,
            messages,
            handle,
        }
    }
}

impl SqlTool for QueryCheckerTool {
    type Args = QueryArgs;

    const KIND: ToolKind = ToolKind::QueryChecker;

    fn messages(&self) -> Messages {
        self.messages
    }

    fn runtime(&self) -> &Handle {
        &self.handle
    }

    async fn call(&self, args: QueryArgs) -> String {
        match self.validator.validate(args.sql()).await {
            Ok(outcome) => {
                debug!(valid = outcome.is_valid(), "Query checked");
                self.messages.validation(&outcome)
            }
            Err(e) => {
                warn!(error = %e, "Query check failed");
                self.messages.error(Self::KIND, &e)
            }
        }
    }
}
