//! Test doubles shared by unit tests across the crate.

use crate::database::{QueryExecutor, QueryResult};
use crate::error::{DatabaseError, DbResult, Result};
use crate::protocol::Tool;
use crate::tools::{CallOrigin, ContextProvider, ToolContext, ToolHandler};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Executor that records every statement and answers with canned data.
#[derive(Default)]
pub struct RecordingExecutor {
    statements: Mutex<Vec<String>>,
    next_result: Mutex<Option<QueryResult>>,
    fail_with: Mutex<Option<String>>,
}

impl RecordingExecutor {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    pub fn last_statement(&self) -> Option<String> {
        self.statements.lock().last().cloned()
    }

    pub fn respond_with(&self, result: QueryResult) {
        *self.next_result.lock() = Some(result);
    }

    pub fn fail_next(&self, message: impl Into<String>) {
        *self.fail_with.lock() = Some(message.into());
    }

    fn record(&self, sql: &str) -> DbResult<()> {
        self.statements.lock().push(sql.to_string());
        match self.fail_with.lock().take() {
            Some(message) => Err(DatabaseError::QueryFailed(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl QueryExecutor for RecordingExecutor {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn query(&self, sql: &str, _limit: Option<u32>, _timeout: Duration) -> DbResult<QueryResult> {
        self.record(sql)?;
        Ok(self.next_result.lock().take().unwrap_or_default())
    }

    async fn execute(&self, sql: &str, _timeout: Duration) -> DbResult<u64> {
        self.record(sql)?;
        Ok(1)
    }

    async fn transaction(&self, statements: &[String], _timeout: Duration) -> DbResult<Vec<u64>> {
        for statement in statements {
            self.record(statement)?;
        }
        Ok(vec![1; statements.len()])
    }
}

pub fn recording_context() -> (ToolContext, Arc<RecordingExecutor>) {
    let executor = Arc::new(RecordingExecutor::default());
    let ctx = ToolContext::new(executor.clone());
    (ctx, executor)
}

/// Context provider backed by a [`RecordingExecutor`], counting handed-out contexts.
pub struct RecordingProvider {
    pub executor: Arc<RecordingExecutor>,
    issued: AtomicU64,
}

impl RecordingProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            executor: Arc::new(RecordingExecutor::default()),
            issued: AtomicU64::new(0),
        })
    }

    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::SeqCst)
    }
}

impl ContextProvider for RecordingProvider {
    fn tool_context(&self, origin: CallOrigin) -> ToolContext {
        let id = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        ToolContext::new(self.executor.clone())
            .with_origin(origin)
            .with_request_id(id)
    }
}

/// Tool returning its own name and the parameters it received.
pub struct EchoTool {
    name: &'static str,
    group: &'static str,
}

impl EchoTool {
    pub fn new(name: &'static str, group: &'static str) -> Self {
        Self { name, group }
    }
}

#[async_trait]
impl ToolHandler for EchoTool {
    fn definition(&self) -> Tool {
        Tool {
            name: self.name.into(),
            description: Some("Echo parameters".into()),
            input_schema: json!({"type": "object"}),
        }
    }

    fn group(&self) -> &'static str {
        self.group
    }

    async fn execute(&self, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        Ok(json!({
            "tool": self.name,
            "params": arguments,
            "request_id": ctx.request_id,
        }))
    }
}

/// Tool that always fails with the given message.
pub struct FailingTool {
    name: &'static str,
    group: &'static str,
}

impl FailingTool {
    pub fn new(name: &'static str, group: &'static str) -> Self {
        Self { name, group }
    }
}

#[async_trait]
impl ToolHandler for FailingTool {
    fn definition(&self) -> Tool {
        Tool {
            name: self.name.into(),
            description: None,
            input_schema: json!({"type": "object"}),
        }
    }

    fn group(&self) -> &'static str {
        self.group
    }

    async fn execute(&self, _arguments: Value, _ctx: &ToolContext) -> Result<Value> {
        Err(DatabaseError::QueryFailed(format!("{} failed", self.name)).into())
    }
}
