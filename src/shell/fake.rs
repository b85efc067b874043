//! Fake Executor
//!
//! An executor that records every invocation and answers from a
//! caller-provided handler, for exercising command-building code in tests.

use crate::error::Result;
use crate::shell::executor::{CommandOutput, Executor, Invocation};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

pub type BoxedHandler = Box<dyn Fn(&Invocation) -> CommandOutput + Send + Sync>;

/// Executor which responds with scripted outputs
pub struct FakeExecutor {
    handler: Mutex<BoxedHandler>,
    calls: Mutex<Vec<Invocation>>,
}

impl FakeExecutor {
    /// Every command succeeds with empty output
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            handler: Mutex::new(Box::new(|_| CommandOutput::success(""))),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Respond to commands with `f`
    pub fn with_handler<F>(f: F) -> Arc<Self>
    where
        F: Fn(&Invocation) -> CommandOutput + Send + Sync + 'static,
    {
        let fake = Self::new();
        *fake.handler.lock() = Box::new(f);
        fake
    }

    /// Every command run so far, rendered as command lines
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(ToString::to_string).collect()
    }
}

#[async_trait]
impl Executor for FakeExecutor {
    async fn execute(&self, invocation: &Invocation) -> Result<CommandOutput> {
        self.calls.lock().push(invocation.clone());
        let handler = self.handler.lock();
        Ok((*handler)(invocation))
    }
}
