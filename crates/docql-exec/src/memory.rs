//! In-memory transport: canned records per table, every call recorded.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use docql_core::document::{FindRequest, Pipeline, Transport};
use docql_core::error::{Error, Result};
use serde_json::Value as Json;

/// One call as the transport saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Find {
        request: FindRequest,
        master_key: bool,
    },
    Aggregate {
        table: String,
        pipeline: Pipeline,
        master_key: bool,
    },
}

#[derive(Debug, Default)]
pub struct MemoryTransport {
    records: HashMap<String, Vec<Json>>,
    calls: Mutex<Vec<Recorded>>,
    fail_with: Option<String>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call against `table` returns `records` unfiltered.
    pub fn with_records(mut self, table: impl Into<String>, records: Vec<Json>) -> Self {
        self.records.insert(table.into(), records);
        self
    }

    /// Every call fails with a transport error.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn calls(&self) -> Vec<Recorded> {
        self.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.lock().len()
    }

    fn respond(&self, table: &str, call: Recorded) -> Result<Vec<Json>> {
        self.lock().push(call);
        if let Some(msg) = &self.fail_with {
            return Err(Error::Transport(msg.clone()));
        }
        Ok(self.records.get(table).cloned().unwrap_or_default())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Recorded>> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Transport for MemoryTransport {
    fn find(&self, request: &FindRequest, use_master_key: bool) -> Result<Vec<Json>> {
        self.respond(
            &request.table,
            Recorded::Find {
                request: request.clone(),
                master_key: use_master_key,
            },
        )
    }

    fn aggregate(&self, table: &str, pipeline: &Pipeline, use_master_key: bool) -> Result<Vec<Json>> {
        self.respond(
            table,
            Recorded::Aggregate {
                table: table.to_string(),
                pipeline: pipeline.clone(),
                master_key: use_master_key,
            },
        )
    }
}
