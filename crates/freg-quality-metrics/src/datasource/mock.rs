//! Mock data source module for testing.
//!
//! This module provides a canned-response implementation of [`DataSource`]
//! for use in unit and integration tests.

use super::{DataSource, QueryDescriptor, Row};
use crate::errors::MetricsError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Mock data source for testing.
///
/// Responses are keyed by [`QueryDescriptor::name`]. A query with several
/// registered responses cycles through them; an unknown query returns no rows.
#[derive(Default)]
pub struct MockDataSource {
    /// Responses to return per query name (cycles through them).
    responses: HashMap<String, Vec<Vec<Row>>>,
    /// Total number of calls made.
    call_count: AtomicUsize,
    /// Calls made per query name.
    calls_by_name: Mutex<HashMap<String, usize>>,
    /// Query names that fail. Empty with `fail_all` false means none.
    failing: Vec<String>,
    /// Whether every query fails.
    fail_all: bool,
    /// Artificial latency per call.
    delay: Option<Duration>,
}

impl MockDataSource {
    /// Create a mock with no canned rows.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock where every query fails.
    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    /// Return `rows` for every call of the named query.
    pub fn with_rows(self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.with_responses(name, vec![rows])
    }

    /// Return the given responses in sequence for the named query.
    pub fn with_responses(mut self, name: impl Into<String>, responses: Vec<Vec<Row>>) -> Self {
        self.responses.insert(name.into(), responses);
        self
    }

    /// Make only the named query fail.
    pub fn failing_query(mut self, name: impl Into<String>) -> Self {
        self.failing.push(name.into());
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Get the number of calls made for one query name.
    pub fn calls_for(&self, name: &str) -> usize {
        self.calls_by_name
            .lock()
            .map(|calls| calls.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    fn record_call(&self, name: &str) -> usize {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.calls_by_name.lock() {
            Ok(mut calls) => {
                let count = calls.entry(name.to_string()).or_insert(0);
                *count += 1;
                *count - 1
            }
            Err(_) => 0,
        }
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn query(&self, query: &QueryDescriptor) -> Result<Vec<Row>, MetricsError> {
        let nth = self.record_call(&query.name);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_all || self.failing.iter().any(|name| name == &query.name) {
            return Err(MetricsError::DataSource(format!(
                "Mock data source error for {}",
                query.name
            )));
        }

        let rows = self
            .responses
            .get(&query.name)
            .filter(|responses| !responses.is_empty())
            // Cycle through responses
            .and_then(|responses| responses.get(nth % responses.len()))
            .cloned()
            .unwrap_or_default();
        Ok(rows)
    }
}
