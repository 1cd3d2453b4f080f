//! Test stores shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use scimbulk_core::{BulkOperationRequest, BulkRequest, Method, ResolverConfig};
use scimbulk_runtime::{
    BulkResolver, InMemoryResourceStore, ResourceStore, StoreError, StoreOutcome,
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One call the resolver made to the store, after substitution.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub path: String,
    pub payload: Option<Value>,
}

type FailWhen = Box<dyn Fn(Method, &str) -> Option<StoreError> + Send + Sync>;

/// Wraps the in-memory store, records every call and fails the calls a
/// predicate selects.
pub struct RecordingStore {
    pub inner: InMemoryResourceStore,
    calls: Mutex<Vec<Call>>,
    fail_when: FailWhen,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::failing(|_, _| None)
    }

    pub fn failing(
        fail_when: impl Fn(Method, &str) -> Option<StoreError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: InMemoryResourceStore::default(),
            calls: Mutex::new(Vec::new()),
            fail_when: Box::new(fail_when),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.path).collect()
    }
}

#[async_trait]
impl ResourceStore for RecordingStore {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        version: Option<&str>,
    ) -> Result<StoreOutcome, StoreError> {
        self.calls.lock().unwrap().push(Call {
            method,
            path: path.to_string(),
            payload: payload.cloned(),
        });
        if let Some(err) = (self.fail_when)(method, path) {
            return Err(err);
        }
        self.inner.execute(method, path, payload, version).await
    }
}

/// Tracks how many store calls are in flight at once.
#[derive(Default)]
pub struct ConcurrencyGauge {
    inner: InMemoryResourceStore,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResourceStore for ConcurrencyGauge {
    async fn execute(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        version: Option<&str>,
    ) -> Result<StoreOutcome, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        // let the other futures of the wave start before this one finishes
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        let result = self.inner.execute(method, path, payload, version).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn resolver(store: Arc<dyn ResourceStore>) -> BulkResolver {
    BulkResolver::new(ResolverConfig::default(), store)
}

pub fn request(operations: Vec<BulkOperationRequest>) -> BulkRequest {
    BulkRequest::new(operations)
}

pub fn status_of(report: &scimbulk_runtime::ResolutionReport, index: usize) -> &str {
    &report.response().operations[index].status
}
