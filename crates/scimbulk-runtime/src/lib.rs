//! # scimbulk-runtime
//!
//! Resolves SCIM bulk requests whose operations reference each other through
//! `bulkId` temporary ids.
//!
//! A POST inside a bulk request may carry a `bulkId`; any other operation in
//! the same request may then write `bulkId:<token>` wherever the permanent id
//! of that resource belongs. This crate works out which operations depend on
//! which, rejects what can never be satisfied, executes the rest in a safe
//! order against a [`ResourceStore`] and reports one result per operation.
//!
//! ## Pipeline
//!
//! ```text
//! BulkRequest
//!       │
//!       ▼
//! ┌──────────────────────┐
//! │ 1. Normalize records │  ← batch shape checks
//! │ 2. Scan references   │  ← declared reference attributes
//! │ 3. Build graph       │  ← duplicate / dangling bulkIds
//! │ 4. Validate          │  ← reference cycles
//! │ 5. Schedule          │  ← ResourceStore, failOnErrors
//! │ 6. Aggregate         │
//! └──────────┬───────────┘
//!            │
//!            ▼
//! BulkResponse + ResolverMap
//! ```
//!
//! Batch-level problems ([`BulkError`]) reject the request before anything
//! executes. Everything else is recorded per operation ([`OperationError`])
//! and failures only ever propagate to operations that depend on them.
//!
//! ## Example Usage
//!
//! ```ignore
//! use scimbulk_core::ResolverConfig;
//! use scimbulk_runtime::{BulkResolver, InMemoryResourceStore};
//! use std::sync::Arc;
//!
//! let config = ResolverConfig::from_file("scimbulk.yaml")?;
//! let store = Arc::new(InMemoryResourceStore::new(&config.store));
//! let resolver = BulkResolver::new(config, store);
//!
//! let report = resolver.resolve_slice(&body).await?;
//! println!("{}", serde_json::to_string_pretty(report.response())?);
//! ```

pub mod aggregator;
pub mod context;
pub mod error;
pub mod graph;
pub mod record;
pub mod resolver;
pub mod resolver_map;
pub mod scanner;
pub mod scheduler;
pub mod store;
pub mod validator;

// Re-export main types
pub use aggregator::{aggregate, ResolutionReport};
pub use context::ResolutionContext;
pub use error::{BulkError, OperationError};
pub use graph::{DependencyGraph, NodeId};
pub use record::{OperationRecord, OperationState, Outcome, ResolvedResource, ResourcePath};
pub use resolver::BulkResolver;
pub use resolver_map::{Resolution, ResolverMap};
pub use scanner::{ReferenceScanner, Substituted};
pub use scheduler::Scheduler;
pub use store::{InMemoryResourceStore, ResourceStore, StoreError, StoreOutcome};
