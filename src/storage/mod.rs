//! Persistence layer: entities, validation, and the storage port
//!
//! This module provides a trait-based abstraction over durable storage.
//! The engine consumes only the narrow [`StorageBackend`] port; entities
//! are plain values defined in [`schema`], and every document headed for
//! storage passes through [`validators`] first.
//!
//! ## Design
//!
//! - **Trait-based**: `StorageBackend` allows swapping implementations
//! - **Async**: all operations are async for compatibility with Tokio
//! - **Validated at the edge**: validators normalize in place and produce
//!   canonical config JSON, so probes re-parse exactly what was stored

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
pub mod validators;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use schema::{
    Admin, Agent, AgentHistory, AgentStatus, Alert, AlertCondition, AlertDeliveryStatus,
    AlertHistory, AlertKind, Check, CheckHistory, CheckKind, CheckStatus,
};
pub use validators::{ValidationError, ValidationResult};
