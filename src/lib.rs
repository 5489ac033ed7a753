//! Dideban - a self-hosted infrastructure monitoring engine
//!
//! A single process that periodically probes targets (HTTP endpoints,
//! ICMP hosts), ingests push metrics from remote agents, persists
//! outcomes, and dispatches alerts when conditions fire.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌─────────────────┐
//!                 │     Engine      │
//!                 └───┬─────────┬───┘
//!           schedules │         │ 30s liveness loop
//!        ┌────────────▼──┐   ┌──▼──────────────┐
//!        │   Scheduler   │   │  Agent liveness │
//!        │ (worker pool) │   │  (synthetic     │
//!        └──────┬────────┘   │   offline rows) │
//!               │ fires      └──┬──────────────┘
//!        ┌──────▼────────┐      │
//!        │  Dispatcher   │      │
//!        │  http │ ping  │      │
//!        └──────┬────────┘      │
//!               ▼               ▼
//!          observations ──► storage ──► alert evaluation ──► transport
//! ```
//!
//! The engine owns the scheduler and its jobs; entity records are owned by
//! storage and consumed by value. Every configuration document entering
//! the pipeline passes through [`storage::validators`] first.

pub mod alerts;
pub mod config;
pub mod engine;
pub mod probes;
pub mod scheduler;
pub mod storage;

pub use alerts::{AlertData, AlertSender};
pub use engine::Engine;
pub use probes::{Probe, ProbeDispatcher, ProbeError};
pub use scheduler::{ScheduledJob, Scheduler, SchedulerConfig};
pub use storage::{MemoryBackend, StorageBackend};
