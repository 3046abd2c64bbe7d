//! Actor-based daemon core
//!
//! Each long-lived concern runs as an independent async task communicating
//! via Tokio channels.
//!
//! ## Architecture Overview
//!
//! ```text
//!   ConfigStore ◄──── config.get / config.reload ────┐
//!        │ get() per tick                            │
//!        ▼                                           │
//!   MonitorActor ── watch ──► latest HealthSnapshot  │
//!        │                                           │
//!        │ broadcast TransitionEvent                 │
//!        ▼                                           │
//!   AlertActor ◄── acknowledge / dismiss / list ── Dispatcher ◄── IpcServer
//! ```
//!
//! ## Actor Types
//!
//! - **MonitorActor**: samples host resources on a periodic tick and emits
//!   status transition events
//! - **AlertActor**: owns all alert state; transitions and client lifecycle
//!   commands serialize through its mailbox
//!
//! ## Communication Patterns
//!
//! 1. **Commands**: each actor has an mpsc command channel for control messages
//! 2. **Events**: status transitions fan out over a broadcast channel
//! 3. **Request/Response**: oneshot channels for synchronous queries
//! 4. **Latest-value**: the health snapshot lives in a watch channel, so reads
//!    never block on the sampling loop

pub mod alert;
pub mod messages;
pub mod monitor;
