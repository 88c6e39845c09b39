//! # Refkeep Architecture
//!
//! Refkeep keeps a **schemaless document store referentially consistent**:
//! deleting a user, resolution, topic or journal entry removes everything that
//! hangs off it, denormalized comment counters stay in step with the comments
//! they count, and whatever a crash leaves behind can be found and repaired.
//!
//! The store offers per-batch atomicity and nothing more. Refkeep never
//! pretends otherwise: every multi-step operation is ordered so that an
//! interruption leaves only *orphans* (records whose referent is gone), and
//! every step is idempotent so the fix for an interruption is to run the same
//! operation again.
//!
//! ## The Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Admin CLI (refkeep-cli crate)                              │
//! │  - Parses arguments, renders outcomes, owns the terminal    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade, authorization for account closure           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - Cascade delete, comments, counters, orphan scan/repair   │
//! │  - Ordering, batching, timeouts, best-effort vs. mandatory  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - DocumentStore trait                                      │
//! │  - FileStore (JSON snapshot), InMemoryStore (testing)       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`thread`] sits beside the command layer: a pure function turning a flat
//! list of comments into a reply forest.
//!
//! ## No I/O Assumptions in Core
//!
//! From `api.rs` inward, code never writes to stdout or stderr and never
//! exits the process. Diagnostics go through `tracing`; the host installs a
//! subscriber (the CLI uses `tracing-subscriber`).
//!
//! ## Testing Strategy
//!
//! - **Commands**: `#[cfg(test)]` modules over `InMemoryStore`, seeded with
//!   [`store::memory::fixtures::StoreFixture`], with injected write failures,
//!   failing group queries and latency for the partial-failure paths.
//! - **Storage**: the file backend is exercised in `tests/` against temp dirs.
//! - **Scenarios**: end-to-end cascades and repairs live in `tests/`.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod thread;

#[cfg(feature = "test_utils")]
pub mod test_utils;

pub use api::RefkeepApi;
pub use error::{RefkeepError, Result};
