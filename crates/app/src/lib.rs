//! # plutocon-app
//!
//! Application layer — the beacon session and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `Transport` — the BLE stack: open links, discover, read, write
//!   - `SessionObserver` — receives lifecycle notifications
//! - Run the **connection state machine** (`connection`)
//! - Serialize GATT traffic through the **operation queue** (`operation`):
//!   one request in flight per link, advanced only by transport callbacks
//! - Expose the **session facade** (`session`) with typed getters and the
//!   fluent `Reader`/`Editor` batch builders
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Concurrency model
//! Everything here is synchronous and `&mut self`. Transport completions are
//! delivered as [`LinkEvent`](ports::transport::LinkEvent)s through
//! [`Session::handle_event`](session::Session::handle_event), from one
//! serialized stream owned by the caller.
//!
//! ## Dependency rule
//! Depends on `plutocon-domain` only (plus `tokio::sync` for the event bus).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod connection;
pub mod event_bus;
pub mod operation;
pub mod ports;
pub mod session;
pub mod write_policy;

#[cfg(test)]
pub(crate) mod test_support;

pub use session::Session;
