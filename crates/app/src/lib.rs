//! # homesync-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `BrokerLink`: raw publish/subscribe connection to a broker
//!   - `Transport`: connected session able to publish
//! - Provide the use-cases:
//!   - `TransportSession`: connect, subscribe, fan out inbound messages
//!   - `DeviceRegistry`: observable mirror of device state
//!   - `StateReconciler`: apply status messages to the registry
//!   - `CommandDispatcher`: validate and send commands
//!   - `insights`: energy summary and advice from a registry snapshot
//! - Provide **in-process infrastructure** (message bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `homesync-domain` only (plus `tokio` for tasks and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod dispatcher;
pub mod event_bus;
pub mod insights;
pub mod ports;
pub mod reconciler;
pub mod registry;
pub mod session;
