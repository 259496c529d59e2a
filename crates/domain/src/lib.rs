//! # homesync-domain
//!
//! Pure domain model for the homesync device-state synchronization client.
//!
//! ## Responsibilities
//! - Foundational types: device identifiers, error conventions, timestamps
//! - Define **Devices** with kind-specific attributes and partial updates
//! - Define **Status messages** (device → dashboard) and their decoding
//! - Define **Commands** (dashboard → device) and their validation
//! - Define the broker **topic namespace**
//! - Provide the built-in demo **fleet**
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod command;
pub mod device;
pub mod fleet;
pub mod status;
pub mod topic;
