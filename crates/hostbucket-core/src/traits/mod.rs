//! Core traits for hostname bucket management
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`HostnameApi`]: Read and change the hostnames attached to a property
//! - [`StateStore`]: Record what the last successful apply produced

pub mod hostname_api;
pub mod state_store;

pub use hostname_api::{HostnameApi, HostnameApiFactory};
pub use state_store::{AppliedState, StateStore};
