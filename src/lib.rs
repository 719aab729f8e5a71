//! # OneAgentAPM Controller
//!
//! Library crate behind the controller binary.
//!
//! - `crd` - the `OneAgentAPM` resource and its condition store
//! - `dtclient` - Dynatrace token lookup, client factory and scope validation
//! - `store` - object store abstraction over the Kubernetes API
//! - `controller` - the reconciler, backoff and HTTP server
//! - `runtime` - initialization, watch loop and error policy
//! - `config` - environment-driven settings

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod dtclient;
pub mod observability;
pub mod runtime;
pub mod store;

pub use crd::*;
