//! AWS-oriented adapters and handlers for the rac reconciliation pipeline.
//!
//! This crate owns runtime integration details (Lambda handlers, subprocess
//! adapters, and the seams to object and parameter storage) and re-exports
//! the domain primitives of `raclambda_core` under a single `runtime` module.

pub mod adapters;
pub mod handlers;

pub mod runtime {
    pub use raclambda_core::{commands, config, contract, delta, error};
}
