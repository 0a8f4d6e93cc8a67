//! Shared reconciliation-cycle domain primitives.
//!
//! This crate owns the trigger envelope contract, handler configuration,
//! error taxonomy, auxiliary-state delta detection, and the argument
//! layouts of the external conversion and sync tools. It intentionally
//! excludes AWS SDK, Lambda runtime, and process-spawning concerns.

pub mod commands;
pub mod config;
pub mod contract;
pub mod delta;
pub mod error;
