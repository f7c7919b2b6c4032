//! AWS-oriented adapters and handlers for the compute farm.
//!
//! This crate owns runtime integration details (Lambda activity handlers,
//! the SWF activity worker, object-store adapters, the transfer job manager
//! and the local workflow driver) and exposes a single runtime module boundary for the contract,
//! split-path and storage key primitives.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod runtime;
pub mod transfer;
pub mod worker;
pub mod workflow;
