//! Repository adapters
//!
//! - **InMemoryBillingRepository**: process-local storage used by the CLI and tests

pub mod memory;

pub use memory::InMemoryBillingRepository;
