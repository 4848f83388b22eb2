// crates/shardline-core/src/runtime/mod.rs
// ============================================================================
// Module: Shardline Runtime Helpers
// Description: Execution purge and scanner registration.
// Purpose: Compose store operations for map consumers.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime helpers sit on top of [`crate::ExecutionMapStore`] and never touch
//! a backend directly. Purge removes every map row of one execution; the
//! scanner registry describes the background workflows that consume the
//! store, handed explicitly to a worker at startup.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod purge;
pub mod scanner;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use purge::PurgeReport;
pub use purge::purge_execution_maps;
pub use scanner::ActivityRegistration;
pub use scanner::RegistrationError;
pub use scanner::RegistrationSink;
pub use scanner::RetryPolicy;
pub use scanner::ScannerRegistry;
pub use scanner::ScannerRegistryBuilder;
pub use scanner::WorkerOptions;
pub use scanner::WorkflowIdReusePolicy;
pub use scanner::WorkflowRegistration;
pub use scanner::WorkflowStartOptions;
