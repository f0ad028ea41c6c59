//! Use-case services.
//!
//! # Responsibility
//! - Expose request-scoped operations, each in its own transaction.
//! - Delegate data access to repository implementations.
//!
//! # Invariants
//! - A service call commits on success and rolls back on any error.

pub mod roster_service;
