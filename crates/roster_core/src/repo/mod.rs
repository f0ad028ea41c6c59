//! Repository contracts over a session.
//!
//! # Responsibility
//! - Name the member and team queries the use-cases need.
//! - Express each one as a `Query` executed by the session.
//!
//! # Invariants
//! - Repositories never own a transaction; the borrowed session does.
//! - Writes go through `Session::persist` / `Session::update`, so entity
//!   validation and auditing always apply.

pub mod member_repo;
pub mod team_repo;
