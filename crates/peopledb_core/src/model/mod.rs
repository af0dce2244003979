//! Entity model shared by the generic repository engine.
//!
//! # Invariants
//! - Every managed record exposes an optional store-generated identifier.
//! - Identifiers are written by the repository engine only, once, on create.

pub mod entity;
pub mod person;
