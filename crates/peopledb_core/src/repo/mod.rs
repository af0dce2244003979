//! Repository layer: statement resolution, the generic CRUD engine and its mappings.
//!
//! # Responsibility
//! - Resolve per-operation query text once per mapping type.
//! - Execute CRUD operations through entity-specific binders and decoders.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Repository APIs return every failure; observers receive a copy for diagnostics.
//! - A repository is only constructed when all seven statements resolve and prepare.

pub mod crud;
pub mod error;
pub mod mapping;
pub mod observer;
pub mod operation;
pub mod people_repo;
pub mod registry;
