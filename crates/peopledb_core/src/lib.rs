//! Generic SQLite data-access core for PeopleDB.
//! Resolves per-operation statements once per entity mapping and runs CRUD
//! operations through entity-specific binders and decoders.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::entity::{Entity, EntityId};
pub use model::person::Person;
pub use repo::crud::{CrudRepository, EntityMapping, Repository};
pub use repo::error::{RepoError, RepoResult};
pub use repo::observer::{LogObserver, NoopObserver, RepoEvent, RepoObserver, RepoOutcome};
pub use repo::operation::CrudOperation;
pub use repo::people_repo::{PeopleRepository, PersonMapping};
pub use repo::registry::{StatementDeclarations, IDS_TOKEN};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
