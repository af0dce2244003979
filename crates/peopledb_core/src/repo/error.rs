//! Repository error type shared by registry construction and CRUD execution.

use crate::db::DbError;
use crate::model::entity::EntityId;
use crate::repo::operation::CrudOperation;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Failure surfaced by a repository. Nothing is swallowed: every variant reaches
/// the caller and is also reported to the repository observer.
#[derive(Debug)]
pub enum RepoError {
    /// No declaration and no default text exists for these operations.
    StatementNotDefined {
        entity: &'static str,
        missing: Vec<CrudOperation>,
    },
    /// The same operation was declared more than once.
    DuplicateStatement {
        entity: &'static str,
        operation: CrudOperation,
    },
    /// Resolved text does not prepare, or its parameters disagree with the mapping.
    InvalidStatement {
        entity: &'static str,
        operation: CrudOperation,
        reason: String,
    },
    /// The store rejected a statement or its execution.
    Db(DbError),
    /// A row or entity shape the mapping cannot satisfy.
    Mapping(String),
    /// Identifier list for a multi-row delete is not usable.
    MalformedDeleteInput(String),
    /// Operation requires a persisted entity.
    MissingId(CrudOperation),
    /// Create was called on an entity the store already identified.
    IdAlreadyAssigned(EntityId),
    /// The create statement ran but did not insert exactly one row.
    NotInserted {
        entity: &'static str,
        changed: usize,
    },
}

impl RepoError {
    /// Stable machine-readable code for logs and observers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StatementNotDefined { .. } => "statement_not_defined",
            Self::DuplicateStatement { .. } => "duplicate_statement",
            Self::InvalidStatement { .. } => "invalid_statement",
            Self::Db(_) => "db_failure",
            Self::Mapping(_) => "mapping_failure",
            Self::MalformedDeleteInput(_) => "malformed_delete_input",
            Self::MissingId(_) => "missing_id",
            Self::IdAlreadyAssigned(_) => "id_already_assigned",
            Self::NotInserted { .. } => "not_inserted",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StatementNotDefined { entity, missing } => {
                let names: Vec<_> = missing.iter().map(|op| op.as_str()).collect();
                write!(
                    f,
                    "no statement defined for `{entity}` operations: {}",
                    names.join(", ")
                )
            }
            Self::DuplicateStatement { entity, operation } => write!(
                f,
                "statement for `{entity}` operation `{operation}` declared more than once"
            ),
            Self::InvalidStatement {
                entity,
                operation,
                reason,
            } => write!(
                f,
                "invalid statement for `{entity}` operation `{operation}`: {reason}"
            ),
            Self::Db(err) => write!(f, "{err}"),
            Self::Mapping(message) => write!(f, "mapping failure: {message}"),
            Self::MalformedDeleteInput(message) => {
                write!(f, "malformed delete input: {message}")
            }
            Self::MissingId(operation) => {
                write!(f, "operation `{operation}` requires an entity with an id")
            }
            Self::IdAlreadyAssigned(id) => write!(f, "entity already has id {id}"),
            Self::NotInserted { entity, changed } => write!(
                f,
                "create for `{entity}` changed {changed} rows, expected exactly one insert"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
