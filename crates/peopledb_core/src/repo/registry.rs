//! Per-mapping statement registry.
//!
//! # Responsibility
//! - Resolve query text for every `CrudOperation` from explicit declarations,
//!   falling back to the mapping's default provider.
//! - Validate resolved text against a live connection before first use.
//!
//! # Invariants
//! - A built registry holds exactly one statement per operation.
//! - Declared text always beats default text for the same operation.
//! - Registries are immutable and built at most once per mapping type.

use crate::repo::error::{RepoError, RepoResult};
use crate::repo::operation::CrudOperation;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use rusqlite::Connection;
use std::any::TypeId;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Token the delete-many statement carries in place of its identifier list.
pub const IDS_TOKEN: &str = ":ids";

static IDS_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":ids\b").expect("valid ids token regex"));

static REGISTRY_CACHE: Lazy<Mutex<HashMap<TypeId, Arc<StatementRegistry>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Where a resolved statement came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementSource {
    Declared,
    Default,
}

/// One resolved (operation, query text) pair.
#[derive(Debug, Clone)]
pub struct StatementEntry {
    pub operation: CrudOperation,
    pub sql: Cow<'static, str>,
    pub source: StatementSource,
}

/// Explicit statement declarations collected from a mapping at registry build time.
#[derive(Debug, Default)]
pub struct StatementDeclarations {
    entries: Vec<(CrudOperation, Cow<'static, str>)>,
}

impl StatementDeclarations {
    /// Declares query text for one operation.
    ///
    /// Declaring the same operation twice makes the registry build fail.
    pub fn declare(
        &mut self,
        operation: CrudOperation,
        sql: impl Into<Cow<'static, str>>,
    ) -> &mut Self {
        self.entries.push((operation, sql.into()));
        self
    }
}

/// Resolved statements for one mapping type, indexed by operation.
#[derive(Debug)]
pub struct StatementRegistry {
    entity: &'static str,
    entries: Vec<StatementEntry>,
}

impl StatementRegistry {
    /// Resolves all seven operations eagerly.
    ///
    /// # Errors
    /// - `DuplicateStatement` when one operation is declared twice.
    /// - `InvalidStatement` when resolved text is blank.
    /// - `StatementNotDefined` listing every operation with neither a declaration
    ///   nor default text.
    pub(crate) fn build(
        entity: &'static str,
        declarations: StatementDeclarations,
        default_statement: impl Fn(CrudOperation) -> Option<Cow<'static, str>>,
    ) -> RepoResult<Self> {
        let mut declared: [Option<Cow<'static, str>>; 7] = Default::default();
        for (operation, sql) in declarations.entries {
            let slot = &mut declared[operation.index()];
            if slot.is_some() {
                return Err(RepoError::DuplicateStatement { entity, operation });
            }
            *slot = Some(sql);
        }

        let mut entries = Vec::with_capacity(CrudOperation::ALL.len());
        let mut missing = Vec::new();
        for (operation, declared_sql) in CrudOperation::ALL.into_iter().zip(declared) {
            let entry = match declared_sql {
                Some(sql) => Some(StatementEntry {
                    operation,
                    sql,
                    source: StatementSource::Declared,
                }),
                None => default_statement(operation).map(|sql| StatementEntry {
                    operation,
                    sql,
                    source: StatementSource::Default,
                }),
            };

            match entry {
                Some(entry) if entry.sql.trim().is_empty() => {
                    return Err(RepoError::InvalidStatement {
                        entity,
                        operation,
                        reason: "statement text is empty".to_string(),
                    });
                }
                Some(entry) => entries.push(entry),
                None => missing.push(operation),
            }
        }

        if !missing.is_empty() {
            return Err(RepoError::StatementNotDefined { entity, missing });
        }

        Ok(Self { entity, entries })
    }

    pub(crate) fn entity(&self) -> &'static str {
        self.entity
    }

    pub(crate) fn entry(&self, operation: CrudOperation) -> &StatementEntry {
        &self.entries[operation.index()]
    }

    pub(crate) fn resolve(&self, operation: CrudOperation) -> &str {
        &self.entry(operation).sql
    }

    /// Prepares every statement on `conn` and checks its parameter count.
    ///
    /// Prepared statements stay in the connection cache for later calls.
    pub(crate) fn validate(
        &self,
        conn: &Connection,
        insert_params: usize,
        update_params: usize,
    ) -> RepoResult<()> {
        for entry in &self.entries {
            let operation = entry.operation;
            let expected = match operation {
                CrudOperation::Create => insert_params,
                CrudOperation::FindById | CrudOperation::DeleteOne => 1,
                CrudOperation::FindAll | CrudOperation::Count => 0,
                CrudOperation::Update => update_params + 1,
                CrudOperation::DeleteMany => 1,
            };

            let sql = if operation == CrudOperation::DeleteMany {
                let tokens = IDS_TOKEN_RE.find_iter(&entry.sql).count();
                if tokens != 1 {
                    return Err(self.invalid(
                        operation,
                        format!("expected exactly one `{IDS_TOKEN}` token, found {tokens}"),
                    ));
                }
                Cow::Owned(expand_ids_token(&entry.sql, 1))
            } else {
                Cow::Borrowed(&*entry.sql)
            };

            let stmt = conn
                .prepare_cached(&sql)
                .map_err(|err| self.invalid(operation, err.to_string()))?;
            let actual = stmt.parameter_count();
            if actual != expected {
                return Err(self.invalid(
                    operation,
                    format!("expected {expected} parameters, found {actual}"),
                ));
            }
        }

        Ok(())
    }

    fn invalid(&self, operation: CrudOperation, reason: String) -> RepoError {
        RepoError::InvalidStatement {
            entity: self.entity,
            operation,
            reason,
        }
    }
}

/// Replaces the `:ids` token with `count` positional markers.
pub(crate) fn expand_ids_token(sql: &str, count: usize) -> String {
    let markers = vec!["?"; count].join(", ");
    IDS_TOKEN_RE.replace(sql, NoExpand(&markers)).into_owned()
}

/// Returns the registry memoized for `key`, building it on first request.
///
/// Failed builds are not cached.
pub(crate) fn cached_registry(
    key: TypeId,
    build: impl FnOnce() -> RepoResult<StatementRegistry>,
) -> RepoResult<Arc<StatementRegistry>> {
    let mut cache = REGISTRY_CACHE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(registry) = cache.get(&key) {
        return Ok(Arc::clone(registry));
    }

    let registry = Arc::new(build()?);
    cache.insert(key, Arc::clone(&registry));
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::{
        cached_registry, expand_ids_token, StatementDeclarations, StatementRegistry,
        StatementSource,
    };
    use crate::repo::error::RepoError;
    use crate::repo::operation::CrudOperation;
    use rusqlite::Connection;
    use std::any::TypeId;
    use std::borrow::Cow;

    fn full_declarations() -> StatementDeclarations {
        let mut declarations = StatementDeclarations::default();
        declarations
            .declare(CrudOperation::Create, "INSERT INTO items (name) VALUES (?)")
            .declare(
                CrudOperation::FindById,
                "SELECT id, name FROM items WHERE id = ?",
            )
            .declare(CrudOperation::FindAll, "SELECT id, name FROM items")
            .declare(CrudOperation::Count, "SELECT COUNT(*) FROM items")
            .declare(CrudOperation::DeleteOne, "DELETE FROM items WHERE id = ?")
            .declare(
                CrudOperation::DeleteMany,
                "DELETE FROM items WHERE id IN (:ids)",
            )
            .declare(CrudOperation::Update, "UPDATE items SET name = ? WHERE id = ?");
        declarations
    }

    fn items_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE items (id INTEGER PRIMARY KEY, name TEXT NOT NULL);")
            .unwrap();
        conn
    }

    #[test]
    fn declared_statements_resolve_without_defaults() {
        let registry = StatementRegistry::build("item", full_declarations(), |_| None).unwrap();

        assert_eq!(
            registry.resolve(CrudOperation::Count),
            "SELECT COUNT(*) FROM items"
        );
        for operation in CrudOperation::ALL {
            assert_eq!(registry.entry(operation).source, StatementSource::Declared);
        }
    }

    #[test]
    fn declaration_wins_over_default_provider() {
        let registry = StatementRegistry::build("item", full_declarations(), |_| {
            Some(Cow::Borrowed("SELECT 'default'"))
        })
        .unwrap();

        assert_eq!(
            registry.resolve(CrudOperation::FindAll),
            "SELECT id, name FROM items"
        );
    }

    #[test]
    fn default_provider_fills_undeclared_operations() {
        let mut declarations = StatementDeclarations::default();
        declarations.declare(CrudOperation::Count, "SELECT COUNT(*) FROM items");

        let registry = StatementRegistry::build("item", declarations, |operation| {
            Some(Cow::Owned(format!("-- default {operation}")))
        })
        .unwrap();

        assert_eq!(
            registry.entry(CrudOperation::Count).source,
            StatementSource::Declared
        );
        assert_eq!(
            registry.entry(CrudOperation::Update).source,
            StatementSource::Default
        );
        assert_eq!(registry.resolve(CrudOperation::Update), "-- default update");
    }

    #[test]
    fn missing_operations_are_reported_together() {
        let mut declarations = StatementDeclarations::default();
        declarations.declare(CrudOperation::Count, "SELECT COUNT(*) FROM items");

        let err = StatementRegistry::build("item", declarations, |operation| {
            (operation == CrudOperation::FindAll).then_some(Cow::Borrowed("SELECT * FROM items"))
        })
        .unwrap_err();

        match err {
            RepoError::StatementNotDefined { entity, missing } => {
                assert_eq!(entity, "item");
                assert_eq!(
                    missing,
                    vec![
                        CrudOperation::Create,
                        CrudOperation::FindById,
                        CrudOperation::DeleteOne,
                        CrudOperation::DeleteMany,
                        CrudOperation::Update,
                    ]
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn duplicate_declaration_is_rejected() {
        let mut declarations = full_declarations();
        declarations.declare(CrudOperation::FindAll, "SELECT id, name FROM items ORDER BY id");

        let err = StatementRegistry::build("item", declarations, |_| None).unwrap_err();
        assert!(matches!(
            err,
            RepoError::DuplicateStatement {
                entity: "item",
                operation: CrudOperation::FindAll
            }
        ));
    }

    #[test]
    fn blank_statement_is_rejected() {
        let mut declarations = StatementDeclarations::default();
        declarations.declare(CrudOperation::Create, "   ");

        let err = StatementRegistry::build("item", declarations, |_| None).unwrap_err();
        assert!(matches!(
            err,
            RepoError::InvalidStatement {
                operation: CrudOperation::Create,
                ..
            }
        ));
    }

    #[test]
    fn expand_ids_token_emits_one_marker_per_id() {
        assert_eq!(
            expand_ids_token("DELETE FROM items WHERE id IN (:ids)", 3),
            "DELETE FROM items WHERE id IN (?, ?, ?)"
        );
        assert_eq!(
            expand_ids_token("DELETE FROM items WHERE id IN (:idsx)", 2),
            "DELETE FROM items WHERE id IN (:idsx)"
        );
    }

    #[test]
    fn validate_accepts_matching_parameter_counts() {
        let conn = items_connection();
        let registry = StatementRegistry::build("item", full_declarations(), |_| None).unwrap();

        registry.validate(&conn, 1, 1).unwrap();
    }

    #[test]
    fn validate_rejects_update_without_trailing_id_slot() {
        let conn = items_connection();
        let registry = StatementRegistry::build("item", full_declarations(), |_| None).unwrap();

        let err = registry.validate(&conn, 1, 2).unwrap_err();
        match err {
            RepoError::InvalidStatement {
                operation, reason, ..
            } => {
                assert_eq!(operation, CrudOperation::Update);
                assert!(reason.contains("expected 3 parameters, found 2"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_delete_many_without_token() {
        let conn = items_connection();
        let mut declarations = StatementDeclarations::default();
        declarations.declare(
            CrudOperation::DeleteMany,
            "DELETE FROM items WHERE id IN (?)",
        );
        let registry = StatementRegistry::build("item", declarations, |operation| {
            full_declarations()
                .entries
                .into_iter()
                .find(|(declared, _)| *declared == operation)
                .map(|(_, sql)| sql)
        })
        .unwrap();

        let err = registry.validate(&conn, 1, 1).unwrap_err();
        assert!(matches!(
            err,
            RepoError::InvalidStatement {
                operation: CrudOperation::DeleteMany,
                ..
            }
        ));
    }

    #[test]
    fn validate_reports_unpreparable_statement() {
        let conn = Connection::open_in_memory().unwrap();
        let registry = StatementRegistry::build("item", full_declarations(), |_| None).unwrap();

        let err = registry.validate(&conn, 1, 1).unwrap_err();
        match err {
            RepoError::InvalidStatement { reason, .. } => {
                assert!(reason.contains("no such table"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn cached_registry_builds_once_per_key() {
        struct Marker;
        let mut builds = 0;

        for _ in 0..3 {
            cached_registry(TypeId::of::<Marker>(), || {
                builds += 1;
                StatementRegistry::build("item", full_declarations(), |_| None)
            })
            .unwrap();
        }

        assert_eq!(builds, 1);
    }
}
