//! Generic CRUD engine driven by a statement registry and an entity mapping.
//!
//! # Responsibility
//! - Execute the seven repository operations for any `EntityMapping`.
//! - Delegate parameter binding and row decoding to the mapping.
//! - Report every outcome to the injected observer and return every failure.
//!
//! # Invariants
//! - Statements are resolved and validated when the repository is constructed.
//! - The engine alone writes entity identifiers, and only after a successful create.
//! - Update binds the identifier at slot `UPDATE_PARAM_COUNT + 1`.
//! - Multi-row delete binds every identifier as its own parameter.

use crate::model::entity::{Entity, EntityId};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::observer::{LogObserver, RepoEvent, RepoObserver, RepoOutcome};
use crate::repo::operation::CrudOperation;
use crate::repo::registry::{
    cached_registry, expand_ids_token, StatementDeclarations, StatementRegistry,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use std::any::TypeId;
use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

static LOG_OBSERVER: LogObserver = LogObserver;

/// Entity-specific half of a concrete repository.
///
/// Implementors supply statements and the pure binder/decoder functions the
/// engine calls for every operation. None of them may assign identifiers.
pub trait EntityMapping: 'static {
    type Entity: Entity;

    /// Short name used in errors and events.
    const ENTITY_NAME: &'static str;
    /// Number of values `bind_insert` produces.
    const INSERT_PARAM_COUNT: usize;
    /// Number of values `bind_update` produces; the id is bound right after them.
    const UPDATE_PARAM_COUNT: usize;

    /// Declares explicit statement text per operation.
    fn declare_statements(_statements: &mut StatementDeclarations) {}

    /// Fallback text for operations without a declaration.
    fn default_statement(_operation: CrudOperation) -> Option<Cow<'static, str>> {
        None
    }

    fn decode(row: &Row<'_>) -> RepoResult<Self::Entity>;
    fn bind_insert(entity: &Self::Entity) -> RepoResult<Vec<Value>>;
    fn bind_update(entity: &Self::Entity) -> RepoResult<Vec<Value>>;
}

/// Caller-facing repository operations.
pub trait Repository {
    type Entity: Entity;

    /// Persists a new entity and writes the generated id into it.
    fn create(&self, entity: &mut Self::Entity) -> RepoResult<EntityId>;
    /// Loads one entity, or `None` when no row has this id.
    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<Self::Entity>>;
    /// Loads every entity in store order.
    fn find_all(&self) -> RepoResult<Vec<Self::Entity>>;
    fn count(&self) -> RepoResult<u64>;
    /// Deletes one persisted entity and returns the affected row count.
    fn delete_one(&self, entity: &Self::Entity) -> RepoResult<usize>;
    /// Deletes all given entities; an empty slice executes nothing.
    ///
    /// Every id is bound as its own parameter, so one call accepts at most
    /// SQLite's host parameter limit (32766 for the bundled build). Larger
    /// inputs fail as `Db` before anything is deleted; split them across calls.
    fn delete_many(&self, entities: &[Self::Entity]) -> RepoResult<usize>;
    /// Writes the update-binder fields of a persisted entity.
    fn update(&self, entity: &Self::Entity) -> RepoResult<usize>;
}

/// SQLite-backed generic repository for mapping `M`.
pub struct CrudRepository<'conn, M: EntityMapping> {
    conn: &'conn Connection,
    statements: Arc<StatementRegistry>,
    observer: &'conn dyn RepoObserver,
    _mapping: PhantomData<M>,
}

impl<'conn, M: EntityMapping> CrudRepository<'conn, M> {
    /// Constructs a repository reporting to the `log` facade.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        Self::try_with_observer(conn, &LOG_OBSERVER)
    }

    /// Constructs a repository reporting to `observer`.
    ///
    /// A construction failure is passed to `observer.on_setup_failed` before it
    /// is returned.
    ///
    /// # Errors
    /// - Registry errors when statements are missing or declared twice.
    /// - `InvalidStatement` when a statement fails to prepare on `conn` or its
    ///   parameter count disagrees with the mapping.
    pub fn try_with_observer(
        conn: &'conn Connection,
        observer: &'conn dyn RepoObserver,
    ) -> RepoResult<Self> {
        match Self::prepare_statements(conn) {
            Ok(statements) => Ok(Self {
                conn,
                statements,
                observer,
                _mapping: PhantomData,
            }),
            Err(err) => {
                observer.on_setup_failed(M::ENTITY_NAME, &err);
                Err(err)
            }
        }
    }

    fn prepare_statements(conn: &Connection) -> RepoResult<Arc<StatementRegistry>> {
        let statements = cached_registry(TypeId::of::<M>(), || {
            let mut declarations = StatementDeclarations::default();
            M::declare_statements(&mut declarations);
            StatementRegistry::build(M::ENTITY_NAME, declarations, M::default_statement)
        })?;
        statements.validate(conn, M::INSERT_PARAM_COUNT, M::UPDATE_PARAM_COUNT)?;
        Ok(statements)
    }

    fn report<T>(
        &self,
        operation: CrudOperation,
        started_at: Instant,
        result: RepoResult<T>,
        outcome: impl FnOnce(&T) -> RepoOutcome,
    ) -> RepoResult<T> {
        let outcome = match &result {
            Ok(value) => outcome(value),
            Err(err) => RepoOutcome::Failed {
                code: err.code(),
                message: err.to_string(),
            },
        };
        self.emit(operation, started_at, outcome);
        result
    }

    fn emit(&self, operation: CrudOperation, started_at: Instant, outcome: RepoOutcome) {
        self.observer.on_event(&RepoEvent {
            entity: self.statements.entity(),
            operation,
            outcome,
            duration_ms: started_at.elapsed().as_millis(),
        });
    }

    fn execute_create(&self, entity: &M::Entity) -> RepoResult<EntityId> {
        if let Some(id) = entity.id() {
            return Err(RepoError::IdAlreadyAssigned(id));
        }

        let values = checked_params(
            CrudOperation::Create,
            M::bind_insert(entity)?,
            M::INSERT_PARAM_COUNT,
        )?;
        let mut stmt = self
            .conn
            .prepare_cached(self.statements.resolve(CrudOperation::Create))?;
        match stmt.insert(params_from_iter(values)) {
            Ok(id) => Ok(id),
            Err(rusqlite::Error::StatementChangedRows(changed)) => Err(RepoError::NotInserted {
                entity: M::ENTITY_NAME,
                changed,
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn execute_find_by_id(&self, id: EntityId) -> RepoResult<(Option<M::Entity>, usize)> {
        let mut stmt = self
            .conn
            .prepare_cached(self.statements.resolve(CrudOperation::FindById))?;
        let mut rows = stmt.query([id])?;

        let Some(row) = rows.next()? else {
            return Ok((None, 0));
        };
        let entity = M::decode(row)?;

        let mut discarded = 0;
        while rows.next()?.is_some() {
            discarded += 1;
        }

        Ok((Some(entity), discarded))
    }

    fn execute_find_all(&self) -> RepoResult<Vec<M::Entity>> {
        let mut stmt = self
            .conn
            .prepare_cached(self.statements.resolve(CrudOperation::FindAll))?;
        let mut rows = stmt.query([])?;
        let mut entities = Vec::new();

        while let Some(row) = rows.next()? {
            entities.push(M::decode(row)?);
        }

        Ok(entities)
    }

    fn execute_count(&self) -> RepoResult<u64> {
        let mut stmt = self
            .conn
            .prepare_cached(self.statements.resolve(CrudOperation::Count))?;
        let mut rows = stmt.query([])?;

        let Some(row) = rows.next()? else {
            return Ok(0);
        };
        let count: i64 = row
            .get(0)
            .map_err(|err| RepoError::Mapping(format!("count column: {err}")))?;
        u64::try_from(count)
            .map_err(|_| RepoError::Mapping(format!("count returned negative value {count}")))
    }

    fn execute_delete_one(&self, entity: &M::Entity) -> RepoResult<usize> {
        let id = entity
            .id()
            .ok_or(RepoError::MissingId(CrudOperation::DeleteOne))?;
        let mut stmt = self
            .conn
            .prepare_cached(self.statements.resolve(CrudOperation::DeleteOne))?;
        Ok(stmt.execute([id])?)
    }

    fn execute_delete_many(&self, ids: &[EntityId]) -> RepoResult<usize> {
        let sql = expand_ids_token(self.statements.resolve(CrudOperation::DeleteMany), ids.len());
        let mut stmt = self.conn.prepare(&sql)?;
        Ok(stmt.execute(params_from_iter(ids))?)
    }

    fn execute_update(&self, entity: &M::Entity) -> RepoResult<usize> {
        let id = entity
            .id()
            .ok_or(RepoError::MissingId(CrudOperation::Update))?;
        let mut values = checked_params(
            CrudOperation::Update,
            M::bind_update(entity)?,
            M::UPDATE_PARAM_COUNT,
        )?;
        values.push(Value::Integer(id));

        let mut stmt = self
            .conn
            .prepare_cached(self.statements.resolve(CrudOperation::Update))?;
        Ok(stmt.execute(params_from_iter(values))?)
    }
}

impl<M: EntityMapping> Repository for CrudRepository<'_, M> {
    type Entity = M::Entity;

    fn create(&self, entity: &mut M::Entity) -> RepoResult<EntityId> {
        let started_at = Instant::now();
        let result = self.execute_create(entity);
        if let Ok(id) = &result {
            entity.set_id(*id);
        }
        self.report(CrudOperation::Create, started_at, result, |id| {
            RepoOutcome::Created(*id)
        })
    }

    fn find_by_id(&self, id: EntityId) -> RepoResult<Option<M::Entity>> {
        let started_at = Instant::now();
        let result = self.execute_find_by_id(id);
        if let Ok((_, discarded)) = &result {
            if *discarded > 0 {
                self.emit(
                    CrudOperation::FindById,
                    started_at,
                    RepoOutcome::ExtraRowsDiscarded {
                        id,
                        discarded: *discarded,
                    },
                );
            }
        }
        self.report(CrudOperation::FindById, started_at, result, |(found, _)| {
            RepoOutcome::Loaded(usize::from(found.is_some()))
        })
        .map(|(found, _)| found)
    }

    fn find_all(&self) -> RepoResult<Vec<M::Entity>> {
        let started_at = Instant::now();
        let result = self.execute_find_all();
        self.report(CrudOperation::FindAll, started_at, result, |entities| {
            RepoOutcome::Loaded(entities.len())
        })
    }

    fn count(&self) -> RepoResult<u64> {
        let started_at = Instant::now();
        let result = self.execute_count();
        self.report(CrudOperation::Count, started_at, result, |count| {
            RepoOutcome::Counted(*count)
        })
    }

    fn delete_one(&self, entity: &M::Entity) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self.execute_delete_one(entity);
        self.report(CrudOperation::DeleteOne, started_at, result, |rows| {
            RepoOutcome::Affected(*rows)
        })
    }

    fn delete_many(&self, entities: &[M::Entity]) -> RepoResult<usize> {
        let started_at = Instant::now();
        if entities.is_empty() {
            self.emit(
                CrudOperation::DeleteMany,
                started_at,
                RepoOutcome::Skipped {
                    reason: "empty_input",
                },
            );
            return Ok(0);
        }

        let result = collect_delete_ids(entities).and_then(|ids| self.execute_delete_many(&ids));
        self.report(CrudOperation::DeleteMany, started_at, result, |rows| {
            RepoOutcome::Affected(*rows)
        })
    }

    fn update(&self, entity: &M::Entity) -> RepoResult<usize> {
        let started_at = Instant::now();
        let result = self.execute_update(entity);
        self.report(CrudOperation::Update, started_at, result, |rows| {
            RepoOutcome::Affected(*rows)
        })
    }
}

fn checked_params(
    operation: CrudOperation,
    values: Vec<Value>,
    expected: usize,
) -> RepoResult<Vec<Value>> {
    if values.len() != expected {
        return Err(RepoError::Mapping(format!(
            "{operation} binder produced {} values, expected {expected}",
            values.len()
        )));
    }
    Ok(values)
}

fn collect_delete_ids<E: Entity>(entities: &[E]) -> RepoResult<Vec<EntityId>> {
    entities
        .iter()
        .enumerate()
        .map(|(position, entity)| match entity.id() {
            Some(id) if id >= 0 => Ok(id),
            Some(id) => Err(RepoError::MalformedDeleteInput(format!(
                "entity at position {position} has negative id {id}"
            ))),
            None => Err(RepoError::MalformedDeleteInput(format!(
                "entity at position {position} has no id"
            ))),
        })
        .collect()
}
