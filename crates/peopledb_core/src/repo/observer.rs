//! Structured reporting of repository outcomes.
//!
//! # Responsibility
//! - Describe every completed, skipped or failed repository operation as a value.
//! - Route those values to a caller-chosen sink instead of a fixed output.
//! - Report repositories that could not be constructed to the same sink.

use crate::model::entity::EntityId;
use crate::repo::error::RepoError;
use crate::repo::operation::CrudOperation;
use log::{error, info, warn};

/// Outcome of one repository operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    /// Create succeeded and the store generated this id.
    Created(EntityId),
    /// A read decoded this many entities.
    Loaded(usize),
    /// Count returned this value.
    Counted(u64),
    /// A write touched this many rows.
    Affected(usize),
    /// Nothing was executed.
    Skipped { reason: &'static str },
    /// A lookup by id matched more rows than the one returned.
    ExtraRowsDiscarded { id: EntityId, discarded: usize },
    /// The operation failed and the error was returned to the caller.
    Failed { code: &'static str, message: String },
}

/// One reported repository event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoEvent {
    pub entity: &'static str,
    pub operation: CrudOperation,
    pub outcome: RepoOutcome,
    pub duration_ms: u128,
}

/// Sink for repository events.
pub trait RepoObserver {
    fn on_event(&self, event: &RepoEvent);

    /// Called once when a repository for `entity` fails to construct; the same
    /// error is returned to the caller.
    fn on_setup_failed(&self, entity: &'static str, err: &RepoError);
}

/// Observer that writes events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

/// Observer that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl RepoObserver for LogObserver {
    fn on_event(&self, event: &RepoEvent) {
        let RepoEvent {
            entity,
            operation,
            outcome,
            duration_ms,
        } = event;

        match outcome {
            RepoOutcome::Created(id) => info!(
                "event=repo_op module=repo status=ok entity={entity} op={operation} id={id} duration_ms={duration_ms}"
            ),
            RepoOutcome::Loaded(rows) => info!(
                "event=repo_op module=repo status=ok entity={entity} op={operation} rows={rows} duration_ms={duration_ms}"
            ),
            RepoOutcome::Counted(count) => info!(
                "event=repo_op module=repo status=ok entity={entity} op={operation} count={count} duration_ms={duration_ms}"
            ),
            RepoOutcome::Affected(rows) => info!(
                "event=repo_op module=repo status=ok entity={entity} op={operation} affected_rows={rows} duration_ms={duration_ms}"
            ),
            RepoOutcome::Skipped { reason } => info!(
                "event=repo_op module=repo status=skipped entity={entity} op={operation} reason={reason}"
            ),
            RepoOutcome::ExtraRowsDiscarded { id, discarded } => warn!(
                "event=repo_extra_rows module=repo status=warn entity={entity} op={operation} id={id} discarded={discarded}"
            ),
            RepoOutcome::Failed { code, message } => error!(
                "event=repo_op module=repo status=error entity={entity} op={operation} duration_ms={duration_ms} error_code={code} error={message}"
            ),
        }
    }

    fn on_setup_failed(&self, entity: &'static str, err: &RepoError) {
        error!(
            "event=repo_setup module=repo status=error entity={entity} error_code={} error={err}",
            err.code()
        );
    }
}

impl RepoObserver for NoopObserver {
    fn on_event(&self, _event: &RepoEvent) {}

    fn on_setup_failed(&self, _entity: &'static str, _err: &RepoError) {}
}
