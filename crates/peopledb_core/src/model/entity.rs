//! Minimal capability every repository-managed record satisfies.

/// Store-generated row identifier.
pub type EntityId = i64;

/// Record with an identifier assigned by the store on first persistence.
///
/// # Invariants
/// - `id()` is `None` until a create operation succeeds.
/// - `set_id` is called by the repository engine only, exactly once per record.
pub trait Entity {
    fn id(&self) -> Option<EntityId>;
    fn set_id(&mut self, id: EntityId);
}
