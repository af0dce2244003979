//! Closed set of operations a generic repository supports.

use std::fmt::{Display, Formatter};

/// One of the seven repository actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CrudOperation {
    Create,
    FindById,
    FindAll,
    Count,
    DeleteOne,
    DeleteMany,
    Update,
}

impl CrudOperation {
    /// Every operation, in declaration order.
    pub const ALL: [CrudOperation; 7] = [
        Self::Create,
        Self::FindById,
        Self::FindAll,
        Self::Count,
        Self::DeleteOne,
        Self::DeleteMany,
        Self::Update,
    ];

    /// Stable snake_case name used in logs and error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::FindById => "find_by_id",
            Self::FindAll => "find_all",
            Self::Count => "count",
            Self::DeleteOne => "delete_one",
            Self::DeleteMany => "delete_many",
            Self::Update => "update",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl Display for CrudOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
