//! Person record persisted in the `people` table.

use crate::model::entity::{Entity, EntityId};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// One row of the `people` table.
///
/// `dob` may carry any offset on input; repositories normalize it to UTC, so a
/// re-read record compares equal to the saved one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: Option<EntityId>,
    pub first_name: String,
    pub last_name: String,
    pub dob: DateTime<FixedOffset>,
    /// Salary in minor currency units. Never written on insert.
    pub salary_cents: Option<i64>,
    /// Contact address. Written on insert only; updates leave it untouched.
    pub email: Option<String>,
}

impl Person {
    /// Creates an unsaved person with no salary or email.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        dob: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            id: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            dob,
            salary_cents: None,
            email: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

impl Entity for Person {
    fn id(&self) -> Option<EntityId> {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }
}
