#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, TimeZone};
use peopledb_core::{CrudOperation, Person, RepoError, RepoEvent, RepoObserver, RepoOutcome};
use std::cell::RefCell;

/// Observer that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingObserver {
    events: RefCell<Vec<RepoEvent>>,
    setup_failures: RefCell<Vec<(&'static str, &'static str)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<RepoEvent> {
        self.events.borrow().clone()
    }

    /// `(entity, error code)` for every failed construction.
    pub fn setup_failures(&self) -> Vec<(&'static str, &'static str)> {
        self.setup_failures.borrow().clone()
    }

    pub fn outcomes_for(&self, operation: CrudOperation) -> Vec<RepoOutcome> {
        self.events
            .borrow()
            .iter()
            .filter(|event| event.operation == operation)
            .map(|event| event.outcome.clone())
            .collect()
    }
}

impl RepoObserver for RecordingObserver {
    fn on_event(&self, event: &RepoEvent) {
        self.events.borrow_mut().push(event.clone());
    }

    fn on_setup_failed(&self, entity: &'static str, error: &RepoError) {
        self.setup_failures
            .borrow_mut()
            .push((entity, error.code()));
    }
}

pub fn at_offset(
    offset_hours: i32,
    (year, month, day): (i32, u32, u32),
    (hour, minute, second): (u32, u32, u32),
) -> DateTime<FixedOffset> {
    FixedOffset::east_opt(offset_hours * 3600)
        .unwrap()
        .with_ymd_and_hms(year, month, day, hour, minute, second)
        .unwrap()
}

pub fn person(first_name: &str, last_name: &str) -> Person {
    Person::new(
        first_name,
        last_name,
        at_offset(-6, (1980, 11, 15), (15, 15, 0)),
    )
}
