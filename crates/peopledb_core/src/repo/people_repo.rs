//! Person mapping for the generic CRUD engine.
//!
//! Every statement is declared explicitly except `count`, which comes from the
//! default provider.

use crate::model::person::Person;
use crate::repo::crud::{CrudRepository, EntityMapping};
use crate::repo::error::RepoResult;
use crate::repo::mapping::{canonical_timestamp, column, parse_canonical_timestamp};
use crate::repo::operation::CrudOperation;
use crate::repo::registry::StatementDeclarations;
use rusqlite::types::Value;
use rusqlite::Row;
use std::borrow::Cow;

const PERSON_SELECT_SQL: &str = "SELECT
    id,
    first_name,
    last_name,
    dob,
    salary_cents,
    email
FROM people";

const INSERT_PERSON_SQL: &str =
    "INSERT INTO people (first_name, last_name, dob, email) VALUES (?1, ?2, ?3, ?4);";

const UPDATE_PERSON_SQL: &str = "UPDATE people
    SET
        first_name = ?1,
        last_name = ?2,
        dob = ?3,
        salary_cents = ?4
    WHERE id = ?5;";

const DELETE_PERSON_SQL: &str = "DELETE FROM people WHERE id = ?1;";

const DELETE_PEOPLE_SQL: &str = "DELETE FROM people WHERE id IN (:ids);";

const COUNT_PEOPLE_SQL: &str = "SELECT COUNT(*) FROM people;";

/// Binder/decoder set for the `people` table.
#[derive(Debug, Clone, Copy)]
pub struct PersonMapping;

/// Generic repository specialised to `Person`.
pub type PeopleRepository<'conn> = CrudRepository<'conn, PersonMapping>;

impl EntityMapping for PersonMapping {
    type Entity = Person;

    const ENTITY_NAME: &'static str = "person";
    const INSERT_PARAM_COUNT: usize = 4;
    const UPDATE_PARAM_COUNT: usize = 4;

    fn declare_statements(statements: &mut StatementDeclarations) {
        statements
            .declare(CrudOperation::Create, INSERT_PERSON_SQL)
            .declare(
                CrudOperation::FindById,
                format!("{PERSON_SELECT_SQL} WHERE id = ?1;"),
            )
            .declare(
                CrudOperation::FindAll,
                format!("{PERSON_SELECT_SQL} ORDER BY id ASC;"),
            )
            .declare(CrudOperation::DeleteOne, DELETE_PERSON_SQL)
            .declare(CrudOperation::DeleteMany, DELETE_PEOPLE_SQL)
            .declare(CrudOperation::Update, UPDATE_PERSON_SQL);
    }

    fn default_statement(operation: CrudOperation) -> Option<Cow<'static, str>> {
        match operation {
            CrudOperation::Count => Some(Cow::Borrowed(COUNT_PEOPLE_SQL)),
            _ => None,
        }
    }

    fn decode(row: &Row<'_>) -> RepoResult<Person> {
        let dob_text: String = column(row, "dob")?;

        Ok(Person {
            id: Some(column(row, "id")?),
            first_name: column(row, "first_name")?,
            last_name: column(row, "last_name")?,
            dob: parse_canonical_timestamp(&dob_text)?,
            salary_cents: column(row, "salary_cents")?,
            email: column(row, "email")?,
        })
    }

    fn bind_insert(person: &Person) -> RepoResult<Vec<Value>> {
        Ok(vec![
            Value::Text(person.first_name.clone()),
            Value::Text(person.last_name.clone()),
            Value::Text(canonical_timestamp(&person.dob)?),
            optional_text(person.email.as_deref()),
        ])
    }

    fn bind_update(person: &Person) -> RepoResult<Vec<Value>> {
        Ok(vec![
            Value::Text(person.first_name.clone()),
            Value::Text(person.last_name.clone()),
            Value::Text(canonical_timestamp(&person.dob)?),
            person.salary_cents.map_or(Value::Null, Value::Integer),
        ])
    }
}

fn optional_text(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |text| Value::Text(text.to_string()))
}
