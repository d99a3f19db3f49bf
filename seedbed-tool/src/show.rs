//! Prints seeded locations with their users and roles.

use std::fmt::{self, Write as _};

use seedbed_core::{Key, Scalar, Store, StoreSink, StoredRecord, StoredValue};

use crate::error::ToolError;
use crate::model::ExampleContext;

#[derive(Debug, PartialEq)]
pub struct LocationView {
    pub city: String,
    pub users: Vec<UserView>,
}

#[derive(Debug, PartialEq)]
pub struct UserView {
    pub name: String,
    pub age: i32,
    pub roles: Vec<String>,
}

/// One block per location: the city, then a tab-indented line per user
/// and a triple-indented line per role, then a blank line.
pub fn render(locations: &[LocationView]) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for location in locations {
        writeln!(out, "{}", location.city)?;
        for user in &location.users {
            writeln!(out, "\t{} {}", user.name, user.age)?;
            for role in &user.roles {
                writeln!(out, "\t\t\t{role}")?;
            }
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn from_context(context: &ExampleContext) -> Vec<LocationView> {
    context
        .locations
        .iter()
        .map(|location| LocationView {
            city: location.city.clone(),
            users: location
                .users
                .iter()
                .map(|user| UserView {
                    name: user.name.clone(),
                    age: user.age,
                    roles: user.roles.iter().map(|role| role.name.clone()).collect(),
                })
                .collect(),
        })
        .collect()
}

pub fn from_store<S: Store>(sink: &StoreSink<S>) -> Result<Vec<LocationView>, ToolError> {
    let mut locations = Vec::new();
    for key in sink.collection_keys("Locations")? {
        let location = load(sink, &key, "Location")?;
        let mut users = Vec::new();
        for user_key in relation_keys(&location, "Users") {
            let user = load(sink, user_key, "User")?;
            let mut roles = Vec::new();
            for role_key in relation_keys(&user, "Roles") {
                roles.push(text(&load(sink, role_key, "Role")?, "Name"));
            }
            users.push(UserView {
                name: text(&user, "Name"),
                age: match user.field("Age") {
                    Some(StoredValue::Scalar(Scalar::I32(age))) => *age,
                    _ => 0,
                },
                roles,
            });
        }
        locations.push(LocationView {
            city: text(&location, "City"),
            users,
        });
    }
    Ok(locations)
}

fn load<S: Store>(sink: &StoreSink<S>, key: &Key, expected: &'static str) -> Result<StoredRecord, ToolError> {
    match sink.load(key)? {
        Some(record) if record.entity == expected => Ok(record),
        _ => Err(ToolError::UnexpectedRecord {
            key: key.to_string(),
            expected,
        }),
    }
}

fn relation_keys<'r>(record: &'r StoredRecord, field: &str) -> &'r [Key] {
    match record.field(field) {
        Some(StoredValue::Many(keys)) => keys,
        _ => &[],
    }
}

fn text(record: &StoredRecord, field: &str) -> String {
    match record.field(field) {
        Some(StoredValue::Scalar(scalar)) => scalar.to_string(),
        _ => String::new(),
    }
}
