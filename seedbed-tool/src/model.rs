//! Example entities seeded from `ExampleContext.xml`.

use std::sync::Arc;

use seedbed_core::{Collection, Context, Entity};

#[derive(Debug, Default, Entity)]
pub struct Location {
    pub city: String,
    pub users: Vec<Arc<User>>,
}

#[derive(Debug, Default, Entity)]
pub struct Role {
    pub name: String,
    pub users: Vec<Arc<User>>,
}

#[derive(Debug, Default, Entity)]
pub struct User {
    pub name: String,
    pub age: i32,
    pub location: Option<Arc<Location>>,
    pub roles: Vec<Arc<Role>>,
}

#[derive(Default, Context)]
pub struct ExampleContext {
    pub users: Collection<User>,
    pub locations: Collection<Location>,
    pub roles: Collection<Role>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use seedbed_core::{FieldKind, SchemaOracle};

    #[test]
    fn schema_covers_all_three_collections() {
        let schema = ExampleContext::schema();
        assert_eq!(schema.schema_name(), "ExampleContext");
        assert_eq!(schema.type_count(), 3);
        for name in ["Users", "Locations", "Roles"] {
            assert!(schema.describe_collection(name).is_ok(), "{name}");
        }
        assert!(matches!(
            User::describe().field_kind("Location"),
            Some(FieldKind::ToOne(target)) if target.name() == "Location"
        ));
    }
}
