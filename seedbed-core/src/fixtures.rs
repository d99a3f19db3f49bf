//! Hand-written records and context shared by unit tests.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::record::{
    AssignError, Collection, CollectionField, Entity, FieldData, FieldValue, Instance, Record, ScalarField,
    ToManyField, ToOneField, assign_many, assign_one, assign_scalar, construct_default,
};
use crate::schema::{Context, EntityRef, FieldKind, Schema, TypeDescription};

#[derive(Debug, Default)]
pub struct Role {
    pub name: String,
}

#[derive(Debug, Default)]
pub struct Location {
    pub city: String,
}

#[derive(Debug, Default)]
pub struct User {
    pub name: String,
    pub age: Option<i32>,
    pub home: Option<Arc<Location>>,
    pub roles: Vec<Arc<Role>>,
}

impl Record for Role {
    fn entity_name(&self) -> &'static str {
        Self::NAME
    }

    fn entity_type(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    fn assign(&mut self, field: &str, value: FieldValue) -> Result<(), AssignError> {
        match field {
            "Name" => self.name = assign_scalar(value)?,
            _ => return Err(AssignError::UnknownField(field.to_string())),
        }
        Ok(())
    }

    fn field_data(&self) -> Vec<(&'static str, FieldData)> {
        vec![("Name", FieldData::Scalar(self.name.to_scalar()))]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Entity for Role {
    const NAME: &'static str = "Role";

    fn describe() -> TypeDescription {
        TypeDescription::new::<Self>()
            .field("Name", FieldKind::Scalar(String::SCALAR_TYPE))
            .constructor(construct_default::<Self>)
    }
}

impl Record for Location {
    fn entity_name(&self) -> &'static str {
        Self::NAME
    }

    fn entity_type(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    fn assign(&mut self, field: &str, value: FieldValue) -> Result<(), AssignError> {
        match field {
            "City" => self.city = assign_scalar(value)?,
            _ => return Err(AssignError::UnknownField(field.to_string())),
        }
        Ok(())
    }

    fn field_data(&self) -> Vec<(&'static str, FieldData)> {
        vec![("City", FieldData::Scalar(self.city.to_scalar()))]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Entity for Location {
    const NAME: &'static str = "Location";

    fn describe() -> TypeDescription {
        TypeDescription::new::<Self>()
            .field("City", FieldKind::Scalar(String::SCALAR_TYPE))
            .constructor(construct_default::<Self>)
    }
}

impl Record for User {
    fn entity_name(&self) -> &'static str {
        Self::NAME
    }

    fn entity_type(&self) -> TypeId {
        TypeId::of::<Self>()
    }

    fn assign(&mut self, field: &str, value: FieldValue) -> Result<(), AssignError> {
        match field {
            "Name" => self.name = assign_scalar(value)?,
            "Age" => self.age = assign_scalar(value)?,
            "Home" => self.home = assign_one(value)?,
            "Roles" => self.roles = assign_many(value)?,
            _ => return Err(AssignError::UnknownField(field.to_string())),
        }
        Ok(())
    }

    fn field_data(&self) -> Vec<(&'static str, FieldData)> {
        vec![
            ("Name", FieldData::Scalar(self.name.to_scalar())),
            ("Age", FieldData::Scalar(self.age.to_scalar())),
            ("Home", FieldData::One(self.home.instance())),
            ("Roles", FieldData::Many(self.roles.instances())),
        ]
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn describe() -> TypeDescription {
        TypeDescription::new::<Self>()
            .field("Name", FieldKind::Scalar(String::SCALAR_TYPE))
            .field("Age", FieldKind::Scalar(<Option<i32>>::SCALAR_TYPE))
            .field("Home", FieldKind::ToOne(EntityRef::of::<Location>()))
            .field("Roles", FieldKind::ToMany(EntityRef::of::<Role>()))
            .constructor(construct_default::<Self>)
    }
}

#[derive(Debug, Default)]
pub struct Directory {
    pub roles: Collection<Role>,
    pub users: Collection<User>,
    pub motto: String,
}

impl Context for Directory {
    fn schema() -> Schema {
        Schema::new("Directory")
            .collection::<Role>("Roles")
            .collection::<User>("Users")
            .property("Motto", "String")
    }

    fn insert(&mut self, collection: &str, instance: Instance) -> Result<(), AssignError> {
        match collection {
            "Roles" => self.roles.insert_instance(instance),
            "Users" => self.users.insert_instance(instance),
            "Motto" => Err(AssignError::NotACollection(collection.to_string())),
            _ => Err(AssignError::UnknownField(collection.to_string())),
        }
    }
}

/// Two roles, one keyed, and a user referring to the keyed role.
pub const ROLES_AND_USERS: &str = r#"<?xml version="1.0"?>
<Directory>
  <Collections>
    <Roles>
      <Role key="admin"><Name>Admin</Name></Role>
      <Role><Name>Guest</Name></Role>
    </Roles>
    <Users>
      <User>
        <Name>Ada</Name>
        <Age>36</Age>
        <Home><City>London</City></Home>
        <Roles><Role usekey="admin"/></Roles>
      </User>
    </Users>
  </Collections>
  <Commands>
    <Command postinsert="true">after</Command>
    <Command>before</Command>
  </Commands>
</Directory>"#;
