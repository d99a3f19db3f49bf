use indexmap::IndexMap;

use crate::builder::EntityBuilder;
use crate::document::Node;
use crate::error::SeedError;
use crate::references::ReferenceTable;
use crate::schema::SchemaOracle;
use crate::sink::RecordSink;

/// What a materialization run inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    /// Top-level instances inserted per collection, in document order.
    pub inserted: IndexMap<String, usize>,
    /// Keys defined during the run.
    pub keys: usize,
}

impl MaterializeReport {
    pub fn total(&self) -> usize {
        self.inserted.values().sum()
    }
}

/// Builds every element of every collection under `collections` and
/// inserts it through `sink`, then commits once.
///
/// The commit happens even when the section has no collections.
pub fn materialize<O, S>(collections: &Node, oracle: &O, sink: &mut S) -> Result<MaterializeReport, SeedError>
where
    O: SchemaOracle + ?Sized,
    S: RecordSink + ?Sized,
{
    let mut references = ReferenceTable::new();
    let mut report = MaterializeReport::default();

    for section in collections.children() {
        let collection = oracle.describe_collection(section.name())?;
        let element = collection.element();
        let description = oracle
            .describe_type(element.type_id())
            .ok_or_else(|| SeedError::UnregisteredType {
                entity: element.name().to_string(),
            })?;
        log::debug!(
            "materializing {} {} into \"{}\"",
            section.children().len(),
            element.name(),
            collection.name()
        );

        let mut builder = EntityBuilder::new(oracle, &mut references);
        for node in section.children() {
            let instance = builder.build(description, node)?;
            sink.insert(collection, instance)
                .map_err(|err| SeedError::sink(format!("insert into \"{}\"", collection.name()), err))?;
        }
        *report.inserted.entry(collection.name().to_string()).or_default() += section.children().len();
    }

    report.keys = references.len();
    log::debug!("committing {} instances", report.total());
    sink.commit().map_err(|err| SeedError::sink("commit", err))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::fixtures::{Directory, ROLES_AND_USERS};
    use crate::schema::Context;
    use crate::sink::{MemorySink, SinkEvent};
    use std::sync::Arc;

    fn run(text: &str) -> (Result<MaterializeReport, SeedError>, MemorySink<Directory>) {
        let document = Document::parse(text).unwrap();
        let schema = Directory::schema();
        let mut sink = MemorySink::new(Directory::default());
        let result = materialize(document.collections().unwrap(), &schema, &mut sink);
        (result, sink)
    }

    #[test]
    fn referenced_role_is_the_same_instance() {
        let (result, sink) = run(ROLES_AND_USERS);
        let report = result.unwrap();
        assert_eq!(report.inserted.get("Roles"), Some(&2));
        assert_eq!(report.inserted.get("Users"), Some(&1));
        assert_eq!(report.keys, 1);

        let directory = sink.context();
        assert_eq!(directory.roles.len(), 2);
        assert_eq!(directory.users.len(), 1);
        let user = directory.users.get(0).unwrap();
        assert_eq!(user.roles.len(), 1);
        assert!(Arc::ptr_eq(&user.roles[0], directory.roles.get(0).unwrap()));
        assert_eq!(user.home.as_ref().unwrap().city, "London");
        assert_eq!(user.age, Some(36));
    }

    #[test]
    fn empty_section_still_commits() {
        let (result, sink) = run("<Directory><Collections/></Directory>");
        assert_eq!(result.unwrap().total(), 0);
        assert_eq!(sink.commits(), 1);
        assert_eq!(sink.journal(), &[SinkEvent::Commit { inserted: 0 }]);
    }

    #[test]
    fn inserts_precede_the_single_commit() {
        let (result, sink) = run(ROLES_AND_USERS);
        result.unwrap();
        let journal = sink.journal();
        assert_eq!(journal.len(), 4);
        assert!(matches!(&journal[0], SinkEvent::Insert { collection, entity: "Role" } if collection == "Roles"));
        assert!(matches!(&journal[2], SinkEvent::Insert { entity: "User", .. }));
        assert_eq!(journal[3], SinkEvent::Commit { inserted: 3 });
    }

    #[test]
    fn unknown_collection_aborts_before_commit() {
        let (result, sink) = run("<Directory><Collections><Groups><Group/></Groups></Collections></Directory>");
        assert!(matches!(
            result,
            Err(SeedError::UnknownCollection { collection, schema }) if collection == "Groups" && schema == "Directory"
        ));
        assert_eq!(sink.commits(), 0);
    }

    #[test]
    fn property_member_is_not_a_collection() {
        let (result, _) = run("<Directory><Collections><Motto/></Collections></Directory>");
        assert!(matches!(result, Err(SeedError::NotACollection { member, .. }) if member == "Motto"));
    }

    #[test]
    fn keys_span_collections() {
        let text = r#"<Directory><Collections>
            <Users><User><Name>Bo</Name><Roles><Role key="ops"><Name>Ops</Name></Role></Roles></User></Users>
            <Users><User><Name>Cy</Name><Roles><Role usekey="ops"/></Roles></User></Users>
        </Collections></Directory>"#;
        let (result, sink) = run(text);
        assert_eq!(result.unwrap().inserted.get("Users"), Some(&2));
        let users = &sink.context().users;
        assert!(Arc::ptr_eq(&users.get(0).unwrap().roles[0], &users.get(1).unwrap().roles[0]));
        // nested roles are not top-level inserts
        assert!(sink.context().roles.is_empty());
    }

    #[test]
    fn undefined_key_aborts_the_run() {
        let text = r#"<Directory><Collections>
            <Users><User><Roles><Role usekey="admin"/></Roles></User></Users>
            <Roles><Role key="admin"/></Roles>
        </Collections></Directory>"#;
        let (result, sink) = run(text);
        assert!(matches!(result, Err(SeedError::UndefinedKey { key }) if key == "admin"));
        assert_eq!(sink.pending(), 0);
        assert_eq!(sink.commits(), 0);
    }
}
