//! The seed document: a tree of named nodes with text and attributes.
//!
//! ```text
//! Root
//!   Collections
//!     <CollectionName>
//!       <Entity key="k"> <Field>text</Field> <Relation usekey="k"/> </Entity>
//!   Commands
//!     <Command postinsert="true">raw command text</Command>
//! ```

use std::borrow::Cow;
use std::fmt::Display;
use std::path::Path;

use indexmap::IndexMap;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::SeedError;

const COLLECTIONS: &[&str] = &["Collections", "DbSets"];
const COMMANDS: &[&str] = &["Commands", "SqlCommands"];

/// Error reading or parsing a seed document.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed document at byte {position}: {message}")]
    Malformed { position: u64, message: String },
    #[error("document has no root element")]
    Empty,
}

/// A document node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    name: String,
    text: String,
    attributes: IndexMap<String, String>,
    children: Vec<Node>,
}

impl Node {
    pub fn new(name: impl Into<String>) -> Self {
        Node {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    /// Shorthand for a leaf node holding a scalar value.
    pub fn leaf(name: impl Into<String>, text: impl Into<String>) -> Self {
        Node::new(name).with_text(text)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// The key this node defines, if any.
    pub fn key(&self) -> Option<&str> {
        self.attribute("key")
    }

    /// The key this node refers to, if any.
    pub fn usekey(&self) -> Option<&str> {
        self.attribute("usekey")
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|child| child.name == name)
    }
}

/// Execution phase of a raw command relative to materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Before any collection is materialized.
    Pre,
    /// After the materialized records are committed.
    Post,
}

/// A raw command and the phase it runs in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    text: String,
    phase: Phase,
}

impl Command {
    pub fn new(text: impl Into<String>, phase: Phase) -> Self {
        Command {
            text: text.into(),
            phase,
        }
    }

    /// Reads a command node: `postinsert` equal to `true` in any case
    /// selects the post phase, anything else the pre phase.
    pub fn from_node(node: &Node) -> Self {
        let post = node
            .attribute("postinsert")
            .is_some_and(|value| value.eq_ignore_ascii_case("true"));
        Command::new(node.text(), if post { Phase::Post } else { Phase::Pre })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }
}

/// A parsed seed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Node,
}

impl Document {
    pub fn new(root: Node) -> Self {
        Document { root }
    }

    /// Reads and parses a document from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        log::debug!("loading seed document {}", path.display());
        let load_error = |source| SeedError::DocumentLoad {
            document: path.display().to_string(),
            source,
        };
        let text = std::fs::read_to_string(path).map_err(|err| load_error(DocumentError::Io(err)))?;
        Self::parse(&text).map_err(load_error)
    }

    /// Parses a document from XML text.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let mut reader = Reader::from_str(text);
        let mut stack: Vec<Node> = Vec::new();
        let mut root = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|err| malformed(reader.buffer_position(), err))?;
            match event {
                Event::Start(start) => {
                    stack.push(open_node(&start).map_err(|err| malformed(reader.buffer_position(), err))?);
                }
                Event::Empty(start) => {
                    let node = open_node(&start).map_err(|err| malformed(reader.buffer_position(), err))?;
                    close_node(&mut stack, &mut root, node, reader.buffer_position())?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| malformed(reader.buffer_position(), "unexpected end tag"))?;
                    close_node(&mut stack, &mut root, node, reader.buffer_position())?;
                }
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|err| malformed(reader.buffer_position(), err))?;
                        node.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data.into_inner()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(malformed(reader.buffer_position(), "unexpected end of document"));
        }
        root.map(Document::new).ok_or(DocumentError::Empty)
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    /// The `Collections` section, if present.
    pub fn collections(&self) -> Option<&Node> {
        COLLECTIONS.iter().find_map(|name| self.root.child(name))
    }

    /// Every command of the `Commands` section, in document order.
    pub fn commands(&self) -> Vec<Command> {
        COMMANDS
            .iter()
            .find_map(|name| self.root.child(name))
            .map(|section| section.children().iter().map(Command::from_node).collect())
            .unwrap_or_default()
    }
}

fn malformed(position: impl TryInto<u64>, message: impl Display) -> DocumentError {
    DocumentError::Malformed {
        position: position.try_into().unwrap_or(u64::MAX),
        message: message.to_string(),
    }
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn open_node(start: &BytesStart<'_>) -> Result<Node, String> {
    let mut node = Node::new(local_name(start.local_name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|err| err.to_string())?;
        let value: Cow<'_, str> = attribute.unescape_value().map_err(|err| err.to_string())?;
        node.attributes
            .insert(local_name(attribute.key.local_name().as_ref()), value.into_owned());
    }
    Ok(node)
}

fn close_node(
    stack: &mut [Node],
    root: &mut Option<Node>,
    node: Node,
    position: impl TryInto<u64>,
) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_some() => return Err(malformed(position, "multiple root elements")),
        None => *root = Some(node),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Seed>
  <Collections>
    <Roles>
      <Role key="admin"><Name>Admin &amp; Owner</Name></Role>
      <Role><Name><![CDATA[<guest>]]></Name></Role>
    </Roles>
  </Collections>
  <Commands>
    <Command>first</Command>
    <Command postinsert="TRUE">second</Command>
    <Command postinsert="false">third</Command>
    <Command postinsert="yes">fourth</Command>
  </Commands>
</Seed>"#;

    #[test]
    fn parses_sections() {
        let document = Document::parse(SAMPLE).unwrap();
        assert_eq!(document.root().name(), "Seed");

        let collections = document.collections().unwrap();
        let roles = collections.child("Roles").unwrap();
        assert_eq!(roles.children().len(), 2);
        assert_eq!(roles.children()[0].key(), Some("admin"));
        assert_eq!(roles.children()[0].child("Name").unwrap().text(), "Admin & Owner");
        assert_eq!(roles.children()[1].child("Name").unwrap().text(), "<guest>");
    }

    #[test]
    fn commands_are_partitioned_by_postinsert() {
        let document = Document::parse(SAMPLE).unwrap();
        let phases: Vec<_> = document
            .commands()
            .iter()
            .map(|command| (command.text().to_string(), command.phase()))
            .collect();
        assert_eq!(
            phases,
            vec![
                ("first".to_string(), Phase::Pre),
                ("second".to_string(), Phase::Post),
                ("third".to_string(), Phase::Pre),
                ("fourth".to_string(), Phase::Pre),
            ]
        );
    }

    #[test]
    fn missing_sections_are_empty() {
        let document = Document::parse("<Seed/>").unwrap();
        assert!(document.collections().is_none());
        assert!(document.commands().is_empty());
    }

    #[test]
    fn legacy_section_names_are_accepted() {
        let document =
            Document::parse("<Seed><DbSets><Users/></DbSets><SqlCommands><C>x</C></SqlCommands></Seed>").unwrap();
        assert!(document.collections().unwrap().child("Users").is_some());
        assert_eq!(document.commands().len(), 1);
    }

    #[test]
    fn namespace_prefixes_are_dropped() {
        let document = Document::parse(r#"<s:Seed xmlns:s="urn:seed"><s:Collections/></s:Seed>"#).unwrap();
        assert_eq!(document.root().name(), "Seed");
        assert!(document.collections().is_some());
    }

    #[test]
    fn mismatched_tags_are_malformed() {
        let err = Document::parse("<Seed><Collections></Seed>").unwrap_err();
        assert!(matches!(err, DocumentError::Malformed { .. }));
    }

    #[test]
    fn unclosed_document_is_malformed() {
        assert!(Document::parse("<Seed><Collections>").is_err());
    }

    #[test]
    fn empty_document_has_no_root() {
        assert!(matches!(Document::parse("   "), Err(DocumentError::Empty)));
    }

    #[test]
    fn second_root_is_rejected() {
        assert!(Document::parse("<A/><B/>").is_err());
    }

    #[test]
    fn load_reports_the_path() {
        let err = Document::load("/nonexistent/seed.xml").unwrap_err();
        match err {
            SeedError::DocumentLoad { document, source } => {
                assert_eq!(document, "/nonexistent/seed.xml");
                assert!(matches!(source, DocumentError::Io(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Seed.xml");
        std::fs::write(&path, SAMPLE).unwrap();
        let document = Document::load(&path).unwrap();
        assert_eq!(document.commands().len(), 4);
    }
}
