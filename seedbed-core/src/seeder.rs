use std::path::PathBuf;

use serde::Deserialize;

use crate::commands::run_commands;
use crate::document::{Document, DocumentError, Phase};
use crate::error::SeedError;
use crate::materialize::{MaterializeReport, materialize};
use crate::schema::SchemaOracle;
use crate::sink::RecordSink;

/// Where the seed document is found.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SeedOptions {
    /// Explicit document path. Relative paths are joined to `base_dir`.
    pub document: Option<PathBuf>,
    /// Directory holding the document. Defaults to the current directory.
    pub base_dir: Option<PathBuf>,
    /// Extension of the default document name.
    pub extension: String,
}

impl Default for SeedOptions {
    fn default() -> Self {
        SeedOptions {
            document: None,
            base_dir: None,
            extension: "xml".to_string(),
        }
    }
}

/// Outcome of one seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub pre_commands: usize,
    /// `None` when the document has no `Collections` section.
    pub materialized: Option<MaterializeReport>,
    pub post_commands: usize,
}

impl SeedReport {
    /// Top-level instances inserted.
    pub fn inserted(&self) -> usize {
        self.materialized.as_ref().map_or(0, MaterializeReport::total)
    }
}

/// Runs a seed document against a schema and a sink.
pub struct Seeder<'a, O: SchemaOracle + ?Sized> {
    oracle: &'a O,
    options: SeedOptions,
}

impl<'a, O: SchemaOracle + ?Sized> Seeder<'a, O> {
    pub fn new(oracle: &'a O) -> Self {
        Self::with_options(oracle, SeedOptions::default())
    }

    pub fn with_options(oracle: &'a O, options: SeedOptions) -> Self {
        Seeder { oracle, options }
    }

    pub fn oracle(&self) -> &'a O {
        self.oracle
    }

    pub fn options(&self) -> &SeedOptions {
        &self.options
    }

    /// Resolves the document location: the explicit override, or the
    /// oracle's default document name, under the base directory.
    pub fn document_path(&self) -> Result<PathBuf, SeedError> {
        let name = match &self.options.document {
            Some(document) => document.clone(),
            None => PathBuf::from(self.oracle.document_name(&self.options.extension)),
        };
        if name.is_absolute() {
            return Ok(name);
        }
        let base = match &self.options.base_dir {
            Some(base) => base.clone(),
            None => std::env::current_dir().map_err(|err| SeedError::DocumentLoad {
                document: name.display().to_string(),
                source: DocumentError::Io(err),
            })?,
        };
        Ok(base.join(name))
    }

    /// Loads the document and seeds `sink` from it.
    pub fn seed<S: RecordSink + ?Sized>(&self, sink: &mut S) -> Result<SeedReport, SeedError> {
        let document = Document::load(self.document_path()?)?;
        self.seed_document(&document, sink)
    }

    /// Pre-phase commands, then the collections and their commit, then
    /// post-phase commands. Absent sections are skipped.
    pub fn seed_document<S: RecordSink + ?Sized>(&self, document: &Document, sink: &mut S) -> Result<SeedReport, SeedError> {
        let commands = document.commands();
        let pre_commands = run_commands(&commands, Phase::Pre, sink)?;
        let materialized = match document.collections() {
            Some(collections) => Some(materialize(collections, self.oracle, sink)?),
            None => {
                log::debug!("document has no collections");
                None
            }
        };
        let post_commands = run_commands(&commands, Phase::Post, sink)?;

        let report = SeedReport {
            pre_commands,
            materialized,
            post_commands,
        };
        log::debug!(
            "seeded {}: {} inserted, {} commands",
            self.oracle.schema_name(),
            report.inserted(),
            report.pre_commands + report.post_commands
        );
        Ok(report)
    }
}
