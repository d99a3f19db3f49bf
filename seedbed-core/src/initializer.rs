use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::SeedError;
use crate::key::Key;
use crate::schema::{Context, SchemaOracle};
use crate::seeder::{SeedReport, Seeder};
use crate::sink::{MemorySink, MemorySinkError, RecordSink};
use crate::store::Store;
use crate::store_sink::{StoreSink, StoreSinkError};

/// A sink whose backing store can be created, stamped with the model it
/// was created for, and dropped.
pub trait Database: RecordSink {
    /// Stamp written by the last `create`, or `None` if the store does not
    /// exist yet.
    fn model_stamp(&self) -> Result<Option<Key>, Self::Error>;

    /// Creates the store for the model identified by `stamp`.
    fn create(&mut self, stamp: &Key) -> Result<(), Self::Error>;

    /// Removes everything, stamp included.
    fn drop_all(&mut self) -> Result<(), Self::Error>;
}

/// When a seeding run happens relative to creating the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Initializer {
    /// Seed only a store that does not exist yet.
    #[default]
    CreateIfNotExists,
    /// Drop, recreate, and seed on every run.
    DropCreateAlways,
    /// Drop, recreate, and seed when the schema fingerprint differs from
    /// the stored stamp; seed a missing store.
    DropCreateIfModelChanges,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown initializer \"{0}\"; expected if-missing, always, or if-model-changed")]
pub struct ParseInitializerError(String);

impl FromStr for Initializer {
    type Err = ParseInitializerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "if-missing" | "create-if-not-exists" => Ok(Initializer::CreateIfNotExists),
            "always" | "drop-create-always" => Ok(Initializer::DropCreateAlways),
            "if-model-changed" | "drop-create-if-model-changes" => Ok(Initializer::DropCreateIfModelChanges),
            _ => Err(ParseInitializerError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Initializer {
    type Error = ParseInitializerError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Initializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Initializer::CreateIfNotExists => "if-missing",
            Initializer::DropCreateAlways => "always",
            Initializer::DropCreateIfModelChanges => "if-model-changed",
        })
    }
}

/// Result of [`Initializer::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    Skipped,
    Seeded(SeedReport),
}

impl Initializer {
    /// Applies the strategy to `database`, seeding it through `seeder`
    /// when the strategy calls for it.
    pub fn initialize<O, D>(&self, seeder: &Seeder<'_, O>, database: &mut D) -> Result<InitOutcome, SeedError>
    where
        O: SchemaOracle + ?Sized,
        D: Database + ?Sized,
    {
        let fingerprint = seeder.oracle().fingerprint();
        let stamp = database
            .model_stamp()
            .map_err(|err| SeedError::sink("read the model stamp", err))?;

        let drop_first = match (*self, stamp) {
            (Initializer::DropCreateAlways, _) => true,
            (_, None) => false,
            (Initializer::CreateIfNotExists, Some(_)) => {
                log::info!("store exists, skipping seed");
                return Ok(InitOutcome::Skipped);
            }
            (Initializer::DropCreateIfModelChanges, Some(stamp)) if stamp == fingerprint => {
                log::info!("model unchanged ({fingerprint}), skipping seed");
                return Ok(InitOutcome::Skipped);
            }
            (Initializer::DropCreateIfModelChanges, Some(stamp)) => {
                log::info!("model changed from {stamp} to {fingerprint}");
                true
            }
        };

        if drop_first {
            log::info!("dropping store");
            database.drop_all().map_err(|err| SeedError::sink("drop the store", err))?;
        }
        log::info!("creating store for model {fingerprint}");
        database
            .create(&fingerprint)
            .map_err(|err| SeedError::sink("create the store", err))?;
        seeder.seed(database).map(InitOutcome::Seeded)
    }
}

impl<C: Context + Default> Database for MemorySink<C> {
    fn model_stamp(&self) -> Result<Option<Key>, MemorySinkError> {
        Ok(self.stamp())
    }

    fn create(&mut self, stamp: &Key) -> Result<(), MemorySinkError> {
        self.set_stamp(*stamp);
        Ok(())
    }

    fn drop_all(&mut self) -> Result<(), MemorySinkError> {
        self.reset(C::default());
        Ok(())
    }
}

impl<S: Store> Database for StoreSink<S> {
    fn model_stamp(&self) -> Result<Option<Key>, StoreSinkError> {
        self.stamp()
    }

    fn create(&mut self, stamp: &Key) -> Result<(), StoreSinkError> {
        self.write_stamp(stamp)
    }

    fn drop_all(&mut self) -> Result<(), StoreSinkError> {
        self.clear()
    }
}
