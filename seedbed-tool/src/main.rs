mod config;
mod error;
mod model;
mod show;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use seedbed_core::{Context, InitOutcome, Initializer, MemorySink, SeedReport, Seeder, StoreSink};
use seedbed_rocks::RocksStore;

use crate::config::{Overrides, Settings, load_config, resolve};
use crate::model::ExampleContext;

#[derive(Parser)]
#[command(name = "seedbed")]
#[command(about = "Seed the example context from an XML document", long_about = None)]
struct Cli {
    /// Config file (default: ./seedbed.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the RocksDB store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Seed document (default: ExampleContext.xml)
    #[arg(long, global = true)]
    document: Option<PathBuf>,

    /// Directory the seed document is resolved against
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize the store and seed it
    Seed {
        /// When to seed: if-missing, always, or if-model-changed
        #[arg(short, long)]
        initializer: Option<Initializer>,
    },
    /// Print the seeded locations, users, and roles
    Show,
    /// Seed into memory and print the result without touching the store
    Check,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let initializer = match &cli.command {
        Command::Seed { initializer } => *initializer,
        Command::Show | Command::Check => None,
    };
    let config = load_config(cli.config.as_deref())?;
    let settings = resolve(
        config,
        Overrides {
            store: cli.store,
            document: cli.document,
            base_dir: cli.base_dir,
            initializer,
        },
    );

    match cli.command {
        Command::Seed { .. } => seed(settings)?,
        Command::Show => {
            let sink = StoreSink::new(RocksStore::open(&settings.store_path)?);
            print!("{}", show::render(&show::from_store(&sink)?)?);
        }
        Command::Check => check(settings)?,
    }

    Ok(())
}

fn seed(settings: Settings) -> anyhow::Result<()> {
    let schema = ExampleContext::schema();
    let seeder = Seeder::with_options(&schema, settings.seed);
    let mut sink = StoreSink::new(RocksStore::open(&settings.store_path)?);

    log::info!(
        "initializing {} with strategy {}",
        settings.store_path.display(),
        settings.initializer
    );
    match settings.initializer.initialize(&seeder, &mut sink)? {
        InitOutcome::Skipped => println!("Store already initialized, nothing seeded"),
        InitOutcome::Seeded(report) => print_report(&report),
    }
    Ok(())
}

fn check(settings: Settings) -> anyhow::Result<()> {
    let schema = ExampleContext::schema();
    let seeder = Seeder::with_options(&schema, settings.seed);
    println!("Checking {}", seeder.document_path()?.display());

    let mut sink = MemorySink::new(ExampleContext::default());
    let report = seeder.seed(&mut sink)?;
    print_report(&report);
    println!();
    print!("{}", show::render(&show::from_context(sink.context()))?);
    Ok(())
}

fn print_report(report: &SeedReport) {
    println!("Commands before insert: {}", report.pre_commands);
    match &report.materialized {
        Some(materialized) => {
            for (collection, count) in &materialized.inserted {
                println!("  {collection}: {count}");
            }
            println!("Inserted {} records ({} keys)", materialized.total(), materialized.keys);
        }
        None => println!("No collections section"),
    }
    println!("Commands after insert: {}", report.post_commands);
}
