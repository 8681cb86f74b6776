//! Check command - validate a configuration file

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tabwrite_config::Config;
use tabwrite_pipeline::{Boundedness, StreamingWrite};
use tabwrite_routing::{DestinationResolver, SchemaResolver};
use tabwrite_sinks::memory::MemoryTableStore;

/// Check command arguments
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Validate as if the input were unbounded (required for auto sharding)
    #[arg(long)]
    pub unbounded: bool,
}

/// Run the check command
pub fn run(args: CheckArgs) -> Result<()> {
    let config = Config::from_file(&args.config).context("failed to load configuration")?;

    let boundedness = if args.unbounded {
        Boundedness::Unbounded
    } else {
        Boundedness::Bounded
    };
    let store = Arc::new(MemoryTableStore::new());
    StreamingWrite::from_config(config.write.clone(), store.clone(), store)
        .context("invalid configuration")?
        .with_boundedness(boundedness)
        .validate()
        .context("invalid configuration")?;

    let destination = match DestinationResolver::from_config(&config.write)? {
        Some(DestinationResolver::Static(table)) => table.to_string(),
        Some(resolver) => format!("{:?}", resolver),
        None => "(none)".to_string(),
    };
    let schema = match SchemaResolver::from_config(&config.write)? {
        SchemaResolver::Static(schema) => format!("{} field(s)", schema.fields.len()),
        _ => "none".to_string(),
    };

    println!("configuration OK: {}", args.config.display());
    println!("  destination:     {}", destination);
    println!("  schema:          {}", schema);
    println!("  retry strategy:  {}", config.write.retry_strategy);
    println!(
        "  sharding:        {}",
        if config.write.with_auto_sharding {
            "auto".to_string()
        } else {
            format!("fixed ({} shards)", config.write.num_shards)
        }
    );
    Ok(())
}
