//! Operator tool for capped collections
//!
//! ```text
//! capctl --namespace test.events --extent-size 65536 --extent-size 65536 \
//!        --max-records 500 --inserts 2000 --save events.capd
//! capctl --config events.toml --snapshot events.capd --inserts 100
//! ```

use anyhow::{bail, Context, Result};
use cartridge_capped::{CappedCollection, CappedConfig};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "capctl", version, about = "Inspect and exercise capped collections")]
struct Cli {
    /// TOML configuration; flags below override its fields
    #[arg(long)]
    config: Option<PathBuf>,

    /// Collection namespace (`<db>.<collection>`)
    #[arg(long)]
    namespace: Option<String>,

    /// Extent length in bytes; repeat for each extent of the ring
    #[arg(long = "extent-size")]
    extent_sizes: Vec<u32>,

    /// Record count bound
    #[arg(long)]
    max_records: Option<u64>,

    /// Snapshot to open instead of creating a fresh collection
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Number of random records to insert
    #[arg(long, default_value_t = 0)]
    inserts: u64,

    /// Smallest and largest payload of the random records
    #[arg(long, default_value_t = 16)]
    min_payload: usize,
    #[arg(long, default_value_t = 512)]
    max_payload: usize,

    /// Seed for the payload generator
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write the collection to this snapshot when done
    #[arg(long)]
    save: Option<PathBuf>,
}

impl Cli {
    fn build_config(&self) -> Result<CappedConfig> {
        let mut config = match &self.config {
            Some(path) => CappedConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => {
                let ns = self.namespace.as_deref().unwrap_or("capctl.scratch");
                let sizes = if self.extent_sizes.is_empty() {
                    vec![64 * 1024; 4]
                } else {
                    self.extent_sizes.clone()
                };
                CappedConfig::new(ns, sizes)?
            }
        };

        if self.config.is_some() {
            if let Some(ns) = &self.namespace {
                config.namespace = cartridge_capped::Namespace::new(ns.as_str())?;
            }
            if !self.extent_sizes.is_empty() {
                config.extent_sizes = self.extent_sizes.clone();
            }
        }
        if let Some(max) = self.max_records {
            config.max_records = Some(max);
        }

        config.check()?;
        Ok(config)
    }
}

fn install_tracing_subscriber() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn main() -> Result<()> {
    install_tracing_subscriber();
    let cli = Cli::parse();

    if cli.min_payload > cli.max_payload {
        bail!(
            "--min-payload {} exceeds --max-payload {}",
            cli.min_payload,
            cli.max_payload
        );
    }

    let config = cli.build_config()?;
    let collection = match &cli.snapshot {
        Some(path) => CappedCollection::open(path, config)
            .with_context(|| format!("opening {}", path.display()))?,
        None => CappedCollection::create(config)?,
    };

    if cli.inserts > 0 {
        let mut rng = StdRng::seed_from_u64(cli.seed);
        let mut writer = collection.write();
        let mut rejected = 0u64;

        for i in 0..cli.inserts {
            let len = rng.gen_range(cli.min_payload..=cli.max_payload);
            let mut payload = vec![0u8; len];
            rng.fill(&mut payload[..]);

            if writer.insert(&payload)?.is_none() {
                rejected += 1;
                warn!("Insert {} of {} bytes found no room", i, len);
            }
        }
        info!(
            "Inserted {} records ({} rejected)",
            cli.inserts - rejected,
            rejected
        );
    }

    if let Some(path) = &cli.save {
        collection
            .save(path)
            .with_context(|| format!("saving {}", path.display()))?;
    }

    let stats = collection.stats()?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
