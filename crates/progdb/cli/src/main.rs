// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! progdb CLI
//!
//! Loads a JSON dataset and runs progressive approximate aggregate queries
//! over it, printing confidence intervals as blocks are processed.

mod config;
mod query_args;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use progdb_core::{Dataset, Engine, EngineConfig, EngineRunner, Priority, Query, SamplerSpec, Schema, SchedulerKind};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{CliConfig, OutputConfig};
use crate::query_args::build_definition;

#[derive(Parser)]
#[command(name = "progdb")]
#[command(about = "progdb - Progressive approximate aggregation over JSON datasets")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (TOML); defaults to $PROGDB_CONFIG
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DatasetArgs {
    /// JSON file holding an array of row objects
    dataset: PathBuf,
    /// JSON schema overriding inferred column types
    #[arg(long, short = 's')]
    schema: Option<PathBuf>,
}

#[derive(Args)]
struct QueryArgs {
    /// Aggregate: min, max, count, sum or mean
    #[arg(long, short = 'a')]
    accumulator: Option<String>,
    /// Quantitative field to aggregate
    #[arg(long, short = 't')]
    target: Option<String>,
    /// Grouping field; repeat for two groupings
    #[arg(long, short = 'g')]
    group_by: Vec<String>,
    /// Build the query by combining these fields in order, instead of --accumulator
    #[arg(long, value_delimiter = ',')]
    fields: Vec<String>,
    /// Row filter `field=value` or `field=low..high`; repeatable
    #[arg(long = "where", short = 'w')]
    filters: Vec<String>,
}

#[derive(Args)]
struct EngineArgs {
    /// Scheduler: QueryOrder, RoundRobin or Fifo
    #[arg(long)]
    scheduler: Option<String>,
    /// Rows per sample block
    #[arg(long)]
    sample_size: Option<usize>,
    /// Fixed number of sample blocks, in dataset order
    #[arg(long, conflicts_with = "sample_size")]
    num_blocks: Option<usize>,
    /// Seed for the random sampler
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the dataset's fields with their inferred types
    Describe {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
    /// Run a query progressively, printing intervals as blocks complete
    Run {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        query: QueryArgs,
        #[command(flatten)]
        engine: EngineArgs,
        /// Pace jobs with the configured latency instead of running flat out
        #[arg(long)]
        live: bool,
    },
    /// Print the wire shape of the queue holding a query
    Shape {
        #[command(flatten)]
        dataset: DatasetArgs,
        #[command(flatten)]
        query: QueryArgs,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let config = match CliConfig::resolve(cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Describe { dataset } => handle_describe(&config, &dataset),
        Commands::Run { dataset, query, engine, live } => handle_run(config, &dataset, &query, &engine, live).await,
        Commands::Shape { dataset, query } => handle_shape(config, &dataset, &query),
        Commands::Config => handle_config(&config),
    };

    if let Err(e) = result {
        error!("Command failed: {:#}", e);
        process::exit(1);
    }
}

fn load_dataset(config: &CliConfig, args: &DatasetArgs) -> anyhow::Result<Arc<Dataset>> {
    let schema = args.schema.as_ref().map(Schema::load).transpose().context("Failed to load schema")?;
    let dataset = Dataset::load(&args.dataset, schema.as_ref(), config.engine.default_num_bins)
        .with_context(|| format!("Failed to load dataset {}", args.dataset.display()))?;
    Ok(Arc::new(dataset))
}

fn build_engine(config: EngineConfig, dataset: Arc<Dataset>, args: Option<&EngineArgs>) -> anyhow::Result<Engine> {
    let mut config = config;

    if let Some(args) = args {
        if let Some(scheduler) = &args.scheduler {
            config.scheduler = scheduler.parse::<SchedulerKind>()?;
        }
        if let Some(num_blocks) = args.num_blocks {
            config.sampler = SamplerSpec::UniformNumBlocks { num_blocks };
        } else if args.sample_size.is_some() || args.seed.is_some() {
            let (default_size, default_seed) = match config.sampler {
                SamplerSpec::UniformRandom { sample_size, seed } => (sample_size, seed),
                SamplerSpec::UniformNumBlocks { .. } => (1000, None),
            };
            config.sampler = SamplerSpec::UniformRandom {
                sample_size: args.sample_size.unwrap_or(default_size),
                seed: args.seed.or(default_seed),
            };
        }
    }

    Ok(Engine::new(dataset, config)?)
}

fn handle_describe(config: &CliConfig, args: &DatasetArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(config, args)?;

    println!("{} ({} rows)", dataset.name(), dataset.len());
    println!("{:<24} {:<10} {:<14} nullable", "field", "type", "vl type");
    for field in dataset.fields() {
        println!("{:<24} {:<10} {:<14} {}", field.name(), field.data_type().to_string(), field.vl_type().to_string(), field.nullable());
    }

    Ok(())
}

async fn handle_run(config: CliConfig, dataset_args: &DatasetArgs, query_args: &QueryArgs, engine_args: &EngineArgs, live: bool) -> anyhow::Result<()> {
    let dataset = load_dataset(&config, dataset_args)?;
    let definition = build_query(&dataset, query_args)?;
    let mut engine = build_engine(config.engine.clone(), dataset, Some(engine_args))?;

    let output = config.output.clone();
    if output.every_block {
        engine.set_on_job_done(move |query| print_query(query, &output));
    }

    let id = engine.submit(definition)?;
    info!(query = %id, "Submitted query");

    let shared = if live {
        let runner = EngineRunner::new(engine);
        let executed = runner.start().await?;
        info!(executed, "Live run finished");
        runner.engine().clone()
    } else {
        let executed = engine.run_all();
        info!(executed, "Run finished");
        Arc::new(Mutex::new(engine))
    };

    let engine = shared.lock();
    if let Some(query) = engine.query(id) {
        if !config.output.every_block {
            print_query(query, &config.output);
        }
        println!("done: {}", query.desc());
    }

    Ok(())
}

fn handle_shape(config: CliConfig, dataset_args: &DatasetArgs, query_args: &QueryArgs) -> anyhow::Result<()> {
    let dataset = load_dataset(&config, dataset_args)?;
    let definition = build_query(&dataset, query_args)?;
    let mut engine = build_engine(config.engine, dataset, None)?;

    let query = engine.create_query(definition)?;
    engine.request(query, Priority::Highest);
    println!("{}", serde_json::to_string_pretty(&engine.queue_shape())?);

    Ok(())
}

fn handle_config(config: &CliConfig) -> anyhow::Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}

fn build_query(dataset: &Dataset, args: &QueryArgs) -> anyhow::Result<progdb_core::QueryDefinition> {
    Ok(build_definition(
        dataset,
        args.accumulator.as_deref(),
        args.target.as_deref(),
        &args.group_by,
        &args.fields,
        &args.filters,
    )?)
}

fn print_query(query: &Query, output: &OutputConfig) {
    let progress = query.progress();
    println!(
        "[{}] block {}/{} ({:.1}% of rows) {}",
        query.id(),
        progress.processed_blocks,
        progress.total_blocks,
        progress.percent(),
        query.desc()
    );

    let precision = output.precision;
    for (key, interval) in query.intervals() {
        if interval.is_empty() {
            println!("  {key}: (empty)");
            continue;
        }
        let ci = interval.ci95();
        println!("  {key}: {:.precision$} [{:.precision$}, {:.precision$}] (n={})", interval.center, ci.low, ci.high, interval.n);
    }
}
