//! Index snapshot commands: build, query, stats.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Args, Subcommand};
use serde::Deserialize;
use tracing::info;

use quad_fusion_core::index::{HnswConfig, HnswIndex, IndexSnapshot};
use quad_fusion_core::similarity::DistanceMetric;

#[derive(Subcommand)]
pub enum IndexCommands {
    /// Build a snapshot from a JSONL file of `{"id": ..., "vector": [...]}` lines
    Build(BuildArgs),
    /// Query a snapshot with an inline comma-separated vector
    Query(QueryArgs),
    /// Print snapshot size and configuration
    Stats(StatsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Input JSONL file, one vector per line
    #[arg(long)]
    input: PathBuf,
    /// Output snapshot path (JSON)
    #[arg(long)]
    output: PathBuf,
    /// Neighbors per node per layer
    #[arg(long, default_value_t = 16)]
    m: usize,
    /// Construction beam width
    #[arg(long, default_value_t = 200)]
    ef_construction: usize,
    /// Search beam width stored in the snapshot config
    #[arg(long, default_value_t = 64)]
    ef_search: usize,
    /// Distance metric: cosine, euclidean or dot
    #[arg(long, default_value = "cosine")]
    metric: String,
    /// Keep int8 codes and beam-search over them
    #[arg(long)]
    quantize: bool,
}

#[derive(Args)]
pub struct QueryArgs {
    /// Snapshot path
    #[arg(long)]
    snapshot: PathBuf,
    /// Comma-separated query vector, e.g. "0.1,0.2,0.3"
    #[arg(long)]
    vector: String,
    /// Number of neighbors
    #[arg(long, default_value_t = 10)]
    k: usize,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Snapshot path
    #[arg(long)]
    snapshot: PathBuf,
}

#[derive(Deserialize)]
struct VectorLine {
    id: String,
    vector: Vec<f32>,
}

fn parse_metric(name: &str) -> anyhow::Result<DistanceMetric> {
    match name {
        "cosine" => Ok(DistanceMetric::Cosine),
        "euclidean" => Ok(DistanceMetric::Euclidean),
        "dot" => Ok(DistanceMetric::Dot),
        other => bail!("unknown metric '{other}' (expected cosine, euclidean or dot)"),
    }
}

fn load_snapshot(path: &PathBuf) -> anyhow::Result<HnswIndex> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let snapshot: IndexSnapshot = serde_json::from_str(&raw).context("parsing snapshot")?;
    Ok(HnswIndex::deserialize(snapshot)?)
}

pub fn run(action: IndexCommands) -> anyhow::Result<()> {
    match action {
        IndexCommands::Build(args) => build(args),
        IndexCommands::Query(args) => query(args),
        IndexCommands::Stats(args) => stats(args),
    }
}

fn build(args: BuildArgs) -> anyhow::Result<()> {
    let file = fs::File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let mut entries: Vec<(String, Vec<f32>)> = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let parsed: VectorLine = serde_json::from_str(&line)
            .with_context(|| format!("line {} of {}", lineno + 1, args.input.display()))?;
        entries.push((parsed.id, parsed.vector));
    }
    let dimension = match entries.first() {
        Some((_, v)) => v.len(),
        None => bail!("input file contains no vectors"),
    };

    let config = HnswConfig {
        m: args.m,
        ef_construction: args.ef_construction,
        ef_search: args.ef_search,
        metric: parse_metric(&args.metric)?,
        quantize: args.quantize,
        rerank_candidates: None,
    };
    let mut index = HnswIndex::new(dimension, config)?;
    let count = entries.len();
    index.insert_batch(entries)?;
    info!(count, dimension, "index built");

    let json = serde_json::to_string(&index.serialize())?;
    fs::write(&args.output, json)
        .with_context(|| format!("writing {}", args.output.display()))?;
    println!(
        "wrote snapshot of {count} vectors (dim {dimension}) to {}",
        args.output.display()
    );
    Ok(())
}

fn query(args: QueryArgs) -> anyhow::Result<()> {
    let index = load_snapshot(&args.snapshot)?;

    let vector: Vec<f32> = args
        .vector
        .split(',')
        .map(|c| c.trim().parse::<f32>().context("parsing vector component"))
        .collect::<anyhow::Result<_>>()?;

    let hits = index.search(&vector, args.k, None)?;
    for hit in hits {
        println!("{}\t{:.6}", hit.id, hit.distance);
    }
    Ok(())
}

fn stats(args: StatsArgs) -> anyhow::Result<()> {
    let index = load_snapshot(&args.snapshot)?;
    let config = index.config();
    println!("vectors:        {}", index.len());
    println!("dimension:      {}", index.dimension());
    println!("metric:         {:?}", config.metric);
    println!("m / m0:         {} / {}", config.m, config.m0());
    println!("ef_search:      {}", config.ef_search);
    println!("quantized:      {}", config.quantize);
    println!("approx. bytes:  {}", index.memory_usage());
    Ok(())
}
