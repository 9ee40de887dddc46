//! Unified search demo over seeded in-memory stores.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Deserialize;
use tracing::info;

use quad_fusion_core::index::HnswConfig;
use quad_fusion_core::sources::{
    GraphSourceAdapter, MemorySourceAdapter, PatternSourceAdapter, VectorSourceAdapter,
};
use quad_fusion_core::stubs::{
    HashingEmbedder, InMemoryEpisodicStore, InMemoryGraphStore, InMemoryPatternStore,
};
use quad_fusion_core::traits::QueryEmbedder;
use quad_fusion_core::{FusionOptionsPatch, UnifiedSearchOrchestrator};

#[derive(Args)]
pub struct SearchArgs {
    /// Query text
    query: String,
    /// JSON seed file describing documents, graph, episodes and patterns
    #[arg(long)]
    seed: PathBuf,
    /// Number of fused results
    #[arg(long, default_value_t = 10)]
    top_k: usize,
    /// Per-source timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Episodic namespace
    #[arg(long)]
    namespace: Option<String>,
    /// Embedding dimension for the hashing embedder
    #[arg(long, default_value_t = 128)]
    dimension: usize,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SeedFile {
    documents: Vec<SeedDocument>,
    graph: SeedGraph,
    episodes: Vec<SeedEpisode>,
    patterns: Vec<SeedPattern>,
}

#[derive(Deserialize)]
struct SeedDocument {
    id: String,
    text: String,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct SeedGraph {
    nodes: Vec<SeedGraphNode>,
    edges: Vec<(String, String)>,
}

#[derive(Deserialize)]
struct SeedGraphNode {
    id: String,
    #[serde(default)]
    keywords: Vec<String>,
}

#[derive(Deserialize)]
struct SeedEpisode {
    #[serde(default = "default_namespace")]
    namespace: String,
    content: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

#[derive(Deserialize)]
struct SeedPattern {
    id: String,
    triggers: Vec<String>,
    confidence: f32,
}

pub async fn run(args: SearchArgs) -> anyhow::Result<()> {
    let raw = fs::read_to_string(&args.seed)
        .with_context(|| format!("reading seed file {}", args.seed.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw).context("parsing seed file")?;

    let embedder = Arc::new(HashingEmbedder::new(args.dimension));

    let vector = VectorSourceAdapter::new(HnswConfig::default(), embedder.clone())?;
    for doc in &seed.documents {
        let embedding = embedder.embed(&doc.text).await?;
        vector.insert(doc.id.clone(), embedding)?;
    }

    let graph = InMemoryGraphStore::new();
    for node in &seed.graph.nodes {
        let keywords: Vec<&str> = node.keywords.iter().map(String::as_str).collect();
        graph.add_node(node.id.clone(), &keywords).await;
    }
    for (a, b) in &seed.graph.edges {
        graph.add_edge(a.clone(), b.clone()).await;
    }

    let memory = InMemoryEpisodicStore::new();
    for episode in &seed.episodes {
        memory.record(&episode.namespace, episode.content.clone()).await;
    }

    let patterns = InMemoryPatternStore::new();
    for pattern in &seed.patterns {
        let triggers: Vec<&str> = pattern.triggers.iter().map(String::as_str).collect();
        patterns
            .add_pattern(pattern.id.clone(), &triggers, pattern.confidence)
            .await;
    }

    info!(
        documents = seed.documents.len(),
        graph_nodes = seed.graph.nodes.len(),
        episodes = seed.episodes.len(),
        patterns = seed.patterns.len(),
        "stores seeded"
    );

    let orchestrator = UnifiedSearchOrchestrator::new(
        Arc::new(vector),
        Arc::new(GraphSourceAdapter::new(Arc::new(graph))),
        Arc::new(MemorySourceAdapter::new(Arc::new(memory))),
        Arc::new(PatternSourceAdapter::new(Arc::new(patterns))),
    );

    let patch = FusionOptionsPatch {
        top_k: Some(args.top_k),
        source_timeout_ms: args.timeout_ms,
        memory_namespace: args.namespace.clone(),
        ..FusionOptionsPatch::default()
    };

    let response = orchestrator.search(&args.query, None, Some(patch)).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
