//! End-to-end pipeline over the real adapters and the in-memory
//! reference stores.

use std::sync::Arc;

use quad_fusion_core::index::HnswConfig;
use quad_fusion_core::sources::{
    GraphSourceAdapter, MemorySourceAdapter, PatternSourceAdapter, VectorSourceAdapter,
};
use quad_fusion_core::stubs::{
    HashingEmbedder, InMemoryEpisodicStore, InMemoryGraphStore, InMemoryPatternStore,
};
use quad_fusion_core::traits::QueryEmbedder;
use quad_fusion_core::{FusionOptionsPatch, FusionWeightsPatch, KnowledgeSource, UnifiedSearchOrchestrator};

const DIM: usize = 64;

async fn build_orchestrator() -> UnifiedSearchOrchestrator {
    let embedder = Arc::new(HashingEmbedder::new(DIM));

    let vector = VectorSourceAdapter::new(HnswConfig::default(), embedder.clone()).unwrap();
    for (id, text) in [
        ("doc-async", "async runtimes schedule tasks on worker threads"),
        ("doc-borrow", "the borrow checker enforces aliasing rules"),
        ("doc-fusion", "weighted fusion of ranked retrieval results"),
    ] {
        let embedding = embedder.embed(text).await.unwrap();
        vector.insert(id, embedding).unwrap();
    }

    let graph = InMemoryGraphStore::new();
    graph.add_node("doc-async", &["async", "runtime"]).await;
    graph.add_node("doc-fusion", &["fusion", "ranking"]).await;
    graph.add_node("doc-tokio", &[]).await;
    graph.add_edge("doc-async", "doc-tokio").await;

    let memory = InMemoryEpisodicStore::new();
    memory
        .record("default", "debugged the async scheduler yesterday")
        .await;

    let patterns = InMemoryPatternStore::new();
    patterns
        .add_pattern("pattern-async-retry", &["async", "retry"], 0.9)
        .await;
    patterns.add_pattern("pattern-weak", &["async"], 0.05).await;

    UnifiedSearchOrchestrator::new(
        Arc::new(vector),
        Arc::new(GraphSourceAdapter::new(Arc::new(graph))),
        Arc::new(MemorySourceAdapter::new(Arc::new(memory))),
        Arc::new(PatternSourceAdapter::new(Arc::new(patterns))),
    )
}

#[tokio::test]
async fn full_pipeline_fuses_all_four_sources() {
    let orchestrator = build_orchestrator().await;
    let response = orchestrator
        .search("async runtime", None, None)
        .await
        .unwrap();

    assert_eq!(response.metadata.sources_responded, 4);
    assert!(!response.results.is_empty());

    // the graph-seeded doc shows up with graph attribution
    let doc_async = response
        .results
        .iter()
        .find(|r| r.id == "doc-async")
        .expect("doc-async surfaced");
    assert!(doc_async
        .sources
        .iter()
        .any(|c| c.source == KnowledgeSource::Graph));

    // low-confidence pattern stays below the default floor
    assert!(response.results.iter().all(|r| r.id != "pattern-weak"));

    // every fused score is a valid [0, 1] weight-sum
    for result in &response.results {
        assert!(result.score >= 0.0 && result.score <= 1.0);
    }
}

#[tokio::test]
async fn repeated_queries_are_byte_identical() {
    let orchestrator = build_orchestrator().await;
    let first = orchestrator.search("async fusion", None, None).await.unwrap();
    let second = orchestrator.search("async fusion", None, None).await.unwrap();

    let order = |r: &quad_fusion_core::SearchResponse| {
        r.results
            .iter()
            .map(|x| (x.id.clone(), x.score))
            .collect::<Vec<_>>()
    };
    assert_eq!(order(&first), order(&second));
}

#[tokio::test]
async fn zeroing_a_source_weight_removes_its_influence() {
    let orchestrator = build_orchestrator().await;
    let patch = FusionOptionsPatch {
        weights: FusionWeightsPatch {
            vector: Some(0.0),
            graph: Some(1.0),
            memory: Some(0.0),
            pattern: Some(0.0),
        },
        ..FusionOptionsPatch::default()
    };

    let response = orchestrator
        .search("async runtime", None, Some(patch))
        .await
        .unwrap();

    // only graph-surfaced ids can carry score now
    for result in &response.results {
        if result.score > 0.0 {
            assert!(
                result
                    .sources
                    .iter()
                    .any(|c| c.source == KnowledgeSource::Graph),
                "{} scored {} without graph backing",
                result.id,
                result.score
            );
        }
    }
}

#[tokio::test]
async fn namespace_patch_scopes_memory_recall() {
    let orchestrator = build_orchestrator().await;
    let patch = FusionOptionsPatch {
        memory_namespace: Some("empty-namespace".to_string()),
        ..FusionOptionsPatch::default()
    };
    let response = orchestrator
        .search("async scheduler", None, Some(patch))
        .await
        .unwrap();

    // the memory source responds (empty set), nothing recalled from the
    // unseeded namespace
    let memory_stats = &response.source_stats[&KnowledgeSource::Memory];
    assert!(memory_stats.responded);
    assert_eq!(memory_stats.result_count, 0);
}
