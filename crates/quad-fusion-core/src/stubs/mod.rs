//! In-memory reference implementations of the external-store contracts.
//!
//! Used by tests, demos and the CLI. Each store is a `HashMap` behind a
//! tokio `RwLock`; nothing here persists. The [`HashingEmbedder`] is a
//! deterministic feature-hashing embedder so vector behavior is
//! reproducible without a model.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::CoreResult;
use crate::traits::{
    EpisodeHit, EpisodicStore, GraphHop, GraphStore, PatternHit, PatternStore, QueryEmbedder,
};
use crate::types::EntityId;

/// Lowercased alphanumeric tokens of a text.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

// =========================================================================
// Graph store
// =========================================================================

#[derive(Default)]
struct GraphInner {
    /// Node id -> keyword labels used for seed resolution.
    labels: HashMap<EntityId, Vec<String>>,
    /// Undirected adjacency.
    edges: HashMap<EntityId, HashSet<EntityId>>,
}

/// In-memory graph store: keyword-seeded breadth-first traversal.
#[derive(Default)]
pub struct InMemoryGraphStore {
    inner: RwLock<GraphInner>,
}

impl InMemoryGraphStore {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the keywords that make it a traversal seed.
    pub async fn add_node(&self, id: impl Into<EntityId>, keywords: &[&str]) {
        let id = id.into();
        let mut inner = self.inner.write().await;
        inner
            .labels
            .insert(id.clone(), keywords.iter().map(|k| k.to_lowercase()).collect());
        inner.edges.entry(id).or_default();
    }

    /// Add an undirected edge.
    pub async fn add_edge(&self, a: impl Into<EntityId>, b: impl Into<EntityId>) {
        let a = a.into();
        let b = b.into();
        let mut inner = self.inner.write().await;
        inner.edges.entry(a.clone()).or_default().insert(b.clone());
        inner.edges.entry(b).or_default().insert(a);
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn neighborhood(&self, query: &str, max_depth: usize) -> CoreResult<Vec<GraphHop>> {
        let tokens: HashSet<String> = tokenize(query).into_iter().collect();
        let inner = self.inner.read().await;

        let seeds: Vec<&EntityId> = inner
            .labels
            .iter()
            .filter(|(id, keywords)| {
                tokens.contains(&id.to_lowercase())
                    || keywords.iter().any(|k| tokens.contains(k))
            })
            .map(|(id, _)| id)
            .collect();

        let mut depth_by_id: HashMap<&EntityId, usize> = HashMap::new();
        let mut frontier: VecDeque<(&EntityId, usize)> = VecDeque::new();
        for seed in seeds {
            depth_by_id.insert(seed, 0);
            frontier.push_back((seed, 0));
        }

        while let Some((id, depth)) = frontier.pop_front() {
            if depth == max_depth {
                continue;
            }
            if let Some(neighbors) = inner.edges.get(id) {
                for neighbor in neighbors {
                    if !depth_by_id.contains_key(neighbor) {
                        depth_by_id.insert(neighbor, depth + 1);
                        frontier.push_back((neighbor, depth + 1));
                    }
                }
            }
        }

        Ok(depth_by_id
            .into_iter()
            .map(|(id, depth)| GraphHop {
                id: id.clone(),
                depth,
                metadata: serde_json::Value::Null,
            })
            .collect())
    }
}

// =========================================================================
// Episodic store
// =========================================================================

struct Episode {
    id: EntityId,
    content: String,
    content_hash: String,
    created_at: DateTime<Utc>,
}

/// In-memory episodic store: token-overlap recall per namespace.
///
/// Recording the same content twice in one namespace is a no-op that
/// returns the existing episode's id (content-hash dedup).
#[derive(Default)]
pub struct InMemoryEpisodicStore {
    namespaces: RwLock<HashMap<String, Vec<Episode>>>,
}

impl InMemoryEpisodicStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an episode, returning its id.
    ///
    /// Duplicate content within a namespace returns the already-stored
    /// episode's id instead of minting a new one.
    pub async fn record(&self, namespace: &str, content: impl Into<String>) -> EntityId {
        let content = content.into();
        let content_hash = crate::similarity::content_hash(&content);

        let mut namespaces = self.namespaces.write().await;
        let episodes = namespaces.entry(namespace.to_string()).or_default();
        if let Some(existing) = episodes.iter().find(|e| e.content_hash == content_hash) {
            return existing.id.clone();
        }

        let id = Uuid::new_v4().to_string();
        episodes.push(Episode {
            id: id.clone(),
            content,
            content_hash,
            created_at: Utc::now(),
        });
        id
    }
}

#[async_trait]
impl EpisodicStore for InMemoryEpisodicStore {
    async fn recall(
        &self,
        namespace: &str,
        query: &str,
        limit: usize,
    ) -> CoreResult<Vec<EpisodeHit>> {
        let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
        if query_tokens.is_empty() {
            return Ok(Vec::new());
        }

        let namespaces = self.namespaces.read().await;
        let episodes = match namespaces.get(namespace) {
            Some(episodes) => episodes,
            None => return Ok(Vec::new()),
        };

        let mut hits: Vec<EpisodeHit> = episodes
            .iter()
            .filter_map(|episode| {
                let content_tokens: HashSet<String> =
                    tokenize(&episode.content).into_iter().collect();
                let overlap = query_tokens.intersection(&content_tokens).count();
                if overlap == 0 {
                    return None;
                }
                Some(EpisodeHit {
                    id: episode.id.clone(),
                    relevance: overlap as f32 / query_tokens.len() as f32,
                    namespace: namespace.to_string(),
                    metadata: serde_json::json!({
                        "created_at": episode.created_at.to_rfc3339(),
                    }),
                })
            })
            .collect();

        hits.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

// =========================================================================
// Pattern store
// =========================================================================

struct StoredPattern {
    id: EntityId,
    triggers: Vec<String>,
    confidence: f32,
}

/// In-memory pattern store: trigger-token matching with learned
/// confidences supplied at insert time (the learning engine that would
/// update them lives outside this crate).
#[derive(Default)]
pub struct InMemoryPatternStore {
    patterns: RwLock<Vec<StoredPattern>>,
}

impl InMemoryPatternStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a pattern with its trigger terms and confidence.
    pub async fn add_pattern(
        &self,
        id: impl Into<EntityId>,
        triggers: &[&str],
        confidence: f32,
    ) {
        let mut patterns = self.patterns.write().await;
        patterns.push(StoredPattern {
            id: id.into(),
            triggers: triggers.iter().map(|t| t.to_lowercase()).collect(),
            confidence,
        });
    }
}

#[async_trait]
impl PatternStore for InMemoryPatternStore {
    async fn match_patterns(
        &self,
        query: &str,
        min_confidence: f32,
        limit: usize,
    ) -> CoreResult<Vec<PatternHit>> {
        let tokens: HashSet<String> = tokenize(query).into_iter().collect();
        let patterns = self.patterns.read().await;

        let mut hits: Vec<PatternHit> = patterns
            .iter()
            .filter(|p| p.confidence >= min_confidence)
            .filter(|p| p.triggers.iter().any(|t| tokens.contains(t)))
            .map(|p| PatternHit {
                id: p.id.clone(),
                confidence: p.confidence,
                metadata: serde_json::Value::Null,
            })
            .collect();

        hits.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }
}

// =========================================================================
// Embedder
// =========================================================================

/// Deterministic feature-hashing embedder.
///
/// Each token hashes to a bucket and a sign; the resulting vector is
/// L2-normalized. Identical text always produces the identical vector,
/// which is what tests and demos need from an embedder.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    /// Create an embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl QueryEmbedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dimension];
        for token in tokenize(text) {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            token.hash(&mut hasher);
            let h = hasher.finish();
            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 32) & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in vector.iter_mut() {
                *x /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_graph_bfs_depths() {
        let graph = InMemoryGraphStore::new();
        graph.add_node("rust", &["rust", "language"]).await;
        graph.add_node("tokio", &["async"]).await;
        graph.add_node("hyper", &["http"]).await;
        graph.add_edge("rust", "tokio").await;
        graph.add_edge("tokio", "hyper").await;

        let hops = graph.neighborhood("tell me about rust", 2).await.unwrap();
        let depth_of = |id: &str| hops.iter().find(|h| h.id == id).map(|h| h.depth);
        assert_eq!(depth_of("rust"), Some(0));
        assert_eq!(depth_of("tokio"), Some(1));
        assert_eq!(depth_of("hyper"), Some(2));
    }

    #[tokio::test]
    async fn test_graph_depth_bound() {
        let graph = InMemoryGraphStore::new();
        graph.add_node("a", &["a"]).await;
        graph.add_node("b", &[]).await;
        graph.add_node("c", &[]).await;
        graph.add_edge("a", "b").await;
        graph.add_edge("b", "c").await;

        let hops = graph.neighborhood("a", 1).await.unwrap();
        assert!(hops.iter().any(|h| h.id == "b"));
        assert!(!hops.iter().any(|h| h.id == "c"));
    }

    #[tokio::test]
    async fn test_episodic_recall_scoped_and_ranked() {
        let store = InMemoryEpisodicStore::new();
        store.record("work", "fixed the race in the fusion scorer").await;
        store.record("work", "lunch was good").await;
        store.record("home", "fusion cooking experiment").await;

        let hits = store.recall("work", "fusion race", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].relevance - 1.0).abs() < 1e-6);
        assert_eq!(hits[0].namespace, "work");

        let other = store.recall("home", "fusion race", 10).await.unwrap();
        assert_eq!(other.len(), 1);
        assert!(other[0].relevance < 1.0);
    }

    #[tokio::test]
    async fn test_episodic_dedup_by_content_hash() {
        let store = InMemoryEpisodicStore::new();
        let first = store.record("ns", "exactly the same words").await;
        let second = store.record("ns", "exactly the same words").await;
        assert_eq!(first, second);

        let hits = store.recall("ns", "exactly", 10).await.unwrap();
        assert_eq!(hits.len(), 1);

        // different namespace gets its own copy
        let third = store.record("other", "exactly the same words").await;
        assert_ne!(first, third);
    }

    #[tokio::test]
    async fn test_pattern_matching_with_floor() {
        let store = InMemoryPatternStore::new();
        store.add_pattern("retry-loop", &["retry", "backoff"], 0.8).await;
        store.add_pattern("noise", &["retry"], 0.1).await;

        let hits = store.match_patterns("how to retry", 0.5, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "retry-loop");
    }

    #[tokio::test]
    async fn test_hashing_embedder_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(32);
        let a = embedder.embed("federated retrieval engine").await.unwrap();
        let b = embedder.embed("federated retrieval engine").await.unwrap();
        let c = embedder.embed("something else entirely").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }
}
