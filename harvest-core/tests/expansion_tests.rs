//! Property tests for breadth-first keyword expansion.

use std::sync::Arc;

use harvest_core::{
    ExpandedVocabulary, ExpansionConfig, HarvestError, InMemoryOracle, KeywordExpander,
    LanguageTag, OracleRegistry, SeedKeyword,
};
use proptest::prelude::*;

const POOL: &[&str] = &["river", "stream", "lake", "pond", "creek", "delta", "basin", "spring"];

fn en() -> LanguageTag {
    LanguageTag::new("en").unwrap()
}

/// A random neighbour graph over [`POOL`]: for each term, up to five
/// `(neighbour index, similarity)` pairs.
fn arb_graph() -> impl Strategy<Value = Vec<Vec<(usize, f32)>>> {
    proptest::collection::vec(
        proptest::collection::vec((0..POOL.len(), 0.0f32..=1.0f32), 0..5),
        POOL.len(),
    )
}

fn arb_seeds() -> impl Strategy<Value = Vec<usize>> {
    proptest::collection::btree_set(0..POOL.len(), 1..4).prop_map(|s| s.into_iter().collect())
}

fn oracle_from(graph: &[Vec<(usize, f32)>]) -> InMemoryOracle {
    graph.iter().enumerate().fold(InMemoryOracle::new(), |oracle, (i, neighbours)| {
        oracle.with_neighbours(POOL[i], neighbours.iter().map(|&(j, s)| (POOL[j], s)))
    })
}

fn expander(graph: &[Vec<(usize, f32)>]) -> KeywordExpander {
    let registry = OracleRegistry::builder().register_model(en(), Arc::new(oracle_from(graph))).build();
    KeywordExpander::new(Arc::new(registry))
}

fn config(depth: u32, breadth: usize, min_similarity: f32) -> ExpansionConfig {
    ExpansionConfig::builder()
        .depth(depth)
        .breadth(breadth)
        .min_similarity(min_similarity)
        .build()
        .unwrap()
}

fn seeds(indices: &[usize]) -> Vec<SeedKeyword> {
    indices.iter().map(|&i| SeedKeyword::new(POOL[i], en()).unwrap()).collect()
}

fn expand(
    graph: &[Vec<(usize, f32)>],
    seed_indices: &[usize],
    config: ExpansionConfig,
) -> ExpandedVocabulary {
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(expander(graph).expand(&seeds(seed_indices), &en(), &config)).unwrap()
}

mod prop_expansion {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn depth_zero_returns_exactly_the_seeds(
            graph in arb_graph(),
            seed_indices in arb_seeds(),
            breadth in 1usize..5,
        ) {
            let vocabulary = expand(&graph, &seed_indices, config(0, breadth, 0.0));
            prop_assert_eq!(vocabulary.len(), seed_indices.len());
            for &i in &seed_indices {
                let keyword = vocabulary.get(POOL[i]).unwrap();
                prop_assert_eq!(keyword.generation, 0);
                prop_assert_eq!(keyword.similarity, 1.0);
            }
        }

        #[test]
        fn derived_terms_respect_min_similarity_and_depth(
            graph in arb_graph(),
            seed_indices in arb_seeds(),
            depth in 1u32..4,
            breadth in 1usize..5,
            min_similarity in 0.0f32..=1.0f32,
        ) {
            let vocabulary = expand(&graph, &seed_indices, config(depth, breadth, min_similarity));
            for keyword in vocabulary.iter() {
                if keyword.generation == 0 {
                    prop_assert_eq!(keyword.similarity, 1.0);
                    prop_assert!(seed_indices.iter().any(|&i| POOL[i] == keyword.term));
                } else {
                    prop_assert!(keyword.generation <= depth);
                    prop_assert!(keyword.similarity >= min_similarity);
                    prop_assert!(keyword.similarity <= 1.0);
                }
            }

            let bound: usize = (0..=depth).map(|g| breadth.pow(g)).sum::<usize>() * seed_indices.len();
            prop_assert!(vocabulary.len() <= bound);
        }

        #[test]
        fn expansion_is_deterministic(
            graph in arb_graph(),
            seed_indices in arb_seeds(),
            depth in 0u32..4,
            breadth in 1usize..5,
        ) {
            let first = expand(&graph, &seed_indices, config(depth, breadth, 0.3));
            let second = expand(&graph, &seed_indices, config(depth, breadth, 0.3));
            prop_assert_eq!(first, second);
        }
    }
}

#[tokio::test]
async fn river_expands_to_stream_and_lake() {
    let graph = vec![vec![(1, 0.8), (2, 0.6)]];
    let registry = OracleRegistry::builder()
        .register_model(en(), Arc::new(oracle_from(&graph)))
        .build();
    let vocabulary = KeywordExpander::new(Arc::new(registry))
        .expand(&seeds(&[0]), &en(), &config(1, 2, 0.5))
        .await
        .unwrap();

    let entries: Vec<_> = vocabulary
        .iter()
        .map(|k| (k.term.as_str(), k.generation, k.similarity))
        .collect();
    assert_eq!(entries, vec![("lake", 1, 0.6), ("river", 0, 1.0), ("stream", 1, 0.8)]);
}

#[tokio::test]
async fn similarity_never_grows_with_generation() {
    let oracle = InMemoryOracle::new()
        .with_neighbours("river", [("stream", 0.7)])
        .with_neighbours("stream", [("creek", 0.9)])
        .with_neighbours("creek", [("brook", 0.95)]);
    let registry = OracleRegistry::builder().register_model(en(), Arc::new(oracle)).build();
    let vocabulary = KeywordExpander::new(Arc::new(registry))
        .expand(&seeds(&[0]), &en(), &config(3, 2, 0.5))
        .await
        .unwrap();

    let chain: Vec<_> = ["river", "stream", "creek", "brook"]
        .iter()
        .map(|t| vocabulary.get(t).unwrap().similarity)
        .collect();
    assert!(chain.windows(2).all(|w| w[1] <= w[0]), "{chain:?}");
}

#[tokio::test]
async fn unregistered_language_is_model_unavailable() {
    let registry = OracleRegistry::builder().build();
    let de = LanguageTag::new("de").unwrap();
    let seeds = vec![SeedKeyword::new("fluss", de.clone()).unwrap()];
    let err = KeywordExpander::new(Arc::new(registry))
        .expand(&seeds, &de, &config(1, 2, 0.5))
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::ModelUnavailable { .. }));
}
