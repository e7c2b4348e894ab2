//! Integration tests for the HNSW index.
//!
//! Tests the full lifecycle: build, query, persistence.
//!
//! Note: HnswIndex uses ordinals (0, 1, 2, ...) based on insertion order.

use std::collections::{HashSet, VecDeque};

use rand::prelude::*;
use wordnn::ann::{index_factory, AnnIndex, AnyIndex};
use wordnn::hnsw::{HnswIndex, HnswParams, NeighborSelection};
use wordnn::persistence::{read_index, write_index};
use wordnn::{DistanceMetric, NnConfig};

/// Generate random vectors for testing.
fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    use std::hash::{Hash, Hasher};

    (0..n)
        .map(|i| {
            (0..dim)
                .map(|j| {
                    let mut hasher = std::collections::hash_map::DefaultHasher::new();
                    seed.hash(&mut hasher);
                    i.hash(&mut hasher);
                    j.hash(&mut hasher);
                    let h = hasher.finish();
                    (h as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
                })
                .collect()
        })
        .collect()
}

/// `n` vectors spread uniformly within `spread` of one of `clusters` centers,
/// the centers drawn uniformly from `[-center_range, center_range]`.
fn clustered_vectors(
    n: usize,
    dim: usize,
    clusters: usize,
    center_range: f32,
    seed: u64,
) -> Vec<Vec<f32>> {
    let spread = 0.3;
    let mut rng = StdRng::seed_from_u64(seed);
    let centers: Vec<Vec<f32>> = (0..clusters)
        .map(|_| {
            (0..dim)
                .map(|_| rng.random_range(-center_range..center_range))
                .collect()
        })
        .collect();
    (0..n)
        .map(|i| {
            centers[i % clusters]
                .iter()
                .map(|c| c + rng.random_range(-spread..spread))
                .collect()
        })
        .collect()
}

fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Compute exact k-NN under squared L2.
fn exact_knn(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<(u32, f32)> {
    let mut distances: Vec<(u32, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i as u32, l2(v, query)))
        .collect();
    distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    distances.truncate(k);
    distances
}

/// Calculate recall@k.
fn recall_at_k(exact: &[(u32, f32)], approx: &[(u32, f32)], k: usize) -> f32 {
    let exact_set: HashSet<u32> = exact.iter().take(k).map(|(i, _)| *i).collect();
    let approx_set: HashSet<u32> = approx.iter().take(k).map(|(i, _)| *i).collect();
    exact_set.intersection(&approx_set).count() as f32 / k as f32
}

fn build(vectors: &[Vec<f32>], params: HnswParams) -> HnswIndex {
    let mut index = HnswIndex::with_params(vectors[0].len(), params).unwrap();
    for v in vectors {
        index.add(v).unwrap();
    }
    AnnIndex::build(&mut index).unwrap();
    index
}

/// Build the way `nn` does with its default flags.
fn build_with_tool_defaults(vectors: &[Vec<f32>], seed: u64) -> AnyIndex {
    let config = NnConfig {
        seed: Some(seed),
        ..NnConfig::with_paths("corpus.txt", "query.txt", "nn.txt", "index.bin")
    };
    let mut index = index_factory(vectors[0].len(), &config.index_key, &config.factory_options())
        .unwrap();
    for v in vectors {
        index.add(v).unwrap();
    }
    index.build().unwrap();
    index
}

/// Nodes reachable from the entry point over layer-0 edges.
fn reachable_on_layer0(index: &HnswIndex) -> usize {
    let Some(entry) = index.entry_point() else {
        return 0;
    };
    let mut seen = vec![false; index.len()];
    let mut queue = VecDeque::from([entry]);
    seen[entry as usize] = true;
    while let Some(node) = queue.pop_front() {
        for &next in index.neighbors(node, 0) {
            if !seen[next as usize] {
                seen[next as usize] = true;
                queue.push_back(next);
            }
        }
    }
    seen.iter().filter(|s| **s).count()
}

fn self_search_misses(index: &HnswIndex, vectors: &[Vec<f32>]) -> usize {
    vectors
        .iter()
        .enumerate()
        .filter(|&(i, v)| index.search(v, 1).unwrap()[0].0 != i as u32)
        .count()
}

fn seeded(m: usize, seed: u64) -> HnswParams {
    HnswParams {
        ef_construction: 64,
        seed: Some(seed),
        ..HnswParams::with_m(m)
    }
}

fn mean_recall(index: &HnswIndex, data: &[Vec<f32>], queries: &[Vec<f32>], k: usize, ef: usize) -> f32 {
    let total: f32 = queries
        .iter()
        .map(|q| {
            let approx = index.search_with_ef(q, k, ef).unwrap();
            recall_at_k(&exact_knn(data, q, k), &approx, k)
        })
        .sum();
    total / queries.len() as f32
}

#[test]
fn test_layer0_is_connected_from_entry_point() {
    let data = random_vectors(600, 16, 1);
    let index = build(&data, seeded(8, 11));
    assert_eq!(reachable_on_layer0(&index), index.len());
}

#[test]
fn test_clustered_data_stays_connected_with_tool_defaults() {
    // Word embeddings are clustered; far-apart clusters are the hard case for
    // the shrink step, which can drop every edge into a freshly opened cluster.
    for center_range in [1.0, 10.0] {
        for seed in 0..3 {
            let data = clustered_vectors(3000, 16, 20, center_range, seed);
            let index = build_with_tool_defaults(&data, seed);
            let hnsw = index.as_hnsw().unwrap();

            assert_eq!(
                reachable_on_layer0(hnsw),
                data.len(),
                "centers in +-{center_range}, seed {seed}"
            );
            for layer in 0..=hnsw.max_level() {
                assert_eq!(hnsw.layer_connectivity(layer).1, 0, "layer {layer}");
            }
        }
    }
}

#[test]
fn test_clustered_self_search_with_tool_defaults() {
    for seed in 0..3 {
        let data = clustered_vectors(3000, 16, 20, 1.0, seed);
        let index = build_with_tool_defaults(&data, seed);
        let misses = self_search_misses(index.as_hnsw().unwrap(), &data);
        // efConstruction 26 is a fast, low-quality build; a handful of
        // late insertions can hide behind their neighbors' full lists.
        assert!(misses * 50 <= data.len(), "seed {seed}: {misses} misses");
    }
}

#[test]
fn test_clustered_self_search_is_exact_with_a_wider_build_beam() {
    for center_range in [1.0, 10.0] {
        let data = clustered_vectors(1500, 16, 20, center_range, 4);
        let params = HnswParams {
            ef_construction: 200,
            ef_search: 64,
            ..seeded(8, 4)
        };
        let index = build(&data, params);
        assert_eq!(self_search_misses(&index, &data), 0, "centers in +-{center_range}");
    }
}

#[test]
fn test_degree_bounds_hold_on_every_layer() {
    let data = random_vectors(800, 8, 2);
    let m = 6;
    let index = build(&data, seeded(m, 3));

    for id in 0..index.len() as u32 {
        let level = index.level(id).unwrap();
        assert!(level <= index.max_level());
        assert!(index.neighbors(id, 0).len() <= 2 * m);
        for layer in 1..=level {
            assert!(index.neighbors(id, layer).len() <= m);
        }
        // No links above the node's own level.
        assert!(index.neighbors(id, level + 1).is_empty());
    }
}

#[test]
fn test_every_vector_finds_itself() {
    let data = random_vectors(300, 12, 4);
    let index = build(&data, seeded(8, 5));

    for (i, v) in data.iter().enumerate() {
        let results = index.search_with_ef(v, 1, 64).unwrap();
        assert_eq!(results[0].0, i as u32);
        assert_eq!(results[0].1, 0.0);
    }
}

#[test]
fn test_recall_does_not_drop_with_larger_ef() {
    let data = random_vectors(1000, 16, 6);
    let queries = random_vectors(50, 16, 7);
    let index = build(&data, seeded(8, 8));

    let low = mean_recall(&index, &data, &queries, 10, 10);
    let high = mean_recall(&index, &data, &queries, 10, 200);
    assert!(high >= low, "recall fell from {low} to {high}");
    assert!(high > 0.9, "recall@10 with ef=200 only {high}");
}

#[test]
fn test_results_sorted_and_bounded_by_k() {
    let data = random_vectors(200, 8, 9);
    let index = build(&data, seeded(4, 10));
    let results = index.search(&data[17], 25).unwrap();
    assert_eq!(results.len(), 25);
    for pair in results.windows(2) {
        assert!(pair[0].1 < pair[1].1 || (pair[0].1 == pair[1].1 && pair[0].0 < pair[1].0));
    }
}

#[test]
fn test_same_seed_builds_same_graph() {
    let data = random_vectors(300, 8, 12);
    let a = build(&data, seeded(8, 42));
    let b = build(&data, seeded(8, 42));

    assert_eq!(a.entry_point(), b.entry_point());
    assert_eq!(a.max_level(), b.max_level());
    for id in 0..a.len() as u32 {
        assert_eq!(a.level(id), b.level(id));
        assert_eq!(a.neighbors(id, 0), b.neighbors(id, 0));
    }
}

#[test]
fn test_simple_selection_also_finds_neighbors() {
    let data = random_vectors(400, 8, 13);
    let queries = random_vectors(20, 8, 14);
    let params = HnswParams {
        neighbor_selection: NeighborSelection::Simple,
        ..seeded(12, 15)
    };
    let index = build(&data, params);
    assert!(mean_recall(&index, &data, &queries, 5, 100) > 0.8);
}

#[test]
fn test_inner_product_metric_is_used_for_search() {
    let params = HnswParams {
        metric: DistanceMetric::InnerProduct,
        ..seeded(4, 16)
    };
    let mut index = HnswIndex::with_params(2, params).unwrap();
    index.add(&[1.0, 0.0]).unwrap();
    index.add(&[3.0, 0.0]).unwrap();
    index.add(&[0.0, 1.0]).unwrap();

    let results = index.search(&[1.0, 0.0], 1).unwrap();
    assert_eq!(results, vec![(1, -3.0)]);
}

#[test]
fn test_persistence_round_trip_gives_identical_results() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hnsw.idx");

    let data = random_vectors(500, 16, 17);
    let queries = random_vectors(25, 16, 18);
    let params = HnswParams {
        metric: DistanceMetric::Cosine,
        ef_search: 40,
        ..seeded(8, 19)
    };
    let index = AnyIndex::Hnsw(build(&data, params.clone()));
    write_index(&index, &path).unwrap();
    let loaded = read_index(&path).unwrap();

    let reloaded = loaded.as_hnsw().unwrap();
    assert_eq!(reloaded.params(), &params);
    assert_eq!(loaded.num_vectors(), 500);
    for q in &queries {
        assert_eq!(index.search(q, 10).unwrap(), loaded.search(q, 10).unwrap());
    }
}

#[test]
fn test_ef_search_can_change_after_build() {
    let data = random_vectors(200, 8, 20);
    let mut index = build(&data, seeded(8, 21));
    index.set_ef_search(150);
    assert_eq!(index.params().ef_search, 150);
    assert_eq!(index.search(&data[3], 1).unwrap()[0].0, 3);
}
