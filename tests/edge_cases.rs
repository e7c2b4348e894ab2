//! Edge case tests.
//!
//! Boundary conditions across the index families and the vector reader:
//! - Empty indexes and k = 0
//! - k larger than the index
//! - Duplicate vectors
//! - Zero vectors under cosine
//! - Dimension mismatches

use std::io::Cursor;

use wordnn::ann::{index_factory, AnnIndex, FactoryOptions};
use wordnn::hnsw::{HnswIndex, HnswParams};
use wordnn::{AnnError, DistanceMetric, VectorCorpus, VectorReader};

fn options() -> FactoryOptions {
    FactoryOptions {
        seed: Some(7),
        ..FactoryOptions::default()
    }
}

// =============================================================================
// Empty and tiny indexes
// =============================================================================

#[test]
fn empty_graph_and_flat_search_return_nothing() {
    for key in ["hnswcustom", "HNSW16", "Flat"] {
        let index = index_factory(3, key, &options()).unwrap();
        assert!(index.search(&[0.0, 0.0, 0.0], 5).unwrap().is_empty(), "{key}");
    }
}

#[test]
fn trained_indexes_reject_build_without_vectors() {
    for key in ["PQ1x2", "IVF4,Flat"] {
        let mut index = index_factory(2, key, &options()).unwrap();
        assert!(index.build().is_err(), "{key}");
    }
}

#[test]
fn k_zero_returns_empty() {
    let mut index = index_factory(2, "hnswcustom", &options()).unwrap();
    index.add(&[1.0, 1.0]).unwrap();
    assert!(index.search(&[1.0, 1.0], 0).unwrap().is_empty());
}

#[test]
fn single_vector_index() {
    let mut index = HnswIndex::new(2, 4).unwrap();
    index.add(&[3.0, 4.0]).unwrap();
    assert_eq!(index.search(&[0.0, 0.0], 3).unwrap(), vec![(0, 25.0)]);
}

#[test]
fn k_larger_than_index_returns_all_in_order() {
    let mut index = index_factory(1, "hnswcustom", &options()).unwrap();
    for x in [4.0f32, 2.0, 8.0] {
        index.add(&[x]).unwrap();
    }
    let ids: Vec<u32> = index
        .search(&[0.0], 300)
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec![1, 0, 2]);
}

// =============================================================================
// Duplicates and degenerate vectors
// =============================================================================

#[test]
fn many_duplicates_stay_searchable() {
    let params = HnswParams {
        seed: Some(1),
        ..HnswParams::with_m(4)
    };
    let mut index = HnswIndex::with_params(3, params).unwrap();
    for _ in 0..100 {
        index.add(&[0.5, 0.5, 0.5]).unwrap();
    }
    AnnIndex::build(&mut index).unwrap();

    // Twins at distance 0 always rank the newest last, so shrinking drops
    // every edge into it; build must reattach them.
    assert_eq!(index.layer_connectivity(0), (100, 0));
    let results = index.search(&[0.5, 0.5, 0.5], 10).unwrap();
    assert_eq!(results.len(), 10);
    assert!(results.iter().all(|&(_, d)| d == 0.0));
}

#[test]
fn zero_vectors_under_cosine_do_not_produce_nan() {
    let options = FactoryOptions {
        metric: DistanceMetric::Cosine,
        ..options()
    };
    let mut index = index_factory(2, "hnswcustom", &options).unwrap();
    index.add(&[0.0, 0.0]).unwrap();
    index.add(&[1.0, 0.0]).unwrap();
    let results = index.search(&[0.0, 0.0], 2).unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|(_, d)| d.is_finite()));
}

#[test]
fn non_finite_components_are_rejected() {
    let mut index = HnswIndex::new(2, 4).unwrap();
    assert!(matches!(
        index.add(&[f32::NAN, 1.0]),
        Err(AnnError::InvalidParameter(_))
    ));
}

#[test]
fn every_family_rejects_non_finite_components() {
    for key in ["hnswcustom", "Flat", "PQ2", "IVF1,Flat"] {
        let mut index = index_factory(4, key, &options()).unwrap();
        for bad in [
            [1.0, f32::NAN, 0.0, 0.0],
            [f32::INFINITY, 0.0, 0.0, 0.0],
            [0.0, 0.0, 0.0, f32::NEG_INFINITY],
        ] {
            assert!(
                matches!(index.add(&bad), Err(AnnError::InvalidParameter(_))),
                "{key}"
            );
        }
        assert_eq!(index.num_vectors(), 0, "{key}");
    }
}

// =============================================================================
// Dimension mismatches
// =============================================================================

#[test]
fn every_family_rejects_wrong_dimensions() {
    for key in ["hnswcustom", "Flat", "PQ2", "IVF1,Flat"] {
        let mut index = index_factory(4, key, &options()).unwrap();
        assert!(
            matches!(
                index.add(&[1.0, 2.0]),
                Err(AnnError::DimensionMismatch {
                    expected: 4,
                    found: 2
                })
            ),
            "{key}"
        );
    }
}

#[test]
fn trained_families_reject_search_before_build() {
    for key in ["PQ2x4", "IVF2,Flat", "IVF2,PQ2x4"] {
        let mut index = index_factory(4, key, &options()).unwrap();
        index.add(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(
            matches!(index.search(&[1.0, 2.0, 3.0, 4.0], 1), Err(AnnError::NotBuilt)),
            "{key}"
        );
    }
}

// =============================================================================
// Vector files
// =============================================================================

#[test]
fn header_only_corpus_is_empty() {
    let reader = VectorReader::new(Cursor::new("0 5\n"), "empty.txt").unwrap();
    let corpus = VectorCorpus::from_reader(reader).unwrap();
    assert!(corpus.is_empty());
    assert_eq!(corpus.dimension(), 5);
}

#[test]
fn crlf_line_endings_are_accepted() {
    let reader = VectorReader::new(Cursor::new("1 2\r\nw 1.5 -2\r\n"), "crlf.txt").unwrap();
    let corpus = VectorCorpus::from_reader(reader).unwrap();
    assert_eq!(corpus.label(0), Some("w"));
    assert_eq!(corpus.vector(0), Some(&[1.5f32, -2.0][..]));
}

#[test]
fn scientific_notation_parses() {
    let reader = VectorReader::new(Cursor::new("1 2\nw 1e-3 2.5E2\n"), "sci.txt").unwrap();
    let corpus = VectorCorpus::from_reader(reader).unwrap();
    assert_eq!(corpus.vector(0), Some(&[0.001f32, 250.0][..]));
}

#[test]
fn missing_file_is_an_input_format_error() {
    let err = VectorCorpus::load("/definitely/not/here.txt").unwrap_err();
    assert!(matches!(err, AnnError::InputFormat { .. }));
}
