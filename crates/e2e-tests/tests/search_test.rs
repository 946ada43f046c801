//! Search E2E tests: ingested catalog queried by image.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use artlens_indexing::{IngestConfig, NoOpProgressCallback};
use artlens_service::{SearchError, SearchService};
use artlens_types::ArtworkPayload;
use artlens_vector::{IndexRecord, VectorStore};
use bytes::Bytes;
use e2e_tests::{color_for, png, random_vector, MeanColorEmbedder, StubImageSource, TestHarness};

async fn ingest_ids(harness: &TestHarness, ids: &[u64]) {
    let rows: Vec<(u64, &str, &str)> = ids.iter().map(|&id| (id, "Work", "Paintings")).collect();
    let catalog = harness.write_catalog("catalog.csv", &rows);
    let mut source = StubImageSource::new().0;
    for &id in ids {
        source = source.with_artwork(id);
    }
    let mut ingestor = harness.ingestor(
        Arc::new(source),
        Arc::new(MeanColorEmbedder::new()),
        IngestConfig::default(),
    );
    ingestor
        .run(&mut harness.reader(&catalog, None), &NoOpProgressCallback)
        .await
        .unwrap();
}

/// Asking for more results than stored returns everything, best first.
#[tokio::test]
async fn test_top_k_larger_than_collection() {
    let harness = TestHarness::new();
    ingest_ids(&harness, &[5, 60, 170]).await;
    let service = SearchService::new(Arc::new(MeanColorEmbedder::new()), harness.store.clone());

    let hits = service.search(png(color_for(60)), 5).await.unwrap();

    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].id, 60);
    assert!((hits[0].score - 1.0).abs() < 1e-4);
    assert_eq!(hits[0].title, "Work");
    assert_eq!(hits[0].artist, "Artist 60");
    for pair in hits.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_empty_collection_returns_no_hits() {
    let harness = TestHarness::new();
    let service = SearchService::new(Arc::new(MeanColorEmbedder::new()), harness.store.clone());

    let hits = service.search(png([10, 200, 10]), 5).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn test_undecodable_query_is_an_error() {
    let harness = TestHarness::new();
    ingest_ids(&harness, &[1]).await;
    let service = SearchService::new(Arc::new(MeanColorEmbedder::new()), harness.store.clone());

    let result = service
        .search(Bytes::from_static(b"definitely not an image"), 5)
        .await;
    assert!(matches!(result, Err(SearchError::UndecodableImage)));
}

/// Hits for vectors stored without metadata carry empty fields.
#[tokio::test]
async fn test_search_over_random_collection() {
    let harness = TestHarness::new();
    let mut rng = StdRng::seed_from_u64(7);
    let records: Vec<IndexRecord> = (0..50)
        .map(|id| {
            IndexRecord::new(
                id,
                random_vector(&mut rng),
                ArtworkPayload {
                    title: format!("Random {id}"),
                    ..Default::default()
                },
            )
        })
        .collect();
    let target = records[17].vector.clone();
    harness.store.upsert(records).await.unwrap();

    let points = harness.store.search(&target, 10).await.unwrap();
    assert_eq!(points.len(), 10);
    assert_eq!(points[0].id, 17);
    assert_eq!(points[0].payload.as_ref().unwrap().title, "Random 17");
}
