//! Bundle cutting behaviour of `MergedBlocksWriter`, observed through a
//! recording store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use blockmerge_core::codec::read_blocks;
use blockmerge_core::{
    Block, BlockOutcome, ByteStream, MergeError, MergedBlocksStore, MergedBlocksWriter,
    MergerConfig, NdjsonCompression, NdjsonWriterFactory, StoreError, StoreResult,
};
use futures::StreamExt;

/// Store that drains every stream into memory and remembers the writes.
#[derive(Default)]
struct RecordingStore {
    writes: Mutex<Vec<(String, Vec<u8>)>>,
    fail_on: Option<String>,
}

impl RecordingStore {
    fn failing_on(name: &str) -> Self {
        Self {
            writes: Mutex::new(Vec::new()),
            fail_on: Some(name.to_string()),
        }
    }

    fn names(&self) -> Vec<String> {
        self.writes
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn blocks(&self, name: &str) -> Vec<Block> {
        let writes = self.writes.lock().unwrap();
        let (_, bytes) = writes
            .iter()
            .find(|(n, _)| n == name)
            .unwrap_or_else(|| panic!("no merged file {name}"));
        read_blocks(bytes, NdjsonCompression::None).unwrap()
    }
}

#[async_trait]
impl MergedBlocksStore for RecordingStore {
    async fn write_object(&self, name: &str, mut content: ByteStream) -> StoreResult<()> {
        let mut bytes = Vec::new();
        while let Some(chunk) = content.next().await {
            let chunk = chunk.map_err(|source| StoreError::Source {
                name: name.to_string(),
                source,
            })?;
            bytes.extend_from_slice(&chunk);
        }

        if self.fail_on.as_deref() == Some(name) {
            return Err(StoreError::Io {
                message: "bucket unavailable".into(),
            });
        }

        self.writes.lock().unwrap().push((name.to_string(), bytes));
        Ok(())
    }
}

fn merger(store: Arc<RecordingStore>, config: MergerConfig) -> MergedBlocksWriter {
    let factory = Arc::new(NdjsonWriterFactory::new(NdjsonCompression::None));
    MergedBlocksWriter::new(store, factory, config)
}

fn blk(n: u64) -> Block {
    Block::new(n, format!("{n:016x}")).with_parent(n.saturating_sub(1), format!("{:016x}", n.saturating_sub(1)))
}

async fn feed(merger: &mut MergedBlocksWriter, numbers: impl IntoIterator<Item = u64>) {
    for n in numbers {
        assert_eq!(
            merger.process_block(blk(n)).await.unwrap(),
            BlockOutcome::Accepted,
            "block {n}"
        );
    }
}

// ============================================================================
// Complete bundles
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_full_bundle_flushes_exactly_once() {
    for base in [0u64, 100, 4200, 17_000_000] {
        let store = Arc::new(RecordingStore::default());
        let mut merger = merger(store.clone(), MergerConfig::default());

        feed(&mut merger, base..base + 100).await;

        let expected_name = format!("{:010}", base);
        assert_eq!(store.names(), vec![expected_name.clone()]);

        let blocks = store.blocks(&expected_name);
        assert_eq!(blocks.len(), 100);
        assert!(blocks.iter().map(|b| b.number).eq(base..base + 100));
        assert_eq!(merger.low_boundary(), base + 100);
        assert_eq!(merger.buffered(), 0);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_consecutive_bundles_with_size_enforced() {
    let store = Arc::new(RecordingStore::default());
    let mut merger = merger(store.clone(), MergerConfig::default());

    feed(&mut merger, 0..350).await;

    assert_eq!(
        store.names(),
        vec!["0000000000", "0000000100", "0000000200"]
    );
    assert_eq!(merger.buffered(), 50);
    assert_eq!(merger.low_boundary(), 300);
}

// ============================================================================
// Boundary establishment
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_first_block_off_boundary_is_rejected() {
    let store = Arc::new(RecordingStore::default());
    let mut merger = merger(store.clone(), MergerConfig::default());

    let err = merger.process_block(blk(150)).await.unwrap_err();
    assert!(matches!(
        err,
        MergeError::BoundaryViolation {
            block_number: 150,
            ..
        }
    ));
    assert!(store.names().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_first_streamable_block_is_accepted_off_boundary() {
    let store = Arc::new(RecordingStore::default());
    let config = MergerConfig::default().with_first_streamable_block(150);
    let mut merger = merger(store.clone(), config);

    feed(&mut merger, 150..200).await;

    assert_eq!(store.names(), vec!["0000000100"]);
    assert_eq!(store.blocks("0000000100").len(), 50);
}

// ============================================================================
// Missing blocks
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_block_from_next_bundle_flushes_short_buffer() {
    let store = Arc::new(RecordingStore::default());
    let config = MergerConfig::default().with_enforce_bundle_size(false);
    let mut merger = merger(store.clone(), config);

    feed(&mut merger, 0..50).await;
    feed(&mut merger, [150]).await;

    assert_eq!(store.names(), vec!["0000000000"]);
    assert_eq!(store.blocks("0000000000").len(), 50);
    assert_eq!(merger.low_boundary(), 100);
    assert_eq!(merger.buffered(), 1);

    feed(&mut merger, 151..200).await;
    assert_eq!(store.names(), vec!["0000000000", "0000000100"]);
    assert_eq!(store.blocks("0000000100").len(), 50);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_gap_wider_than_one_bundle_advances_one_width_per_flush() {
    let store = Arc::new(RecordingStore::default());
    let config = MergerConfig::default().with_enforce_bundle_size(false);
    let mut merger = merger(store.clone(), config);

    feed(&mut merger, 0..50).await;
    feed(&mut merger, [350]).await;

    // Only one step: 350 now sits in the buffer for [100, 199]
    assert_eq!(merger.low_boundary(), 100);
    assert_eq!(merger.buffered(), 1);

    feed(&mut merger, [351]).await;
    assert_eq!(store.names(), vec!["0000000000", "0000000100"]);
    assert_eq!(store.blocks("0000000100")[0].number, 350);
    assert_eq!(merger.low_boundary(), 200);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_undersized_bundle_fails_with_count() {
    let store = Arc::new(RecordingStore::default());
    let mut merger = merger(store.clone(), MergerConfig::default());

    feed(&mut merger, 0..200).await;
    feed(&mut merger, 200..256).await;

    let err = merger.process_block(blk(299)).await.unwrap_err();
    match err {
        MergeError::SizeMismatch {
            low_boundary,
            expected,
            actual,
            duplicate_numbers,
            duplicate_ids,
        } => {
            assert_eq!(low_boundary, 200);
            assert_eq!(expected, 100);
            assert_eq!(actual, 57);
            assert_eq!((duplicate_numbers, duplicate_ids), (0, 0));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.names(), vec!["0000000000", "0000000100"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_duplicate_block_makes_bundle_oversized() {
    let store = Arc::new(RecordingStore::default());
    let mut merger = merger(store.clone(), MergerConfig::default());

    feed(&mut merger, 0..100).await;
    feed(&mut merger, 100..150).await;
    feed(&mut merger, 149..199).await;

    let err = merger.process_block(blk(199)).await.unwrap_err();
    assert!(matches!(
        err,
        MergeError::SizeMismatch {
            low_boundary: 100,
            actual: 101,
            duplicate_numbers: 1,
            duplicate_ids: 1,
            ..
        }
    ));
    // The mismatch leaves the bundle in place
    assert_eq!(merger.buffered(), 101);
    assert_eq!(merger.low_boundary(), 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_forked_block_counted_as_number_duplicate_only() {
    let store = Arc::new(RecordingStore::default());
    let mut merger = merger(store.clone(), MergerConfig::default());

    feed(&mut merger, 0..100).await;
    feed(&mut merger, 100..150).await;
    let fork = Block::new(149, "fork-149");
    assert_eq!(merger.process_block(fork).await.unwrap(), BlockOutcome::Accepted);
    feed(&mut merger, 150..199).await;

    let err = merger.process_block(blk(199)).await.unwrap_err();
    assert!(matches!(
        err,
        MergeError::SizeMismatch {
            actual: 101,
            duplicate_numbers: 1,
            duplicate_ids: 0,
            ..
        }
    ));
}

// ============================================================================
// Stop block
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_block_completes_without_buffering() {
    let store = Arc::new(RecordingStore::default());
    let config = MergerConfig::default().with_stop_block(Some(300));
    let mut merger = merger(store.clone(), config);

    feed(&mut merger, 200..300).await;
    assert_eq!(store.names(), vec!["0000000200"]);

    let outcome = merger.process_block(blk(300)).await.unwrap();
    assert_eq!(outcome, BlockOutcome::Completed);
    assert!(merger.is_terminated());
    assert_eq!(merger.buffered(), 0);
    assert_eq!(store.names(), vec!["0000000200"]);
    assert!(store
        .blocks("0000000200")
        .iter()
        .all(|b| b.number < 300));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_stop_block_after_missing_last_block_still_flushes() {
    let store = Arc::new(RecordingStore::default());
    let config = MergerConfig::default()
        .with_stop_block(Some(300))
        .with_enforce_bundle_size(false);
    let mut merger = merger(store.clone(), config);

    feed(&mut merger, 200..299).await;
    let outcome = merger.process_block(blk(300)).await.unwrap();

    assert_eq!(outcome, BlockOutcome::Completed);
    assert_eq!(store.names(), vec!["0000000200"]);
    assert_eq!(store.blocks("0000000200").len(), 99);
}

// ============================================================================
// Flush bookkeeping
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_store_write_still_advances() {
    let store = Arc::new(RecordingStore::failing_on("0000000100"));
    let mut merger = merger(store.clone(), MergerConfig::default());

    feed(&mut merger, 0..199).await;
    let err = merger.process_block(blk(199)).await.unwrap_err();

    match err {
        MergeError::Downstream { filename, source } => {
            assert_eq!(filename, "0000000100");
            assert!(source.to_string().contains("bucket unavailable"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(merger.low_boundary(), 200);
    assert_eq!(merger.buffered(), 0);

    // The stream carries on with the next bundle
    feed(&mut merger, 200..300).await;
    assert_eq!(store.names(), vec!["0000000000", "0000000200"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_empty_flush_fails_and_advances() {
    let store = Arc::new(RecordingStore::default());
    let mut merger = merger(store.clone(), MergerConfig::default());

    feed(&mut merger, 1100..1200).await;
    assert_eq!(merger.low_boundary(), 1200);

    let err = merger.process_block(blk(1350)).await.unwrap_err();
    assert!(matches!(err, MergeError::EmptyBundle { low_boundary: 1200 }));
    assert_eq!(merger.low_boundary(), 1300);
    assert_eq!(merger.buffered(), 0);
}
