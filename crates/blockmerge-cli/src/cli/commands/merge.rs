use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use blockmerge_core::codec::NdjsonBlocks;
use blockmerge_core::{
    BlockOutcome, MergedBlocksWriter, MergerConfig, NdjsonCompression, NdjsonWriterFactory,
    ObjectStoreMergedStore,
};

use super::super::args::MergeArgs;
use crate::exit_codes::{MERGE_FAILED, SUCCESS};

pub async fn run(args: MergeArgs) -> anyhow::Result<i32> {
    let config = load_config(&args)?;

    let compression = if args.no_gzip {
        NdjsonCompression::None
    } else {
        NdjsonCompression::Gzip
    };
    let suffix = args
        .suffix
        .clone()
        .unwrap_or_else(|| compression.suffix().to_string());

    let store = ObjectStoreMergedStore::from_url(&args.store)
        .with_context(|| format!("failed to open store {}", args.store))?
        .with_suffix(suffix);

    let input = open_input(&args.input)?;
    let input_compression = if args.input_gzip {
        NdjsonCompression::Gzip
    } else {
        NdjsonCompression::None
    };

    let mut merger = MergedBlocksWriter::new(
        Arc::new(store),
        Arc::new(NdjsonWriterFactory::new(compression)),
        config,
    );

    let mut seen = 0u64;
    for block in NdjsonBlocks::open(input, input_compression) {
        let block = block.with_context(|| format!("failed to read block stream {}", args.input))?;
        seen += 1;

        match merger.process_block(block).await {
            Ok(BlockOutcome::Accepted) => {}
            Ok(BlockOutcome::Completed) => break,
            Err(e) => {
                tracing::error!(error = %e, low_boundary = ?e.low_boundary(), "merge failed");
                eprintln!("merge failed: {e}");
                return Ok(MERGE_FAILED);
            }
        }
    }

    if args.flush_trailing {
        if let Err(e) = merger.finish().await {
            tracing::error!(error = %e, "flushing trailing bundle");
            eprintln!("merge failed: {e}");
            return Ok(MERGE_FAILED);
        }
    } else if merger.buffered() > 0 {
        tracing::info!(
            low_boundary = merger.low_boundary(),
            blocks = merger.buffered(),
            "dropping trailing partial bundle"
        );
    }

    tracing::info!(blocks = seen, "merge complete");
    Ok(SUCCESS)
}

fn load_config(args: &MergeArgs) -> anyhow::Result<MergerConfig> {
    let mut config = match &args.config {
        Some(path) => MergerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => MergerConfig::default(),
    };

    if let Some(first) = args.first_streamable_block {
        config = config.with_first_streamable_block(first);
    }
    if args.stop_block.is_some() {
        config = config.with_stop_block(args.stop_block);
    }
    if args.no_enforce_size {
        config = config.with_enforce_bundle_size(false);
    }
    Ok(config)
}

fn open_input(input: &str) -> anyhow::Result<Box<dyn Read + Send>> {
    if input == "-" {
        return Ok(Box::new(std::io::stdin()));
    }
    let file =
        std::fs::File::open(input).with_context(|| format!("failed to open input {input}"))?;
    Ok(Box::new(file))
}
